//! Minimal POSIX shell word handling.
//!
//! Only what the engine needs: quoting values substituted into command
//! templates, and splitting a rendered command back into words so the
//! safety validator can inspect flags and targets.

/// Quote a value for safe substitution into a shell command.
///
/// Values made only of unremarkable characters are returned as-is; anything
/// else is wrapped in single quotes (`it's` → `'it'\''s'`).
pub fn escape(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '=' | '@')
        })
    {
        return s.to_string();
    }

    let mut escaped = String::with_capacity(s.len() + 4);
    escaped.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// Split a command line into words, honouring single and double quotes and
/// backslash escapes. Shell operators (`|`, `;`, `&`, `<`, `>`) outside
/// quotes end the current word and are emitted as their own words.
pub fn split(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_word = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(next) = chars.next() {
                                current.push(next);
                            }
                        }
                        _ => current.push(c),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' | ';' | '&' | '<' | '>' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
                let mut op = ch.to_string();
                while let Some(&next) = chars.peek() {
                    if next == ch {
                        op.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                words.push(op);
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Whether a word is a shell control operator produced by [`split`].
pub fn is_operator(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| matches!(c, '|' | ';' | '&' | '<' | '>'))
}

/// Binary name of the leading word, path stripped (`/usr/bin/nmap` → `nmap`).
pub fn leading_binary(command: &str) -> Option<String> {
    let words = split(command);
    let first = words.first()?;
    if is_operator(first) {
        return None;
    }
    first.rsplit('/').next().map(str::to_string)
}
