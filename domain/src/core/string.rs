//! String utilities for the domain layer.

/// Marker appended when captured output exceeds its cap.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Truncate a string to a maximum length with ellipsis (UTF-8 safe)
///
/// Uses byte length for max_len but ensures truncation occurs at valid
/// UTF-8 character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let end = floor_char_boundary(s, target);
        format!("{}...", &s[..end])
    }
}

/// Cap captured command output at `max_bytes`, appending [`TRUNCATION_MARKER`]
/// when anything was dropped.
pub fn cap_output(mut s: String, max_bytes: usize) -> String {
    if s.len() > max_bytes {
        let end = floor_char_boundary(&s, max_bytes);
        s.truncate(end);
        s.push_str(TRUNCATION_MARKER);
    }
    s
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut end = index.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}
