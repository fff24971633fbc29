//! Interactive approval gate for proposed commands.
//!
//! Every command the safety validator accepts is shown here before it
//! reaches the execution tracker:
//!
//! ```text
//! ═══════════════════════════════════════════════════════════════
//!   ⚠️  Command Requires Approval
//! ═══════════════════════════════════════════════════════════════
//!
//! Session:   session-20240501-101500-123456
//! Phase:     Enumeration
//! Objective: identify services on 10.0.0.5
//!
//! Command:
//!   nmap -sV -p 22,80 10.0.0.5
//!
//! Commands:
//!   approve         - Run this command as-is
//!   edit [command]  - Replace the command (re-validated)
//!   reject [reason] - Skip it and plan something else
//!
//! approve>
//! ```
//!
//! # Commands
//!
//! | Command | Aliases | Description |
//! |---------|---------|-------------|
//! | `approve` | `a`, `y`, `yes` | Submit the command |
//! | `edit` | `e` | Replace the command string |
//! | `reject` | `r`, `n`, `no` | Reject, with an optional reason |

use async_trait::async_trait;
use colored::Colorize;
use gauntlet_application::{ApprovalDecision, ApprovalError, ApprovalPort, ApprovalRequest};
use gauntlet_domain::core::string::truncate;
use std::io::{self, BufRead, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";

/// One line typed at the approval prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Answer {
    Approve,
    /// `edit` with the replacement inline, or `None` to ask for it.
    Edit(Option<String>),
    Reject(Option<String>),
    Help,
    Unknown(String),
}

fn parse_answer(input: &str) -> Answer {
    let input = input.trim();
    let input = input.strip_prefix('/').unwrap_or(input);
    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };
    let rest = (!rest.is_empty()).then(|| rest.to_string());

    match word.to_lowercase().as_str() {
        "approve" | "a" | "y" | "yes" if rest.is_none() => Answer::Approve,
        "edit" | "e" => Answer::Edit(rest),
        "reject" | "r" | "n" | "no" => Answer::Reject(rest),
        "help" | "h" | "?" => Answer::Help,
        _ => Answer::Unknown(input.to_string()),
    }
}

/// Terminal approval prompt.
///
/// Implements [`ApprovalPort`]. Input is read on a blocking thread so the
/// runtime keeps driving the Ctrl+C handler while the prompt waits; end of
/// input is treated as cancellation.
pub struct InteractiveApproval;

impl InteractiveApproval {
    pub fn new() -> Self {
        Self
    }

    fn display_prompt(request: &ApprovalRequest) {
        let command = &request.command;
        println!();
        println!("{}", RULE.yellow().bold());
        println!("{}", "  ⚠️  Command Requires Approval".yellow().bold());
        println!("{}", RULE.yellow().bold());
        println!();

        println!("{} {}", "Session:  ".cyan().bold(), request.session_id);
        println!("{} {}", "Goal:     ".cyan().bold(), truncate(&request.goal, 100));
        println!(
            "{} {}",
            "Phase:    ".cyan().bold(),
            request.phase.display_name()
        );
        if let Some(objective) = &request.objective {
            println!("{} {}", "Objective:".cyan().bold(), objective);
        }
        println!(
            "{} {} ({})",
            "Intent:   ".cyan().bold(),
            command.intent,
            command.tool.dimmed()
        );
        println!();

        println!("{}", "Command:".cyan().bold());
        println!("  {}", command.rendered_command.bold());
        println!();

        if !command.reasoning.is_empty() {
            println!("{}", "Reasoning:".cyan().bold());
            println!("  {}", truncate(&command.reasoning, 300).dimmed());
            println!();
        }

        if !request.advisories.is_empty() {
            println!("{}", "Advisories:".yellow().bold());
            for advisory in &request.advisories {
                println!("  └─ {}", advisory.yellow());
            }
            println!();
        }

        Self::display_commands();
    }

    fn display_commands() {
        println!("{}", "Commands:".cyan().bold());
        println!("  {}         - Run this command as-is", "approve".green());
        println!(
            "  {}  - Replace the command (re-validated)",
            "edit [command]".yellow()
        );
        println!(
            "  {} - Skip it and plan something else",
            "reject [reason]".red()
        );
        println!();
    }

    /// Print a prompt and read one line; `None` on end of input.
    async fn read_line(prompt: &str) -> Result<Option<String>, ApprovalError> {
        print!("{} ", prompt.magenta().bold());
        io::stdout()
            .flush()
            .map_err(|e| ApprovalError::Io(format!("Failed to flush stdout: {}", e)))?;

        tokio::task::spawn_blocking(|| {
            let mut input = String::new();
            match io::stdin().lock().read_line(&mut input) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(input.trim().to_string())),
                Err(e) => Err(ApprovalError::Io(format!("Failed to read input: {}", e))),
            }
        })
        .await
        .map_err(|e| ApprovalError::Io(format!("Input task failed: {}", e)))?
    }
}

impl Default for InteractiveApproval {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalPort for InteractiveApproval {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Self::display_prompt(request);

        loop {
            let Some(input) = Self::read_line("approve>").await? else {
                println!();
                return Err(ApprovalError::Cancelled);
            };

            match parse_answer(&input) {
                Answer::Approve => {
                    println!("{}", "✓ Approved".green().bold());
                    return Ok(ApprovalDecision::Approve);
                }
                Answer::Reject(reason) => {
                    println!("{}", "✗ Rejected".red().bold());
                    return Ok(ApprovalDecision::Reject { reason });
                }
                Answer::Edit(Some(command)) => {
                    println!("{} {}", "✎ Edited:".yellow().bold(), command);
                    return Ok(ApprovalDecision::Edit(command));
                }
                Answer::Edit(None) => {
                    let Some(command) = Self::read_line("command>").await? else {
                        println!();
                        return Err(ApprovalError::Cancelled);
                    };
                    if command.is_empty() {
                        println!("{}", "Empty command; nothing changed.".dimmed());
                        continue;
                    }
                    println!("{} {}", "✎ Edited:".yellow().bold(), command);
                    return Ok(ApprovalDecision::Edit(command));
                }
                Answer::Help => Self::display_commands(),
                Answer::Unknown(input) if input.is_empty() => {}
                Answer::Unknown(input) => {
                    println!("{} Unknown command: {}", "?".yellow(), input);
                    Self::display_commands();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_approve_aliases() {
        for input in ["approve", "a", "Y", "/approve", "  yes  "] {
            assert_eq!(parse_answer(input), Answer::Approve, "{}", input);
        }
    }

    #[test]
    fn test_parse_reject_with_reason() {
        assert_eq!(parse_answer("reject"), Answer::Reject(None));
        assert_eq!(
            parse_answer("r   too noisy for this host"),
            Answer::Reject(Some("too noisy for this host".to_string()))
        );
    }

    #[test]
    fn test_parse_edit_inline_and_prompted() {
        assert_eq!(parse_answer("e"), Answer::Edit(None));
        assert_eq!(
            parse_answer("edit nmap -sV -p 22 10.0.0.5"),
            Answer::Edit(Some("nmap -sV -p 22 10.0.0.5".to_string()))
        );
    }

    #[test]
    fn test_approve_with_trailing_text_is_not_approval() {
        assert!(matches!(parse_answer("a b"), Answer::Unknown(_)));
        assert_eq!(parse_answer("?"), Answer::Help);
        assert_eq!(parse_answer(""), Answer::Unknown(String::new()));
    }
}
