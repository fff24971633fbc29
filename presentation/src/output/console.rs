//! Console output formatter for sessions, runs and the tool catalog

use colored::Colorize;
use gauntlet_application::{RunAgentOutput, StopReason};
use gauntlet_domain::command::{CommandRecord, CommandStatus, CompletedCommand};
use gauntlet_domain::core::string::truncate;
use gauntlet_domain::session::{ResumeContext, SessionView};
use gauntlet_domain::tool::ToolCatalog;

/// Formats session data for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Full report of one session
    pub fn format_view(view: &SessionView) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Session Report"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Session:".cyan().bold(), view.session_id));
        output.push_str(&format!("{} {}\n", "Goal:".cyan().bold(), view.goal));
        let state = if view.done {
            "done".green().bold().to_string()
        } else {
            view.loop_state.to_string()
        };
        output.push_str(&format!(
            "{} {} ({}), cycle {}\n",
            "Phase:".cyan().bold(),
            view.phase.display_name(),
            state,
            view.cycle
        ));
        output.push_str(&format!(
            "{} {} / updated {}\n",
            "Started:".cyan().bold(),
            view.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            view.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(objective) = &view.current_objective {
            output.push_str(&format!("{} {}\n", "Objective:".cyan().bold(), objective));
        }
        if let Some(pending) = &view.pending_command {
            output.push_str(&format!(
                "{} {}\n",
                "Waiting on:".yellow().bold(),
                pending
            ));
        }

        output.push_str(&Self::section_header(&format!("Facts ({})", view.summary)));
        output.push_str(&Self::format_facts(view));

        output.push_str(&Self::section_header(&format!(
            "Commands ({} run, {} succeeded)",
            view.commands.len(),
            view.successful_commands()
        )));
        if view.commands.is_empty() {
            output.push_str(&format!("  {}\n", "none".dimmed()));
        }
        for command in &view.commands {
            output.push_str(&Self::format_command_line(command));
        }

        if !view.failures.is_empty() {
            output.push_str(&Self::section_header(&format!(
                "Failures ({})",
                view.failures.len()
            )));
            for failure in &view.failures {
                output.push_str(&format!(
                    "  {} [{}] {}: {}\n",
                    failure.timestamp.format("%H:%M:%S").to_string().dimmed(),
                    failure.phase,
                    failure.kind.as_str().yellow(),
                    truncate(&failure.reason, 100)
                ));
            }
        }

        if !view.phase_history.is_empty() {
            output.push_str(&Self::section_header("Phase History"));
            for transition in &view.phase_history {
                output.push_str(&format!(
                    "  {} {} → {}  {}\n",
                    transition.timestamp.format("%H:%M:%S").to_string().dimmed(),
                    transition.from,
                    transition.to.to_string().cyan(),
                    truncate(&transition.reason, 80).dimmed()
                ));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    fn format_facts(view: &SessionView) -> String {
        let facts = &view.facts;
        let mut output = String::new();
        if facts.is_empty() {
            output.push_str(&format!("  {}\n", "none yet".dimmed()));
            return output;
        }

        if !facts.hosts.is_empty() {
            output.push_str(&format!("{}\n", "Hosts:".bold()));
            for host in facts.hosts.iter() {
                let mut line = format!("  * {}", host.key);
                if !host.hostnames.is_empty() {
                    let names: Vec<_> = host.hostnames.iter().map(String::as_str).collect();
                    line.push_str(&format!(" ({})", names.join(", ")));
                }
                if let Some(os) = &host.os {
                    line.push_str(&format!(" {}", os.dimmed()));
                }
                output.push_str(&line);
                output.push('\n');
            }
        }

        if !facts.services.is_empty() {
            output.push_str(&format!("{}\n", "Services:".bold()));
            for service in facts.services.iter() {
                let name = service.service.as_deref().unwrap_or("unknown");
                let version = service.version.as_deref().unwrap_or("");
                output.push_str(&format!(
                    "  * {}:{}/{} {} {}\n",
                    service.host,
                    service.port,
                    service.protocol,
                    name.green(),
                    version.dimmed()
                ));
            }
        }

        if !facts.vulnerabilities.is_empty() {
            output.push_str(&format!("{}\n", "Vulnerabilities:".bold()));
            for vuln in facts.vulnerabilities.iter() {
                let id = vuln.cve.as_deref().unwrap_or(&vuln.kind);
                let affected: Vec<String> = vuln.affected.iter().map(ToString::to_string).collect();
                output.push_str(&format!(
                    "  * [{}] {} on {}\n",
                    vuln.severity.to_string().red(),
                    id,
                    affected.join(", ")
                ));
            }
        }

        if !facts.credentials.is_empty() {
            output.push_str(&format!("{}\n", "Credentials:".bold()));
            for credential in facts.credentials.iter() {
                let service = credential
                    .service
                    .as_deref()
                    .map(|s| format!(" ({})", s))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "  * {}@{}{} {}\n",
                    credential.username.yellow(),
                    credential.target,
                    service,
                    Self::mask(&credential.secret).dimmed()
                ));
            }
        }

        if !facts.technologies.is_empty() {
            output.push_str(&format!("{}\n", "Technologies:".bold()));
            for tech in facts.technologies.iter() {
                let version = tech.version.as_deref().unwrap_or("");
                let host = tech
                    .host
                    .as_deref()
                    .map(|h| format!(" on {}", h))
                    .unwrap_or_default();
                output.push_str(&format!("  * {} {}{}\n", tech.name, version, host));
            }
        }
        output
    }

    fn format_command_line(command: &CommandRecord) -> String {
        let marker = match (command.status(), command.outcome().map(|o| o.success)) {
            (_, Some(true)) => "✓".green(),
            (_, Some(false)) => "✗".red(),
            (CommandStatus::Running, _) => "⚡".yellow(),
            _ => "…".dimmed(),
        };
        let detail = match command.outcome() {
            Some(outcome) if !outcome.success => outcome
                .failure
                .as_ref()
                .map(|f| format!(" ({})", f))
                .unwrap_or_default(),
            Some(_) => String::new(),
            None => format!(" ({})", command.status()),
        };
        format!(
            "  {} {} {} {}{}\n",
            marker,
            command.id.to_string().bold(),
            format!("[{}]", command.phase).dimmed(),
            truncate(&command.rendered_command, 90),
            detail.dimmed()
        )
    }

    /// Short status block for `status` and `resume`
    pub fn format_resume(context: &ResumeContext) -> String {
        format!(
            "{}\n{}",
            Self::section_header("Session Status").trim_start(),
            context
        )
    }

    /// One line per stored session, newest first
    pub fn format_list(views: &[SessionView]) -> String {
        if views.is_empty() {
            return format!("{}\n", "No sessions found.".dimmed());
        }
        let mut sorted: Vec<&SessionView> = views.iter().collect();
        sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut output = String::new();
        for view in sorted {
            let state = if view.done {
                "done".green().to_string()
            } else if view.pending_command.is_some() {
                "waiting".yellow().to_string()
            } else {
                view.loop_state.to_string()
            };
            output.push_str(&format!(
                "{}  {:<14} {:<10} {:>3} cmds  {}\n",
                view.session_id.bold(),
                view.phase.display_name(),
                state,
                view.commands.len(),
                truncate(&view.goal, 50).dimmed()
            ));
        }
        output
    }

    /// Catalog table with installation status
    pub fn format_tools(catalog: &ToolCatalog) -> String {
        let mut output = Self::section_header(&format!("Tools ({})", catalog.len()));
        for tool in catalog.tools() {
            let installed = if catalog.is_available(&tool.name) {
                "installed".green()
            } else {
                "missing".red()
            };
            let phases: Vec<&str> = tool.phases.iter().map(|p| p.as_str()).collect();
            output.push_str(&format!(
                "  {:<10} {:<10} {:<9} {}\n",
                tool.name.bold(),
                tool.category.as_str(),
                installed,
                phases.join(",").dimmed()
            ));
            for intent in &tool.intents {
                output.push_str(&format!(
                    "      {} {}\n",
                    intent.intent.cyan(),
                    intent.description.dimmed()
                ));
            }
        }
        output
    }

    /// Summary printed when an agent invocation returns
    pub fn format_outcome(session_id: &str, output: &RunAgentOutput) -> String {
        let mut text = String::new();
        let stop = match &output.stop {
            StopReason::Done => output.stop.to_string().green().bold(),
            StopReason::Suspended { .. } => output.stop.to_string().yellow().bold(),
            StopReason::CycleLimit | StopReason::Cancelled => output.stop.to_string().red().bold(),
        };
        text.push_str(&format!("\n{} {}\n", "Stopped:".cyan().bold(), stop));
        text.push_str(&format!(
            "{} {}, cycle {}\n",
            "Phase:".cyan().bold(),
            output.phase.display_name(),
            output.cycle
        ));
        text.push_str(&format!("{} {}\n", "Facts:".cyan().bold(), output.facts));
        if output.failures > 0 {
            text.push_str(&format!(
                "{} {}\n",
                "Failures:".cyan().bold(),
                output.failures
            ));
        }

        match &output.stop {
            StopReason::Suspended { command } => {
                text.push_str(&format!(
                    "\nRun it with:    {}\n",
                    format!("gauntlet run {} --session {}", command, session_id).bold()
                ));
                text.push_str(&format!(
                    "Then continue:  {}\n",
                    format!("gauntlet resume {}", session_id).bold()
                ));
            }
            StopReason::CycleLimit | StopReason::Cancelled => {
                text.push_str(&format!(
                    "\nContinue with:  {}\n",
                    format!("gauntlet resume {}", session_id).bold()
                ));
            }
            StopReason::Done => {}
        }
        text
    }

    /// Result of `gauntlet run`
    pub fn format_completed(command: &CompletedCommand) -> String {
        let outcome = &command.outcome;
        let mut output = String::new();
        let status = if outcome.success {
            "success".green().bold()
        } else {
            "failed".red().bold()
        };
        output.push_str(&format!(
            "{} {} {} in {:.1}s\n",
            command.id.to_string().bold(),
            status,
            outcome
                .exit_code
                .map(|c| format!("(exit {})", c))
                .unwrap_or_default(),
            outcome.elapsed_ms as f64 / 1000.0
        ));
        if let Some(failure) = &outcome.failure {
            output.push_str(&format!("{} {}\n", "Reason:".yellow().bold(), failure));
        }
        if !outcome.stdout.trim().is_empty() {
            output.push_str(&Self::section_header("stdout"));
            output.push_str(&Self::indent(outcome.stdout.trim_end(), "  "));
            output.push('\n');
        }
        if !outcome.stderr.trim().is_empty() {
            output.push_str(&Self::section_header("stderr"));
            output.push_str(&Self::indent(outcome.stderr.trim_end(), "  "));
            output.push('\n');
        }
        output
    }

    /// Session view as JSON
    pub fn format_json(view: &SessionView) -> String {
        serde_json::to_string_pretty(view).unwrap_or_else(|_| "{}".to_string())
    }

    fn mask(secret: &str) -> String {
        let visible: String = secret.chars().take(2).collect();
        format!("{}{}", visible, "*".repeat(secret.chars().count().saturating_sub(2).min(8)))
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_domain::command::CommandOutcome;
    use gauntlet_domain::facts::entities::{Credential, Host, Service};
    use gauntlet_domain::facts::FactSummary;
    use gauntlet_domain::session::{RedTeamPhase, Session};

    fn plain() {
        colored::control::set_override(false);
    }

    fn session() -> Session {
        let mut session = Session::with_id("session-test", "enumerate 10.0.0.0/24");
        session.facts.hosts.insert(Host::from_address("10.0.0.5"));
        session
            .facts
            .services
            .insert(Service::new("10.0.0.5", 22, "tcp").with_service("ssh"));
        session.facts.credentials.insert(Credential {
            username: "admin".to_string(),
            secret: "hunter2".to_string(),
            target: "10.0.0.5".to_string(),
            service: Some("ssh".to_string()),
        });

        let mut record = CommandRecord::new(
            "cmd-0001",
            "nmap",
            "host_discovery",
            "nmap -sn 10.0.0.0/24",
            RedTeamPhase::Recon,
        );
        record.mark_running().unwrap();
        record
            .mark_complete(CommandOutcome::from_exit(String::new(), String::new(), 1, 1500))
            .unwrap();
        session.add_command(record).unwrap();
        session
    }

    #[test]
    fn test_format_view_lists_facts_and_commands() {
        plain();
        let text = ConsoleFormatter::format_view(&session().view());
        assert!(text.contains("session-test"));
        assert!(text.contains("10.0.0.5:22/tcp ssh"));
        assert!(text.contains("cmd-0001"));
        assert!(text.contains("exited with code 1"));
        assert!(text.contains("Commands (1 run, 0 succeeded)"));
    }

    #[test]
    fn test_credential_secret_is_masked() {
        plain();
        let text = ConsoleFormatter::format_view(&session().view());
        assert!(text.contains("admin@10.0.0.5 (ssh) hu*****"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_json_view_keeps_full_data() {
        let json = ConsoleFormatter::format_json(&session().view());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session_id"], "session-test");
        assert_eq!(value["summary"]["services"], 1);
        assert_eq!(value["commands"][0]["id"], "cmd-0001");
    }

    #[test]
    fn test_format_list_empty_and_sorted() {
        plain();
        assert!(ConsoleFormatter::format_list(&[]).contains("No sessions found"));

        let older = Session::with_id("session-old", "a").view();
        let mut newer = Session::with_id("session-new", "b").view();
        newer.updated_at = older.updated_at + chrono::Duration::seconds(30);
        let text = ConsoleFormatter::format_list(&[older, newer]);
        let new_at = text.find("session-new").unwrap();
        let old_at = text.find("session-old").unwrap();
        assert!(new_at < old_at);
    }

    #[test]
    fn test_suspended_outcome_names_next_commands() {
        plain();
        let output = RunAgentOutput {
            stop: StopReason::Suspended {
                command: "cmd-0003".into(),
            },
            phase: RedTeamPhase::Enumeration,
            cycle: 4,
            facts: FactSummary::default(),
            failures: 0,
        };
        let text = ConsoleFormatter::format_outcome("session-x", &output);
        assert!(text.contains("gauntlet run cmd-0003 --session session-x"));
        assert!(text.contains("gauntlet resume session-x"));
    }

    #[test]
    fn test_mask_short_secrets() {
        assert_eq!(ConsoleFormatter::mask("ab"), "ab");
        assert_eq!(ConsoleFormatter::mask("abcdefghijklmnop"), "ab********");
    }
}
