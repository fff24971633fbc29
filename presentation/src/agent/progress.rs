//! Progress reporting for agent loop execution

use colored::Colorize;
use gauntlet_application::AgentProgressNotifier;
use gauntlet_domain::command::{CommandId, CommandRecord, CompletedCommand};
use gauntlet_domain::core::string::truncate;
use gauntlet_domain::facts::FactSummary;
use gauntlet_domain::oracle::{OracleCall, OracleFailure, PlanDecision, ThinkDecision};
use gauntlet_domain::safety::RejectionReason;
use gauntlet_domain::session::{FailureRecord, LoopState, RedTeamPhase};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Reports progress during the agent loop with spinners
pub struct AgentProgressReporter {
    multi: MultiProgress,
    cycle_bar: Mutex<Option<ProgressBar>>,
    exec_bar: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl AgentProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            cycle_bar: Mutex::new(None),
            exec_bar: Mutex::new(None),
            verbose: false,
        }
    }

    /// Create with verbose output (shows oracle reasoning)
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::new()
        }
    }

    fn cycle_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn exec_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.yellow} {prefix:.bold.yellow} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn state_emoji(state: LoopState) -> &'static str {
        match state {
            LoopState::Thinking => "🔍",
            LoopState::Planning => "📝",
            LoopState::Proposing => "🛠️",
            LoopState::AwaitingApproval => "🔒",
            LoopState::AwaitingExecution => "⏳",
            LoopState::Observing => "👁️",
            LoopState::Done => "🎉",
        }
    }

    fn spinner(&self, slot: &Mutex<Option<ProgressBar>>, style: ProgressStyle, prefix: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(style);
        pb.set_prefix(prefix);
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Some(old) = slot.lock().unwrap_or_else(|e| e.into_inner()).replace(pb) {
            old.finish_and_clear();
        }
    }

    fn set_message(&self, message: String) {
        if let Some(pb) = self
            .cycle_bar
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            pb.set_message(message);
        }
    }

    fn clear(slot: &Mutex<Option<ProgressBar>>) {
        if let Some(pb) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pb.finish_and_clear();
        }
    }

    fn finish_all(&self) {
        Self::clear(&self.exec_bar);
        Self::clear(&self.cycle_bar);
    }

    /// Print a line without tearing the active spinners.
    fn print(&self, line: String) {
        let _ = self.multi.println(line);
    }
}

impl Default for AgentProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentProgressNotifier for AgentProgressReporter {
    fn on_loop_state(&self, state: LoopState) {
        self.set_message(format!("{} {}", Self::state_emoji(state), state));
    }

    fn on_cycle_start(&self, cycle: u64) {
        self.spinner(
            &self.cycle_bar,
            Self::cycle_style(),
            format!("Cycle {}", cycle),
        );
    }

    fn on_phase_change(&self, from: RedTeamPhase, to: RedTeamPhase, reason: &str) {
        self.print(format!(
            "{} {} → {}",
            "⏭".cyan(),
            from.display_name().dimmed(),
            to.display_name().cyan().bold()
        ));
        if self.verbose && !reason.is_empty() {
            self.print(format!("    {}", truncate(reason, 120).dimmed()));
        }
    }

    fn on_think(&self, decision: &ThinkDecision) {
        if self.verbose && !decision.reasoning.is_empty() {
            self.print(format!(
                "    {} {}",
                "💭".dimmed(),
                truncate(&decision.reasoning, 120).dimmed()
            ));
        }
    }

    fn on_plan(&self, decision: &PlanDecision) {
        self.set_message(format!("📝 {}", truncate(&decision.objective, 60)));
        if self.verbose {
            self.print(format!(
                "    {} {} {}",
                "→".blue(),
                decision.intent.cyan(),
                truncate(&decision.objective, 80)
            ));
        }
    }

    fn on_proposal(&self, _command: &CommandRecord) {
        // The approval prompt owns the terminal from here.
        self.finish_all();
    }

    fn on_safety_rejection(&self, command: &str, reason: &RejectionReason) {
        self.print(format!(
            "  {} {} {}",
            "⛔".red(),
            "Blocked:".red().bold(),
            reason
        ));
        if self.verbose {
            self.print(format!("      {}", truncate(command, 100).dimmed()));
        }
    }

    fn on_approval_denied(&self, command: &CommandRecord, reason: Option<&str>) {
        let reason = reason.unwrap_or("no reason given");
        self.print(format!(
            "  {} {} {} ({})",
            "✗".red(),
            command.id,
            "rejected".red(),
            reason.dimmed()
        ));
    }

    fn on_submitted(&self, id: &CommandId, command: &str) {
        self.print(format!(
            "  {} {} {}",
            "↑".blue(),
            id.to_string().bold(),
            truncate(command, 100)
        ));
    }

    fn on_execution_start(&self, id: &CommandId, command: &str) {
        self.spinner(&self.exec_bar, Self::exec_style(), format!("⚡ {}", id));
        if let Some(pb) = self
            .exec_bar
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            pb.set_message(truncate(command, 60));
        }
    }

    fn on_execution_complete(&self, command: &CompletedCommand) {
        Self::clear(&self.exec_bar);
        let outcome = &command.outcome;
        let elapsed = format!("{:.1}s", outcome.elapsed_ms as f64 / 1000.0);
        if outcome.success {
            self.print(format!(
                "  {} {} {} {}",
                "✓".green(),
                command.id,
                command.tool.green(),
                elapsed.dimmed()
            ));
        } else {
            let why = outcome
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "failed".to_string());
            self.print(format!(
                "  {} {} {} {} {}",
                "✗".red(),
                command.id,
                command.tool.red(),
                why.red(),
                elapsed.dimmed()
            ));
        }
    }

    fn on_facts_merged(&self, growth: &FactSummary) {
        if growth.total() > 0 {
            self.print(format!("    {} +{}", "ℹ".blue(), growth));
        }
    }

    fn on_suspended(&self, id: &CommandId) {
        self.finish_all();
        self.print(format!(
            "{} {} {}",
            "⏳".yellow(),
            id.to_string().bold(),
            "is waiting to be run".yellow()
        ));
    }

    fn on_failure(&self, failure: &FailureRecord) {
        if self.verbose {
            self.print(format!(
                "    {} {}: {}",
                "⚠".yellow(),
                failure.kind.as_str().yellow(),
                truncate(&failure.reason, 100)
            ));
        }
    }

    fn on_done(&self, reasoning: &str) {
        self.finish_all();
        println!();
        println!("{} {}", "🎉", "Goal satisfied".green().bold());
        if !reasoning.is_empty() {
            println!("   {}", reasoning.dimmed());
        }
    }

    fn on_oracle_retry(&self, call: OracleCall, attempt: u32, max: u32, error: &OracleFailure) {
        self.print(format!(
            "    {} {} retry {}/{}: {}",
            "↻".yellow(),
            call.as_str().yellow(),
            attempt,
            max,
            truncate(&error.to_string(), 80).dimmed()
        ));
    }

    fn on_oracle_fallback(&self, call: OracleCall, error: &OracleFailure) {
        self.print(format!(
            "    {} {} unavailable, using fallback: {}",
            "⚠".yellow(),
            call.as_str().yellow(),
            truncate(&error.to_string(), 80).dimmed()
        ));
    }
}

/// Simple text-based progress (no spinners), for non-terminal output
pub struct SimpleAgentProgress {
    verbose: bool,
}

impl SimpleAgentProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl AgentProgressNotifier for SimpleAgentProgress {
    fn on_cycle_start(&self, cycle: u64) {
        if self.verbose {
            println!("Cycle {}", cycle);
        }
    }

    fn on_phase_change(&self, from: RedTeamPhase, to: RedTeamPhase, _reason: &str) {
        println!("Phase: {} -> {}", from, to);
    }

    fn on_plan(&self, decision: &PlanDecision) {
        if self.verbose {
            println!("  plan: {} ({})", decision.objective, decision.intent);
        }
    }

    fn on_safety_rejection(&self, _command: &str, reason: &RejectionReason) {
        println!("  blocked: {}", reason);
    }

    fn on_approval_denied(&self, command: &CommandRecord, reason: Option<&str>) {
        println!(
            "  rejected {}: {}",
            command.id,
            reason.unwrap_or("no reason given")
        );
    }

    fn on_submitted(&self, id: &CommandId, command: &str) {
        println!("  submitted {}: {}", id, command);
    }

    fn on_execution_complete(&self, command: &CompletedCommand) {
        let status = if command.outcome.success { "ok" } else { "FAILED" };
        println!("  {} {} {}", command.id, command.tool, status);
    }

    fn on_suspended(&self, id: &CommandId) {
        println!("Waiting: {}", id);
    }

    fn on_done(&self, reasoning: &str) {
        println!("Done: {}", reasoning);
    }

    fn on_oracle_fallback(&self, call: OracleCall, error: &OracleFailure) {
        println!("  {} fallback: {}", call, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styles_build() {
        let _ = AgentProgressReporter::cycle_style();
        let _ = AgentProgressReporter::exec_style();
    }

    #[test]
    fn test_execution_bar_is_cleared_on_completion() {
        let reporter = AgentProgressReporter::new();
        let id = CommandId::new("cmd-0001");
        reporter.on_cycle_start(1);
        reporter.on_execution_start(&id, "nmap -sn 10.0.0.0/24");
        assert!(reporter.exec_bar.lock().unwrap().is_some());

        let record = CommandRecord::new(
            "cmd-0001",
            "nmap",
            "host_discovery",
            "nmap -sn 10.0.0.0/24",
            RedTeamPhase::Recon,
        );
        reporter.on_proposal(&record);
        assert!(reporter.exec_bar.lock().unwrap().is_none());
        assert!(reporter.cycle_bar.lock().unwrap().is_none());
    }
}
