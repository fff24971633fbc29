//! CLI entrypoint for gauntlet
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use gauntlet_application::{
    AgentProgressNotifier, ApprovalPort, AutoApprove, ExecutionTracker, NoAgentProgress,
    OracleClient, OraclePort, RunAgentUseCase, RunMode, SessionManager, StateRecovery,
};
use gauntlet_domain::command::CommandId;
use gauntlet_domain::config::{ApprovalMode, ConfigIssue};
use gauntlet_domain::session::{Session, SessionId};
use gauntlet_domain::tool::ToolCatalog;
use gauntlet_infrastructure::{
    ConfigLoader, FileConfig, FileExecutionStore, FileSnapshotStore, HeuristicOracle,
    JsonlSessionEventLogger, OracleBackend, PidLiveness, ProcessBackend, ProcessOracle,
    binary_on_path, build_catalog, sessions_root,
};
use gauntlet_presentation::{
    AgentProgressReporter, Cli, Command, ConsoleFormatter, InteractiveApproval,
    SimpleAgentProgress,
};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting gauntlet");

    let config = ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    report_issues(&config.validate())?;
    for path in ConfigLoader::sources(cli.config.as_deref()) {
        info!(path = %path.display(), "Loaded config file");
    }

    let catalog = Arc::new(
        build_catalog(
            config.tools.manifest_path().as_deref(),
            &config.tools.disabled,
            binary_on_path,
        )
        .context("Failed to build tool catalog")?,
    );

    if let Command::Tools = cli.command {
        print!("{}", ConsoleFormatter::format_tools(&catalog));
        return Ok(());
    }

    let app = App::new(&config, catalog);
    let progress = progress_for(&cli);

    match cli.command {
        Command::Start {
            goal,
            scope,
            auto_approve,
            wait,
        } => {
            app.recover()?;
            let session = app.manager.create(goal)?;
            println!("Session: {}", session.id());
            app.drive(session, &scope, auto_approve, wait, &*progress)
                .await?;
        }
        Command::Resume {
            session,
            scope,
            auto_approve,
            wait,
        } => {
            app.recover()?;
            let resumed = app.manager.resume(&SessionId::new(session))?;
            if let Some(file) = &resumed.rolled_back_from {
                warn!(snapshot = %file, "Latest snapshot was unreadable; restored from backup");
            }
            if !cli.quiet {
                print!("{}", ConsoleFormatter::format_resume(&resumed.context));
            }
            app.drive(resumed.session, &scope, auto_approve, wait, &*progress)
                .await?;
        }
        Command::Run { command, session } => {
            app.recover()?;
            let id = SessionId::new(session);
            let completed = app
                .manager
                .run_command(&id, &CommandId::new(command))
                .await?;
            print!("{}", ConsoleFormatter::format_completed(&completed));
            println!("\nContinue with: gauntlet resume {}", id);
        }
        Command::Status { session } => {
            let loaded = app.manager.load(&SessionId::new(session))?;
            print!(
                "{}",
                ConsoleFormatter::format_resume(&loaded.session.resume_context())
            );
        }
        Command::Show { session, json } => {
            let view = app.manager.view(&SessionId::new(session))?;
            if json {
                println!("{}", ConsoleFormatter::format_json(&view));
            } else {
                print!("{}", ConsoleFormatter::format_view(&view));
            }
        }
        Command::List => {
            print!("{}", ConsoleFormatter::format_list(&app.manager.list()?));
        }
        // Printed before storage is opened.
        Command::Tools => {}
    }

    Ok(())
}

/// Long-lived components shared by every subcommand.
struct App<'a> {
    config: &'a FileConfig,
    catalog: Arc<ToolCatalog>,
    manager: Arc<SessionManager>,
    tracker: Arc<ExecutionTracker>,
    recovery: Arc<StateRecovery>,
    events: Arc<JsonlSessionEventLogger>,
}

impl<'a> App<'a> {
    fn new(config: &'a FileConfig, catalog: Arc<ToolCatalog>) -> Self {
        let data_dir = config.storage.resolve_data_dir();
        let root = sessions_root(&data_dir);
        info!(path = %root.display(), "Session storage");

        let params = config.execution_params();
        let snapshots = Arc::new(FileSnapshotStore::new(&root));
        let executions = Arc::new(FileExecutionStore::new(&root));
        let backend = Arc::new(ProcessBackend::new().with_capture_limit(params.output_cap_bytes));

        let recovery = Arc::new(
            StateRecovery::new(snapshots).with_retention(config.storage.backup_retention),
        );
        let tracker = Arc::new(
            ExecutionTracker::new(executions, backend, params)
                .with_liveness(Arc::new(PidLiveness)),
        );
        let manager = Arc::new(SessionManager::new(
            Arc::clone(&recovery),
            Arc::clone(&tracker),
            catalog.clone(),
        ));

        Self {
            config,
            catalog,
            manager,
            tracker,
            recovery,
            events: Arc::new(JsonlSessionEventLogger::new(root)),
        }
    }

    /// Close out commands whose runner died. Read-only subcommands skip this.
    fn recover(&self) -> Result<()> {
        let recovered = self.manager.init()?;
        if recovered > 0 {
            warn!(commands = recovered, "Closed out commands interrupted by a previous run");
        }
        Ok(())
    }

    fn oracle(&self) -> Result<OracleClient> {
        let (backend, _) = self.config.oracle.parse_backend();
        let oracle: Arc<dyn OraclePort> = match backend {
            OracleBackend::Heuristic => Arc::new(HeuristicOracle::new()),
            OracleBackend::Process => {
                let command = self.config.oracle.command.as_deref().unwrap_or_default();
                Arc::new(ProcessOracle::new(command).context("Invalid oracle.command")?)
            }
        };
        info!(oracle = %oracle.name(), "Oracle backend");
        Ok(OracleClient::new(oracle, self.config.oracle.to_retry_policy()))
    }

    fn approval(&self, auto_approve: bool) -> Arc<dyn ApprovalPort> {
        let (mode, _) = self.config.agent.parse_approval_mode();
        if auto_approve || mode == ApprovalMode::Auto {
            warn!("Auto-approval enabled; the safety validator is the only gate");
            Arc::new(AutoApprove)
        } else {
            Arc::new(InteractiveApproval::new())
        }
    }

    /// Run the agent loop on `session` until it stops.
    async fn drive(
        &self,
        mut session: Session,
        scope: &[String],
        auto_approve: bool,
        wait: bool,
        progress: &dyn AgentProgressNotifier,
    ) -> Result<()> {
        let (policy, issues) = self
            .config
            .safety
            .to_safety_policy(scope, &self.catalog.flag_whitelists());
        report_issues(&issues)?;

        let active = self.manager.begin(session.id())?;
        let use_case = RunAgentUseCase::new(
            self.oracle()?,
            self.catalog.clone(),
            Arc::new(policy),
            Arc::clone(&self.tracker),
            Arc::clone(&self.recovery),
            self.approval(auto_approve),
            self.config.execution_params(),
        )
        .with_event_logger(self.events.clone())
        .with_cancellation(active.token());

        let manager = Arc::clone(&self.manager);
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let count = manager.cancel_all();
                eprintln!("\nInterrupted; stopping after the current step (Ctrl+C again to abort)");
                info!(sessions = count, "Cancellation requested");
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        });

        let mode = if wait { RunMode::Wait } else { RunMode::Suspend };
        let result = use_case
            .execute_with_progress(&mut session, mode, progress)
            .await;
        interrupt.abort();
        drop(active);

        let output = result?;
        print!(
            "{}",
            ConsoleFormatter::format_outcome(session.id().as_str(), &output)
        );
        Ok(())
    }
}

fn progress_for(cli: &Cli) -> Box<dyn AgentProgressNotifier> {
    if cli.quiet {
        Box::new(NoAgentProgress)
    } else if !std::io::stdout().is_terminal() {
        Box::new(SimpleAgentProgress::new(cli.verbose > 0))
    } else if cli.verbose > 0 {
        Box::new(AgentProgressReporter::verbose())
    } else {
        Box::new(AgentProgressReporter::new())
    }
}

/// Log warnings; fail on errors.
fn report_issues(issues: &[ConfigIssue]) -> Result<()> {
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue);
    }
    if ConfigIssue::has_errors(issues) {
        let errors: Vec<String> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(ToString::to_string)
            .collect();
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}

/// Initialize logging based on verbosity level; `RUST_LOG` overrides it.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("--log-file must name a file: {}", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}
