use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use autonomy_engine::budget::resolve_budget;
use autonomy_engine::cli::{Cli, Commands, ConfigAction, ConsoleHumanChannel, Display, RunArgs};
use autonomy_engine::config::{CONFIG_FILE_NAME, EngineConfig, OrchestratorConfig};
use autonomy_engine::domain::new_session_id;
use autonomy_engine::error::{OrchestratorError, Result};
use autonomy_engine::executor::CommandExecutor;
use autonomy_engine::notification::{
    EventBus, EventLog, FnHandler, InMemoryEventBus, OrchestratorEvent, Subscription,
};
use autonomy_engine::orchestrator::Orchestrator;
use autonomy_engine::output::OutputWriter;
use autonomy_engine::safety::GitCheckpoints;

/// Context for command output handling.
struct OutputContext<'a> {
    display: &'a Display,
    writer: &'a Arc<OutputWriter>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("autonomy_engine=debug")
    } else {
        EnvFilter::new("autonomy_engine=info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let display = Display::new();
    let writer = Arc::new(OutputWriter::new(cli.output));
    let out = OutputContext {
        display: &display,
        writer: &writer,
    };
    let config_path = cli.config;

    match cli.command {
        Commands::Run(args) => cmd_run(&out, args, config_path).await,
        Commands::Config { action } => {
            cmd_config(&out, action, config_path).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config_path(explicit: Option<PathBuf>, base: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| base.join(CONFIG_FILE_NAME))
}

async fn cmd_run(
    out: &OutputContext<'_>,
    args: RunArgs,
    config_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let workdir = match &args.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let engine = EngineConfig::load(&resolve_config_path(config_path, &workdir)).await?;

    let budget = resolve_budget(
        &args.flag_budget(),
        args.budget.as_deref(),
        &engine.budget.limits(),
    )?;
    let mut config = OrchestratorConfig::from_engine_config(&engine, budget);
    if let Some(level) = args.autonomy {
        config.autonomy_level = level;
    }
    if args.unattended {
        config.unattended = true;
    }

    let session_id = args.session_id.clone().unwrap_or_else(new_session_id);
    let mut executor = CommandExecutor::new(&args.exec, &workdir).with_session_id(&session_id);
    if let Some(secs) = args.unit_timeout_secs {
        executor = executor.with_timeout(Duration::from_secs(secs));
    }

    let bus = Arc::new(InMemoryEventBus::new(config.event_channel_capacity));
    let unattended = config.unattended;
    let mut orchestrator = Orchestrator::new(config, Arc::new(executor))
        .with_event_bus(Arc::clone(&bus) as Arc<dyn EventBus>)
        .with_session_id(&session_id);

    if args.git_checkpoints {
        orchestrator = orchestrator.with_checkpoints(Arc::new(GitCheckpoints::new(&workdir)));
    }

    let mut subscriptions: Vec<Subscription> = Vec::new();
    if engine.notification.event_log {
        let logs_dir = workdir.join(&engine.notification.logs_dir);
        subscriptions.push(bus.subscribe("*", Arc::new(EventLog::new(logs_dir))));
    }

    let spinner = out
        .writer
        .is_text()
        .then(|| out.display.create_spinner("Starting session..."));

    if let Some(spinner) = &spinner {
        let spinner = spinner.clone();
        subscriptions.push(bus.subscribe(
            "*",
            Arc::new(FnHandler(move |event: &OrchestratorEvent| {
                if let Some(message) = progress_message(event) {
                    spinner.set_message(message);
                }
            })),
        ));
    } else {
        let writer = Arc::clone(out.writer);
        subscriptions.push(bus.subscribe(
            "*",
            Arc::new(FnHandler(move |event: &OrchestratorEvent| {
                writer.emit_event(event)
            })),
        ));
    }

    if !unattended && std::io::stdin().is_terminal() {
        let mut channel = ConsoleHumanChannel::new();
        if let Some(spinner) = &spinner {
            channel = channel.with_spinner(spinner.clone());
        }
        orchestrator = orchestrator.with_human_channel(Arc::new(channel));
    }

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling session (press Ctrl-C again to exit)");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let result = orchestrator.process(&args.request).await;
    bus.shutdown().await;
    drop(subscriptions);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let outcome = result?;
    out.writer.emit_outcome(&outcome);
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn progress_message(event: &OrchestratorEvent) -> Option<String> {
    match event {
        OrchestratorEvent::IterationStarted { iteration, .. } => {
            Some(format!("Iteration {}", iteration))
        }
        OrchestratorEvent::StateChanged { to, .. } => Some(format!("{}...", to)),
        OrchestratorEvent::ResourceWarning {
            resource,
            percentage,
            ..
        } => Some(format!("{} at {:.0}% of budget", resource, percentage)),
        _ => None,
    }
}

async fn cmd_config(
    out: &OutputContext<'_>,
    action: ConfigAction,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let path = resolve_config_path(config_path, &std::env::current_dir()?);

    match action {
        ConfigAction::Show => {
            let config = EngineConfig::load(&path).await?;
            out.writer.emit_document(&config);
        }
        ConfigAction::Validate => {
            EngineConfig::load(&path).await?;
            out.writer
                .emit_message(&format!("Configuration is valid: {}", path.display()));
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(OrchestratorError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            EngineConfig::default().save(&path).await?;
            out.writer
                .emit_message(&format!("Configuration written: {}", path.display()));
        }
    }

    Ok(())
}
