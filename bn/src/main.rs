//! Botnet - command and control over single-slot mailboxes
//!
//! CLI entry point for the coordinator, workers and the mailbox hub.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use botnet::cli::{Cli, Command, forwarded_args};
use botnet::config::Config;
use botnet::console::{Console, TerminalConsole};
use botnet::coordinator::{Coordinator, Outcome};
use botnet::error::ProtocolError;
use botnet::ipc::{self, MailboxHub, RemoteMailbox};
use botnet::mailbox::MailboxError;
use botnet::registry::KnownWorkerRegistry;
use botnet::worker::{Worker, default_worker_id};
use datastore::DataStore;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("botnet")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Workers, hub and coordinators share one file
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("botnet.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::SUCCESS);
    };

    let loaded = Config::load_with_warnings(cli.config.as_ref());
    let config_log_level = loaded.as_ref().ok().and_then(|(config, _)| config.log_level.clone());
    if let Err(e) = setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let (config, skipped) = loaded.context("Failed to load configuration")?;
    for warning in skipped {
        warn!("{}", warning);
    }

    debug!(?command, "main: dispatching command");
    match command {
        Command::Run { target, action, args } => cmd_run(&config, &target, &action, &args).await,
        Command::Bot { id } => cmd_bot(&config, id).await,
        Command::Hub => cmd_hub(&config).await,
        Command::Known { clear } => cmd_known(&config, clear),
    }
}

/// Send one command and collect its responses
async fn cmd_run(config: &Config, target: &str, action: &str, raw_args: &[String]) -> Result<ExitCode> {
    debug!(%target, %action, ?raw_args, "cmd_run: called");
    let console = Arc::new(TerminalConsole);

    // Reject bad input before anything touches a mailbox
    if let Err(e) = Coordinator::validate(target, action) {
        console.error(&e.to_string());
        return Ok(ExitCode::from(e.exit_code()));
    }

    let (args, wait_known) = forwarded_args(raw_args);
    let store = Arc::new(DataStore::open(&config.registry.store_path)?);
    let registry = KnownWorkerRegistry::load(store).context("Failed to load known worker registry")?;
    let (commands, responses) = RemoteMailbox::pair(&config.mailbox.socket_path);

    let mut coordinator = Coordinator::new(
        Arc::new(commands),
        Arc::new(responses),
        registry,
        console.clone(),
        config.coordinator.clone(),
    );

    match coordinator.execute(target, action, args, wait_known).await {
        Ok(outcome) => {
            if let Outcome::Broadcast(report) = &outcome {
                console.info(&format!(
                    "Broadcast {} finished: {} responded, {} failed",
                    report.command_id,
                    report.responders.len(),
                    report.failures.len()
                ));
            }
            info!(succeeded = outcome.all_succeeded(), "cmd_run: finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!(error = %e, "cmd_run: failed");
            console.error(&describe(&e, config));
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

fn describe(e: &ProtocolError, config: &Config) -> String {
    match e {
        ProtocolError::Mailbox(MailboxError::Unreachable(_)) => format!(
            "{} (is `bn hub` running on {}?)",
            e,
            config.mailbox.socket_path.display()
        ),
        e if e.is_contention() => format!("{}. Shutting down...", e),
        e => e.to_string(),
    }
}

/// Run a worker until shutdown or Ctrl-C
async fn cmd_bot(config: &Config, id: Option<String>) -> Result<ExitCode> {
    debug!(?id, "cmd_bot: called");
    let id = match id {
        Some(id) => id,
        None => default_worker_id()?,
    };

    let (commands, responses) = RemoteMailbox::pair(&config.mailbox.socket_path);
    commands.ping().await.context(format!(
        "Mailbox hub not reachable at {}; start it with `bn hub`",
        config.mailbox.socket_path.display()
    ))?;

    let worker = Worker::new(
        id,
        Arc::new(commands),
        Arc::new(responses),
        Arc::new(TerminalConsole),
        config.worker.clone(),
    );

    tokio::select! {
        result = worker.run() => result.context("Worker stopped on mailbox error")?,
        _ = tokio::signal::ctrl_c() => {
            info!("cmd_bot: interrupted");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Serve the mailboxes until SIGINT or SIGTERM
async fn cmd_hub(config: &Config) -> Result<ExitCode> {
    debug!("cmd_hub: called");
    use tokio::signal::unix::{SignalKind, signal};

    let (listener, socket_path) = ipc::create_listener_at(&config.mailbox.socket_path)?;
    println!("{} Mailbox hub listening on {}", "✓".green(), socket_path.display());
    info!(?socket_path, "Mailbox hub listening");

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let hub = Arc::new(MailboxHub::new());

    let result = tokio::select! {
        result = hub.serve(listener) => result,
        _ = sigint.recv() => {
            info!("SIGINT received, stopping hub");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, stopping hub");
            Ok(())
        }
    };

    ipc::cleanup_socket(&socket_path);
    println!("Mailbox hub stopped");
    result.map(|()| ExitCode::SUCCESS)
}

/// Print or reset the known worker registry
fn cmd_known(config: &Config, clear: bool) -> Result<ExitCode> {
    debug!(clear, "cmd_known: called");
    let store = Arc::new(DataStore::open(&config.registry.store_path)?);
    let mut registry = KnownWorkerRegistry::load(store)?;

    if clear {
        registry.reset()?;
        println!("{} Cleared known bots", "✓".green());
    } else if registry.is_empty() {
        println!("No known bots");
    } else {
        for worker in registry.workers() {
            println!("{}", worker.cyan());
        }
    }
    Ok(ExitCode::SUCCESS)
}
