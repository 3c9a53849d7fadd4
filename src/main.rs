//! # Quillflow: Editorial Workflow Daemon
//!
//! Runs the reminder sweeper and the notification dispatcher for one venue,
//! and offers a few inspection commands over the same record store.
//!
//! Usage:
//!   quillflow run                          # Sweeper + dispatcher until Ctrl-C
//!   quillflow sweep --at 2026-04-01T09:00:00Z
//!   quillflow tasks 12                     # Derived tasks of paper #12
//!   quillflow replay 12                    # Fold the edit history of paper #12
//!   quillflow config --init                # Write the default config

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use quillflow_core::clock::{Clock, SystemClock};
use quillflow_core::config::VenueConfig;
use quillflow_core::directory::StaticDirectory;
use quillflow_core::traits::{IdentityOracle, Notifier};
use quillflow_core::types::PaperId;
use quillflow_engine::Engine;
use quillflow_scheduler::{SchedulerDb, SweepTarget, notifier_from_config, spawn_dispatcher, spawn_sweeper};

#[derive(Parser)]
#[command(name = "quillflow", version, about = "📜 Quillflow, the editorial workflow engine")]
struct Cli {
    /// Config file (default: ~/.quillflow/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sweeper and dispatcher until interrupted
    Run,
    /// Sweep once and deliver whatever it produced
    Sweep {
        /// Sweep as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the derived tasks of a paper (id or number)
    Tasks { paper: String },
    /// Rebuild a paper from its edit history and compare with the store
    Replay { paper: String },
    /// Print the effective configuration
    Config {
        /// Write the defaults to the config path and exit
        #[arg(long)]
        init: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).into_owned())
}

fn load_config(path: Option<&Path>) -> Result<VenueConfig> {
    let config = match path {
        Some(p) => VenueConfig::load_from(p)?,
        None => VenueConfig::load()?,
    };
    Ok(config)
}

fn init_logging(verbose: bool, config: &VenueConfig) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_directory(config: &VenueConfig) -> Result<Arc<StaticDirectory>> {
    let path = expand_path(&config.storage.directory_path);
    if !path.exists() {
        tracing::warn!("⚠️ No profile directory at {}; every invitee will look unknown", path.display());
        return Ok(Arc::new(StaticDirectory::new()));
    }
    let directory = StaticDirectory::load_from(&path)
        .with_context(|| format!("loading profiles from {}", path.display()))?;
    Ok(Arc::new(directory))
}

/// Accept either a paper id or its number.
fn resolve_paper(engine: &Engine, arg: &str) -> Result<PaperId> {
    if let Ok(number) = arg.parse::<u32>() {
        let found = engine
            .store()
            .papers()?
            .into_iter()
            .find(|p| p.number == number)
            .map(|p| p.id);
        return found.with_context(|| format!("no paper with number {number}"));
    }
    Ok(PaperId::from(arg))
}

fn parse_instant(at: Option<&str>, clock: &dyn Clock) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid RFC 3339 instant: {s}"))?
            .with_timezone(&Utc)),
        None => Ok(clock.now()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config);

    if let Command::Config { init } = &cli.command {
        if *init {
            let path = cli.config.clone().unwrap_or_else(VenueConfig::default_path);
            VenueConfig::default().save_to(&path)?;
            println!("✅ Wrote default config to {}", path.display());
        } else {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        return Ok(());
    }

    let config = Arc::new(config);
    let directory = open_directory(&config)?;
    let oracle: Arc<dyn IdentityOracle> = directory;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::from(quillflow_store::open_store(&config)?);
    let ledger = Arc::new(SchedulerDb::open(&expand_path(&config.storage.scheduler_db_path))?);
    let engine = Arc::new(
        Engine::new(store, oracle.clone(), config.clone(), clock.clone()).with_ledger(ledger.clone()),
    );

    match cli.command {
        Command::Run => {
            let notifier = notifier_from_config(&config.notify, oracle)?;
            println!("📜 Quillflow v{} for {}", env!("CARGO_PKG_VERSION"), config.name);
            println!("   ⏰ Sweep every:    {}s", config.scheduler.sweep_interval_secs);
            println!("   📮 Dispatch every: {}s via {}", config.scheduler.dispatch_interval_secs, notifier.name());
            println!();

            let sweeper = spawn_sweeper(engine.clone(), clock, config.scheduler.sweep_interval_secs);
            let dispatcher = spawn_dispatcher(
                engine.outbox(),
                notifier.clone(),
                Some(ledger),
                config.scheduler.dispatch_interval_secs,
            );

            tokio::signal::ctrl_c().await?;
            tracing::info!("🛑 Shutting down");
            sweeper.abort();
            dispatcher.abort();
            let stats = engine.flush(notifier.as_ref()).await;
            if stats.sent + stats.failed > 0 {
                tracing::info!("📮 Final flush: {} sent, {} failed", stats.sent, stats.failed);
            }
        }
        Command::Sweep { at } => {
            let at = parse_instant(at.as_deref(), clock.as_ref())?;
            let report = engine.sweep(at);
            let notifier = notifier_from_config(&config.notify, oracle)?;
            let stats = engine.flush(notifier.as_ref()).await;
            println!(
                "📣 Swept {} paper(s) at {}: {} reminder(s), {} message(s) sent, {} failed",
                report.papers,
                at.to_rfc3339(),
                report.reminders,
                stats.sent,
                stats.failed
            );
            for (paper, err) in &report.failures {
                println!("   ❌ {paper}: {err}");
            }
        }
        Command::Tasks { paper } => {
            let paper_id = resolve_paper(&engine, &paper)?;
            let tasks = engine.tasks(&paper_id)?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Command::Replay { paper } => {
            let paper_id = resolve_paper(&engine, &paper)?;
            let report = engine.replay(&paper_id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.consistent {
                anyhow::bail!("replay of {paper_id} diverges from the stored paper");
            }
        }
        Command::Config { .. } => {}
    }

    Ok(())
}
