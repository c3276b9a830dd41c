#![forbid(unsafe_code)]

//! `lumen-runner` — terminal front-end for the Lumen execution core.
//!
//! Stands in for the editor UI: runs a saved file under the supervised
//! interpreter with an interactive stdin bridge, forces an artifact sync,
//! or reads and merges the persisted settings record.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use lumen_runner::settings::{SettingsMap, SettingsStore};
use lumen_runner::supervisor::events::{describe_exit, RunEvent};
use lumen_runner::sync::{HttpSource, UpdateSynchronizer};
use lumen_runner::{AppError, GlobalConfig, Result, ShellCommand, ShellCore, ShellReply};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "lumen-runner", about = "Lumen interpreter runner", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a Lumen file interactively.
    Run {
        /// File to execute.
        file: PathBuf,
        /// Arguments forwarded to the program.
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Check the remote manifest and update interpreter files if stale.
    Sync,
    /// Inspect or change persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    /// Print the settings record.
    Show,
    /// Merge one key into the settings record.
    Set {
        /// Setting name.
        key: String,
        /// Value, parsed as JSON when possible, otherwise stored as text.
        value: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(args: Cli) -> Result<i32> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::from_toml_str("")?,
    };
    debug!(install_dir = %config.install_dir.display(), "configuration loaded");

    match args.command {
        Command::Run { file, args } => run_file(config, file, args).await,
        Command::Sync => {
            let settings = Arc::new(settings_store(&config));
            let source = Arc::new(HttpSource::new(config.update.request_timeout())?);
            let synchronizer = UpdateSynchronizer::new(&config, source, settings);
            if !synchronizer.is_enabled() {
                println!("updates are disabled in the configuration");
                return Ok(0);
            }
            if synchronizer.check_and_sync().await? {
                println!("interpreter files updated");
            } else {
                println!("interpreter files already up to date");
            }
            Ok(0)
        }
        Command::Settings { action } => {
            let store = settings_store(&config);
            let record = match action {
                SettingsAction::Show => store.load()?.unwrap_or_default(),
                SettingsAction::Set { key, value } => {
                    let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                    let mut patch = SettingsMap::new();
                    patch.insert(key, value);
                    store.merge(patch)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(0)
        }
    }
}

fn settings_store(config: &GlobalConfig) -> SettingsStore {
    SettingsStore::new(config.settings_path(), config.update.stamp_key.clone())
}

async fn run_file(config: GlobalConfig, file: PathBuf, args: Vec<String>) -> Result<i32> {
    let source = Arc::new(HttpSource::new(config.update.request_timeout())?);
    let core = ShellCore::open(config, source).await;
    info!("session ready");

    let start = ShellCommand::Start {
        path: file.to_string_lossy().into_owned(),
        args,
    };
    let mut run = match core.dispatch(start).await {
        ShellReply::Started(run) => run,
        ShellReply::Error(msg) => {
            eprintln!("{msg}");
            return Ok(1);
        }
        other => {
            warn!(?other, "unexpected reply to start");
            return Ok(1);
        }
    };

    // Terminal input is read on a plain thread: a blocking stdin read inside
    // the runtime would stall shutdown.
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut exit_code = 1;
    let mut stop_requested = false;

    loop {
        tokio::select! {
            event = run.events.recv() => match event {
                Some(RunEvent::Output(text)) => {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.flush().await?;
                }
                Some(RunEvent::Error(text)) => {
                    stderr.write_all(text.as_bytes()).await?;
                    stderr.flush().await?;
                }
                Some(RunEvent::InputRequested { kind }) => {
                    debug!(?kind, "program is waiting for input");
                }
                Some(RunEvent::Exited { code }) => {
                    stdout.write_all(describe_exit(code).as_bytes()).await?;
                    stdout.flush().await?;
                    exit_code = code.unwrap_or(1);
                }
                None => break,
            },

            Some(line) = line_rx.recv() => {
                if let ShellReply::Error(msg) = core.dispatch(ShellCommand::SendInput { text: line }).await {
                    eprintln!("{msg}");
                }
            }

            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                if let Err(err) = signal {
                    warn!(%err, "ctrl-c handler failed");
                }
                stop_requested = true;
                if let ShellReply::Error(msg) = core.dispatch(ShellCommand::Stop).await {
                    eprintln!("{msg}");
                }
            }
        }
    }

    Ok(exit_code)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
