//! # RF Gateway
//!
//! Bridge 433/868 MHz remote controls to JSON events through an OOK radio.
//!
//! Decoded telegrams are written as JSON Lines, and send requests are read
//! from stdin one per line. Log output goes to stderr so stdout carries
//! only the event stream.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use rf_gateway::app::{Mode, RcApplication};
use rf_gateway::config::{Config, LoggingConfig};
use rf_gateway::event::{JsonlEventLog, TracingSink};
use rf_gateway::radio::LoopbackRadio;
use rf_gateway::request::Request;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// File name prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "rf-gateway.log";

/// Console command switching the operating mode
const MODE_COMMAND: &str = "mode";

/// RF Gateway - bridge 433/868 MHz remote controls through an OOK radio
#[derive(Parser, Debug)]
#[command(name = "rf-gateway", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (default: config/gateway.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Operating mode overriding the configuration (rc433 or fs20)
    #[arg(short, long)]
    mode: Option<Mode>,
}

/// Main entry point for the RF gateway
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (command line path, then `config/gateway.toml`, then defaults)
///    - Set up logging with tracing subscriber
///    - Build the application for the configured mode
///
/// 2. **Main Loop**
///    - Poll the transceiver on every scheduler tick
///    - Turn stdin lines into send requests (`mode <rc433|fs20>` switches mode)
///    - Handle Ctrl+C for graceful shutdown
///
/// # Examples
///
/// ```bash
/// echo 'send/intertechno/4242/3/on' | cargo run --release
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = init_logging(&config.logging);

    info!("RF Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let log = open_event_log(config.events.log_path.as_deref())?;
    let mut sink = (
        JsonlEventLog::new(log, config.events.base_topic.as_str()),
        TracingSink::new(config.events.base_topic.as_str()),
    );

    let tick_ms = config.scheduler.tick_ms;
    let mut gateway = Gateway::new(config);

    let mut tick = interval(Duration::from_millis(tick_ms));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("Polling radio every {} ms", tick_ms);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                gateway.app.poll(&mut sink);
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => gateway.handle_line(&line),
                    Ok(None) => {
                        debug!("stdin closed, receive only");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total events logged: {}", sink.0.records());
                break;
            }
        }
    }

    Ok(())
}

/// Load the configuration named on the command line or the default file
///
/// # Errors
///
/// Fails when the named file (or the default file, if present) cannot be
/// read or does not validate
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH))?,
        None => Config::default(),
    };

    if let Some(mode) = args.mode {
        config.application.mode = mode;
    }

    Ok(config)
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer and must live until shutdown.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.to_ascii_lowercase()));

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            None
        }
    }
}

/// Event log destination, stdout when no path is configured
fn open_event_log(path: Option<&str>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open event log {}", path))?;
            info!("Writing events to {}", path);
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Application state driven by the main loop
struct Gateway {
    config: Config,
    app: RcApplication<LoopbackRadio>,
}

impl Gateway {
    fn new(config: Config) -> Self {
        let app = build_application(&config, config.application.mode);
        Self { config, app }
    }

    /// Handle one console line: a mode switch or a send request
    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some(requested) = line.strip_prefix(MODE_COMMAND).and_then(|m| m.strip_prefix(' ')) {
            match requested.parse::<Mode>() {
                Ok(mode) if mode == self.app.mode() => info!("Already in {} mode", mode),
                // The old application is dropped, even mid-transmission
                Ok(mode) => self.app = build_application(&self.config, mode),
                Err(e) => warn!("{}", e),
            }
            return;
        }

        let request = match Request::from_line(&self.config.events.base_topic, line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Ignoring input '{}': {}", line, e);
                return;
            }
        };

        let protocol = request.protocol().unwrap_or("?").to_string();
        if let Err(e) = self.app.handle(request) {
            warn!("Rejected {} request '{}': {}", protocol, line, e);
        }
    }
}

fn build_application(config: &Config, mode: Mode) -> RcApplication<LoopbackRadio> {
    let settings = config.radio.settings_for(mode);
    info!(
        "Radio at {} Hz, {} dBm",
        settings.frequency_hz, settings.tx_power_dbm
    );
    RcApplication::new(mode, LoopbackRadio::new(), &settings)
}
