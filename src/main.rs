//! Arduino Bridge - Main Entry Point
//!
//! `bridge` runs the bus side and supervises a `controller` child process;
//! `controller` owns the board and serves the request/reply channel.

use anyhow::Context;
use arduino_bridge::{
    bridge::{BridgeClient, BusReceiver, Mailbox},
    bus::{ZmqBusSink, ZmqBusSource},
    config::{BridgeConfig, ConfigSource, CONFIG_ENV},
    controller::BoardController,
    logging,
    supervisor::ControllerProcess,
    transport::{ZmqRequester, ZmqResponder},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often an idle controller rechecks its stop flag
const CONTROLLER_STOP_CHECK: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "arduino-bridge", version, author, about = "Bridge a topic bus to an Arduino board")]
struct Cli {
    /// Config file (overrides ARDUINO_BRIDGE_CONFIG and the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bus bridge and its controller child
    Bridge,
    /// Run the board controller
    Controller {
        /// Reply endpoint to bind, e.g. tcp://*:38782
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Write a default config file
    InitConfig {
        /// Destination; the resolved config location when omitted
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        return init_config(path.clone().or(cli.config.clone()));
    }

    let (config, source) =
        BridgeConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Bridge => {
            let _guard = logging::init(&config.logging, "bridge")?;
            log_source(&source);
            run_bridge(&config, &source)
        }
        Command::Controller { endpoint } => {
            let _guard = logging::init(&config.logging, "controller")?;
            log_source(&source);
            run_controller(&config, endpoint)
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

fn log_source(source: &ConfigSource) {
    match source {
        ConfigSource::Explicit(path) => tracing::info!("Using config {:?}", path),
        ConfigSource::Default(path) if path.exists() => tracing::info!("Using config {:?}", path),
        _ => tracing::info!("Using built-in configuration"),
    }
}

fn init_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => ConfigSource::resolve(None)
            .path()
            .map(|p| p.to_path_buf())
            .context("No config directory on this platform; pass a path")?,
    };

    if path.exists() {
        anyhow::bail!("{:?} already exists", path);
    }
    BridgeConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn stop_on_ctrlc(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        tracing::info!("Interrupt received, stopping");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")
}

fn run_controller(config: &BridgeConfig, endpoint: Option<String>) -> anyhow::Result<()> {
    let endpoint = endpoint.unwrap_or_else(|| config.controller.endpoint.clone());
    let connector = config.controller.simulator.connector();

    let running = Arc::new(AtomicBool::new(true));
    stop_on_ctrlc(running.clone())?;

    let mut responder = ZmqResponder::bind(&endpoint)?.with_poll_timeout(Some(CONTROLLER_STOP_CHECK));
    let mut controller = BoardController::new(Box::new(connector), config.controller.settings())
        .with_running_flag(running);

    controller.run(&mut responder)?;
    Ok(())
}

fn run_bridge(config: &BridgeConfig, source: &ConfigSource) -> anyhow::Result<()> {
    let mut command = config.supervisor.command()?;
    if let ConfigSource::Explicit(path) = source {
        command = command.env(CONFIG_ENV, path.display().to_string());
    }
    let process = ControllerProcess::spawn(&command)?;

    let running = Arc::new(AtomicBool::new(true));
    stop_on_ctrlc(running.clone())?;

    let mailbox = Arc::new(Mailbox::new());
    let bus_source = ZmqBusSource::connect(&config.bus.subscribe_endpoint)?;
    let bus_sink = ZmqBusSink::connect(&config.bus.publish_endpoint)?;
    let requester = ZmqRequester::connect(&config.bridge.controller_endpoint)?;

    let mut receiver = BusReceiver::spawn(
        Box::new(bus_source),
        mailbox.clone(),
        running.clone(),
        config.bridge.receive_timeout(),
    )?;
    let mut client = BridgeClient::new(
        Box::new(requester),
        Box::new(bus_sink),
        mailbox,
        config.bridge.settings(),
    )
    .with_running_flag(running);

    let result = client.run();
    receiver.stop()?;

    let timeout = config.supervisor.shutdown_timeout();
    if let Err(e) = client.shutdown(timeout) {
        tracing::warn!("Shutdown handshake failed: {}", e);
    }
    let status = process.shutdown(timeout)?;
    tracing::info!("Controller exited with {}", status);

    result.context("Bridge stopped on error")
}
