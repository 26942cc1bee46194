//! SmartAmbient Hub Library
//!
//! Listens to a microphone, splits each frame into bass/mid/treble energy and
//! drives three lights (red, yellow, green) through a best-effort publish
//! capability. The binary wires the cpal backend to a stdout command sink.

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod session;

use audio::{CpalBackend, DeviceSelector};
use clap::Parser;
use config::{ConfigError, HubConfig};
use protocol::{ChannelPublisher, OutboundMessage};
use session::{SessionController, SessionError, StopOutcome};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Top-level errors surfaced by `run`
#[derive(Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(
    name = "ambient-hub",
    version,
    about = "Drive three lights from live microphone audio"
)]
pub struct Cli {
    /// Config file (defaults to $AMBIENT_HUB_CONFIG or ./config.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Input device: enumeration index or case-insensitive name fragment
    #[arg(long, short)]
    pub device: Option<String>,

    /// Print the available audio devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Parse arguments, start audio-reactive mode and run until Ctrl-C.
pub fn run() -> Result<(), HubError> {
    let cli = Cli::parse();

    let config_path = HubConfig::resolve_path(cli.config.as_deref());
    let config = HubConfig::load_with_env(&config_path)?;
    init_logging(&config.log_level);

    if config_path.exists() {
        log::info!("Loaded configuration from {}", config_path.display());
    } else {
        log::warn!("{} not found, using defaults", config_path.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_hub(cli, config))
}

async fn run_hub(cli: Cli, config: HubConfig) -> Result<(), HubError> {
    let (publisher, outbound_rx) = ChannelPublisher::new(config.publish.queue_capacity);
    let controller = Arc::new(SessionController::new(
        Arc::new(CpalBackend::new()),
        Arc::new(publisher),
        config.audio.clone(),
        config.publish.command_topic.clone(),
    ));

    if cli.list_devices {
        for device in controller.devices()? {
            println!(
                "{:>3} {} {} ({} in)",
                device.index,
                if device.is_default { "*" } else { " " },
                device.name,
                device.input_channels
            );
        }
        return Ok(());
    }

    log::info!("==================================================");
    log::info!("SmartAmbient Hub starting...");
    log::info!("==================================================");

    let mut writer = tokio::spawn(write_outbound(outbound_rx));

    let selector = cli.device.as_deref().map(DeviceSelector::parse);
    let starter = controller.clone();
    let device = tokio::task::spawn_blocking(move || starter.start(selector.as_ref()))
        .await??;
    log::info!(
        "Audio-reactive mode active on {} (index {}, {} Hz)",
        device.name,
        device.index,
        device.sample_rate
    );

    let mut writer_done = false;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            log::info!("Shutdown signal received, cleaning up...");
        }
        result = &mut writer => {
            writer_done = true;
            match result {
                Ok(Ok(())) => log::warn!("Command sink closed"),
                Ok(Err(e)) => log::error!("Command sink failed: {}", e),
                Err(e) => log::error!("Command sink task failed: {}", e),
            }
        }
    }

    let stopper = controller.clone();
    let outcome = tokio::task::spawn_blocking(move || stopper.stop()).await??;
    if outcome == StopOutcome::NotActive {
        log::warn!("Audio listening was not active at shutdown");
    }

    // Dropping the last controller closes the queue, letting the writer drain and exit.
    drop(controller);
    if !writer_done {
        writer.await??;
    }

    log::info!("SmartAmbient Hub stopped");
    Ok(())
}

/// Writes each queued command as `<topic> <payload>` on stdout.
async fn write_outbound(mut rx: mpsc::Receiver<OutboundMessage>) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(msg) = rx.recv().await {
        let line = format!("{} {}\n", msg.topic, msg.payload);
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
