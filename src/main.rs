mod parse_args;

use arkpad::config::Config;
use arkpad::controller::{CollectorHandle, CollectorSettings};
use arkpad::link::ControlLink;
use arkpad::mapping::Sample;
use arkpad::session::{Session, SessionEnd, SessionEvent};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args::parse_args().map_err(|e| eyre!("Invalid arguments: {}", e))?;
    setup(args.verbose)?;

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    Config::ensure_default_config(&config_path).await?;
    let mut config = Config::load(&config_path).await?;
    if let Some(host) = args.host {
        config.device.host = host;
    }
    if let Some(port) = args.port {
        config.device.port = port;
    }
    config.validate()?;

    let (input_tx, input_rx) = watch::channel(Sample::default());
    let collector = if args.no_gamepad {
        warn!("Gamepad disabled, sending neutral input");
        None
    } else {
        let settings = CollectorSettings {
            deadzone: config.gamepad.deadzone,
            invert_tilt: config.gamepad.invert_tilt,
            mapping: config.buttons,
        };
        Some(
            CollectorHandle::spawn(settings, input_tx.clone())
                .map_err(|e| eyre!("Failed to spawn gamepad collector: {}", e))?,
        )
    };

    let (events_tx, events_rx) = mpsc::channel(100);
    let _event_logger = tokio::spawn(log_events(events_rx));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    if let Some(collector) = collector {
        tokio::spawn(watch_collector(collector, cancel.clone()));
    }

    let link = Arc::new(ControlLink::new(
        config.device.clone(),
        config.link.read_timeout(),
    ));
    let session = Session::create(&config, link, input_rx, events_tx);

    let active = session
        .connect()
        .await
        .map_err(|(_, e)| eyre!("Could not connect to {}: {}", config.device, e))?;
    let closed = active.run(cancel).await;

    match closed.end() {
        Some(end @ SessionEnd::Failed { .. }) => {
            if end.is_recoverable() {
                info!("The device may be reconnected by starting again");
            }
            Err(eyre!("Session ended: {}", end))
        }
        _ => Ok(()),
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Reports a gamepad thread that stops while the session is still running
async fn watch_collector(collector: CollectorHandle, cancel: CancellationToken) {
    let mut poll = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = poll.tick() => {
                if collector.is_finished() {
                    error!("Gamepad collector stopped, the last input keeps being sent");
                    return;
                }
            }
        }
    }
}

async fn log_events(mut events: mpsc::Receiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected(endpoint) => info!("connected to {}", endpoint),
            SessionEvent::Failed(message) => error!("{}", message),
            SessionEvent::Disconnected(endpoint) => info!("disconnected from {}", endpoint),
        }
    }
}
