// src/main.rs
//
// Replays a recorded drive through the control engine with in-memory
// platform collaborators and reports what the engine did.

use anyhow::Result;
use speed_of_sound::replay::{self, MemorySink, RecordingSurface, ReplayLocationProvider};
use speed_of_sound::service::OutputSink;
use speed_of_sound::types::TriggerEvent;
use speed_of_sound::{Config, ControlError, TrackingController, TrackingEvent, TriggerMonitor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Time given to the volume worker to settle after the last fix
const SETTLE_TIME: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("SPEED_OF_SOUND_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("speed_of_sound={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🔊 Speed of Sound starting");
    info!(
        "Calibration: {:.0}..{:.0} {} -> {}..{}%",
        config.calibration.low_speed,
        config.calibration.high_speed,
        config.calibration.speed_units,
        config.calibration.low_volume,
        config.calibration.high_volume
    );

    let fixes = replay::load_trace(&config.replay.trace_path)?;
    info!("Loaded {} fixes from {}", fixes.len(), config.replay.trace_path);

    let location = Arc::new(ReplayLocationProvider::new(config.replay.location_permission));
    let sink = Arc::new(MemorySink::new(config.replay.sink_max_volume, 0));
    let surface = Arc::new(RecordingSurface::default());
    let controller =
        TrackingController::new(&config, location.clone(), sink.clone(), surface.clone())?;

    let observer = tokio::spawn(log_events(controller.subscribe()));

    // Auto-activate through the trigger path when it is configured,
    // otherwise behave like a manual start.
    let started = if config.activation.enable_bluetooth {
        let mut monitor = TriggerMonitor::new(controller.clone(), config.activation.clone(), true);
        let address = config
            .activation
            .bluetooth_devices
            .first()
            .cloned()
            .unwrap_or_else(|| "00:00:00:00:00:00".to_string());
        monitor
            .on_event(TriggerEvent::AccessoryConnected { address })
            .map(|_| controller.is_tracking())
    } else {
        controller.request_start().map(|_| true)
    };

    match started {
        Ok(true) => {}
        Ok(false) => {
            warn!("Triggers did not activate tracking; nothing to replay");
            return Ok(());
        }
        Err(ControlError::PermissionDenied) => {
            warn!("Location permission denied; grant it and run again");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let delivered = replay::replay_fixes(&location, &fixes, config.replay.speedup).await;
    tokio::time::sleep(SETTLE_TIME).await;
    controller.request_stop();

    if let Err(e) = observer.await {
        error!("Event observer failed: {}", e);
    }

    let summary = controller.metrics().summary();
    info!("\n✓ Replay complete: {} fixes delivered", delivered);
    info!("  Final volume: {}/{}", sink.current_volume(), config.replay.sink_max_volume);
    info!("  Volume writes: {}", sink.writes().len());
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Log every event until tracking goes idle.
async fn log_events(mut events: tokio::sync::broadcast::Receiver<TrackingEvent>) {
    loop {
        match events.recv().await {
            Ok(TrackingEvent::LevelChanged {
                raw_speed,
                level_percent,
            }) => {
                info!("🚗 {:5.1} m/s -> {:3}%", raw_speed, level_percent);
            }
            Ok(TrackingEvent::StateChanged(state)) => {
                info!("State: {:?}", state);
                if !state.is_tracking() {
                    break;
                }
            }
            Ok(TrackingEvent::PermissionNeeded) => warn!("Location permission needed"),
            Err(RecvError::Lagged(n)) => warn!("Observer lagged, {} events dropped", n),
            Err(RecvError::Closed) => break,
        }
    }
}
