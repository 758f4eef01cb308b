// src/service/volume_ramp.rs
//
// Background worker that owns the output sink. It eases the system volume
// toward the latest desired level instead of jumping, and only ever looks
// at the newest target; intermediate targets are coalesced away.
//
// Sink writes are blocking platform calls, so each one runs on the blocking
// pool. A slow write never holds up the runtime threads the sampler uses.

use super::platform::OutputSink;
use crate::pipeline::TrackingMetrics;
use crate::types::VolumeRampConfig;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Next level on the way from `current` to `target`.
pub fn approach(current: f32, target: f32, cfg: &VolumeRampConfig) -> f32 {
    if (target - current).abs() < cfg.snap_threshold {
        return target;
    }
    let step = ((target - current) * cfg.approach_rate).clamp(-cfg.max_approach, cfg.max_approach);
    current + step
}

/// Handle to a running ramp worker.
pub struct VolumeRamp {
    target: watch::Sender<f32>,
    /// Set once stopped; held while writing so no write lands after stop
    stopped: Arc<Mutex<bool>>,
    handle: JoinHandle<()>,
}

impl VolumeRamp {
    /// Start the worker on `runtime`. Initial level and target come from the
    /// sink's present volume, so nothing moves until a target is published.
    pub fn spawn(
        runtime: &Handle,
        sink: Arc<dyn OutputSink>,
        cfg: VolumeRampConfig,
        metrics: TrackingMetrics,
    ) -> Self {
        let max = sink.max_volume();
        let initial = if max > 0 {
            (sink.current_volume() as f32 / max as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };
        debug!("Volume worker starting at {:.2} (max {})", initial, max);

        let (target, target_rx) = watch::channel(initial);
        let stopped = Arc::new(Mutex::new(false));
        let handle = runtime.spawn(run_ramp(
            sink,
            cfg,
            metrics,
            initial,
            target_rx,
            Arc::clone(&stopped),
        ));

        Self {
            target,
            stopped,
            handle,
        }
    }

    /// Publish a new desired level in [0, 1]. Wakes the worker only on change.
    pub fn set_target(&self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.target.send_if_modified(|current| {
            if *current == level {
                false
            } else {
                trace!("Target volume {:.3}", level);
                *current = level;
                true
            }
        });
    }

    #[cfg(test)]
    fn target(&self) -> f32 {
        *self.target.borrow()
    }

    /// Stop the worker. Waits out a write already in flight; once this
    /// returns, no further sink write happens.
    pub fn shutdown(self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.handle.abort();
        debug!("Volume worker stopped");
    }
}

async fn run_ramp(
    sink: Arc<dyn OutputSink>,
    cfg: VolumeRampConfig,
    metrics: TrackingMetrics,
    mut current: f32,
    mut target_rx: watch::Receiver<f32>,
    stopped: Arc<Mutex<bool>>,
) {
    let max = sink.max_volume();
    let delay = Duration::from_millis(cfg.update_delay_ms);

    loop {
        tokio::time::sleep(delay).await;

        let mut target = *target_rx.borrow_and_update();
        if current == target {
            trace!("Volume matched, parking");
            if target_rx.changed().await.is_err() {
                break;
            }
            target = *target_rx.borrow_and_update();
        }

        let next = approach(current, target, &cfg);
        let step = (max as f32 * next) as u32;

        let write = {
            let sink = Arc::clone(&sink);
            let stopped = Arc::clone(&stopped);
            task::spawn_blocking(move || {
                let guard = stopped.lock().unwrap_or_else(PoisonError::into_inner);
                if *guard {
                    return None;
                }
                Some(sink.set_volume(step))
            })
        };

        match write.await {
            Ok(Some(Ok(()))) => {
                metrics.inc(&metrics.sink_writes);
                trace!("Volume {:.3} -> step {}/{}", next, step, max);
                current = next;
            }
            Ok(Some(Err(e))) => {
                metrics.inc(&metrics.sink_failures);
                warn!("Failed to set volume to {}: {}", step, e);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Volume write task failed: {}", e);
                break;
            }
        }
    }

    debug!("Volume worker exiting");
}
