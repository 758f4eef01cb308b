// src/service/controller.rs
//
// Tracking lifecycle: Idle ⇄ Tracking.
//
// Every command source (manual toggle, automation plugin, trigger monitor,
// status surface) funnels into the same two transitions, serialized behind
// one mutex. Samples are handled under that same mutex, so a fix racing a
// stop either lands before StateChanged(Idle) or is discarded.

use super::platform::{LocationProvider, OutputSink, StatusSurface};
use super::volume_ramp::VolumeRamp;
use crate::engine::{CalibrationHandle, SampleProcessor, VolumeCalibration};
use crate::error::ControlError;
use crate::pipeline::{EventBus, TrackingEvent, TrackingMetrics};
use crate::types::{
    CommandSource, Config, LocationRequest, RawFix, TrackingState, VolumeRampConfig,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pending events kept for slow observers
const EVENT_BUFFER: usize = 64;

/// Everything the controller needs that never changes after construction.
struct Hub {
    location: Arc<dyn LocationProvider>,
    sink: Arc<dyn OutputSink>,
    surface: Arc<dyn StatusSurface>,
    events: EventBus,
    metrics: TrackingMetrics,
    calibration: CalibrationHandle,
    location_request: LocationRequest,
    ramp: VolumeRampConfig,
    /// Where session workers run, whichever thread issues the command
    runtime: Handle,
}

/// One Idle → Tracking → Idle run.
struct Session {
    id: u64,
    ramp: VolumeRamp,
    sampler: JoinHandle<()>,
}

struct ControllerState {
    state: TrackingState,
    processor: SampleProcessor,
    session: Option<Session>,
    next_session_id: u64,
}

#[derive(Clone)]
pub struct TrackingController {
    hub: Arc<Hub>,
    inner: Arc<Mutex<ControllerState>>,
}

impl TrackingController {
    /// Build an idle controller on the current Tokio runtime. Fails on an
    /// invalid calibration or when called outside a runtime.
    pub fn new(
        config: &Config,
        location: Arc<dyn LocationProvider>,
        sink: Arc<dyn OutputSink>,
        surface: Arc<dyn StatusSurface>,
    ) -> Result<Self, ControlError> {
        Self::with_metrics(config, location, sink, surface, TrackingMetrics::new())
    }

    /// Uses the Tokio runtime the caller is running on.
    pub fn with_metrics(
        config: &Config,
        location: Arc<dyn LocationProvider>,
        sink: Arc<dyn OutputSink>,
        surface: Arc<dyn StatusSurface>,
        metrics: TrackingMetrics,
    ) -> Result<Self, ControlError> {
        let runtime = Handle::try_current().map_err(|_| ControlError::NoRuntime)?;
        Self::with_runtime(config, location, sink, surface, metrics, runtime)
    }

    /// Build with an explicit runtime. Commands may then come from any
    /// thread, including platform callbacks outside the runtime.
    pub fn with_runtime(
        config: &Config,
        location: Arc<dyn LocationProvider>,
        sink: Arc<dyn OutputSink>,
        surface: Arc<dyn StatusSurface>,
        metrics: TrackingMetrics,
        runtime: Handle,
    ) -> Result<Self, ControlError> {
        let calibration = CalibrationHandle::new(config.calibration.to_native()?);

        let hub = Hub {
            location,
            sink,
            surface,
            events: EventBus::new(EVENT_BUFFER),
            metrics,
            calibration: calibration.clone(),
            location_request: LocationRequest::from(&config.location),
            ramp: config.volume.clone(),
            runtime,
        };

        let inner = ControllerState {
            state: TrackingState::Idle,
            processor: SampleProcessor::new(calibration),
            session: None,
            next_session_id: 0,
        };

        Ok(Self {
            hub: Arc::new(hub),
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub fn state(&self) -> TrackingState {
        self.lock().state
    }

    pub fn is_tracking(&self) -> bool {
        self.state().is_tracking()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.hub.events.subscribe()
    }

    pub fn metrics(&self) -> &TrackingMetrics {
        &self.hub.metrics
    }

    pub fn calibration(&self) -> VolumeCalibration {
        self.hub.calibration.get()
    }

    /// Swap the calibration; takes effect on the next sample.
    pub fn update_calibration(&self, calibration: VolumeCalibration) {
        info!(
            "Calibration updated: {:.2}..{:.2} m/s -> {}..{}%",
            calibration.low_speed(),
            calibration.high_speed(),
            calibration.low_level(),
            calibration.high_level()
        );
        self.hub.calibration.set(calibration);
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    pub fn request_start(&self) -> Result<(), ControlError> {
        self.apply(true, CommandSource::Manual)
    }

    pub fn request_stop(&self) {
        // stopping cannot fail
        let _ = self.apply(false, CommandSource::Manual);
    }

    /// Explicit desired state, as sent by the automation plugin.
    pub fn request_set_state(&self, desired: bool) -> Result<(), ControlError> {
        self.apply(desired, CommandSource::Automation)
    }

    /// Stop action on the status surface itself.
    pub fn dismiss_from_surface(&self) {
        let _ = self.apply(false, CommandSource::Surface);
    }

    /// Manual toggle from the UI.
    pub fn toggle(&self) -> Result<TrackingState, ControlError> {
        let mut inner = self.lock();
        let desired = !inner.state.is_tracking();
        self.transition(&mut inner, desired, CommandSource::Manual)?;
        Ok(inner.state)
    }

    /// The single entry point every command source goes through.
    pub fn apply(&self, desired: bool, source: CommandSource) -> Result<(), ControlError> {
        let mut inner = self.lock();
        self.transition(&mut inner, desired, source)
    }

    fn transition(
        &self,
        inner: &mut ControllerState,
        desired: bool,
        source: CommandSource,
    ) -> Result<(), ControlError> {
        if desired {
            self.start_locked(inner, source)
        } else {
            self.stop_locked(inner, source);
            Ok(())
        }
    }

    fn start_locked(
        &self,
        inner: &mut ControllerState,
        source: CommandSource,
    ) -> Result<(), ControlError> {
        if inner.state.is_tracking() {
            debug!("Start from {:?} ignored, already tracking", source);
            return Ok(());
        }

        let hub = &self.hub;
        if !hub.location.has_permission() {
            warn!("📍 Start from {:?} refused: location permission missing", source);
            hub.metrics.inc(&hub.metrics.start_refusals);
            hub.surface.notify_permission_needed();
            hub.events.publish(TrackingEvent::PermissionNeeded);
            return Err(ControlError::PermissionDenied);
        }

        inner.processor.reset_previous_fix();
        let fixes = hub.location.request_updates(hub.location_request)?;

        let id = inner.next_session_id;
        inner.next_session_id += 1;

        let ramp = VolumeRamp::spawn(
            &hub.runtime,
            Arc::clone(&hub.sink),
            hub.ramp.clone(),
            hub.metrics.clone(),
        );
        let sampler = hub.runtime.spawn(run_sampler(
            Arc::clone(&self.hub),
            Arc::clone(&self.inner),
            id,
            fixes,
        ));
        hub.surface.acquire();

        inner.session = Some(Session { id, ramp, sampler });
        inner.state = TrackingState::Tracking;
        hub.metrics.inc(&hub.metrics.sessions_started);
        hub.events
            .publish(TrackingEvent::StateChanged(TrackingState::Tracking));

        info!("▶️  Tracking started (session {}, via {:?})", id, source);
        Ok(())
    }

    fn stop_locked(&self, inner: &mut ControllerState, source: CommandSource) {
        if !inner.state.is_tracking() {
            debug!("Stop from {:?} ignored, not tracking", source);
            return;
        }

        let hub = &self.hub;
        hub.location.remove_updates();
        if let Some(session) = inner.session.take() {
            session.sampler.abort();
            session.ramp.shutdown();
            debug!("Session {} torn down", session.id);
        }
        hub.surface.release();

        inner.state = TrackingState::Idle;
        hub.events.publish(TrackingEvent::StateChanged(TrackingState::Idle));

        info!("⏹️  Tracking stopped (via {:?})", source);
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drains one session's fix stream in arrival order.
async fn run_sampler(
    hub: Arc<Hub>,
    inner: Arc<Mutex<ControllerState>>,
    session_id: u64,
    mut fixes: mpsc::UnboundedReceiver<RawFix>,
) {
    while let Some(fix) = fixes.recv().await {
        hub.metrics.inc(&hub.metrics.samples_received);
        if !handle_fix(&hub, &inner, session_id, &fix) {
            break;
        }
    }
    debug!("Sampler for session {} finished", session_id);
}

/// Returns false once the session is gone.
fn handle_fix(
    hub: &Hub,
    inner: &Mutex<ControllerState>,
    session_id: u64,
    fix: &RawFix,
) -> bool {
    let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
    let ControllerState {
        state,
        processor,
        session,
        ..
    } = &mut *guard;

    let session = match session.as_ref() {
        Some(s) if s.id == session_id && state.is_tracking() => s,
        _ => {
            hub.metrics.inc(&hub.metrics.samples_after_stop);
            debug!("Discarding fix delivered after session {} stopped", session_id);
            return false;
        }
    };

    match processor.on_fix(fix) {
        Some(change) => {
            session.ramp.set_target(change.level);
            hub.metrics.inc(&hub.metrics.levels_published);
            hub.events.publish(TrackingEvent::LevelChanged {
                raw_speed: change.raw_speed,
                level_percent: change.level_percent,
            });
        }
        None => hub.metrics.inc(&hub.metrics.malformed_samples),
    }
    true
}
