// src/service/platform.rs
//
// Seams to the host platform. The controller only ever talks to these.

use crate::error::{ControlError, SinkError};
use crate::types::{LocationRequest, RawFix};
use tokio::sync::mpsc;

/// OS location collaborator.
pub trait LocationProvider: Send + Sync {
    fn has_permission(&self) -> bool;

    /// Begin delivering fixes in arrival order on the returned channel.
    fn request_updates(
        &self,
        request: LocationRequest,
    ) -> Result<mpsc::UnboundedReceiver<RawFix>, ControlError>;

    /// Stop delivering fixes. Must take effect before returning.
    fn remove_updates(&self);
}

/// System audio level control, in the platform's integer steps.
pub trait OutputSink: Send + Sync {
    fn max_volume(&self) -> u32;
    fn current_volume(&self) -> u32;
    fn set_volume(&self, volume: u32) -> Result<(), SinkError>;
}

/// Long-running status surface shown while tracking (e.g. an ongoing
/// notification). Its dismiss affordance should call
/// `TrackingController::dismiss_from_surface`.
pub trait StatusSurface: Send + Sync {
    fn acquire(&self);
    fn release(&self);
    /// One-shot user notice that location permission is needed
    fn notify_permission_needed(&self);
}
