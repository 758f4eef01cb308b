// src/pipeline/event_bus.rs
//
// Outbound observer channel. The controller publishes; UI and logging
// collaborators subscribe without reaching into controller state.

use crate::types::TrackingState;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrackingEvent {
    StateChanged(TrackingState),

    LevelChanged {
        raw_speed: f32,
        level_percent: u8,
    },

    /// Start was refused for lack of location permission
    PermissionNeeded,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TrackingEvent>,
}

impl EventBus {
    /// Slow subscribers lose the oldest events beyond `max_pending`.
    pub fn new(max_pending: usize) -> Self {
        let (sender, _) = broadcast::channel(max_pending.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: TrackingEvent) {
        trace!(
            "Publishing {:?} to {} subscribers",
            event,
            self.sender.receiver_count()
        );
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.sender.subscribe()
    }
}
