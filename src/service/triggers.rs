// src/service/triggers.rs
//
// Turns environmental connect/disconnect events into tracking commands.
//
// Accessory connection state cannot be re-queried reliably, so the last
// observed value is cached here and only changed by accessory events.

use super::controller::TrackingController;
use crate::engine::{decide, ActivationInputs};
use crate::error::ControlError;
use crate::types::{ActivationConfig, AutomationBundle, CommandSource, TriggerEvent};
use tracing::{debug, info};

/// What a trigger event ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No enabled preference depends on the event, or the accessory is not
    /// on the allow-list
    Ignored,
    /// Desired state already matches the controller
    Unchanged,
    /// A command was issued; carries the desired state
    Applied(bool),
}

pub struct TriggerMonitor {
    controller: TrackingController,
    settings: ActivationConfig,
    power_connected: bool,
    accessory_connected: bool,
}

impl TriggerMonitor {
    /// `power_connected` is the power state observed at startup.
    pub fn new(
        controller: TrackingController,
        settings: ActivationConfig,
        power_connected: bool,
    ) -> Self {
        Self {
            controller,
            settings,
            power_connected,
            accessory_connected: false,
        }
    }

    pub fn update_settings(&mut self, settings: ActivationConfig) {
        self.settings = settings;
    }

    pub fn power_connected(&self) -> bool {
        self.power_connected
    }

    pub fn accessory_connected(&self) -> bool {
        self.accessory_connected
    }

    pub fn on_event(&mut self, event: TriggerEvent) -> Result<TriggerOutcome, ControlError> {
        match &event {
            TriggerEvent::PowerConnected => self.power_connected = true,
            TriggerEvent::PowerDisconnected => self.power_connected = false,
            TriggerEvent::AccessoryConnected { address }
            | TriggerEvent::AccessoryDisconnected { address } => {
                if !self.is_selected_accessory(address) {
                    debug!("Ignoring accessory {} (not selected)", address);
                    return Ok(self.ignored());
                }
                self.accessory_connected =
                    matches!(event, TriggerEvent::AccessoryConnected { .. });
            }
        }

        if !self.reacts_to(&event) {
            debug!("{:?} cached; no activation preference depends on it", event);
            return Ok(self.ignored());
        }

        let metrics = self.controller.metrics();
        metrics.inc(&metrics.trigger_evaluations);

        let desired = decide(ActivationInputs {
            power_connected: self.power_connected,
            accessory_connected: self.accessory_connected,
            require_power: self.settings.enable_only_charging,
            enable_on_accessory: self.settings.enable_bluetooth,
        });

        if desired == self.controller.is_tracking() {
            debug!("{:?}: desired state {} already in effect", event, desired);
            return Ok(TriggerOutcome::Unchanged);
        }

        info!("🔌 {:?} -> tracking {}", event, desired);
        self.controller.apply(desired, CommandSource::Trigger)?;
        Ok(TriggerOutcome::Applied(desired))
    }

    /// Power events matter to either preference; accessory events only
    /// when accessory activation is on.
    fn reacts_to(&self, event: &TriggerEvent) -> bool {
        match event {
            TriggerEvent::PowerConnected | TriggerEvent::PowerDisconnected => {
                self.settings.enable_only_charging || self.settings.enable_bluetooth
            }
            TriggerEvent::AccessoryConnected { .. } | TriggerEvent::AccessoryDisconnected { .. } => {
                self.settings.enable_bluetooth
            }
        }
    }

    /// An empty allow-list accepts any accessory.
    fn is_selected_accessory(&self, address: &str) -> bool {
        let devices = &self.settings.bluetooth_devices;
        devices.is_empty() || devices.iter().any(|d| d.eq_ignore_ascii_case(address))
    }

    fn ignored(&self) -> TriggerOutcome {
        let metrics = self.controller.metrics();
        metrics.inc(&metrics.triggers_ignored);
        TriggerOutcome::Ignored
    }
}

/// Apply a directive from the automation plugin. A missing bundle is ignored.
pub fn apply_automation(
    controller: &TrackingController,
    bundle: Option<&AutomationBundle>,
) -> Result<(), ControlError> {
    let Some(bundle) = bundle else {
        debug!("Automation fire without a bundle, ignoring");
        return Ok(());
    };
    let desired = bundle.desired_state();
    info!("🤖 Automation requested tracking {}", desired);
    controller.apply(desired, CommandSource::Automation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::{MemorySink, RecordingSurface, ReplayLocationProvider};
    use crate::types::Config;
    use std::sync::Arc;

    fn controller() -> TrackingController {
        TrackingController::new(
            &Config::default(),
            Arc::new(ReplayLocationProvider::new(true)),
            Arc::new(MemorySink::new(15, 5)),
            Arc::new(RecordingSurface::default()),
        )
        .unwrap()
    }

    fn settings(only_charging: bool, bluetooth: bool, devices: &[&str]) -> ActivationConfig {
        ActivationConfig {
            enable_only_charging: only_charging,
            enable_bluetooth: bluetooth,
            bluetooth_devices: devices.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn connected(address: &str) -> TriggerEvent {
        TriggerEvent::AccessoryConnected {
            address: address.to_string(),
        }
    }

    fn disconnected(address: &str) -> TriggerEvent {
        TriggerEvent::AccessoryDisconnected {
            address: address.to_string(),
        }
    }

    #[tokio::test]
    async fn test_accessory_connect_starts_and_disconnect_stops() {
        let controller = controller();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(false, true, &[]), false);

        assert_eq!(
            monitor.on_event(connected("AA:BB")).unwrap(),
            TriggerOutcome::Applied(true)
        );
        assert!(controller.is_tracking());

        assert_eq!(
            monitor.on_event(disconnected("AA:BB")).unwrap(),
            TriggerOutcome::Applied(false)
        );
        assert!(!controller.is_tracking());
    }

    #[tokio::test]
    async fn test_power_requirement_gates_accessory() {
        let controller = controller();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(true, true, &[]), false);

        assert_eq!(
            monitor.on_event(connected("AA:BB")).unwrap(),
            TriggerOutcome::Unchanged
        );
        assert!(!controller.is_tracking());

        assert_eq!(
            monitor.on_event(TriggerEvent::PowerConnected).unwrap(),
            TriggerOutcome::Applied(true)
        );
        assert_eq!(
            monitor.on_event(TriggerEvent::PowerDisconnected).unwrap(),
            TriggerOutcome::Applied(false)
        );
    }

    #[tokio::test]
    async fn test_unselected_accessory_is_ignored() {
        let controller = controller();
        let mut monitor =
            TriggerMonitor::new(controller.clone(), settings(false, true, &["11:22"]), true);

        assert_eq!(
            monitor.on_event(connected("AA:BB")).unwrap(),
            TriggerOutcome::Ignored
        );
        assert!(!monitor.accessory_connected());

        assert_eq!(
            monitor.on_event(connected("11:22")).unwrap(),
            TriggerOutcome::Applied(true)
        );
        // an unrelated device going away must not stop tracking
        assert_eq!(
            monitor.on_event(disconnected("AA:BB")).unwrap(),
            TriggerOutcome::Ignored
        );
        assert!(controller.is_tracking());
    }

    #[tokio::test]
    async fn test_unplugging_stops_manual_session_when_power_required() {
        let controller = controller();
        controller.request_start().unwrap();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(true, false, &[]), true);

        assert_eq!(
            monitor.on_event(TriggerEvent::PowerDisconnected).unwrap(),
            TriggerOutcome::Applied(false)
        );
        assert!(!controller.is_tracking());

        // plugging back in does not start anything without accessory activation
        assert_eq!(
            monitor.on_event(TriggerEvent::PowerConnected).unwrap(),
            TriggerOutcome::Unchanged
        );
        assert!(!controller.is_tracking());

        let metrics = controller.metrics();
        assert_eq!(metrics.get(&metrics.trigger_evaluations), 2);
        assert_eq!(metrics.get(&metrics.triggers_ignored), 0);
    }

    #[tokio::test]
    async fn test_no_preferences_leaves_manual_session_alone() {
        let controller = controller();
        controller.request_start().unwrap();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(false, false, &[]), true);

        for event in [TriggerEvent::PowerDisconnected, disconnected("AA:BB")] {
            assert_eq!(monitor.on_event(event).unwrap(), TriggerOutcome::Ignored);
        }
        assert!(controller.is_tracking());
        assert!(!monitor.power_connected());

        let metrics = controller.metrics();
        assert_eq!(metrics.get(&metrics.triggers_ignored), 2);
        assert_eq!(metrics.get(&metrics.trigger_evaluations), 0);
    }

    #[tokio::test]
    async fn test_accessory_events_ignored_with_only_power_preference() {
        let controller = controller();
        controller.request_start().unwrap();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(true, false, &[]), true);

        assert_eq!(
            monitor.on_event(disconnected("AA:BB")).unwrap(),
            TriggerOutcome::Ignored
        );
        assert!(controller.is_tracking());
    }

    #[tokio::test]
    async fn test_cached_accessory_state_used_after_settings_change() {
        let controller = controller();
        let mut monitor = TriggerMonitor::new(controller.clone(), settings(false, false, &[]), true);

        monitor.on_event(connected("AA:BB")).unwrap();
        assert!(monitor.accessory_connected());
        assert!(!controller.is_tracking());

        monitor.update_settings(settings(false, true, &[]));
        assert_eq!(
            monitor.on_event(TriggerEvent::PowerConnected).unwrap(),
            TriggerOutcome::Applied(true)
        );
    }

    #[tokio::test]
    async fn test_automation_bundle() {
        let controller = controller();

        apply_automation(&controller, None).unwrap();
        assert!(!controller.is_tracking());

        apply_automation(&controller, Some(&AutomationBundle::default())).unwrap();
        assert!(controller.is_tracking());

        let stop = AutomationBundle {
            tracking: Some(false),
        };
        apply_automation(&controller, Some(&stop)).unwrap();
        assert!(!controller.is_tracking());
    }
}
