// src/engine/activation.rs

/// Snapshot of everything the auto-activation decision depends on.
/// Derived fresh for every trigger event; never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationInputs {
    pub power_connected: bool,
    pub accessory_connected: bool,
    pub require_power: bool,
    pub enable_on_accessory: bool,
}

/// Decide whether tracking should be running.
///
/// The power requirement short-circuits: with it set and no power, nothing
/// else matters.
pub fn decide(inputs: ActivationInputs) -> bool {
    if inputs.require_power && !inputs.power_connected {
        return false;
    }
    inputs.enable_on_accessory && inputs.accessory_connected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(power: bool, accessory: bool, require: bool, enable: bool) -> ActivationInputs {
        ActivationInputs {
            power_connected: power,
            accessory_connected: accessory,
            require_power: require,
            enable_on_accessory: enable,
        }
    }

    #[test]
    fn test_missing_power_wins_over_accessory() {
        for accessory in [false, true] {
            for enable in [false, true] {
                assert!(!decide(inputs(false, accessory, true, enable)));
            }
        }
    }

    #[test]
    fn test_accessory_activates_without_power_requirement() {
        assert!(decide(inputs(false, true, false, true)));
        assert!(decide(inputs(true, true, false, true)));
    }

    #[test]
    fn test_power_alone_never_activates() {
        assert!(!decide(inputs(true, false, true, false)));
        assert!(!decide(inputs(true, true, true, false)));
        assert!(!decide(inputs(true, false, true, true)));
    }

    #[test]
    fn test_power_and_accessory_activate() {
        assert!(decide(inputs(true, true, true, true)));
    }
}
