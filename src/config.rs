//! Configuration snapshot boundary (§6 "Configuration input"): this crate
//! consumes a `CoreConfiguration` snapshot and never parses JSON itself —
//! that belongs to an out-of-scope configuration-file layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::event::{Event, ModifierFlag, MomentarySwitchEvent};
use crate::manipulator::basic::{BasicManipulator, ToEvent};
use crate::manipulator::conditions::Conditions;
use crate::time::AbsoluteDuration;

/// Declarative form of [`ToEvent`], serializable for persistence/config
/// loading; converted to the runtime type when a manipulator manager is
/// rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToEventConfig {
    pub event: Event,
    #[serde(default)]
    pub modifiers: Vec<ModifierFlag>,
    #[serde(default)]
    pub lazy: bool,
    #[serde(default = "default_true")]
    pub repeat: bool,
    #[serde(default)]
    pub halt: bool,
}

fn default_true() -> bool {
    true
}

impl From<ToEventConfig> for ToEvent {
    fn from(c: ToEventConfig) -> Self {
        ToEvent::new(c.event).with_modifiers(c.modifiers).with_halt(c.halt)
    }
}

/// Declarative basic-manipulator rule: the from/to/timing shape of §4.5.2,
/// used for simple modifications, fn-function-keys, and each manipulator
/// inside a complex-modification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulatorRule {
    pub from: MomentarySwitchEvent,
    #[serde(default)]
    pub mandatory_modifiers: Vec<ModifierFlag>,
    #[serde(default)]
    pub optional_modifiers: Vec<ModifierFlag>,
    #[serde(default)]
    pub to: Vec<ToEventConfig>,
    #[serde(default)]
    pub to_if_alone: Vec<ToEventConfig>,
    #[serde(default)]
    pub to_if_held_down: Vec<ToEventConfig>,
    #[serde(default)]
    pub to_delayed_action_invoked: Vec<ToEventConfig>,
    #[serde(default)]
    pub to_delayed_action_canceled: Vec<ToEventConfig>,
    #[serde(default)]
    pub conditions: Conditions,
}

impl ManipulatorRule {
    pub fn build(self) -> BasicManipulator {
        BasicManipulator::new(self.from)
            .with_mandatory_modifiers(self.mandatory_modifiers)
            .with_optional_modifiers(self.optional_modifiers)
            .with_to(self.to.into_iter().map(Into::into).collect())
            .with_to_if_alone(self.to_if_alone.into_iter().map(Into::into).collect())
            .with_to_if_held_down(self.to_if_held_down.into_iter().map(Into::into).collect())
            .with_to_delayed_action(
                self.to_delayed_action_invoked.into_iter().map(Into::into).collect(),
                self.to_delayed_action_canceled.into_iter().map(Into::into).collect(),
            )
            .with_conditions(self.conditions)
    }
}

/// A named group of manipulator rules sharing a description, as a complex
/// modification rule groups several manipulators under one label (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexModificationRule {
    pub description: String,
    pub manipulators: Vec<ManipulatorRule>,
}

/// Per-device flags consumed by grab policy and the post-to-virtual-devices
/// stage (§6, §4.7.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub ignore: bool,
    pub disable_built_in_keyboard_if_exists: bool,
    pub manipulate_caps_lock_led: bool,
    pub mouse_flip_x: bool,
    pub mouse_flip_y: bool,
    pub mouse_flip_vertical_wheel: bool,
    pub mouse_flip_horizontal_wheel: bool,
    pub treat_as_built_in_keyboard: bool,
}

/// One selected profile's worth of configuration (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfiguration {
    pub simple_modifications: Vec<ManipulatorRule>,
    pub fn_function_keys: Vec<ManipulatorRule>,
    pub complex_modifications: Vec<ComplexModificationRule>,
    pub device_settings: HashMap<DeviceId, DeviceSettings>,
    pub virtual_hid_keyboard_country_code: u8,
    pub delay_milliseconds_before_open_device: u64,
}

impl CoreConfiguration {
    pub fn device_settings(&self, device_id: DeviceId) -> DeviceSettings {
        self.device_settings.get(&device_id).cloned().unwrap_or_default()
    }

    pub fn delay_before_open_device(&self) -> AbsoluteDuration {
        AbsoluteDuration::from_millis(self.delay_milliseconds_before_open_device)
    }

    /// Builds the ordered manipulator list for the simple-modifications
    /// stage from this snapshot (§4.7.3 "rebuild simple-modifications ...
    /// manipulator managers").
    pub fn build_simple_modification_manipulators(&self) -> Vec<BasicManipulator> {
        self.simple_modifications.iter().cloned().map(ManipulatorRule::build).collect()
    }

    pub fn build_fn_function_key_manipulators(&self) -> Vec<BasicManipulator> {
        self.fn_function_keys.iter().cloned().map(ManipulatorRule::build).collect()
    }

    pub fn build_complex_modification_manipulators(&self) -> Vec<BasicManipulator> {
        self.complex_modifications
            .iter()
            .flat_map(|rule| rule.manipulators.iter().cloned())
            .map(ManipulatorRule::build)
            .collect()
    }
}

/// The configuration boundary (§6): the core resolves this at use time
/// rather than caching a snapshot, so a live config-file watcher (out of
/// scope for this crate) can swap profiles underneath it.
pub trait ConfigurationProvider: std::fmt::Debug + Send {
    fn current(&self) -> CoreConfiguration;
}

/// A `ConfigurationProvider` that never changes; used by tests and as the
/// default wiring in the binary when no live config-file watcher is
/// plugged in.
#[derive(Debug, Clone)]
pub struct StaticConfigurationProvider {
    configuration: CoreConfiguration,
}

impl StaticConfigurationProvider {
    pub fn new(configuration: CoreConfiguration) -> Self {
        Self { configuration }
    }
}

impl ConfigurationProvider for StaticConfigurationProvider {
    fn current(&self) -> CoreConfiguration {
        self.configuration.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UsagePair;

    #[test]
    fn builds_basic_manipulator_from_rule() {
        let rule = ManipulatorRule {
            from: MomentarySwitchEvent::key(UsagePair::new(7, 0x3a)),
            mandatory_modifiers: vec![],
            optional_modifiers: vec![],
            to: vec![ToEventConfig {
                event: Event::MomentarySwitch(MomentarySwitchEvent::key(UsagePair::new(0x0c, 0x29))),
                modifiers: vec![],
                lazy: false,
                repeat: true,
                halt: false,
            }],
            to_if_alone: vec![],
            to_if_held_down: vec![],
            to_delayed_action_invoked: vec![],
            to_delayed_action_canceled: vec![],
            conditions: Conditions::new(),
        };

        let manipulator = rule.build();
        assert!(!manipulator.needs_virtual_hid_pointing());
    }

    #[test]
    fn device_settings_defaults_when_absent() {
        let config = CoreConfiguration::default();
        let settings = config.device_settings(DeviceId(1));
        assert!(!settings.ignore);
    }

    #[test]
    fn static_provider_returns_clone_of_configuration() {
        let mut config = CoreConfiguration::default();
        config.virtual_hid_keyboard_country_code = 33;
        let provider = StaticConfigurationProvider::new(config);
        assert_eq!(provider.current().virtual_hid_keyboard_country_code, 33);
    }
}
