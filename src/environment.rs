//! Manipulator environment cache (§3 "Queue", glossary "Manipulator
//! environment"): frontmost application, input source, system preferences,
//! per-device properties, and named variables visible to manipulator
//! conditions.

use std::collections::HashMap;

use crate::device::{DeviceId, DeviceProperties};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontmostApplication {
    pub bundle_identifier: String,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSourceProperties {
    pub language: Option<String>,
    pub input_source_id: Option<String>,
}

#[derive(Debug, Default)]
pub struct ManipulatorEnvironment {
    frontmost_application: Option<FrontmostApplication>,
    input_source_properties: Option<InputSourceProperties>,
    system_preferences_changed_count: u64,
    device_properties: HashMap<DeviceId, DeviceProperties>,
    variables: HashMap<String, i64>,
    virtual_hid_keyboard_country_code: Option<u8>,
    keyboard_type: Option<String>,
}

impl ManipulatorEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frontmost_application(&mut self, application: FrontmostApplication) {
        self.frontmost_application = Some(application);
    }

    pub fn frontmost_application(&self) -> Option<&FrontmostApplication> {
        self.frontmost_application.as_ref()
    }

    pub fn set_input_source_properties(&mut self, properties: InputSourceProperties) {
        self.input_source_properties = Some(properties);
    }

    pub fn input_source_properties(&self) -> Option<&InputSourceProperties> {
        self.input_source_properties.as_ref()
    }

    pub fn note_system_preferences_changed(&mut self) {
        self.system_preferences_changed_count += 1;
    }

    pub fn insert_device_properties(&mut self, device_id: DeviceId, properties: DeviceProperties) {
        self.device_properties.insert(device_id, properties);
    }

    pub fn erase_device_properties(&mut self, device_id: DeviceId) {
        self.device_properties.remove(&device_id);
    }

    pub fn device_properties(&self, device_id: DeviceId) -> Option<&DeviceProperties> {
        self.device_properties.get(&device_id)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: i64) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> i64 {
        self.variables.get(name).copied().unwrap_or(0)
    }

    pub fn set_virtual_hid_keyboard_country_code(&mut self, code: u8) {
        self.virtual_hid_keyboard_country_code = Some(code);
    }

    pub fn virtual_hid_keyboard_country_code(&self) -> Option<u8> {
        self.virtual_hid_keyboard_country_code
    }

    /// OS keyboard-type identifier (e.g. "ansi", "iso", "jis"), used by
    /// `keyboard_type_if` conditions to gate fn-row remaps. No OS keyboard
    /// type enumeration happens here; this is just the last value reported
    /// in.
    pub fn set_keyboard_type(&mut self, keyboard_type: impl Into<String>) {
        self.keyboard_type = Some(keyboard_type.into());
    }

    pub fn keyboard_type(&self) -> Option<&str> {
        self.keyboard_type.as_deref()
    }
}
