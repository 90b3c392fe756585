//! Virtual HID service client boundary (C10, §4.6 and §6): delivers
//! post-processed events and reports keyboard/pointing readiness.

use crate::event::{MouseKey, PointingMotion, UsagePair};
use crate::event::EventType;

/// Readiness snapshot the device grabber polls before seizing a device, and
/// the manipulator managers connector needs before it can drain the posted
/// queue (§4.7.1: "If the virtual HID keyboard is not ready,
/// `ungrabbable_temporarily`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VirtualHidDevicesState {
    pub keyboard_ready: bool,
    pub pointing_ready: bool,
}

impl VirtualHidDevicesState {
    pub fn ready_for(&self, needs_pointing: bool) -> bool {
        self.keyboard_ready && (!needs_pointing || self.pointing_ready)
    }
}

/// The external collaborator that owns the actual virtual HID keyboard and
/// pointing devices. A real implementation talks to the platform's virtual
/// HID driver; tests and the in-process dispatcher substitute a fake.
pub trait VirtualHidServiceClient: std::fmt::Debug + Send {
    fn state(&self) -> VirtualHidDevicesState;

    fn post_key(&mut self, usage_pair: UsagePair, event_type: EventType);
    fn post_pointing_button(&mut self, usage_pair: UsagePair, event_type: EventType);
    fn post_pointing_motion(&mut self, motion: PointingMotion);
    fn post_mouse_key(&mut self, mouse_key: MouseKey);

    fn set_caps_lock_led_state(&mut self, on: bool);

    fn initialize_virtual_hid_keyboard(&mut self, country_code: u8);
    fn reset_virtual_hid_keyboard(&mut self);
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Records every call a manipulator-pipeline-driven test makes against
    /// the virtual HID boundary, so assertions can inspect exactly what was
    /// posted without standing up a real platform driver.
    #[derive(Debug, Default)]
    pub struct RecordingVirtualHidClient {
        pub state: VirtualHidDevicesState,
        pub key_events: Vec<(UsagePair, EventType)>,
        pub pointing_button_events: Vec<(UsagePair, EventType)>,
        pub motions: Vec<PointingMotion>,
        pub mouse_keys: Vec<MouseKey>,
        pub caps_lock_led: Option<bool>,
    }

    impl RecordingVirtualHidClient {
        pub fn ready() -> Self {
            Self {
                state: VirtualHidDevicesState { keyboard_ready: true, pointing_ready: true },
                ..Default::default()
            }
        }
    }

    impl VirtualHidServiceClient for RecordingVirtualHidClient {
        fn state(&self) -> VirtualHidDevicesState {
            self.state
        }

        fn post_key(&mut self, usage_pair: UsagePair, event_type: EventType) {
            self.key_events.push((usage_pair, event_type));
        }

        fn post_pointing_button(&mut self, usage_pair: UsagePair, event_type: EventType) {
            self.pointing_button_events.push((usage_pair, event_type));
        }

        fn post_pointing_motion(&mut self, motion: PointingMotion) {
            self.motions.push(motion);
        }

        fn post_mouse_key(&mut self, mouse_key: MouseKey) {
            self.mouse_keys.push(mouse_key);
        }

        fn set_caps_lock_led_state(&mut self, on: bool) {
            self.caps_lock_led = Some(on);
        }

        fn initialize_virtual_hid_keyboard(&mut self, _country_code: u8) {
            self.state.keyboard_ready = true;
        }

        fn reset_virtual_hid_keyboard(&mut self) {
            self.state.keyboard_ready = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_for_keyboard_only_ignores_pointing() {
        let state = VirtualHidDevicesState { keyboard_ready: true, pointing_ready: false };
        assert!(state.ready_for(false));
        assert!(!state.ready_for(true));
    }

    #[test]
    fn not_ready_when_keyboard_missing() {
        let state = VirtualHidDevicesState { keyboard_ready: false, pointing_ready: true };
        assert!(!state.ready_for(false));
    }
}
