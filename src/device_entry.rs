//! Per-device seizure state (C8, §4.7): one `DeviceEntry` per physical
//! device the grabber has matched, bundling the HID monitor handle
//! alongside the per-device trackers that feed grab policy.

use crate::config::DeviceSettings;
use crate::device::{DeviceId, DeviceProperties};
use crate::external::HidValueMonitor;
use crate::pressed_keys::PressedKeysTracker;
use crate::stuck_events::ProbableStuckEventsManager;
use crate::time::AbsoluteTime;

/// Where a device currently stands with respect to exclusive capture
/// (§3 "Grabbable state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabbableState {
    Grabbable,
    UngrabbableTemporarily,
    UngrabbablePermanently,
    None,
}

/// Whether the HID value monitor is running, and if so, whether it holds
/// exclusive capture (§3 "Grabbable state", §4.7.1 item 5 / §4.7.2 /
/// §4.4 retry loop: a device that is merely `ungrabbable_temporarily`
/// keeps its monitor running unseized so it can be resampled without a
/// full stop/start cycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMode {
    Stopped,
    Observing,
    Seized,
}

/// Per-device bundle of seizure state (§4.7.1). The HID value monitor is
/// owned here so the grabber can start/stop it without reaching into a
/// separate device-keyed map.
#[derive(Debug)]
pub struct DeviceEntry {
    device_id: DeviceId,
    properties: DeviceProperties,
    monitor: Box<dyn HidValueMonitor>,
    pressed_keys: PressedKeysTracker,
    stuck_events: ProbableStuckEventsManager,
    settings: DeviceSettings,

    grabbable_state: GrabbableState,
    monitor_mode: MonitorMode,
    disabled: bool,
    caps_lock_led_on: bool,

    /// Suppresses treating the first report batch after a monitor restart
    /// as stuck-key evidence, since it commonly replays keys already down
    /// at grab time (§3 "Device entry").
    first_value_arrived: bool,

    grabbed_time_stamp: Option<AbsoluteTime>,
    ungrabbed_time_stamp: Option<AbsoluteTime>,
}

impl DeviceEntry {
    pub fn new(device_id: DeviceId, properties: DeviceProperties, monitor: Box<dyn HidValueMonitor>) -> Self {
        Self {
            device_id,
            properties,
            monitor,
            pressed_keys: PressedKeysTracker::new(),
            stuck_events: ProbableStuckEventsManager::new(),
            settings: DeviceSettings::default(),
            grabbable_state: GrabbableState::None,
            monitor_mode: MonitorMode::Stopped,
            disabled: false,
            caps_lock_led_on: false,
            first_value_arrived: false,
            grabbed_time_stamp: None,
            ungrabbed_time_stamp: None,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: DeviceProperties) {
        self.properties = properties;
    }

    pub fn monitor_mut(&mut self) -> &mut dyn HidValueMonitor {
        self.monitor.as_mut()
    }

    pub fn pressed_keys_mut(&mut self) -> &mut PressedKeysTracker {
        &mut self.pressed_keys
    }

    pub fn stuck_events_mut(&mut self) -> &mut ProbableStuckEventsManager {
        &mut self.stuck_events
    }

    pub fn stuck_events(&self) -> &ProbableStuckEventsManager {
        &self.stuck_events
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DeviceSettings) {
        self.settings = settings;
    }

    pub fn grabbable_state(&self) -> GrabbableState {
        self.grabbable_state
    }

    pub fn set_grabbable_state(&mut self, state: GrabbableState) {
        self.grabbable_state = state;
    }

    pub fn is_grabbed(&self) -> bool {
        self.monitor_mode == MonitorMode::Seized
    }

    pub fn monitor_mode(&self) -> MonitorMode {
        self.monitor_mode
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn caps_lock_led_on(&self) -> bool {
        self.caps_lock_led_on
    }

    pub fn set_caps_lock_led_on(&mut self, on: bool) {
        self.caps_lock_led_on = on;
    }

    pub fn first_value_arrived(&self) -> bool {
        self.first_value_arrived
    }

    pub fn grabbed_time_stamp(&self) -> Option<AbsoluteTime> {
        self.grabbed_time_stamp
    }

    pub fn ungrabbed_time_stamp(&self) -> Option<AbsoluteTime> {
        self.ungrabbed_time_stamp
    }

    fn set_monitor_mode(&mut self, mode: MonitorMode) {
        if self.monitor_mode != MonitorMode::Stopped {
            self.monitor.async_stop();
        }
        match mode {
            MonitorMode::Stopped => {}
            MonitorMode::Observing => self.monitor.async_start(false),
            MonitorMode::Seized => self.monitor.async_start(true),
        }
        self.monitor_mode = mode;
    }

    /// Transitions into exclusive capture: starts the HID monitor seized,
    /// notes the transition time stamp, and arms the first-batch
    /// suppression. Returns true iff this was a transition into seized mode
    /// (idempotent otherwise), so the caller can emit `device_grabbed`.
    pub fn grab(&mut self, now: AbsoluteTime) -> bool {
        if self.monitor_mode == MonitorMode::Seized {
            return false;
        }
        self.set_monitor_mode(MonitorMode::Seized);
        self.first_value_arrived = false;
        self.grabbed_time_stamp = Some(now);
        true
    }

    /// Starts (or keeps) the HID monitor running without seizing the
    /// device (§3 "the latter without seize"): used for the
    /// `ungrabbable_temporarily` policy outcome so the device keeps being
    /// sampled and can resolve a probable-stuck-event without waiting for a
    /// fresh HID match. Unlike `grab`, this does not re-arm the
    /// first-batch suppression: downgrading from seized to observed is a
    /// policy change, not a fresh device arrival, so the very next report
    /// must still count as live evidence toward resolving the stuck flag.
    pub fn observe_without_seize(&mut self, now: AbsoluteTime) {
        if self.monitor_mode == MonitorMode::Observing {
            return;
        }
        let was_seized = self.monitor_mode == MonitorMode::Seized;
        self.set_monitor_mode(MonitorMode::Observing);
        if was_seized {
            self.ungrabbed_time_stamp = Some(now);
        }
    }

    /// Fully stops the HID monitor, e.g. `ungrabbable_permanently` or
    /// device removal.
    pub fn stop(&mut self, now: AbsoluteTime) {
        if self.monitor_mode == MonitorMode::Stopped {
            return;
        }
        let was_seized = self.monitor_mode == MonitorMode::Seized;
        self.set_monitor_mode(MonitorMode::Stopped);
        if was_seized {
            self.ungrabbed_time_stamp = Some(now);
        }
    }

    /// Restarts the HID monitor (§4.7.2 "stop-then-restart") in whatever
    /// mode it is already in, and re-arms first-batch suppression so the
    /// replayed report isn't treated as a stuck key.
    pub fn restart_monitor(&mut self) {
        let mode = self.monitor_mode;
        self.monitor.async_stop();
        match mode {
            MonitorMode::Stopped => {}
            MonitorMode::Observing => self.monitor.async_start(false),
            MonitorMode::Seized => self.monitor.async_start(true),
        }
        self.first_value_arrived = false;
    }

    /// Marks that at least one report batch has been processed since the
    /// last grab/restart.
    pub fn note_value_arrived(&mut self) {
        self.first_value_arrived = true;
    }
}
