//! External collaborator boundaries (§6): traits the device grabber and
//! dispatcher depend on, with no concrete implementation shipped by this
//! crate beyond test doubles. Real OS-specific HID enumeration, virtual HID
//! drivers, configuration parsing, and IPC transports live outside this
//! core and are injected through these traits.

use crate::device::{DeviceId, DeviceProperties};
use crate::hid_value::RawHidValue;
use crate::time::AbsoluteTime;

/// Per-device HID value monitor, owned by a device entry (C8). A real
/// implementation wraps the platform's HID report callback API; it is
/// started/stopped by the device grabber as grab policy changes.
pub trait HidValueMonitor: std::fmt::Debug + Send {
    /// `seize` requests exclusive capture; `false` starts the monitor in
    /// observe-only mode (§3 "Only `grabbable` and `ungrabbable_temporarily`
    /// result in starting the HID value monitor, the latter without seize").
    fn async_start(&mut self, seize: bool);
    fn async_stop(&mut self);
}

/// Enumeration-level HID monitor (§6 "HID input monitor"): announces device
/// arrival/termination across the whole system, independent of any single
/// device's value stream.
pub trait HidDeviceMonitor: std::fmt::Debug + Send {
    fn async_start(&mut self);
}

/// Messages the HID layer feeds into the dispatcher (§5: "enqueued onto the
/// dispatcher; they never mutate state inline").
#[derive(Debug, Clone)]
pub enum HidMonitorMessage {
    DeviceMatched { registry_id: u64, properties: DeviceProperties },
    DeviceTerminated { registry_id: u64 },
    DeviceError { registry_id: u64, message: String, not_permitted: bool },
    ValuesArrived { device_id: DeviceId, time_stamp: AbsoluteTime, values: Vec<RawHidValue> },
    DeviceStarted { device_id: DeviceId },
    DeviceStopped { device_id: DeviceId },
}

/// Power management monitor (§6).
#[derive(Debug, Clone)]
pub enum PowerManagementMessage {
    SystemWillSleep { completion_token: u64 },
    CanSystemSleep { completion_token: u64 },
    SystemWillPowerOn,
    SystemHasPoweredOn,
    SystemWillNotSleep,
}

/// Acknowledges a sleep grant token within the bounded delay the platform's
/// power manager requires (§6: "within a bounded delay (≤ 1 second)").
pub trait PowerManagementMonitor: std::fmt::Debug + Send {
    fn acknowledge_sleep(&mut self, completion_token: u64);
}

/// Peer datagram channel (§6, out of scope to implement here): inbound
/// messages from a companion process, all enqueued to the dispatcher.
#[derive(Debug, Clone)]
pub enum PeerMessage {
    ObservedDeviceUpdated { device_id: DeviceId, properties: DeviceProperties },
    ObservedCapsLockStateChanged { device_id: DeviceId, on: bool },
    ObservedKeyEvent { device_id: DeviceId, usage_pair: crate::event::UsagePair, event_type: crate::event::EventType },
    SystemPreferencesChanged,
    FrontmostApplicationChanged { bundle_identifier: String, file_path: String },
    InputSourceChanged { language: Option<String>, input_source_id: Option<String> },
    SetVariable { name: String, value: i64 },
}

/// Sends datagrams to the peer process; the dispatcher only ever produces
/// outbound traffic here, never blocks on it (§5 suspension points).
pub trait PeerDatagramChannel: std::fmt::Debug + Send {
    fn send(&mut self, message: PeerMessage);
}

/// Short, structured, human-readable per-device notification strings (§4.9,
/// §7 "User-visible failure behavior"). An empty message clears any
/// previously set notification for that device.
pub trait NotificationMessageSink: std::fmt::Debug + Send {
    fn set_message(&mut self, device_id: DeviceId, message: &str);
}

/// Requests process termination on unrecoverable failure (§7 *Not-permitted*
/// handling: "invoke killer; process exit").
pub trait ProcessKiller: std::fmt::Debug + Send {
    fn terminate(&mut self, exit_code: i32);
}
