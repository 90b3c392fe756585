//! Error kinds surfaced across the daemon (§7). Most failures here are
//! reported and handled in place rather than bubbled as `Result` all the
//! way up: the dispatcher loop keeps running even when a single device or
//! manipulate pass fails, so `CoreError` is primarily for error messages
//! sent to the notification sink and for the `ProcessKiller` path on
//! unrecoverable failure.

use thiserror::Error;

use crate::device::DeviceId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device {0:?} is not permitted (requires Input Monitoring / Accessibility access)")]
    NotPermitted(DeviceId),

    #[error("transient HID error on device {device_id:?}: {message}")]
    HidTransient { device_id: DeviceId, message: String },

    #[error("virtual HID device is not ready yet")]
    VirtualHidNotReady,

    #[error("lost connection to the virtual HID service")]
    VirtualHidLinkLoss,

    #[error("switch on device {0:?} appears to be physically stuck")]
    ProbableStuckSwitch(DeviceId),

    #[error("configuration is malformed: {0}")]
    ConfigurationMalformed(String),

    #[error("system sleep is in progress, deferring")]
    SystemSleepInProgress,

    #[error("device identity {0:?} is already registered")]
    DuplicateDeviceIdentity(DeviceId),
}

impl CoreError {
    /// Whether this error should be surfaced to the user via the
    /// notification sink (§4.9), as opposed to only being logged.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            CoreError::NotPermitted(_)
                | CoreError::VirtualHidNotReady
                | CoreError::VirtualHidLinkLoss
                | CoreError::ProbableStuckSwitch(_)
                | CoreError::ConfigurationMalformed(_)
        )
    }

    /// Whether this error should invoke the `ProcessKiller` (§7
    /// *Not-permitted* handling: "invoke killer; process exit").
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::NotPermitted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_permitted_is_fatal_and_user_visible() {
        let err = CoreError::NotPermitted(DeviceId(1));
        assert!(err.is_fatal());
        assert!(err.is_user_visible());
    }

    #[test]
    fn hid_transient_is_neither_fatal_nor_user_visible() {
        let err = CoreError::HidTransient { device_id: DeviceId(1), message: "timeout".to_string() };
        assert!(!err.is_fatal());
        assert!(!err.is_user_visible());
    }

    #[test]
    fn probable_stuck_switch_is_user_visible_but_not_fatal() {
        let err = CoreError::ProbableStuckSwitch(DeviceId(2));
        assert!(err.is_user_visible());
        assert!(!err.is_fatal());
    }
}
