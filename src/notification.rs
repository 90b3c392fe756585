//! Human-readable notification formatting (§4.9) built atop the
//! [`NotificationMessageSink`] boundary: the core decides *what* to say,
//! the injected sink decides *how* it reaches the user (menu bar item,
//! system notification, log line, ...).

use crate::device::{DeviceId, DeviceProperties};
use crate::error::CoreError;
use crate::external::NotificationMessageSink;

/// Renders a device's display name the way notifications reference it:
/// product name if known, otherwise a generic placeholder carrying the id.
fn device_label(properties: Option<&DeviceProperties>, device_id: DeviceId) -> String {
    properties
        .and_then(|p| p.product.clone())
        .unwrap_or_else(|| format!("device {}", device_id.0))
}

/// Sets or clears a device's notification message depending on whether the
/// error is user-visible (§7). Call with `error: None` to clear a
/// previously set message once the condition resolves.
pub fn notify_device_error(
    sink: &mut dyn NotificationMessageSink,
    device_id: DeviceId,
    properties: Option<&DeviceProperties>,
    error: Option<&CoreError>,
) {
    match error {
        Some(error) if error.is_user_visible() => {
            let label = device_label(properties, device_id);
            sink.set_message(device_id, &format!("{label}: {error}"));
        }
        _ => sink.set_message(device_id, ""),
    }
}

/// Notifies that a device was disabled because the built-in keyboard
/// should be preferred while it is disconnected (§4.7.1 built-in-disable
/// policy).
pub fn notify_built_in_keyboard_disabled(
    sink: &mut dyn NotificationMessageSink,
    device_id: DeviceId,
    properties: Option<&DeviceProperties>,
) {
    let label = device_label(properties, device_id);
    sink.set_message(device_id, &format!("{label}: disabled while an external keyboard is connected"));
}
