//! Device identity and properties (§3 "Device identity").

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

/// Process-unique integer minted when a physical HID device is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub const ZERO: DeviceId = DeviceId(0);
}

/// Mints process-unique [`DeviceId`]s, one per physical device arrival.
#[derive(Debug, Default)]
pub struct DeviceIdAllocator {
    next: AtomicU32,
}

impl DeviceIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> DeviceId {
        DeviceId(self.next.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Matches device-scoped configuration: vendor/product id, device class flags,
/// and an opaque device-address string (e.g. a USB location path) used to
/// disambiguate otherwise-identical vendor/product pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifiers {
    pub vendor_id: u32,
    pub product_id: u32,
    pub is_keyboard: bool,
    pub is_pointing_device: bool,
    pub is_game_pad: bool,
    pub device_address: String,
}

/// Full property set for a seized-or-observed device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProperties {
    pub device_id: DeviceId,
    pub vendor_id: Option<u32>,
    pub product_id: Option<u32>,
    pub location_id: Option<u32>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub transport: Option<String>,
    pub is_keyboard: Option<bool>,
    pub is_pointing_device: Option<bool>,
    pub is_game_pad: Option<bool>,
    pub is_built_in_keyboard: Option<bool>,
    pub is_built_in_pointing_device: Option<bool>,
    pub is_built_in_touch_bar: Option<bool>,
    pub is_virtual_hid_device: Option<bool>,
}

impl DeviceProperties {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            vendor_id: None,
            product_id: None,
            location_id: None,
            manufacturer: None,
            product: None,
            serial_number: None,
            transport: None,
            is_keyboard: None,
            is_pointing_device: None,
            is_game_pad: None,
            is_built_in_keyboard: None,
            is_built_in_pointing_device: None,
            is_built_in_touch_bar: None,
            is_virtual_hid_device: None,
        }
    }

    pub fn device_identifiers(&self) -> DeviceIdentifiers {
        DeviceIdentifiers {
            vendor_id: self.vendor_id.unwrap_or(0),
            product_id: self.product_id.unwrap_or(0),
            is_keyboard: self.is_keyboard.unwrap_or(false),
            is_pointing_device: self.is_pointing_device.unwrap_or(false),
            is_game_pad: self.is_game_pad.unwrap_or(false),
            device_address: self
                .location_id
                .map(|l| format!("{l:x}"))
                .unwrap_or_default(),
        }
    }

    /// Derives the `is_built_in_*` flags from manufacturer/product strings,
    /// mirroring the original implementation's heuristic: a product name
    /// prefixed with "Apple Internal " is a built-in keyboard or pointing
    /// device depending on which class flag is set, and the touch bar is
    /// recognized by exact product name.
    pub fn derive_built_in_flags(&mut self) {
        let is_keyboard = self.is_keyboard.unwrap_or(false);
        let is_pointing = self.is_pointing_device.unwrap_or(false);

        if let Some(product) = &self.product {
            if is_keyboard && is_pointing {
                if product == "Apple Internal Touch Bar" || product == "TouchBarUserDevice" {
                    self.is_built_in_touch_bar = Some(true);
                    return;
                }
            }
            if product.starts_with("Apple Internal ") {
                if is_keyboard && !is_pointing {
                    self.is_built_in_keyboard = Some(true);
                }
                if !is_keyboard && is_pointing {
                    self.is_built_in_pointing_device = Some(true);
                }
            }
        }
    }

    /// Total ordering used to produce the sorted `devices.json` persistence
    /// file: by product name, then manufacturer, then keyboard-ness, then
    /// pointing-ness, then device id (all as in the original `compare`).
    pub fn compare_key(&self) -> (String, String, bool, bool, DeviceId) {
        (
            self.product.clone().unwrap_or_default(),
            self.manufacturer.clone().unwrap_or_default(),
            !self.is_keyboard.unwrap_or(false),
            !self.is_pointing_device.unwrap_or(false),
            self.device_id,
        )
    }
}

impl PartialEq for DeviceProperties {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.vendor_id == other.vendor_id
            && self.product_id == other.product_id
            && self.location_id == other.location_id
            && self.manufacturer == other.manufacturer
            && self.product == other.product
            && self.serial_number == other.serial_number
            && self.transport == other.transport
            && self.is_keyboard == other.is_keyboard
            && self.is_pointing_device == other.is_pointing_device
    }
}
impl Eq for DeviceProperties {}

impl PartialOrd for DeviceProperties {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DeviceProperties {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_key().cmp(&other.compare_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_mints_increasing_unique_ids() {
        let a = DeviceIdAllocator::new();
        let first = a.allocate();
        let second = a.allocate();
        assert_ne!(first, second);
        assert!(second.0 > first.0);
    }

    #[test]
    fn built_in_keyboard_detected_from_product_name() {
        let mut p = DeviceProperties::new(DeviceId(1));
        p.is_keyboard = Some(true);
        p.is_pointing_device = Some(false);
        p.product = Some("Apple Internal Keyboard".to_string());
        p.derive_built_in_flags();
        assert_eq!(p.is_built_in_keyboard, Some(true));
        assert_eq!(p.is_built_in_pointing_device, None);
    }

    #[test]
    fn touch_bar_detected_by_exact_product_name() {
        let mut p = DeviceProperties::new(DeviceId(1));
        p.is_keyboard = Some(true);
        p.is_pointing_device = Some(true);
        p.product = Some("Apple Internal Touch Bar".to_string());
        p.derive_built_in_flags();
        assert_eq!(p.is_built_in_touch_bar, Some(true));
    }

    #[test]
    fn sorts_by_product_then_manufacturer_then_class_then_id() {
        let mut a = DeviceProperties::new(DeviceId(2));
        a.product = Some("Keyboard".to_string());
        let mut b = DeviceProperties::new(DeviceId(1));
        b.product = Some("Mouse".to_string());
        assert!(a < b);
    }
}
