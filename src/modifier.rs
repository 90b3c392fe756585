//! Modifier flag manager and pointing button manager (§3 "Queue").
//!
//! Both trackers are multisets of active holdings keyed by `(flag_or_button,
//! device_id)`. They exist only as a byproduct of entries pushed through a
//! [`crate::queue::Queue`] — there is no out-of-band setter, matching the
//! invariant in §4.1 that `push_back` is the only mutation point.

use std::collections::HashMap;

use crate::device::DeviceId;
use crate::event::{ModifierFlag, UsagePair};

/// The four ways an active modifier holding can change, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierFlagChange {
    Increase,
    Decrease,
    IncreaseSticky,
    DecreaseSticky,
    IncreaseLedLock,
    DecreaseLedLock,
}

#[derive(Debug, Default)]
pub struct ModifierFlagManager {
    regular: HashMap<(ModifierFlag, DeviceId), u32>,
    sticky: HashMap<(ModifierFlag, DeviceId), u32>,
    led_lock: HashMap<(ModifierFlag, DeviceId), u32>,
}

impl ModifierFlagManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back_active_modifier_flag(
        &mut self,
        change: ModifierFlagChange,
        flag: ModifierFlag,
        device_id: DeviceId,
    ) {
        let key = (flag, device_id);
        match change {
            ModifierFlagChange::Increase => *self.regular.entry(key).or_insert(0) += 1,
            ModifierFlagChange::Decrease => decrement(&mut self.regular, key),
            ModifierFlagChange::IncreaseSticky => *self.sticky.entry(key).or_insert(0) += 1,
            ModifierFlagChange::DecreaseSticky => decrement(&mut self.sticky, key),
            ModifierFlagChange::IncreaseLedLock => *self.led_lock.entry(key).or_insert(0) += 1,
            ModifierFlagChange::DecreaseLedLock => decrement(&mut self.led_lock, key),
        }
    }

    /// Whether `flag` is currently held, latched sticky, or LED-locked on any
    /// device.
    pub fn pressed(&self, flag: ModifierFlag) -> bool {
        any_positive(&self.regular, flag) || any_positive(&self.sticky, flag) || any_positive(&self.led_lock, flag)
    }

    pub fn pressed_on_device(&self, flag: ModifierFlag, device_id: DeviceId) -> bool {
        self.regular.get(&(flag, device_id)).copied().unwrap_or(0) > 0
            || self.sticky.get(&(flag, device_id)).copied().unwrap_or(0) > 0
            || self.led_lock.get(&(flag, device_id)).copied().unwrap_or(0) > 0
    }

    pub fn sticky_size(&self, flag: ModifierFlag) -> u32 {
        self.sticky
            .iter()
            .filter(|((f, _), _)| *f == flag)
            .map(|(_, v)| *v)
            .sum()
    }

    /// A valid non-modifier key_down clears every sticky modifier flag on
    /// every device (§3 invariants).
    pub fn erase_all_sticky_modifier_flags(&mut self) {
        self.sticky.clear();
    }

    /// Called when a device is ungrabbed: drops physically-held modifiers for
    /// that device but preserves sticky/LED-lock state.
    pub fn erase_all_active_modifier_flags_except_lock_and_sticky(&mut self, device_id: DeviceId) {
        self.regular.retain(|(_, d), _| *d != device_id);
    }

    pub fn erase_all_active_modifier_flags(&mut self, device_id: DeviceId) {
        self.regular.retain(|(_, d), _| *d != device_id);
        self.sticky.retain(|(_, d), _| *d != device_id);
        self.led_lock.retain(|(_, d), _| *d != device_id);
    }
}

fn decrement(map: &mut HashMap<(ModifierFlag, DeviceId), u32>, key: (ModifierFlag, DeviceId)) {
    if let Some(count) = map.get_mut(&key) {
        if *count <= 1 {
            map.remove(&key);
        } else {
            *count -= 1;
        }
    }
}

fn any_positive(map: &HashMap<(ModifierFlag, DeviceId), u32>, flag: ModifierFlag) -> bool {
    map.iter().any(|((f, _), count)| *f == flag && *count > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointingButtonChange {
    Increase,
    Decrease,
}

#[derive(Debug, Default)]
pub struct PointingButtonManager {
    regular: HashMap<(UsagePair, DeviceId), u32>,
}

impl PointingButtonManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back_active_pointing_button(
        &mut self,
        change: PointingButtonChange,
        button: UsagePair,
        device_id: DeviceId,
    ) {
        let key = (button, device_id);
        match change {
            PointingButtonChange::Increase => *self.regular.entry(key).or_insert(0) += 1,
            PointingButtonChange::Decrease => decrement_button(&mut self.regular, key),
        }
    }

    pub fn pressed(&self, button: UsagePair) -> bool {
        self.regular
            .iter()
            .any(|((b, _), count)| *b == button && *count > 0)
    }

    pub fn erase_all_active_pointing_buttons_except_lock(&mut self, device_id: DeviceId) {
        self.regular.retain(|(_, d), _| *d != device_id);
    }

    pub fn erase_all_active_pointing_buttons(&mut self, device_id: DeviceId) {
        self.regular.retain(|(_, d), _| *d != device_id);
    }
}

fn decrement_button(map: &mut HashMap<(UsagePair, DeviceId), u32>, key: (UsagePair, DeviceId)) {
    if let Some(count) = map.get_mut(&key) {
        if *count <= 1 {
            map.remove(&key);
        } else {
            *count -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increase_then_decrease_clears_pressed() {
        let mut m = ModifierFlagManager::new();
        let d = DeviceId(1);
        m.push_back_active_modifier_flag(ModifierFlagChange::Increase, ModifierFlag::LeftControl, d);
        assert!(m.pressed(ModifierFlag::LeftControl));
        m.push_back_active_modifier_flag(ModifierFlagChange::Decrease, ModifierFlag::LeftControl, d);
        assert!(!m.pressed(ModifierFlag::LeftControl));
    }

    #[test]
    fn sticky_outlives_device_ungrab_clear() {
        let mut m = ModifierFlagManager::new();
        let d = DeviceId(1);
        m.push_back_active_modifier_flag(ModifierFlagChange::IncreaseSticky, ModifierFlag::Fn, d);
        m.erase_all_active_modifier_flags_except_lock_and_sticky(d);
        assert!(m.pressed(ModifierFlag::Fn));
    }

    #[test]
    fn erase_all_sticky_clears_every_device() {
        let mut m = ModifierFlagManager::new();
        m.push_back_active_modifier_flag(ModifierFlagChange::IncreaseSticky, ModifierFlag::Fn, DeviceId(1));
        m.push_back_active_modifier_flag(ModifierFlagChange::IncreaseSticky, ModifierFlag::Fn, DeviceId(2));
        m.erase_all_sticky_modifier_flags();
        assert!(!m.pressed(ModifierFlag::Fn));
    }

    #[test]
    fn pointing_button_tracks_press_state() {
        let mut m = PointingButtonManager::new();
        let button = UsagePair::new(9, 1);
        let d = DeviceId(1);
        m.push_back_active_pointing_button(PointingButtonChange::Increase, button, d);
        assert!(m.pressed(button));
        m.push_back_active_pointing_button(PointingButtonChange::Decrease, button, d);
        assert!(!m.pressed(button));
    }
}
