//! The ordered pipeline queue (C1, §4.1).
//!
//! `push_back` is the only mutation point: there is no out-of-band "set
//! modifier" API. Every entry that passes through a queue updates the
//! embedded modifier flag manager, pointing button manager, and manipulator
//! environment cache as a side effect of being pushed.

use crate::device::DeviceId;
use crate::entry::Entry;
use crate::environment::ManipulatorEnvironment;
use crate::event::{Event, EventState, EventType, StickyModifierType, Validity};
use crate::modifier::{ModifierFlagChange, ModifierFlagManager, PointingButtonManager, PointingButtonChange};
use crate::time::{AbsoluteDuration, EventTimeStamp};

#[derive(Debug)]
pub struct Queue {
    name: String,
    entries: Vec<Entry>,
    modifier_flag_manager: ModifierFlagManager,
    pointing_button_manager: PointingButtonManager,
    manipulator_environment: ManipulatorEnvironment,
    time_stamp_delay: AbsoluteDuration,
}

impl Queue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            modifier_flag_manager: ModifierFlagManager::new(),
            pointing_button_manager: PointingButtonManager::new(),
            manipulator_environment: ManipulatorEnvironment::new(),
            time_stamp_delay: AbsoluteDuration::zero(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `entry`, applying the queue's accumulated time-stamp delay,
    /// running the insertion-time reordering sweep, and updating the
    /// modifier/button/environment trackers.
    pub fn push_back(&mut self, mut entry: Entry) {
        let delay = self.time_stamp_delay;
        let original = *entry.event_time_stamp();
        entry
            .event_time_stamp_mut()
            .set_time_stamp(original.time_stamp() + delay);

        self.update_trackers(&entry);

        self.entries.push(entry);
        self.bubble_tail_into_place();
    }

    fn bubble_tail_into_place(&mut self) {
        if self.entries.len() < 2 {
            return;
        }
        let mut i = self.entries.len() - 1;
        while i > 0 && Self::needs_swap(&self.entries[i - 1], &self.entries[i]) {
            self.entries.swap(i - 1, i);
            i -= 1;
        }
    }

    fn update_trackers(&mut self, entry: &Entry) {
        let device_id = entry.device_id();
        let event_type = entry.event_type();

        match entry.event() {
            Event::MomentarySwitch(switch) => {
                if let Some(flag) = switch.modifier_flag {
                    let change = if event_type == EventType::KeyDown {
                        ModifierFlagChange::Increase
                    } else {
                        ModifierFlagChange::Decrease
                    };
                    self.modifier_flag_manager
                        .push_back_active_modifier_flag(change, flag, device_id);
                }

                if switch.is_pointing_button {
                    let change = if event_type == EventType::KeyDown {
                        PointingButtonChange::Increase
                    } else {
                        PointingButtonChange::Decrease
                    };
                    self.pointing_button_manager
                        .push_back_active_pointing_button(change, switch.usage_pair, device_id);
                }

                if event_type == EventType::KeyDown
                    && entry.is_valid()
                    && switch.modifier_flag.is_none()
                {
                    self.modifier_flag_manager.erase_all_sticky_modifier_flags();
                }
            }
            Event::StickyModifier(flag, sticky_type) => {
                if event_type == EventType::KeyDown || event_type == EventType::Single {
                    let change = match sticky_type {
                        StickyModifierType::Toggle => {
                            if self.modifier_flag_manager.sticky_size(*flag) > 0 {
                                ModifierFlagChange::DecreaseSticky
                            } else {
                                ModifierFlagChange::IncreaseSticky
                            }
                        }
                        StickyModifierType::On => ModifierFlagChange::IncreaseSticky,
                        StickyModifierType::Off => ModifierFlagChange::DecreaseSticky,
                    };
                    self.modifier_flag_manager
                        .push_back_active_modifier_flag(change, *flag, device_id);
                }
            }
            Event::CapsLockStateChanged(on) => {
                let change = if *on {
                    ModifierFlagChange::IncreaseLedLock
                } else {
                    ModifierFlagChange::DecreaseLedLock
                };
                self.modifier_flag_manager.push_back_active_modifier_flag(
                    change,
                    crate::event::ModifierFlag::CapsLock,
                    device_id,
                );
            }
            Event::DeviceGrabbed(properties) => {
                self.manipulator_environment
                    .insert_device_properties(device_id, properties.clone());
            }
            Event::DeviceUngrabbed => {
                self.manipulator_environment.erase_device_properties(device_id);
            }
            Event::SetVariable(name, value) => {
                if event_type == EventType::KeyDown {
                    self.manipulator_environment.set_variable(name.clone(), *value);
                }
            }
            Event::FrontmostApplicationChanged { bundle_identifier, file_path } => {
                self.manipulator_environment.set_frontmost_application(
                    crate::environment::FrontmostApplication {
                        bundle_identifier: bundle_identifier.clone(),
                        file_path: file_path.clone(),
                    },
                );
            }
            Event::InputSourceChanged { language, input_source_id } => {
                self.manipulator_environment.set_input_source_properties(
                    crate::environment::InputSourceProperties {
                        language: language.clone(),
                        input_source_id: input_source_id.clone(),
                    },
                );
            }
            Event::SystemPreferencesChanged => {
                self.manipulator_environment.note_system_preferences_changed();
            }
            Event::VirtualHidKeyboardCountryCodeChanged(code) => {
                self.manipulator_environment
                    .set_virtual_hid_keyboard_country_code(*code);
            }
            _ => {}
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.time_stamp_delay = AbsoluteDuration::zero();
    }

    pub fn front(&self) -> Option<&Entry> {
        self.entries.first()
    }

    pub fn front_mut(&mut self) -> Option<&mut Entry> {
        self.entries.first_mut()
    }

    pub fn erase_front(&mut self) {
        if !self.entries.is_empty() {
            self.entries.remove(0);
        }
        if self.entries.is_empty() {
            self.time_stamp_delay = AbsoluteDuration::zero();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn modifier_flag_manager(&self) -> &ModifierFlagManager {
        &self.modifier_flag_manager
    }

    pub fn modifier_flag_manager_mut(&mut self) -> &mut ModifierFlagManager {
        &mut self.modifier_flag_manager
    }

    pub fn pointing_button_manager(&self) -> &PointingButtonManager {
        &self.pointing_button_manager
    }

    pub fn manipulator_environment(&self) -> &ManipulatorEnvironment {
        &self.manipulator_environment
    }

    pub fn manipulator_environment_mut(&mut self) -> &mut ManipulatorEnvironment {
        &mut self.manipulator_environment
    }

    pub fn erase_all_active_modifier_flags_except_lock_and_sticky(&mut self, device_id: DeviceId) {
        self.modifier_flag_manager
            .erase_all_active_modifier_flags_except_lock_and_sticky(device_id);
    }

    pub fn erase_all_active_modifier_flags(&mut self, device_id: DeviceId) {
        self.modifier_flag_manager
            .erase_all_active_modifier_flags(device_id);
    }

    pub fn erase_all_active_pointing_buttons_except_lock(&mut self, device_id: DeviceId) {
        self.pointing_button_manager
            .erase_all_active_pointing_buttons_except_lock(device_id);
    }

    pub fn erase_all_active_pointing_buttons(&mut self, device_id: DeviceId) {
        self.pointing_button_manager
            .erase_all_active_pointing_buttons(device_id);
    }

    pub fn time_stamp_delay(&self) -> AbsoluteDuration {
        self.time_stamp_delay
    }

    pub fn increase_time_stamp_delay(&mut self, value: AbsoluteDuration) {
        self.time_stamp_delay += value;
    }

    /// Whether adjacent same-time-stamp entries `v1, v2` should be swapped:
    /// compensates for HID reports that bundle a modifier and a non-modifier
    /// key in one frame in device-specific order (§4.1).
    pub fn needs_swap(v1: &Entry, v2: &Entry) -> bool {
        if v1.event_time_stamp().time_stamp() != v2.event_time_stamp().time_stamp() {
            return false;
        }

        let e1 = v1.event().as_momentary_switch();
        let e2 = v2.event().as_momentary_switch();

        if let (Some(e1), Some(e2)) = (e1, e2) {
            let m1 = e1.is_modifier();
            let m2 = e2.is_modifier();

            if !m1 && m2 {
                // v2 is the modifier: reorder to v2,v1 unless v2 is a release.
                return v2.event_type() != EventType::KeyUp;
            }

            if m1 && !m2 {
                // v1 is the modifier: reorder to v2,v1 only if v1 is a release.
                return v1.event_type() == EventType::KeyUp;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::event::{MomentarySwitchEvent, ModifierFlag, UsagePair};
    use crate::time::AbsoluteTime;

    fn modifier_entry(ts: u64, flag: ModifierFlag, event_type: EventType) -> Entry {
        let ev = Event::MomentarySwitch(MomentarySwitchEvent::modifier(UsagePair::new(7, 0xe0), flag));
        Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(ts)),
            ev.clone(),
            event_type,
            ev,
            EventState::Original,
        )
    }

    fn key_entry(ts: u64, usage: u32, event_type: EventType) -> Entry {
        let ev = Event::MomentarySwitch(MomentarySwitchEvent::key(UsagePair::new(7, usage)));
        Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(ts)),
            ev.clone(),
            event_type,
            ev,
            EventState::Original,
        )
    }

    #[test]
    fn same_time_modifier_keydown_is_ordered_before_key() {
        let mut q = Queue::new("test");
        // Device reports up-arrow keydown then control keydown at the same
        // time stamp; the queue must reorder control first (§4.1 example).
        q.push_back(key_entry(100, 0x4f, EventType::KeyDown));
        q.push_back(modifier_entry(100, ModifierFlag::LeftControl, EventType::KeyDown));

        assert!(q.entries()[0].event().as_momentary_switch().unwrap().is_modifier());
        assert!(!q.entries()[1].event().as_momentary_switch().unwrap().is_modifier());
    }

    #[test]
    fn same_time_modifier_keyup_is_ordered_after_key() {
        let mut q = Queue::new("test");
        q.push_back(modifier_entry(100, ModifierFlag::LeftControl, EventType::KeyUp));
        q.push_back(key_entry(100, 0x4f, EventType::KeyUp));

        assert!(!q.entries()[0].event().as_momentary_switch().unwrap().is_modifier());
        assert!(q.entries()[1].event().as_momentary_switch().unwrap().is_modifier());
    }

    #[test]
    fn reordering_is_idempotent_on_already_sorted_queue() {
        let mut q = Queue::new("test");
        q.push_back(modifier_entry(100, ModifierFlag::LeftControl, EventType::KeyDown));
        q.push_back(key_entry(100, 0x4f, EventType::KeyDown));
        let before: Vec<_> = q.entries().to_vec();
        assert!(!Queue::needs_swap(&before[0], &before[1]));
    }

    #[test]
    fn different_time_stamps_never_swap() {
        let mut q = Queue::new("test");
        q.push_back(key_entry(100, 0x4f, EventType::KeyDown));
        q.push_back(modifier_entry(200, ModifierFlag::LeftControl, EventType::KeyDown));
        assert_eq!(q.entries()[0].event_time_stamp().time_stamp(), AbsoluteTime(100));
        assert_eq!(q.entries()[1].event_time_stamp().time_stamp(), AbsoluteTime(200));
    }

    #[test]
    fn valid_non_modifier_key_down_clears_sticky() {
        let mut q = Queue::new("test");
        q.push_back(Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(0)),
            Event::StickyModifier(ModifierFlag::Fn, StickyModifierType::On),
            EventType::KeyDown,
            Event::StickyModifier(ModifierFlag::Fn, StickyModifierType::On),
            EventState::VirtualEvent,
        ));
        assert!(q.modifier_flag_manager().pressed(ModifierFlag::Fn));

        q.push_back(key_entry(10, 0x04, EventType::KeyDown));
        assert!(!q.modifier_flag_manager().pressed(ModifierFlag::Fn));
    }

    #[test]
    fn clearing_queue_resets_time_stamp_delay() {
        let mut q = Queue::new("test");
        q.increase_time_stamp_delay(AbsoluteDuration::from_millis(5));
        q.push_back(key_entry(0, 0x04, EventType::KeyDown));
        q.clear();
        assert_eq!(q.time_stamp_delay(), AbsoluteDuration::zero());
    }

    #[test]
    fn erase_front_pops_oldest_entry() {
        let mut q = Queue::new("test");
        q.push_back(key_entry(0, 0x04, EventType::KeyDown));
        q.push_back(key_entry(10, 0x05, EventType::KeyDown));
        q.erase_front();
        assert_eq!(q.len(), 1);
    }
}
