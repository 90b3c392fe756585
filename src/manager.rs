//! Manipulator manager (C6, §4.5.3): an ordered collection of manipulators
//! applied to one input queue, producing entries into an output queue.

use crate::device::DeviceId;
use crate::event::Event;
use crate::manipulator::Manipulator;
use crate::queue::Queue;
use crate::time::AbsoluteTime;

pub struct ManipulatorManager {
    name: String,
    manipulators: Vec<Box<dyn Manipulator + Send>>,
}

impl std::fmt::Debug for ManipulatorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManipulatorManager")
            .field("name", &self.name)
            .field("manipulator_count", &self.manipulators.len())
            .finish()
    }
}

impl ManipulatorManager {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manipulators: Vec::new(),
        }
    }

    pub fn push(&mut self, manipulator: Box<dyn Manipulator + Send>) {
        self.manipulators.push(manipulator);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Processes at most one entry: pops the front of `input_queue` if it is
    /// due (`time_stamp + input_delay_duration <= now`), runs every
    /// manipulator over it in order, and pushes it unchanged into
    /// `output_queue` if it's still valid after the chain. Also polls every
    /// manipulator for pending timers regardless of whether an entry was
    /// due. Returns true iff it processed an entry or a manipulator fired a
    /// timer (so the caller knows to loop again).
    pub fn manipulate(&mut self, input_queue: &mut Queue, output_queue: &mut Queue, now: AbsoluteTime) -> bool {
        let mut processed = false;

        for manipulator in &mut self.manipulators {
            if manipulator.poll(now, output_queue) {
                processed = true;
            }
        }

        let due = match input_queue.front() {
            Some(entry) => entry.event_time_stamp().with_input_delay() <= now,
            None => false,
        };

        if due {
            let mut entry = input_queue.front().cloned().expect("checked above");
            input_queue.erase_front();

            if matches!(
                entry.event(),
                Event::DeviceKeysAndPointingButtonsAreReleased | Event::DeviceUngrabbed
            ) {
                let device_id: DeviceId = entry.device_id();
                output_queue.erase_all_active_modifier_flags_except_lock_and_sticky(device_id);
                output_queue.erase_all_active_pointing_buttons_except_lock(device_id);
            } else {
                for manipulator in &mut self.manipulators {
                    if !entry.is_valid() {
                        break;
                    }
                    manipulator.manipulate(&mut entry, input_queue, output_queue, now);
                }
            }

            if entry.is_valid() {
                output_queue.push_back(entry);
            }

            processed = true;
        }

        self.manipulators
            .retain(|m| m.valid() || m.active());

        processed
    }

    pub fn invalidate_manipulators(&mut self) {
        for manipulator in &mut self.manipulators {
            manipulator.invalidate();
        }
    }

    /// Discards every manipulator, e.g. ahead of rebuilding a stage from a
    /// fresh configuration snapshot (§4.7.3).
    pub fn clear(&mut self) {
        self.manipulators.clear();
    }

    pub fn needs_virtual_hid_pointing(&self) -> bool {
        self.manipulators.iter().any(|m| m.needs_virtual_hid_pointing())
    }

    pub fn next_wakeup(&self) -> Option<AbsoluteTime> {
        self.manipulators.iter().filter_map(|m| m.next_wakeup()).min()
    }

    pub fn len(&self) -> usize {
        self.manipulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manipulators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::entry::Entry;
    use crate::event::{EventState, EventType, MomentarySwitchEvent, UsagePair};
    use crate::manipulator::basic::{BasicManipulator, ToEvent};
    use crate::time::EventTimeStamp;

    fn key_entry(usage: u32, event_type: EventType, ts: u64) -> Entry {
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
    fn passthrough_when_no_manipulator_consumes() {
        let mut manager = ManipulatorManager::new("test");
        let mut input = Queue::new("in");
        let mut output = Queue::new("out");
        input.push_back(key_entry(0x04, EventType::KeyDown, 0));

        assert!(manager.manipulate(&mut input, &mut output, AbsoluteTime(0)));
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn basic_manipulator_remaps_key() {
        let mut manager = ManipulatorManager::new("simple");
        let from = MomentarySwitchEvent::key(UsagePair::new(7, 0x3a));
        let to_event = ToEvent::new(Event::MomentarySwitch(MomentarySwitchEvent::key(UsagePair::new(0x0c, 0x29))));
        manager.push(Box::new(BasicManipulator::new(from).with_to(vec![to_event])));

        let mut input = Queue::new("in");
        let mut output = Queue::new("out");
        input.push_back(key_entry(0x3a, EventType::KeyDown, 0));

        manager.manipulate(&mut input, &mut output, AbsoluteTime(0));
        assert_eq!(output.len(), 1);
        match output.front().unwrap().event() {
            Event::MomentarySwitch(s) => assert_eq!(s.usage_pair, UsagePair::new(0x0c, 0x29)),
            _ => panic!("expected remapped key"),
        }
    }

    #[test]
    fn device_keys_released_clears_modifiers_without_running_manipulators() {
        let mut manager = ManipulatorManager::new("test");
        let mut input = Queue::new("in");
        let mut output = Queue::new("out");

        output.push_back(Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(0)),
            Event::MomentarySwitch(MomentarySwitchEvent::modifier(
                UsagePair::new(7, 0xe0),
                crate::event::ModifierFlag::LeftControl,
            )),
            EventType::KeyDown,
            Event::MomentarySwitch(MomentarySwitchEvent::modifier(
                UsagePair::new(7, 0xe0),
                crate::event::ModifierFlag::LeftControl,
            )),
            EventState::Original,
        ));
        assert!(output.modifier_flag_manager().pressed(crate::event::ModifierFlag::LeftControl));

        input.push_back(Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(10)),
            Event::DeviceKeysAndPointingButtonsAreReleased,
            EventType::Single,
            Event::DeviceKeysAndPointingButtonsAreReleased,
            EventState::VirtualEvent,
        ));

        manager.manipulate(&mut input, &mut output, AbsoluteTime(10));
        assert!(!output.modifier_flag_manager().pressed(crate::event::ModifierFlag::LeftControl));
    }
}
