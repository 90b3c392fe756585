//! Pointing-motion scaling manipulator (§4.5, pointing-device variant of the
//! basic manipulator): applies a speed multiplier and optional axis
//! inversion to `pointing_motion` entries, leaving momentary switches alone.

use crate::entry::Entry;
use crate::event::Event;
use crate::queue::Queue;
use crate::time::AbsoluteTime;

use super::conditions::Conditions;
use super::Manipulator;

#[derive(Debug)]
pub struct PointingMotionManipulator {
    speed_multiplier: f64,
    invert_x: bool,
    invert_y: bool,
    conditions: Conditions,
    valid: bool,
}

impl PointingMotionManipulator {
    pub fn new(speed_multiplier: f64) -> Self {
        Self {
            speed_multiplier,
            invert_x: false,
            invert_y: false,
            conditions: Conditions::new(),
            valid: true,
        }
    }

    pub fn with_invert_x(mut self, invert: bool) -> Self {
        self.invert_x = invert;
        self
    }

    pub fn with_invert_y(mut self, invert: bool) -> Self {
        self.invert_y = invert;
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    fn scale(&self, value: i32, invert: bool) -> i32 {
        let scaled = (value as f64) * self.speed_multiplier;
        let scaled = if invert { -scaled } else { scaled };
        scaled.round() as i32
    }
}

impl Manipulator for PointingMotionManipulator {
    fn manipulate(
        &mut self,
        entry: &mut Entry,
        context_queue: &Queue,
        output_queue: &mut Queue,
        _now: AbsoluteTime,
    ) -> bool {
        if !self.valid {
            return false;
        }

        let motion = match entry.event() {
            Event::PointingMotion(m) => *m,
            _ => return false,
        };

        if !self
            .conditions
            .matches(entry.device_id(), context_queue.manipulator_environment())
        {
            return false;
        }

        let mut scaled = motion;
        scaled.x = self.scale(motion.x, self.invert_x);
        scaled.y = self.scale(motion.y, self.invert_y);

        let event = Event::PointingMotion(scaled);
        let device_id = entry.device_id();
        let time_stamp = entry.event_time_stamp().time_stamp();
        output_queue.push_back(Entry::new(
            device_id,
            crate::time::EventTimeStamp::new(time_stamp),
            event.clone(),
            entry.event_type(),
            event,
            crate::event::EventState::VirtualEvent,
        ));

        entry.set_validity(crate::event::Validity::Invalid);
        true
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn needs_virtual_hid_pointing(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::entry::Entry;
    use crate::event::{EventState, EventType, PointingMotion};
    use crate::time::EventTimeStamp;

    fn motion_entry(x: i32, y: i32) -> Entry {
        let event = Event::PointingMotion(PointingMotion { x, y, ..Default::default() });
        Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(0)),
            event.clone(),
            EventType::Single,
            event,
            EventState::Original,
        )
    }

    #[test]
    fn scales_motion_by_multiplier() {
        let mut manipulator = PointingMotionManipulator::new(2.0);
        let context = Queue::new("in");
        let mut output = Queue::new("out");
        let mut entry = motion_entry(3, 4);
        assert!(manipulator.manipulate(&mut entry, &context, &mut output, AbsoluteTime(0)));
        match output.front().unwrap().event() {
            Event::PointingMotion(m) => {
                assert_eq!(m.x, 6);
                assert_eq!(m.y, 8);
            }
            _ => panic!("expected pointing motion"),
        }
    }

    #[test]
    fn inverts_requested_axes() {
        let mut manipulator = PointingMotionManipulator::new(1.0).with_invert_y(true);
        let context = Queue::new("in");
        let mut output = Queue::new("out");
        let mut entry = motion_entry(1, 1);
        manipulator.manipulate(&mut entry, &context, &mut output, AbsoluteTime(0));
        match output.front().unwrap().event() {
            Event::PointingMotion(m) => {
                assert_eq!(m.x, 1);
                assert_eq!(m.y, -1);
            }
            _ => panic!("expected pointing motion"),
        }
    }

    #[test]
    fn ignores_non_motion_entries() {
        let mut manipulator = PointingMotionManipulator::new(2.0);
        let context = Queue::new("in");
        let mut output = Queue::new("out");
        let mut entry = Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(0)),
            Event::DeviceUngrabbed,
            EventType::Single,
            Event::DeviceUngrabbed,
            EventState::Original,
        );
        assert!(!manipulator.manipulate(&mut entry, &context, &mut output, AbsoluteTime(0)));
        assert!(output.is_empty());
    }
}
