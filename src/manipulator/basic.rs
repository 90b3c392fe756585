//! The basic manipulator (C5, §4.5.2): from/to remapping with a
//! key-down/key-up state machine supporting `to_if_alone`,
//! `to_if_held_down`, and `to_delayed_action`.

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::entry::Entry;
use crate::event::{Event, EventState, EventType, ModifierFlag, MomentarySwitchEvent, Validity};
use crate::queue::Queue;
use crate::time::{AbsoluteDuration, AbsoluteTime, EventTimeStamp};

use super::conditions::Conditions;
use super::Manipulator;

/// One emitted event in a `to`/`to_if_alone`/`to_if_held_down`/... chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToEvent {
    pub event: Event,
    pub modifiers: Vec<ModifierFlag>,
    pub lazy: bool,
    pub repeat: bool,
    pub halt: bool,
}

impl ToEvent {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            modifiers: Vec::new(),
            lazy: false,
            repeat: true,
            halt: false,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Vec<ModifierFlag>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_halt(mut self, halt: bool) -> Self {
        self.halt = halt;
        self
    }

    fn needs_virtual_hid_pointing(&self) -> bool {
        matches!(
            self.event,
            Event::MomentarySwitch(MomentarySwitchEvent { is_pointing_button: true, .. })
                | Event::PointingMotion(_)
                | Event::MouseKey(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Engaged,
}

#[derive(Debug)]
pub struct BasicManipulator {
    from_event: MomentarySwitchEvent,
    mandatory_modifiers: Vec<ModifierFlag>,
    optional_modifiers: Vec<ModifierFlag>,

    to: Vec<ToEvent>,
    to_if_alone: Vec<ToEvent>,
    to_if_held_down: Vec<ToEvent>,
    to_delayed_action_invoked: Vec<ToEvent>,
    to_delayed_action_canceled: Vec<ToEvent>,
    to_after_key_up: Vec<ToEvent>,

    conditions: Conditions,

    to_if_alone_timeout: AbsoluteDuration,
    to_if_held_down_threshold: AbsoluteDuration,
    to_delayed_action_delay: AbsoluteDuration,

    state: State,
    engaged_device_id: Option<DeviceId>,
    key_down_time_stamp: Option<AbsoluteTime>,
    key_up_time_stamp: Option<AbsoluteTime>,
    other_event_observed: bool,
    held_down_fired: bool,
    delayed_action_deadline: Option<AbsoluteTime>,

    valid: bool,
}

impl BasicManipulator {
    pub fn new(from_event: MomentarySwitchEvent) -> Self {
        Self {
            from_event,
            mandatory_modifiers: Vec::new(),
            optional_modifiers: Vec::new(),
            to: Vec::new(),
            to_if_alone: Vec::new(),
            to_if_held_down: Vec::new(),
            to_delayed_action_invoked: Vec::new(),
            to_delayed_action_canceled: Vec::new(),
            to_after_key_up: Vec::new(),
            conditions: Conditions::new(),
            to_if_alone_timeout: AbsoluteDuration::from_millis(1000),
            to_if_held_down_threshold: AbsoluteDuration::from_millis(500),
            to_delayed_action_delay: AbsoluteDuration::from_millis(500),
            state: State::Idle,
            engaged_device_id: None,
            key_down_time_stamp: None,
            key_up_time_stamp: None,
            other_event_observed: false,
            held_down_fired: false,
            delayed_action_deadline: None,
            valid: true,
        }
    }

    pub fn with_mandatory_modifiers(mut self, modifiers: Vec<ModifierFlag>) -> Self {
        self.mandatory_modifiers = modifiers;
        self
    }

    pub fn with_optional_modifiers(mut self, modifiers: Vec<ModifierFlag>) -> Self {
        self.optional_modifiers = modifiers;
        self
    }

    pub fn with_to(mut self, to: Vec<ToEvent>) -> Self {
        self.to = to;
        self
    }

    pub fn with_to_if_alone(mut self, to: Vec<ToEvent>) -> Self {
        self.to_if_alone = to;
        self
    }

    pub fn with_to_if_held_down(mut self, to: Vec<ToEvent>) -> Self {
        self.to_if_held_down = to;
        self
    }

    pub fn with_to_delayed_action(mut self, invoked: Vec<ToEvent>, canceled: Vec<ToEvent>) -> Self {
        self.to_delayed_action_invoked = invoked;
        self.to_delayed_action_canceled = canceled;
        self
    }

    pub fn with_to_after_key_up(mut self, to: Vec<ToEvent>) -> Self {
        self.to_after_key_up = to;
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_to_if_alone_timeout(mut self, timeout: AbsoluteDuration) -> Self {
        self.to_if_alone_timeout = timeout;
        self
    }

    pub fn with_to_if_held_down_threshold(mut self, threshold: AbsoluteDuration) -> Self {
        self.to_if_held_down_threshold = threshold;
        self
    }

    pub fn with_to_delayed_action_delay(mut self, delay: AbsoluteDuration) -> Self {
        self.to_delayed_action_delay = delay;
        self
    }

    fn matches_from(&self, switch: &MomentarySwitchEvent, queue: &Queue, device_id: DeviceId) -> bool {
        if switch.usage_pair != self.from_event.usage_pair {
            return false;
        }

        let flags = queue.modifier_flag_manager();
        for m in &self.mandatory_modifiers {
            if !flags.pressed(*m) {
                return false;
            }
        }

        for pressed in ModifierFlag::all() {
            if flags.pressed(pressed)
                && !self.mandatory_modifiers.contains(&pressed)
                && !self.optional_modifiers.contains(&pressed)
            {
                return false;
            }
        }

        let _ = device_id;
        true
    }

    /// Presses `chain` for the primary `to` target: every entry goes down
    /// and stays down until `release_chain` runs it back up at the
    /// originating switch's key-up. Used only for `self.to`.
    fn emit_chain(chain: &[ToEvent], device_id: DeviceId, time_stamp: AbsoluteTime, output_queue: &mut Queue) {
        let mut t = time_stamp;
        for to in chain {
            for m in &to.modifiers {
                Self::emit_one(
                    Event::MomentarySwitch(MomentarySwitchEvent::modifier(m.usage_pair(), *m)),
                    EventType::KeyDown,
                    device_id,
                    t,
                    output_queue,
                );
            }

            Self::emit_one(to.event.clone(), EventType::KeyDown, device_id, t, output_queue);

            if to.halt {
                break;
            }

            t += AbsoluteDuration::from_millis(1);
        }
    }

    /// Releases what `emit_chain` pressed, in reverse: the `to` target's own
    /// key-up, then its wrapping modifiers.
    fn release_chain(chain: &[ToEvent], device_id: DeviceId, time_stamp: AbsoluteTime, output_queue: &mut Queue) {
        for to in chain {
            Self::emit_one(to.event.clone(), EventType::KeyUp, device_id, time_stamp, output_queue);

            for m in to.modifiers.iter().rev() {
                Self::emit_one(
                    Event::MomentarySwitch(MomentarySwitchEvent::modifier(m.usage_pair(), *m)),
                    EventType::KeyUp,
                    device_id,
                    time_stamp,
                    output_queue,
                );
            }

            if to.halt {
                break;
            }
        }
    }

    /// Fires `chain` as a complete, self-contained press: used by
    /// `to_if_alone`/`to_if_held_down`/`to_delayed_action_*`, none of which
    /// have a later event of their own to hang a release on.
    fn emit_oneshot_chain(chain: &[ToEvent], device_id: DeviceId, time_stamp: AbsoluteTime, output_queue: &mut Queue) {
        let mut t = time_stamp;
        for to in chain {
            for m in &to.modifiers {
                Self::emit_one(
                    Event::MomentarySwitch(MomentarySwitchEvent::modifier(m.usage_pair(), *m)),
                    EventType::KeyDown,
                    device_id,
                    t,
                    output_queue,
                );
            }

            Self::emit_one(to.event.clone(), EventType::KeyDown, device_id, t, output_queue);
            if to.repeat {
                Self::emit_one(to.event.clone(), EventType::KeyUp, device_id, t, output_queue);
            }

            for m in to.modifiers.iter().rev() {
                Self::emit_one(
                    Event::MomentarySwitch(MomentarySwitchEvent::modifier(m.usage_pair(), *m)),
                    EventType::KeyUp,
                    device_id,
                    t,
                    output_queue,
                );
            }

            if to.halt {
                break;
            }

            t += AbsoluteDuration::from_millis(1);
        }
    }

    fn emit_one(
        event: Event,
        event_type: EventType,
        device_id: DeviceId,
        time_stamp: AbsoluteTime,
        output_queue: &mut Queue,
    ) {
        output_queue.push_back(Entry::new(
            device_id,
            EventTimeStamp::new(time_stamp),
            event.clone(),
            event_type,
            event,
            EventState::VirtualEvent,
        ));
    }
}

impl Manipulator for BasicManipulator {
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

        let switch = match entry.event() {
            Event::MomentarySwitch(s) => *s,
            _ => return false,
        };

        let device_id = entry.device_id();
        let time_stamp = entry.event_time_stamp().time_stamp();

        if !self.matches_from(&switch, context_queue, device_id) {
            if self.state == State::Engaged {
                self.other_event_observed = true;
            }
            return false;
        }

        if !self.conditions.matches(device_id, context_queue.manipulator_environment()) {
            return false;
        }

        match (self.state, entry.event_type()) {
            (State::Idle, EventType::KeyDown) => {
                self.state = State::Engaged;
                self.engaged_device_id = Some(device_id);
                self.key_down_time_stamp = Some(time_stamp);
                self.other_event_observed = false;
                self.held_down_fired = false;
                Self::emit_chain(&self.to, device_id, time_stamp, output_queue);
                entry.set_validity(Validity::Invalid);
                true
            }
            (State::Engaged, EventType::KeyUp) if self.engaged_device_id == Some(device_id) => {
                self.key_up_time_stamp = Some(time_stamp);
                Self::release_chain(&self.to, device_id, time_stamp, output_queue);

                if !self.to_if_alone.is_empty() && !self.other_event_observed {
                    if let Some(down) = self.key_down_time_stamp {
                        if (time_stamp - down) <= self.to_if_alone_timeout {
                            Self::emit_oneshot_chain(&self.to_if_alone, device_id, time_stamp, output_queue);
                        }
                    }
                }

                if !self.to_delayed_action_invoked.is_empty() {
                    self.delayed_action_deadline = Some(time_stamp + self.to_delayed_action_delay);
                } else {
                    self.state = State::Idle;
                    self.engaged_device_id = None;
                }

                entry.set_validity(Validity::Invalid);
                true
            }
            _ => false,
        }
    }

    fn poll(&mut self, now: AbsoluteTime, output_queue: &mut Queue) -> bool {
        let mut emitted = false;

        if self.state == State::Engaged && !self.held_down_fired && !self.to_if_held_down.is_empty() {
            if let (Some(device_id), Some(down)) = (self.engaged_device_id, self.key_down_time_stamp) {
                if self.key_up_time_stamp.is_none() && (now - down) >= self.to_if_held_down_threshold {
                    Self::emit_oneshot_chain(&self.to_if_held_down, device_id, now, output_queue);
                    self.held_down_fired = true;
                    emitted = true;
                }
            }
        }

        if let Some(deadline) = self.delayed_action_deadline {
            if now >= deadline {
                if let Some(device_id) = self.engaged_device_id {
                    Self::emit_oneshot_chain(&self.to_delayed_action_invoked, device_id, now, output_queue);
                }
                self.delayed_action_deadline = None;
                self.state = State::Idle;
                self.engaged_device_id = None;
                self.key_down_time_stamp = None;
                self.key_up_time_stamp = None;
                emitted = true;
            }
        }

        emitted
    }

    fn next_wakeup(&self) -> Option<AbsoluteTime> {
        let held_down_wakeup = if self.state == State::Engaged && !self.held_down_fired && self.key_up_time_stamp.is_none() {
            self.key_down_time_stamp.map(|t| t + self.to_if_held_down_threshold)
        } else {
            None
        };

        [held_down_wakeup, self.delayed_action_deadline]
            .into_iter()
            .flatten()
            .min()
    }

    fn active(&self) -> bool {
        self.state == State::Engaged
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }

    fn needs_virtual_hid_pointing(&self) -> bool {
        [&self.to, &self.to_if_alone, &self.to_if_held_down, &self.to_delayed_action_invoked]
            .iter()
            .any(|chain| chain.iter().any(|e| e.needs_virtual_hid_pointing()))
    }
}
