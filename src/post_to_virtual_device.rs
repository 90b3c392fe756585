//! Post-event-to-virtual-devices (§4.6, stage 4 of the connector): drains the
//! final stage's output queue into the virtual HID service client.

use crate::event::Event;
use crate::queue::Queue;
use crate::virtual_hid::VirtualHidServiceClient;

/// Drains every entry currently in `posted` (the output queue of the fixed
/// post-event-to-virtual-devices manipulator manager stage) into `client`,
/// translating each canonical event into the matching virtual HID report
/// call. Sticky-modifier and set-variable events have already done their
/// work as side effects of being pushed through earlier queues (§3 "Queue")
/// and carry no report of their own. Shell-command, select-input-source, and
/// stop-keyboard-repeat virtual events are consumed and discarded: executing
/// an arbitrary shell command or switching the OS input source is outside
/// this crate's external-collaborator boundary (no such trait is defined),
/// matching the Non-goal of not specifying the full surface of every
/// manipulator rule type.
pub fn flush_posted_queue(posted: &mut Queue, client: &mut dyn VirtualHidServiceClient) {
    while let Some(entry) = posted.front() {
        let event = entry.event().clone();
        let event_type = entry.event_type();
        posted.erase_front();

        match event {
            Event::MomentarySwitch(switch) if switch.is_pointing_button => {
                client.post_pointing_button(switch.usage_pair, event_type);
            }
            Event::MomentarySwitch(switch) => {
                client.post_key(switch.usage_pair, event_type);
            }
            Event::PointingMotion(motion) => {
                if !motion.is_zero() {
                    client.post_pointing_motion(motion);
                }
            }
            Event::MouseKey(mouse_key) => {
                client.post_mouse_key(mouse_key);
            }
            Event::CapsLockStateChanged(on) => {
                client.set_caps_lock_led_state(on);
            }
            Event::VirtualHidKeyboardCountryCodeChanged(code) => {
                client.initialize_virtual_hid_keyboard(code);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::entry::Entry;
    use crate::event::{EventState, EventType, MomentarySwitchEvent, PointingMotion, UsagePair};
    use crate::time::{AbsoluteTime, EventTimeStamp};
    use crate::virtual_hid::testing::RecordingVirtualHidClient;

    fn push(queue: &mut Queue, event: Event, event_type: EventType) {
        queue.push_back(Entry::new(
            DeviceId(1),
            EventTimeStamp::new(AbsoluteTime(0)),
            event.clone(),
            event_type,
            event,
            EventState::VirtualEvent,
        ));
    }

    #[test]
    fn key_events_are_posted_and_queue_drained() {
        let mut posted = Queue::new("posted");
        push(
            &mut posted,
            Event::MomentarySwitch(MomentarySwitchEvent::key(UsagePair::new(7, 0x04))),
            EventType::KeyDown,
        );

        let mut client = RecordingVirtualHidClient::ready();
        flush_posted_queue(&mut posted, &mut client);

        assert!(posted.is_empty());
        assert_eq!(client.key_events, vec![(UsagePair::new(7, 0x04), EventType::KeyDown)]);
    }

    #[test]
    fn zero_motion_is_not_posted() {
        let mut posted = Queue::new("posted");
        push(&mut posted, Event::PointingMotion(PointingMotion::default()), EventType::Single);

        let mut client = RecordingVirtualHidClient::ready();
        flush_posted_queue(&mut posted, &mut client);

        assert!(client.motions.is_empty());
    }

    #[test]
    fn caps_lock_change_sets_led_state() {
        let mut posted = Queue::new("posted");
        push(&mut posted, Event::CapsLockStateChanged(true), EventType::Single);

        let mut client = RecordingVirtualHidClient::ready();
        flush_posted_queue(&mut posted, &mut client);

        assert_eq!(client.caps_lock_led, Some(true));
    }
}
