//! Manipulator managers connector (C7, §4.6): chains the four fixed pipeline
//! stages via intermediate queues and drives time-ordered dispatch across
//! them.

use crate::manager::ManipulatorManager;
use crate::queue::Queue;
use crate::time::AbsoluteTime;
use crate::virtual_hid::VirtualHidServiceClient;

/// One (manager, input queue, output queue) connection. The connector owns
/// the queues; the manager only ever sees them through `manipulate`.
struct Connection {
    manager: ManipulatorManager,
    input_queue: Queue,
}

/// Chains the four stages named in §4.6: simple-modifications,
/// complex-modifications, fn-function-keys, post-event-to-virtual-devices.
/// Stage *i*'s output queue is stage *i+1*'s input queue; the last stage's
/// output is the "posted" queue, drained separately by
/// [`crate::post_to_virtual_device::flush_posted_queue`].
pub struct ManipulatorManagersConnector {
    connections: Vec<Connection>,
    posted_queue: Queue,
}

impl ManipulatorManagersConnector {
    pub fn new() -> Self {
        let stage_names = [
            "simple_modifications",
            "complex_modifications",
            "fn_function_keys",
            "post_event_to_virtual_devices",
        ];

        let connections = stage_names
            .iter()
            .map(|name| Connection {
                manager: ManipulatorManager::new(*name),
                input_queue: Queue::new(*name),
            })
            .collect();

        Self {
            connections,
            posted_queue: Queue::new("posted"),
        }
    }

    /// The merged input queue: the first stage's input queue, fed directly
    /// by the device grabber.
    pub fn merged_input_queue_mut(&mut self) -> &mut Queue {
        &mut self.connections[0].input_queue
    }

    pub fn manager_mut(&mut self, stage: usize) -> &mut ManipulatorManager {
        &mut self.connections[stage].manager
    }

    /// Drives every stage once in order, letting stage *i*'s emissions feed
    /// stage *i+1* within the same call. Loops until no stage processes
    /// anything for the current `now`. Returns the number of drive passes
    /// performed (0 if nothing was due).
    pub fn manipulate(&mut self, now: AbsoluteTime) -> u32 {
        let mut passes = 0;

        loop {
            let mut any_processed = false;

            for i in 0..self.connections.len() {
                let processed = if i + 1 < self.connections.len() {
                    let (left, right) = self.connections.split_at_mut(i + 1);
                    let connection = &mut left[i];
                    let next_input = &mut right[0].input_queue;
                    connection.manager.manipulate(&mut connection.input_queue, next_input, now)
                } else {
                    let connection = &mut self.connections[i];
                    connection
                        .manager
                        .manipulate(&mut connection.input_queue, &mut self.posted_queue, now)
                };

                any_processed = any_processed || processed;
            }

            if !any_processed {
                break;
            }
            passes += 1;
        }

        passes
    }

    pub fn flush_posted_queue(&mut self, client: &mut dyn VirtualHidServiceClient) {
        crate::post_to_virtual_device::flush_posted_queue(&mut self.posted_queue, client);
    }

    /// Earliest `time_stamp + input_delay_duration` across every stage's
    /// input queue, used by the driver to schedule the next `manipulate`
    /// call (§4.6).
    pub fn min_input_event_time_stamp(&self) -> Option<AbsoluteTime> {
        self.connections
            .iter()
            .filter_map(|c| c.input_queue.front().map(|e| e.event_time_stamp().with_input_delay()))
            .chain(self.connections.iter().filter_map(|c| c.manager.next_wakeup()))
            .min()
    }

    pub fn invalidate_manipulators(&mut self) {
        for connection in &mut self.connections {
            connection.manager.invalidate_manipulators();
        }
    }

    pub fn needs_virtual_hid_pointing(&self) -> bool {
        self.connections.iter().any(|c| c.manager.needs_virtual_hid_pointing())
    }
}

impl Default for ManipulatorManagersConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;
    use crate::entry::Entry;
    use crate::event::{Event, EventState, EventType, MomentarySwitchEvent, UsagePair};
    use crate::manipulator::basic::{BasicManipulator, ToEvent};
    use crate::time::EventTimeStamp;
    use crate::virtual_hid::testing::RecordingVirtualHidClient;

    fn key_entry(usage: u32, event_type: EventType, ts: u64) -> Entry {
        let ev = Event::MomentarySwitch(MomentarySwitchEvent::key(UsagePair::new(7, usage)));
        Entry::new(DeviceId(1), EventTimeStamp::new(AbsoluteTime(ts)), ev.clone(), event_type, ev, EventState::Original)
    }

    #[test]
    fn entry_flows_through_all_four_stages_to_posted_queue() {
        let mut connector = ManipulatorManagersConnector::new();
        connector.merged_input_queue_mut().push_back(key_entry(0x04, EventType::KeyDown, 0));

        let passes = connector.manipulate(AbsoluteTime(0));
        assert!(passes >= 1);

        let mut client = RecordingVirtualHidClient::ready();
        connector.flush_posted_queue(&mut client);
        assert_eq!(client.key_events.len(), 1);
    }

    #[test]
    fn remap_in_simple_modifications_stage_reaches_posted_queue() {
        let mut connector = ManipulatorManagersConnector::new();
        let from = MomentarySwitchEvent::key(UsagePair::new(7, 0x3a));
        let to = UsagePair::new(0x0c, 0x29);
        connector.manager_mut(0).push(Box::new(
            BasicManipulator::new(from).with_to(vec![ToEvent::new(Event::MomentarySwitch(MomentarySwitchEvent::key(to)))]),
        ));

        connector.merged_input_queue_mut().push_back(key_entry(0x3a, EventType::KeyDown, 0));
        connector.manipulate(AbsoluteTime(0));

        let mut client = RecordingVirtualHidClient::ready();
        connector.flush_posted_queue(&mut client);
        assert_eq!(client.key_events, vec![(to, EventType::KeyDown)]);
    }

    #[test]
    fn min_input_event_time_stamp_reflects_earliest_pending_entry() {
        let mut connector = ManipulatorManagersConnector::new();
        assert!(connector.min_input_event_time_stamp().is_none());

        connector.merged_input_queue_mut().push_back(key_entry(0x04, EventType::KeyDown, 50));
        assert_eq!(connector.min_input_event_time_stamp(), Some(AbsoluteTime(50)));
    }
}
