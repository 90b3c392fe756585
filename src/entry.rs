//! Pipeline queue entries (§3 "Entry").

use crate::device::DeviceId;
use crate::event::{Event, EventState, EventType, Validity};
use crate::time::EventTimeStamp;

/// One element of a pipeline queue: a device-scoped, time-stamped, typed
/// event, carrying both the (possibly remapped) event and the original event
/// it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    device_id: DeviceId,
    event_time_stamp: EventTimeStamp,
    event: Event,
    event_type: EventType,
    original_event: Event,
    state: EventState,
    lazy: bool,
    validity: Validity,
}

impl Entry {
    pub fn new(
        device_id: DeviceId,
        event_time_stamp: EventTimeStamp,
        event: Event,
        event_type: EventType,
        original_event: Event,
        state: EventState,
    ) -> Self {
        Self {
            device_id,
            event_time_stamp,
            event,
            event_type,
            original_event,
            state,
            lazy: false,
            validity: Validity::Valid,
        }
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn event_time_stamp(&self) -> &EventTimeStamp {
        &self.event_time_stamp
    }

    pub fn event_time_stamp_mut(&mut self) -> &mut EventTimeStamp {
        &mut self.event_time_stamp
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn original_event(&self) -> &Event {
        &self.original_event
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn lazy(&self) -> bool {
        self.lazy
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn set_validity(&mut self, validity: Validity) {
        self.validity = validity;
    }

    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }
}
