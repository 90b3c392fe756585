//! Probable-stuck-events detector (C4, §4.4): per-device bookkeeping that
//! notices a switch whose held state at the moment of seize is ambiguous.

use std::collections::HashMap;

use crate::event::{EventType, MomentarySwitchEvent};

/// Where an observation of a switch's state came from: this process holding
/// an exclusive seize on the device, or a passive/companion-process view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    Observed,
    Seized,
}

#[derive(Debug, Clone, Copy)]
struct LastObservation {
    event_type: EventType,
    source: ObservationSource,
}

/// Tracks, per switch, the last observed (event_type, source) pair and
/// flags the single switch (if any) whose state is ambiguous across a
/// seize/unseize boundary.
#[derive(Debug, Default)]
pub struct ProbableStuckEventsManager {
    last_observations: HashMap<MomentarySwitchEvent, LastObservation>,
    probable_stuck_event: Option<MomentarySwitchEvent>,
}

impl ProbableStuckEventsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation of `event`'s type from `source`. Returns
    /// `true` when the device should be stopped-then-restarted to
    /// re-sample its current state, because the observation just seen
    /// crosses a seize/unseize boundary with a flipped event type
    /// (seized-key-down followed by observed-key-up, or vice versa).
    pub fn update(
        &mut self,
        event: MomentarySwitchEvent,
        event_type: EventType,
        source: ObservationSource,
    ) -> bool {
        let resolving = self.probable_stuck_event == Some(event) && event_type == EventType::KeyDown;
        if resolving {
            self.probable_stuck_event = None;
        }

        // A resolving key-down settles the ambiguity outright; comparing it
        // against the very observation that raised the flag would just
        // re-raise it.
        let mut needs_regrab = false;
        if !resolving {
            if let Some(previous) = self.last_observations.get(&event) {
                if previous.source != source && previous.event_type != event_type {
                    self.probable_stuck_event = Some(event);
                    needs_regrab = true;
                }
            }
        }

        self.last_observations
            .insert(event, LastObservation { event_type, source });

        needs_regrab
    }

    pub fn find_probable_stuck_event(&self) -> Option<MomentarySwitchEvent> {
        self.probable_stuck_event
    }

    pub fn clear(&mut self) {
        self.last_observations.clear();
        self.probable_stuck_event = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UsagePair;

    fn key() -> MomentarySwitchEvent {
        MomentarySwitchEvent::key(UsagePair::new(7, 4))
    }

    #[test]
    fn seized_down_then_observed_up_flags_stuck_and_requests_regrab() {
        let mut mgr = ProbableStuckEventsManager::new();
        let k = key();
        assert!(!mgr.update(k, EventType::KeyDown, ObservationSource::Seized));
        assert!(mgr.find_probable_stuck_event().is_none());

        let needs_regrab = mgr.update(k, EventType::KeyUp, ObservationSource::Observed);
        assert!(needs_regrab);
        assert_eq!(mgr.find_probable_stuck_event(), Some(k));
    }

    #[test]
    fn matching_key_down_clears_stuck_flag() {
        let mut mgr = ProbableStuckEventsManager::new();
        let k = key();
        mgr.update(k, EventType::KeyDown, ObservationSource::Seized);
        mgr.update(k, EventType::KeyUp, ObservationSource::Observed);
        assert!(mgr.find_probable_stuck_event().is_some());

        mgr.update(k, EventType::KeyDown, ObservationSource::Seized);
        assert!(mgr.find_probable_stuck_event().is_none());
    }

    #[test]
    fn same_source_repeat_does_not_request_regrab() {
        let mut mgr = ProbableStuckEventsManager::new();
        let k = key();
        mgr.update(k, EventType::KeyDown, ObservationSource::Seized);
        let needs_regrab = mgr.update(k, EventType::KeyDown, ObservationSource::Seized);
        assert!(!needs_regrab);
        assert!(mgr.find_probable_stuck_event().is_none());
    }

    #[test]
    fn unrelated_switch_does_not_affect_existing_stuck_flag() {
        let mut mgr = ProbableStuckEventsManager::new();
        let a = key();
        let b = MomentarySwitchEvent::key(UsagePair::new(7, 5));
        mgr.update(a, EventType::KeyDown, ObservationSource::Seized);
        mgr.update(a, EventType::KeyUp, ObservationSource::Observed);
        assert_eq!(mgr.find_probable_stuck_event(), Some(a));

        mgr.update(b, EventType::KeyDown, ObservationSource::Seized);
        assert_eq!(mgr.find_probable_stuck_event(), Some(a));
    }

    #[test]
    fn clear_resets_all_state() {
        let mut mgr = ProbableStuckEventsManager::new();
        let k = key();
        mgr.update(k, EventType::KeyDown, ObservationSource::Seized);
        mgr.update(k, EventType::KeyUp, ObservationSource::Observed);
        mgr.clear();
        assert!(mgr.find_probable_stuck_event().is_none());
    }
}
