//! Device grabber (C9, §4.7): top-level coordinator that turns HID
//! enumeration and value-arrival messages into pipeline feeds, owns the
//! per-device grab policy, and reacts to sleep/wake and virtual-HID
//! reconnect events.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::CoreConfiguration;
use crate::connector::ManipulatorManagersConnector;
use crate::device::{DeviceId, DeviceIdAllocator, DeviceProperties};
use crate::device_entry::{DeviceEntry, GrabbableState};
use crate::entry::Entry;
use crate::event::{Event, EventState, EventType};
use crate::external::{HidValueMonitor, NotificationMessageSink};
use crate::hid_value::{self, RawHidValue};
use crate::notification;
use crate::stuck_events::ObservationSource;
use crate::time::{AbsoluteTime, EventTimeStamp};
use crate::virtual_hid::{VirtualHidDevicesState, VirtualHidServiceClient};

/// Top-level coordinator tying device lifecycle (§4.7.1-.5) to the fixed
/// four-stage manipulator pipeline (C7).
#[derive(Debug)]
pub struct DeviceGrabber {
    devices: HashMap<DeviceId, DeviceEntry>,
    device_id_allocator: DeviceIdAllocator,
    connector: ManipulatorManagersConnector,
    configuration: CoreConfiguration,
    sleeping: bool,
    virtual_hid_state: VirtualHidDevicesState,
}

impl DeviceGrabber {
    pub fn new(configuration: CoreConfiguration) -> Self {
        Self {
            devices: HashMap::new(),
            device_id_allocator: DeviceIdAllocator::new(),
            connector: ManipulatorManagersConnector::new(),
            configuration,
            sleeping: false,
            virtual_hid_state: VirtualHidDevicesState::default(),
        }
    }

    pub fn connector_mut(&mut self) -> &mut ManipulatorManagersConnector {
        &mut self.connector
    }

    pub fn device(&self, device_id: DeviceId) -> Option<&DeviceEntry> {
        self.devices.get(&device_id)
    }

    /// §4.7.1: a new physical device arrived. Allocates its `DeviceId`,
    /// builds a device entry, and re-evaluates grab policy for everyone
    /// (built-in-keyboard disable depends on the full device set).
    pub fn device_matched(
        &mut self,
        mut properties: DeviceProperties,
        monitor: Box<dyn HidValueMonitor>,
        notification_sink: &mut dyn NotificationMessageSink,
        now: AbsoluteTime,
    ) -> DeviceId {
        let device_id = self.device_id_allocator.allocate();
        properties.device_id = device_id;
        properties.derive_built_in_flags();
        info!(?device_id, product = ?properties.product, "device matched");

        let entry = DeviceEntry::new(device_id, properties, monitor);
        self.devices.insert(device_id, entry);
        self.reevaluate_all(notification_sink, now);
        device_id
    }

    /// §3 "destroyed when it announces termination, on which all pending
    /// down events for this device are resolved into device-keys-are-
    /// released + device-ungrabbed".
    pub fn device_terminated(&mut self, device_id: DeviceId, notification_sink: &mut dyn NotificationMessageSink, now: AbsoluteTime) {
        if let Some(mut entry) = self.devices.remove(&device_id) {
            entry.pressed_keys_mut().make_entries_and_clear();
            entry.stop(now);
            Self::push_virtual_event(&mut self.connector, device_id, Event::DeviceKeysAndPointingButtonsAreReleased, now);
            Self::push_virtual_event(&mut self.connector, device_id, Event::DeviceUngrabbed, now);
            info!(?device_id, "device terminated");
        }
        self.reevaluate_all(notification_sink, now);
    }

    fn push_virtual_event(connector: &mut ManipulatorManagersConnector, device_id: DeviceId, event: Event, now: AbsoluteTime) {
        connector.merged_input_queue_mut().push_back(Entry::new(
            device_id,
            EventTimeStamp::new(now),
            event.clone(),
            EventType::Single,
            event,
            EventState::VirtualEvent,
        ));
    }

    fn cares_about(properties: &DeviceProperties) -> bool {
        properties.is_keyboard.unwrap_or(false)
            || properties.is_pointing_device.unwrap_or(false)
            || properties.is_game_pad.unwrap_or(false)
    }

    fn needs_pointing(&self) -> bool {
        self.connector.needs_virtual_hid_pointing()
            || self.devices.values().any(|e| {
                e.is_grabbed() && !e.is_disabled() && e.properties().is_pointing_device.unwrap_or(false)
            })
    }

    /// §4.7.1.1: recomputes the built-in-keyboard disable flag across the
    /// whole device set whenever membership or configuration changes.
    fn recompute_built_in_disable(&mut self) {
        let external_keyboard_present = self.devices.values().any(|e| {
            e.properties().is_keyboard.unwrap_or(false) && !e.properties().is_built_in_keyboard.unwrap_or(false)
        });

        for entry in self.devices.values_mut() {
            let is_built_in = entry.properties().is_built_in_keyboard.unwrap_or(false)
                || entry.settings().treat_as_built_in_keyboard;
            if is_built_in && entry.settings().disable_built_in_keyboard_if_exists {
                entry.set_disabled(external_keyboard_present);
            } else {
                entry.set_disabled(false);
            }
        }
    }

    /// §4.7.1: the grabbable-policy numbered list, evaluated per device.
    fn evaluate_policy_for(&self, entry: &DeviceEntry) -> GrabbableState {
        if entry.settings().ignore {
            return GrabbableState::None;
        }
        if !Self::cares_about(entry.properties()) {
            return GrabbableState::None;
        }
        if self.sleeping {
            return GrabbableState::UngrabbableTemporarily;
        }
        if !self.virtual_hid_state.keyboard_ready {
            return GrabbableState::UngrabbableTemporarily;
        }
        if entry.properties().is_pointing_device.unwrap_or(false) && !self.virtual_hid_state.pointing_ready {
            return GrabbableState::UngrabbableTemporarily;
        }
        if entry.stuck_events().find_probable_stuck_event().is_some() {
            return GrabbableState::UngrabbableTemporarily;
        }
        GrabbableState::Grabbable
    }

    /// Re-evaluates grab policy for every device, applying grab/ungrab
    /// transitions and user-visible notifications for the stuck-switch
    /// case (§4.7.1 step 5, §4.9).
    pub fn reevaluate_all(&mut self, notification_sink: &mut dyn NotificationMessageSink, now: AbsoluteTime) {
        self.recompute_built_in_disable();

        let device_ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        for device_id in device_ids {
            let new_state = {
                let entry = self.devices.get(&device_id).expect("device present");
                self.evaluate_policy_for(entry)
            };

            let entry = self.devices.get_mut(&device_id).expect("device present");
            let previous_state = entry.grabbable_state();
            entry.set_grabbable_state(new_state);

            if previous_state != GrabbableState::UngrabbableTemporarily
                && new_state == GrabbableState::UngrabbableTemporarily
                && entry.stuck_events().find_probable_stuck_event().is_some()
            {
                let switch = entry.stuck_events().find_probable_stuck_event();
                notification::notify_device_error(
                    notification_sink,
                    device_id,
                    Some(entry.properties()),
                    Some(&crate::error::CoreError::ProbableStuckSwitch(device_id)),
                );
                warn!(?device_id, ?switch, "device temporarily ungrabbable: probable stuck switch");
            } else if previous_state == GrabbableState::UngrabbableTemporarily
                && new_state != GrabbableState::UngrabbableTemporarily
            {
                notification::notify_device_error(notification_sink, device_id, Some(entry.properties()), None);
            }

            match new_state {
                GrabbableState::Grabbable => {
                    if entry.grab(now) {
                        let properties = entry.properties().clone();
                        Self::push_virtual_event(&mut self.connector, device_id, Event::DeviceGrabbed(properties), now);
                    }
                }
                GrabbableState::UngrabbableTemporarily => entry.observe_without_seize(now),
                GrabbableState::UngrabbablePermanently | GrabbableState::None => entry.stop(now),
            }
        }
    }

    /// §4.7.2: one report batch arrived for `device_id`.
    pub fn values_arrived(
        &mut self,
        device_id: DeviceId,
        time_stamp: AbsoluteTime,
        values: &[RawHidValue],
        notification_sink: &mut dyn NotificationMessageSink,
        now: AbsoluteTime,
    ) {
        let is_virtual_hid_keyboard = self
            .devices
            .get(&device_id)
            .map(|e| e.properties().is_virtual_hid_device.unwrap_or(false))
            .unwrap_or(false);

        if is_virtual_hid_keyboard {
            for value in values {
                if value.usage_pair.usage_page == hid_value::usage::LED_PAGE
                    && value.usage_pair.usage == hid_value::usage::CAPS_LOCK_LED
                {
                    let event = Event::CapsLockStateChanged(value.integer_value != 0);
                    self.connector.merged_input_queue_mut().push_back(Entry::new(
                        device_id,
                        EventTimeStamp::new(time_stamp),
                        event.clone(),
                        EventType::Single,
                        event,
                        EventState::Original,
                    ));
                }
            }
            return;
        }

        let mut needs_regrab = false;
        let mut released_to_empty = false;
        let ignore_input = self
            .devices
            .get(&device_id)
            .map(|e| !e.is_grabbed() || e.is_disabled())
            .unwrap_or(true);

        if let Some(entry) = self.devices.get_mut(&device_id) {
            let first_batch = !entry.first_value_arrived();
            entry.note_value_arrived();
            let source = if entry.is_grabbed() { ObservationSource::Seized } else { ObservationSource::Observed };

            for value in values {
                if hid_value::classify_momentary_switch(value.usage_pair) {
                    let switch = crate::event::MomentarySwitchEvent::key(value.usage_pair);
                    let event_type = if value.integer_value != 0 { EventType::KeyDown } else { EventType::KeyUp };
                    if first_batch {
                        continue;
                    }
                    if entry.stuck_events_mut().update(switch, event_type, source) {
                        needs_regrab = true;
                    }
                    if event_type == EventType::KeyDown {
                        entry.pressed_keys_mut().insert(switch);
                    } else {
                        entry.pressed_keys_mut().erase(&switch);
                        if entry.pressed_keys_mut().is_empty() {
                            released_to_empty = true;
                        }
                    }
                }
            }
        }

        if needs_regrab {
            if let Some(entry) = self.devices.get_mut(&device_id) {
                entry.restart_monitor();
            }
            self.reevaluate_all(notification_sink, now);
            return;
        }

        // §4.2 final paragraph: an ignored device still reports zeroed
        // pointing motion so downstream "device produced activity"
        // bookkeeping sees a report, but its momentary switches are
        // suppressed inside `convert_batch`.
        for entry in hid_value::convert_batch(device_id, time_stamp, values, ignore_input) {
            self.connector.merged_input_queue_mut().push_back(entry);
        }

        // §4.3: synthesize device-keys-and-pointing-buttons-are-released
        // once the per-device held-key set goes empty, after the key-up
        // entry that emptied it.
        if released_to_empty {
            Self::push_virtual_event(&mut self.connector, device_id, Event::DeviceKeysAndPointingButtonsAreReleased, now);
        }
    }

    /// §4.7.3: a new configuration snapshot arrived.
    pub fn update_configuration(
        &mut self,
        configuration: CoreConfiguration,
        notification_sink: &mut dyn NotificationMessageSink,
        now: AbsoluteTime,
    ) {
        self.configuration = configuration;

        let simple = self.configuration.build_simple_modification_manipulators();
        let fn_keys = self.configuration.build_fn_function_key_manipulators();
        let complex = self.configuration.build_complex_modification_manipulators();

        self.connector.manager_mut(0).clear();
        for m in simple {
            self.connector.manager_mut(0).push(Box::new(m));
        }

        self.connector.manager_mut(1).clear();
        for m in complex {
            self.connector.manager_mut(1).push(Box::new(m));
        }

        self.connector.manager_mut(2).clear();
        for m in fn_keys {
            self.connector.manager_mut(2).push(Box::new(m));
        }

        for (device_id, settings) in self.configuration.device_settings.clone() {
            if let Some(entry) = self.devices.get_mut(&device_id) {
                entry.set_settings(settings);
            }
        }

        self.reevaluate_all(notification_sink, now);
    }

    /// §4.7.4: `system_will_sleep`.
    pub fn system_will_sleep(&mut self, notification_sink: &mut dyn NotificationMessageSink, now: AbsoluteTime) {
        self.sleeping = true;
        info!("system will sleep");
        self.reevaluate_all(notification_sink, now);
    }

    /// §4.7.4: `will_power_on` / `has_powered_on` / `will_not_sleep`.
    pub fn system_did_wake(&mut self, notification_sink: &mut dyn NotificationMessageSink, now: AbsoluteTime) {
        self.sleeping = false;
        info!("system woke");
        self.reevaluate_all(notification_sink, now);
    }

    /// §4.7.5: connected to the virtual HID service.
    pub fn virtual_hid_connected(
        &mut self,
        client: &mut dyn VirtualHidServiceClient,
        notification_sink: &mut dyn NotificationMessageSink,
        now: AbsoluteTime,
    ) {
        client.initialize_virtual_hid_keyboard(self.configuration.virtual_hid_keyboard_country_code);
        self.virtual_hid_state = client.state();
        info!(?self.virtual_hid_state, "virtual HID service connected");
        self.reevaluate_all(notification_sink, now);
    }

    pub fn virtual_hid_disconnected(&mut self, notification_sink: &mut dyn NotificationMessageSink, now: AbsoluteTime) {
        self.virtual_hid_state = VirtualHidDevicesState::default();
        warn!("virtual HID service disconnected");
        self.reevaluate_all(notification_sink, now);
    }

    /// Drives the manipulator pipeline and flushes posted output to the
    /// virtual HID client. Returns the number of manipulate passes run.
    pub fn manipulate(&mut self, client: &mut dyn VirtualHidServiceClient, now: AbsoluteTime) -> u32 {
        let state = client.state();
        self.virtual_hid_state = state;
        let needs_pointing = self.needs_pointing();

        if !state.ready_for(needs_pointing) {
            return 0;
        }

        let passes = self.connector.manipulate(now);
        self.connector.flush_posted_queue(client);
        passes
    }

    pub fn min_input_event_time_stamp(&self) -> Option<AbsoluteTime> {
        self.connector.min_input_event_time_stamp()
    }

    /// §4.7.1 "Observed-only devices ... feed probable-stuck-event updates
    /// but not events": a companion process reported a key transition on a
    /// device this process does not seize.
    pub fn observe_key_event(
        &mut self,
        device_id: DeviceId,
        usage_pair: crate::event::UsagePair,
        event_type: EventType,
        notification_sink: &mut dyn NotificationMessageSink,
        now: AbsoluteTime,
    ) {
        let switch = crate::event::MomentarySwitchEvent::key(usage_pair);
        let needs_regrab = match self.devices.get_mut(&device_id) {
            Some(entry) => entry.stuck_events_mut().update(switch, event_type, ObservationSource::Observed),
            None => return,
        };

        if needs_regrab {
            self.reevaluate_all(notification_sink, now);
        }
    }

    pub fn update_observed_device_properties(&mut self, device_id: DeviceId, properties: DeviceProperties) {
        if let Some(entry) = self.devices.get_mut(&device_id) {
            entry.set_properties(properties);
        }
    }
}
