//! HID report → canonical event normalization (C3, §4.2).

use crate::device::DeviceId;
use crate::entry::Entry;
use crate::event::{Event, MomentarySwitchEvent, PointingMotion, UsagePair};
use crate::event::{EventState, EventType};
use crate::time::{AbsoluteTime, EventTimeStamp};

/// Generic Desktop page (0x01) pointing axis usages, plus the Consumer page
/// (0x0c) AC Pan usage used for horizontal wheel on many trackpads.
pub mod usage {
    pub const GENERIC_DESKTOP_PAGE: u32 = 0x01;
    pub const X: u32 = 0x30;
    pub const Y: u32 = 0x31;
    pub const WHEEL: u32 = 0x38;

    pub const CONSUMER_PAGE: u32 = 0x0c;
    pub const AC_PAN: u32 = 0x0238;

    pub const LED_PAGE: u32 = 0x08;
    pub const CAPS_LOCK_LED: u32 = 0x02;
}

/// One raw HID value from a device's input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHidValue {
    pub usage_pair: UsagePair,
    pub integer_value: i64,
}

impl RawHidValue {
    pub fn new(usage_page: u32, usage_code: u32, integer_value: i64) -> Self {
        Self {
            usage_pair: UsagePair::new(usage_page, usage_code),
            integer_value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointingAxis {
    X,
    Y,
    VerticalWheel,
    HorizontalWheel,
}

fn classify_axis(usage_pair: UsagePair) -> Option<PointingAxis> {
    match (usage_pair.usage_page, usage_pair.usage) {
        (usage::GENERIC_DESKTOP_PAGE, usage::X) => Some(PointingAxis::X),
        (usage::GENERIC_DESKTOP_PAGE, usage::Y) => Some(PointingAxis::Y),
        (usage::GENERIC_DESKTOP_PAGE, usage::WHEEL) => Some(PointingAxis::VerticalWheel),
        (usage::CONSUMER_PAGE, usage::AC_PAN) => Some(PointingAxis::HorizontalWheel),
        _ => None,
    }
}

fn is_caps_lock_led(usage_pair: UsagePair) -> bool {
    usage_pair.usage_page == usage::LED_PAGE && usage_pair.usage == usage::CAPS_LOCK_LED
}

/// Whether `usage_pair` should be treated as a momentary switch (key,
/// consumer control, or pointing button) rather than a pointing axis or
/// the caps-lock LED report, as classified by [`convert_batch`].
pub fn classify_momentary_switch(usage_pair: UsagePair) -> bool {
    classify_axis(usage_pair).is_none() && !is_caps_lock_led(usage_pair)
}

fn apply_axis(motion: &mut PointingMotion, axis: PointingAxis, value: i64) {
    let value = value as i32;
    match axis {
        PointingAxis::X => motion.x = value,
        PointingAxis::Y => motion.y = value,
        PointingAxis::VerticalWheel => motion.vertical_wheel = value,
        PointingAxis::HorizontalWheel => motion.horizontal_wheel = value,
    }
}

/// Converts a batch of raw HID values (all sharing one time stamp, i.e. one
/// input report) into canonical entries, coalescing contiguous pointing axes
/// into a single `pointing_motion` entry per run (§4.2).
///
/// `ignore_input` corresponds to a device configured to be used only for
/// wake/presence detection: momentary switches are suppressed, and any
/// pointing run present is still emitted but with every axis zeroed so
/// downstream "device produced activity" bookkeeping still sees a report.
pub fn convert_batch(
    device_id: DeviceId,
    time_stamp: AbsoluteTime,
    values: &[RawHidValue],
    ignore_input: bool,
) -> Vec<Entry> {
    let mut out = Vec::new();
    let mut run: Option<(PointingMotion, Vec<PointingAxis>)> = None;

    let flush = |run: &mut Option<(PointingMotion, Vec<PointingAxis>)>, out: &mut Vec<Entry>| {
        if let Some((motion, _)) = run.take() {
            let motion = if ignore_input { PointingMotion::default() } else { motion };
            let event = Event::PointingMotion(motion);
            out.push(Entry::new(
                device_id,
                EventTimeStamp::new(time_stamp),
                event.clone(),
                EventType::Single,
                event,
                EventState::Original,
            ));
        }
    };

    for value in values {
        if let Some(axis) = classify_axis(value.usage_pair) {
            let seen_before = run
                .as_ref()
                .map(|(_, seen)| seen.contains(&axis))
                .unwrap_or(false);

            if seen_before {
                flush(&mut run, &mut out);
            }

            let entry = run.get_or_insert_with(|| (PointingMotion::default(), Vec::new()));
            apply_axis(&mut entry.0, axis, value.integer_value);
            entry.1.push(axis);
            continue;
        }

        if is_caps_lock_led(value.usage_pair) {
            flush(&mut run, &mut out);
            let event = Event::CapsLockStateChanged(value.integer_value != 0);
            out.push(Entry::new(
                device_id,
                EventTimeStamp::new(time_stamp),
                event.clone(),
                EventType::Single,
                event,
                EventState::Original,
            ));
            continue;
        }

        // Momentary switch (key, consumer control, or pointing button).
        flush(&mut run, &mut out);

        if ignore_input {
            continue;
        }

        let switch = MomentarySwitchEvent::key(value.usage_pair);
        let event_type = if value.integer_value != 0 {
            EventType::KeyDown
        } else {
            EventType::KeyUp
        };
        let event = Event::MomentarySwitch(switch);
        out.push(Entry::new(
            device_id,
            EventTimeStamp::new(time_stamp),
            event.clone(),
            event_type,
            event,
            EventState::Original,
        ));
    }

    flush(&mut run, &mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_axis_report_produces_one_motion_entry() {
        let values = vec![RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::X, 5)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries.len(), 1);
        match entries[0].event() {
            Event::PointingMotion(m) => assert_eq!(m.x, 5),
            _ => panic!("expected pointing motion"),
        }
    }

    #[test]
    fn repeated_axis_flushes_and_starts_new_run() {
        let values = vec![
            RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::X, 1),
            RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::X, 2),
        ];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn mixed_axes_coalesce_into_single_motion() {
        let values = vec![
            RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::X, 3),
            RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::Y, -2),
        ];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries.len(), 1);
        match entries[0].event() {
            Event::PointingMotion(m) => {
                assert_eq!(m.x, 3);
                assert_eq!(m.y, -2);
            }
            _ => panic!("expected pointing motion"),
        }
    }

    #[test]
    fn key_down_and_up_classified_by_integer_value() {
        let values = vec![RawHidValue::new(0x07, 0x04, 1)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries[0].event_type(), EventType::KeyDown);

        let values = vec![RawHidValue::new(0x07, 0x04, 0)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries[0].event_type(), EventType::KeyUp);
    }

    #[test]
    fn caps_lock_led_emits_single_event() {
        let values = vec![RawHidValue::new(usage::LED_PAGE, usage::CAPS_LOCK_LED, 1)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type(), EventType::Single);
        assert!(matches!(entries[0].event(), Event::CapsLockStateChanged(true)));
    }

    #[test]
    fn ignored_device_zeroes_motion_but_keeps_the_report() {
        let values = vec![RawHidValue::new(usage::GENERIC_DESKTOP_PAGE, usage::X, 7)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, true);
        assert_eq!(entries.len(), 1);
        match entries[0].event() {
            Event::PointingMotion(m) => assert!(m.is_zero()),
            _ => panic!("expected pointing motion"),
        }
    }

    #[test]
    fn ignored_device_suppresses_momentary_switches() {
        let values = vec![RawHidValue::new(0x07, 0x04, 1)];
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &values, true);
        assert!(entries.is_empty());
    }

    #[test]
    fn empty_batch_produces_no_motion_entry() {
        let entries = convert_batch(DeviceId(1), AbsoluteTime(0), &[], false);
        assert!(entries.is_empty());
    }
}
