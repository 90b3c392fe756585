//! Monotonic time primitives used throughout the pipeline.
//!
//! `AbsoluteTime` mirrors the original implementation's `mach_absolute_time`-based
//! time points: a single monotonically increasing integer counted in nanoseconds
//! since an arbitrary epoch (process start). Everything downstream of the HID
//! layer schedules and compares purely in these units so that the pipeline never
//! depends on wall-clock time.

use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// A point in monotonic time, in nanoseconds since an arbitrary epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbsoluteTime(pub u64);

/// A span of monotonic time, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbsoluteDuration(pub u64);

impl AbsoluteTime {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn checked_sub(self, other: AbsoluteTime) -> Option<AbsoluteDuration> {
        self.0.checked_sub(other.0).map(AbsoluteDuration)
    }
}

impl AbsoluteDuration {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    pub fn as_std(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl Add<AbsoluteDuration> for AbsoluteTime {
    type Output = AbsoluteTime;
    fn add(self, rhs: AbsoluteDuration) -> AbsoluteTime {
        AbsoluteTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<AbsoluteDuration> for AbsoluteTime {
    fn add_assign(&mut self, rhs: AbsoluteDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for AbsoluteTime {
    type Output = AbsoluteDuration;
    fn sub(self, rhs: AbsoluteTime) -> AbsoluteDuration {
        AbsoluteDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Add for AbsoluteDuration {
    type Output = AbsoluteDuration;
    fn add(self, rhs: AbsoluteDuration) -> AbsoluteDuration {
        AbsoluteDuration(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for AbsoluteDuration {
    fn add_assign(&mut self, rhs: AbsoluteDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

/// `(time_stamp, input_delay_duration)`: the scheduling unit for every entry in
/// a pipeline queue. The *effective* scheduled time is always
/// `time_stamp + input_delay_duration` (see [`EventTimeStamp::with_input_delay`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTimeStamp {
    time_stamp: AbsoluteTime,
    input_delay_duration: AbsoluteDuration,
}

impl EventTimeStamp {
    pub fn new(time_stamp: AbsoluteTime) -> Self {
        Self {
            time_stamp,
            input_delay_duration: AbsoluteDuration::zero(),
        }
    }

    pub fn with_delay(time_stamp: AbsoluteTime, input_delay_duration: AbsoluteDuration) -> Self {
        Self {
            time_stamp,
            input_delay_duration,
        }
    }

    pub fn time_stamp(&self) -> AbsoluteTime {
        self.time_stamp
    }

    pub fn set_time_stamp(&mut self, value: AbsoluteTime) {
        self.time_stamp = value;
    }

    pub fn input_delay_duration(&self) -> AbsoluteDuration {
        self.input_delay_duration
    }

    pub fn set_input_delay_duration(&mut self, value: AbsoluteDuration) {
        self.input_delay_duration = value;
    }

    /// The scheduling key used by queues: the time the entry should be treated
    /// as "arrived" for ordering and stage-gating purposes.
    pub fn with_input_delay(&self) -> AbsoluteTime {
        self.time_stamp + self.input_delay_duration
    }
}
