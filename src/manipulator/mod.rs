//! Manipulator contract (C5, §4.5.1) and the concrete manipulator kinds.

pub mod basic;
pub mod conditions;
pub mod mouse_basic;

use crate::entry::Entry;
use crate::queue::Queue;
use crate::time::AbsoluteTime;

/// A single transformation unit in a manipulator manager's ordered list.
///
/// `manipulate` is invoked by the enclosing manager for the current front
/// entry of its input queue. A manipulator whose conditions reject the
/// entry is a no-op and returns `false` (the entry is left untouched for
/// the next manipulator in the chain). A manipulator that consumes the
/// entry marks it invalid via `entry.set_validity` and returns `true`.
pub trait Manipulator: std::fmt::Debug {
    /// `context_queue` is the queue the entry was popped from: manipulators
    /// read its modifier/button/environment state to evaluate conditions
    /// (the entry's own modifier side effects were already applied to it
    /// when it was originally pushed there). Emitted to-events go into
    /// `output_queue`, which is a different queue and updates its own
    /// trackers independently as the chain stage's events accumulate.
    fn manipulate(
        &mut self,
        entry: &mut Entry,
        context_queue: &Queue,
        output_queue: &mut Queue,
        now: AbsoluteTime,
    ) -> bool;

    /// Called once per manager drive even when there is no front entry to
    /// process, so that manipulators with pending timers (`to_if_alone`,
    /// `to_if_held_down`, `to_delayed_action`) can fire. Returns `true` if
    /// it emitted anything into `output_queue`.
    fn poll(&mut self, _now: AbsoluteTime, _output_queue: &mut Queue) -> bool {
        false
    }

    /// The next instant, if any, at which this manipulator needs to be
    /// polled regardless of new input.
    fn next_wakeup(&self) -> Option<AbsoluteTime> {
        None
    }

    /// True while the manipulator holds state that must be allowed to
    /// finish (an in-flight timer) even after it has otherwise been
    /// invalidated by a manager-wide `invalidate_manipulators()`.
    fn active(&self) -> bool {
        false
    }

    /// False once the manipulator has been told to retire (its owning
    /// configuration was replaced). Combined with `active() == false`,
    /// this makes it eligible for removal from the manager's list.
    fn valid(&self) -> bool {
        true
    }

    fn invalidate(&mut self) {}

    fn needs_virtual_hid_pointing(&self) -> bool {
        false
    }
}
