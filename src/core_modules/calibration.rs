// THEORY:
// The calibration lifecycle is a fixed sequence of phases. Only the Idle phase
// waits on the user; the two setup phases after it are purely timed, and the
// Active phase runs until something ends the session.
//
//     Idle --start--> GetReady --G--> Calibrating --C--> Active --> Terminated
//      ^  \--edit--> EditingLayout --commit/fail--/^
//      \-----------------------------------------/
//
// Exactly one phase is current at a time. Pointer-driven layout edits belong to
// EditingLayout and accumulator updates belong to Active, so the two never touch
// shared state in the same tick.

use crate::clock::Clock;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    EditingLayout,
    GetReady,
    Calibrating,
    Active,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::EditingLayout => "editing-layout",
            Phase::GetReady => "get-ready",
            Phase::Calibrating => "calibrating",
            Phase::Active => "active",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Whole seconds left: the duration minus the whole seconds already elapsed.
///
/// Reads 3, 2, 1 over a three second phase; zero only once the phase is over.
pub fn countdown_seconds(duration: Duration, elapsed: Duration) -> u64 {
    duration.as_secs().saturating_sub(elapsed.as_secs())
}

/// Tracks one timed phase against a clock.
#[derive(Debug, Clone, Copy)]
pub struct PhaseTimer {
    started: Duration,
    duration: Duration,
}

impl PhaseTimer {
    pub fn start<C: Clock + ?Sized>(clock: &C, duration: Duration) -> Self {
        Self {
            started: clock.now(),
            duration,
        }
    }

    pub fn elapsed<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        clock.now().saturating_sub(self.started)
    }

    pub fn is_done<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        self.elapsed(clock) >= self.duration
    }

    pub fn remaining_seconds<C: Clock + ?Sized>(&self, clock: &C) -> u64 {
        countdown_seconds(self.duration, self.elapsed(clock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedClock(Cell<Duration>);

    impl Clock for FixedClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
        fn sleep(&self, duration: Duration) {
            self.0.set(self.0.get() + duration);
        }
    }

    #[test]
    fn countdown_subtracts_whole_elapsed_seconds() {
        let three = Duration::from_secs(3);
        let shown: Vec<u64> = [0, 500, 1500, 2500, 2999]
            .into_iter()
            .map(|ms| countdown_seconds(three, Duration::from_millis(ms)))
            .collect();
        assert_eq!(shown, [3, 3, 2, 1, 1]);
        assert_eq!(countdown_seconds(three, Duration::from_secs(3)), 0);
        assert_eq!(countdown_seconds(three, Duration::from_secs(5)), 0);
    }

    #[test]
    fn timer_finishes_at_its_duration() {
        let clock = FixedClock(Cell::new(Duration::from_secs(100)));
        let timer = PhaseTimer::start(&clock, Duration::from_secs(3));
        clock.sleep(Duration::from_millis(2500));
        assert!(!timer.is_done(&clock));
        assert_eq!(timer.remaining_seconds(&clock), 1);
        clock.sleep(Duration::from_millis(500));
        assert!(timer.is_done(&clock));
    }

    #[test]
    fn phases_render_as_kebab_case() {
        assert_eq!(Phase::EditingLayout.to_string(), "editing-layout");
        assert_eq!(Phase::GetReady.to_string(), "get-ready");
    }
}
