//! Round countdown and delayed-action slot for codeduel rooms.
//!
//! A room owns exactly one [`RoundClock`] and one [`Deadline`]. Both are
//! single slots: starting the clock or setting the deadline replaces
//! whatever was armed before, so a room can never have two countdowns
//! racing each other.
//!
//! # Idle clocks pend forever
//!
//! When nothing is armed, [`RoundClock::wait_for_tick`] and
//! [`Deadline::wait`] never resolve. That is what lets them sit inside a
//! room actor's `tokio::select!` loop unconditionally:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = inbox.recv() => { /* handle commands */ }
//!         tick = clock.wait_for_tick() => { /* timerUpdate, maybe end round */ }
//!         () = advance.wait() => { /* next round after a solve */ }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Smallest period a clock will accept.
const MIN_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// A countdown step, returned by [`RoundClock::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Ticks left after this one. Zero means the round ran out.
    pub remaining: u64,
    /// `true` on the tick that reached zero. The clock is idle afterwards.
    pub expired: bool,
    /// Which countdown produced this tick (increments on every start).
    pub run: u64,
}

// ---------------------------------------------------------------------------
// RoundClock
// ---------------------------------------------------------------------------

/// Fixed-cadence countdown for one round.
pub struct RoundClock {
    period: Duration,
    remaining: u64,
    /// When the next tick should fire. `None` while idle.
    next_tick: Option<Instant>,
    run: u64,
}

impl RoundClock {
    /// Creates an idle clock that ticks every `period` once started.
    pub fn new(period: Duration) -> Self {
        let period = if period < MIN_PERIOD {
            warn!(?period, "round clock period too small, clamping");
            MIN_PERIOD
        } else {
            period
        };
        Self {
            period,
            remaining: 0,
            next_tick: None,
            run: 0,
        }
    }

    /// Starts a countdown of `ticks` periods, cancelling any running one.
    pub fn start(&mut self, ticks: u64) {
        if self.next_tick.is_some() {
            debug!(run = self.run, remaining = self.remaining, "replacing running countdown");
        }
        self.run += 1;
        self.remaining = ticks;
        self.next_tick = Some(Instant::now() + self.period);
        debug!(run = self.run, ticks, "countdown started");
    }

    /// Stops the countdown. Idempotent.
    pub fn cancel(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(run = self.run, remaining = self.remaining, "countdown cancelled");
        }
    }

    /// Waits for the next tick of the running countdown.
    ///
    /// Pends forever while the clock is idle.
    ///
    /// ## Cancel safety
    ///
    /// Inside `select!` this future is dropped whenever another branch
    /// wins. All state changes happen after the sleep completes, with no
    /// await in between, so a dropped wait leaves the countdown exactly
    /// where it was and the next call sleeps until the same instant.
    pub async fn wait_for_tick(&mut self) -> ClockTick {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        self.remaining = self.remaining.saturating_sub(1);
        let expired = self.remaining == 0;
        // Keep the original cadence; a late wakeup doesn't shift later ticks.
        self.next_tick = if expired { None } else { Some(next + self.period) };

        trace!(run = self.run, remaining = self.remaining, expired, "clock tick");

        ClockTick {
            remaining: self.remaining,
            expired,
            run: self.run,
        }
    }

    /// Whether a countdown is armed.
    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Ticks left in the current (or last) countdown.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of countdowns started so far.
    pub fn runs(&self) -> u64 {
        self.run
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A one-shot delayed action slot.
///
/// Used for the pause between a solved round and the next one. Setting
/// it again moves the deadline; clearing it drops the pending action.
#[derive(Debug, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Creates an unarmed deadline.
    pub fn new() -> Self {
        Self { at: None }
    }

    /// Arms the deadline `after` from now, replacing any pending one.
    pub fn set(&mut self, after: Duration) {
        self.at = Some(Instant::now() + after);
    }

    /// Disarms the deadline. Idempotent.
    pub fn clear(&mut self) {
        self.at = None;
    }

    /// Whether the deadline is armed.
    pub fn is_set(&self) -> bool {
        self.at.is_some()
    }

    /// Waits for the deadline, then disarms it.
    ///
    /// Pends forever while unarmed, so an idle deadline never wins a
    /// `select!`. Dropping the future before it fires keeps the deadline
    /// armed for the next call.
    pub async fn wait(&mut self) {
        let Some(at) = self.at else {
            std::future::pending::<()>().await;
            unreachable!()
        };
        time::sleep_until(at).await;
        self.at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock_is_idle() {
        let clock = RoundClock::new(Duration::from_secs(1));
        assert!(!clock.is_running());
        assert_eq!(clock.runs(), 0);
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let clock = RoundClock::new(Duration::ZERO);
        assert_eq!(clock.period(), MIN_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let mut clock = RoundClock::new(Duration::from_secs(1));
        clock.start(3);
        clock.cancel();
        clock.cancel();
        assert!(!clock.is_running());
    }

    #[test]
    fn test_new_deadline_is_unarmed() {
        assert!(!Deadline::new().is_set());
    }
}
