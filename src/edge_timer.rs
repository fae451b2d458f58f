//! Echo pulse timing.
//!
//! [`EdgeTimer`] turns the two edges of one echo pulse into a single
//! duration and hands it to exactly one waiter. The handoff is a
//! single-producer/single-consumer slot guarded by a mutex and a condvar:
//! the producer publishes the duration and notifies under the same lock the
//! consumer re-checks after every wake, so a wakeup can neither be lost nor
//! mistaken for readiness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::HcSr04Error;
use crate::hal::{EchoPin, MonotonicClock};

/// Direction of a transition on the echo line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    /// The edge that leaves the line at `high`.
    pub fn from_level(high: bool) -> Self {
        if high { Edge::Rising } else { Edge::Falling }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No measurement in flight; edges are dropped.
    Idle,
    /// Trigger about to fire, waiting for the echo to rise.
    Armed,
    /// Echo is high since `start_ns`.
    High { start_ns: i64 },
    /// Pulse complete, duration not yet consumed.
    Ready { duration_ns: i64 },
}

#[derive(Debug)]
struct PulseState {
    phase: Phase,
    cycle: u64,
    not_before_ns: i64,
    published: u64,
}

/// Proof that a cycle was armed. Consumed by [`EdgeTimer::wait`].
#[must_use = "an armed cycle must be waited on"]
#[derive(Debug)]
pub struct Ticket {
    cycle: u64,
}

impl Ticket {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// Shared pulse timing state between the echo edge source and the
/// measurement session.
#[derive(Debug)]
pub struct EdgeTimer {
    state: Mutex<PulseState>,
    ready: Condvar,
}

impl Default for EdgeTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeTimer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PulseState {
                phase: Phase::Idle,
                cycle: 0,
                not_before_ns: i64::MIN,
                published: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Start a new cycle, discarding anything left over from the previous one.
    ///
    /// Must be called before the trigger pulse so that an echo which starts
    /// immediately is not missed.
    pub fn arm(&self) -> Ticket {
        self.arm_at(i64::MIN)
    }

    /// Like [`arm`](Self::arm), additionally dropping edges timestamped
    /// before `not_before_ns`.
    ///
    /// Edge sources that queue events (such as the gpio-cdev listener) may
    /// still deliver edges from an earlier cycle after the new one is armed.
    pub fn arm_at(&self, not_before_ns: i64) -> Ticket {
        let mut state = self.state.lock();
        state.cycle += 1;
        state.phase = Phase::Armed;
        state.not_before_ns = not_before_ns;
        trace!(cycle = state.cycle, not_before_ns, "edge timer armed");
        Ticket { cycle: state.cycle }
    }

    /// Record an echo transition observed at `timestamp_ns`.
    ///
    /// This is the interrupt-side entry point. It never blocks beyond the
    /// state lock, which the waiting side only holds for a few assignments.
    pub fn on_edge(&self, edge: Edge, timestamp_ns: i64) {
        let mut state = self.state.lock();
        if timestamp_ns < state.not_before_ns {
            return;
        }
        match (state.phase, edge) {
            (Phase::Armed | Phase::High { .. }, Edge::Rising) => {
                state.phase = Phase::High {
                    start_ns: timestamp_ns,
                };
            }
            (Phase::High { start_ns }, Edge::Falling) => {
                state.phase = Phase::Ready {
                    duration_ns: timestamp_ns.saturating_sub(start_ns),
                };
                state.published += 1;
                self.ready.notify_one();
            }
            // Spurious: idle line, falling edge without a rise, or a pulse
            // already published for this cycle.
            _ => {}
        }
    }

    /// Block until the pulse for `ticket` is complete or `timeout` elapses.
    ///
    /// Returns the pulse width in nanoseconds. On timeout the cycle is
    /// disarmed, so an echo edge arriving late cannot leave the timer ready.
    pub fn wait(&self, ticket: Ticket, timeout: Duration) -> Option<i64> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let mut timed_out = false;
        loop {
            if state.cycle != ticket.cycle {
                return None;
            }
            if let Phase::Ready { duration_ns } = state.phase {
                state.phase = Phase::Idle;
                return Some(duration_ns);
            }
            if timed_out {
                state.phase = Phase::Idle;
                return None;
            }
            timed_out = self.ready.wait_until(&mut state, deadline).timed_out();
        }
    }

    /// Whether a completed pulse is waiting to be consumed.
    pub fn is_ready(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Ready { .. })
    }

    /// Total readiness notifications since construction.
    pub fn pulses_published(&self) -> u64 {
        self.state.lock().published
    }
}

/// Edge interrupt service routine for platforms that deliver a bare
/// "echo changed" notification.
///
/// Each call samples the echo level and the clock and forwards the edge,
/// the same way a kernel handler registered on both edges would.
pub struct InterruptHandler<P, C> {
    timer: Arc<EdgeTimer>,
    echo: P,
    clock: C,
}

impl<P: EchoPin, C: MonotonicClock> InterruptHandler<P, C> {
    pub fn new(timer: Arc<EdgeTimer>, echo: P, clock: C) -> Self {
        Self { timer, echo, clock }
    }

    pub fn fire(&mut self) -> Result<(), HcSr04Error> {
        let high = self.echo.level()?;
        let now = self.clock.now_ns();
        self.timer.on_edge(Edge::from_level(high), now);
        Ok(())
    }
}
