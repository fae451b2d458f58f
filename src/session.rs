use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use spin_sleep::SpinSleeper;
use tracing::{debug, error, instrument, trace, warn};

use crate::HcSr04Error;
use crate::edge_timer::EdgeTimer;
use crate::hal::{MonotonicClock, TriggerPin};

/// Width of the TRIG pulse that starts a ranging burst.
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Longest the session waits for a complete echo pulse after triggering.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(50);

/// Echo width per centimetre of distance: round trip at ~343 m/s.
pub const NS_PER_CM: i64 = 58_000;

/// Farthest distance the sensor reports reliably.
pub const MAX_DISTANCE_CM: i64 = 400;

// Larger than the pulse, so the sleeper spins for its whole duration.
const PULSE_SPIN_ACCURACY_NS: u32 = 1_000_000;

/// Echo width in nanoseconds to whole centimetres, truncating.
pub fn convert(duration_ns: i64) -> i64 {
    duration_ns / NS_PER_CM
}

/// Accept `distance_cm` only inside `0..=MAX_DISTANCE_CM`.
pub fn validate(distance_cm: i64) -> Result<i64, HcSr04Error> {
    if (0..=MAX_DISTANCE_CM).contains(&distance_cm) {
        Ok(distance_cm)
    } else {
        Err(HcSr04Error::OutOfRange(distance_cm))
    }
}

/// A single completed ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Distance to the target (centimetres).
    pub distance_cm: i64,
    /// Measured echo pulse width (nanoseconds).
    pub duration_ns: i64,
}

impl Measurement {
    pub fn from_duration(duration_ns: i64) -> Self {
        Self {
            distance_cm: convert(duration_ns),
            duration_ns,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        validate(self.distance_cm).is_ok()
    }

    /// Text token handed to readers, e.g. `"200cm\n"`.
    pub fn format(&self) -> String {
        format!("{}cm\n", self.distance_cm)
    }
}

/// Where a request currently is in its trigger/wait/convert cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Triggered,
    Waiting,
    Ready,
    TimedOut,
    Completed,
    Rejected,
}

/// Runs one trigger, wait, convert and validate cycle per call.
///
/// The trigger line and the [`EdgeTimer`] are not duplicated per caller, so
/// the whole cycle runs with the trigger locked: concurrent callers queue up
/// behind the measurement in flight. The current [`SessionState`] lives in
/// its own cell and can be read at any point of the cycle.
pub struct MeasurementSession<T> {
    trigger: Mutex<T>,
    state: Mutex<SessionState>,
    timer: Arc<EdgeTimer>,
    clock: Option<Box<dyn MonotonicClock + Send + Sync>>,
    sleeper: SpinSleeper,
}

impl<T: TriggerPin> MeasurementSession<T> {
    pub fn new(trigger: T, timer: Arc<EdgeTimer>) -> Self {
        Self {
            trigger: Mutex::new(trigger),
            state: Mutex::new(SessionState::Idle),
            timer,
            clock: None,
            sleeper: SpinSleeper::new(PULSE_SPIN_ACCURACY_NS),
        }
    }

    /// Stamp each cycle with `clock` when arming, so echo edges timestamped
    /// before the cycle started are dropped. `clock` must be the clock the
    /// edge timestamps come from.
    pub fn with_clock(mut self, clock: impl MonotonicClock + Send + Sync + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// The timer this session waits on; echo edges must be fed into it.
    pub fn timer(&self) -> &Arc<EdgeTimer> {
        &self.timer
    }

    /// State of the request in flight, or the one the last request ended in.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn enter(&self, next: SessionState) {
        let mut state = self.state.lock();
        trace!(from = ?*state, to = ?next, "session state");
        *state = next;
    }

    /// Perform one complete ranging.
    ///
    /// Never retries: a [`Timeout`](HcSr04Error::Timeout) or
    /// [`OutOfRange`](HcSr04Error::OutOfRange) is returned as is and the
    /// next call starts from a clean cycle.
    #[instrument(level = "debug", skip(self))]
    pub fn measure(&self) -> Result<Measurement, HcSr04Error> {
        let mut trigger = self.trigger.lock();
        self.enter(SessionState::Idle);

        let not_before_ns = self.clock.as_ref().map_or(i64::MIN, |c| c.now_ns());
        let ticket = self.timer.arm_at(not_before_ns);
        if let Err(err) = self.pulse(&mut trigger) {
            self.enter(SessionState::Rejected);
            return Err(err);
        }
        self.enter(SessionState::Triggered);

        self.enter(SessionState::Waiting);
        let Some(duration_ns) = self.timer.wait(ticket, ECHO_TIMEOUT) else {
            self.enter(SessionState::TimedOut);
            warn!(timeout = ?ECHO_TIMEOUT, "no echo pulse");
            self.enter(SessionState::Rejected);
            return Err(HcSr04Error::Timeout);
        };
        self.enter(SessionState::Ready);

        let measurement = Measurement::from_duration(duration_ns);
        if let Err(err) = validate(measurement.distance_cm) {
            error!(
                distance_cm = measurement.distance_cm,
                duration_ns, "distance out of range"
            );
            self.enter(SessionState::Rejected);
            return Err(err);
        }

        debug!(distance_cm = measurement.distance_cm, duration_ns, "measured");
        self.enter(SessionState::Completed);
        Ok(measurement)
    }

    fn pulse(&self, trigger: &mut T) -> Result<(), HcSr04Error> {
        trigger.set(true)?;
        self.sleeper.sleep(TRIGGER_PULSE);
        trigger.set(false)
    }
}
