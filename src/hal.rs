//! The hardware the ranging core talks to.
//!
//! The core never touches a GPIO chip directly; it drives a [`TriggerPin`],
//! samples an [`EchoPin`] and reads a [`MonotonicClock`]. The [`cdev`](crate::cdev)
//! module provides the Linux implementations.

use crate::HcSr04Error;

/// Digital output driving the sensor's TRIG input.
pub trait TriggerPin {
    fn set(&mut self, high: bool) -> Result<(), HcSr04Error>;
}

/// Digital input wired to the sensor's ECHO output.
pub trait EchoPin {
    /// Current logical level, `true` when high.
    fn level(&mut self) -> Result<bool, HcSr04Error>;
}

/// Nanosecond timestamps that never go backwards with wall-clock changes.
pub trait MonotonicClock {
    fn now_ns(&self) -> i64;
}
