//! HC-SR04 ultrasonic ranging with interrupt-timed echo capture.
//!
//! A ranging pulses TRIG for 10 µs, then waits (without spinning) for the
//! ECHO line to go high and back low. Both edges are timestamped where they
//! are observed and handed to the waiting caller through an [`EdgeTimer`].
//! The pulse width converts to centimetres at 58 µs/cm.
//!
//! ```no_run
//! use hcsr04_driver::{HcSr04, Settings};
//!
//! let sensor = HcSr04::open(&Settings::default())?;
//! let reading = sensor.measure()?;
//! print!("{}", reading.format());
//! # Ok::<(), hcsr04_driver::HcSr04Error>(())
//! ```

pub mod cdev;
mod device;
pub mod edge_timer;
mod error;
pub mod hal;
pub mod reader;
pub mod session;
mod settings;

pub use device::HcSr04;
pub use edge_timer::{Edge, EdgeTimer, InterruptHandler, Ticket};
pub use error::HcSr04Error;
pub use reader::DistanceFile;
pub use session::{
    ECHO_TIMEOUT, MAX_DISTANCE_CM, Measurement, MeasurementSession, NS_PER_CM, SessionState,
    TRIGGER_PULSE, convert, validate,
};
pub use settings::Settings;
