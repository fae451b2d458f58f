#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hcsr04_driver::hal::TriggerPin;
use hcsr04_driver::{Edge, EdgeTimer, HcSr04Error, MeasurementSession};

/// What the fake sensor answers with after each trigger pulse.
#[derive(Debug, Clone)]
pub enum Echo {
    /// Rising edge at the first timestamp, falling at the second.
    Pulse(i64, i64),
    /// Echo goes high and never comes back.
    StuckHigh,
    /// Sensor disconnected; no edges at all.
    Silent,
    /// Arbitrary edge sequence.
    Edges(Vec<(Edge, i64)>),
}

/// Trigger line wired to a simulated HC-SR04.
///
/// On each falling trigger edge that ends a high pulse, the next scripted
/// echo is played into the [`EdgeTimer`] synchronously, before the session
/// starts waiting, which exercises the "edge already arrived" path.
pub struct SimulatedSensor {
    timer: Arc<EdgeTimer>,
    script: Vec<Echo>,
    high: bool,
    pulses: Arc<AtomicUsize>,
}

impl SimulatedSensor {
    pub fn new(timer: Arc<EdgeTimer>, script: Vec<Echo>) -> Self {
        Self {
            timer,
            script,
            high: false,
            pulses: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pulse_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulses)
    }

    fn play(&mut self) {
        let echo = if self.script.is_empty() {
            Echo::Silent
        } else {
            self.script.remove(0)
        };
        match echo {
            Echo::Pulse(rise, fall) => {
                self.timer.on_edge(Edge::Rising, rise);
                self.timer.on_edge(Edge::Falling, fall);
            }
            Echo::StuckHigh => self.timer.on_edge(Edge::Rising, 0),
            Echo::Silent => {}
            Echo::Edges(edges) => {
                for (edge, at) in edges {
                    self.timer.on_edge(edge, at);
                }
            }
        }
    }
}

impl TriggerPin for SimulatedSensor {
    fn set(&mut self, high: bool) -> Result<(), HcSr04Error> {
        if self.high && !high {
            self.pulses.fetch_add(1, Ordering::SeqCst);
            self.play();
        }
        self.high = high;
        Ok(())
    }
}

pub fn session(script: Vec<Echo>) -> (MeasurementSession<SimulatedSensor>, Arc<AtomicUsize>) {
    let timer = Arc::new(EdgeTimer::new());
    let sensor = SimulatedSensor::new(Arc::clone(&timer), script);
    let pulses = sensor.pulse_counter();
    (MeasurementSession::new(sensor, timer), pulses)
}
