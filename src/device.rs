use std::sync::Arc;

use gpio_cdev::{Chip, EventRequestFlags, LineRequestFlags};
use tracing::{info, instrument};

use crate::cdev::{CdevTrigger, EchoListener, KernelClock};
use crate::edge_timer::EdgeTimer;
use crate::reader::DistanceFile;
use crate::session::{Measurement, MeasurementSession};
use crate::{HcSr04Error, Settings};

/// An HC-SR04 wired to a Linux GPIO chip.
///
/// Owns the trigger line, the echo edge subscription and the thread that
/// services it. Dropping the sensor stops the listener before the lines
/// are released.
pub struct HcSr04 {
    listener: EchoListener,
    session: MeasurementSession<CdevTrigger>,
}

impl HcSr04 {
    /// Acquire both lines and start listening for echo edges.
    ///
    /// On failure everything acquired so far is released again.
    #[instrument(err, skip(settings), fields(chip = %settings.chip.display()))]
    pub fn open(settings: &Settings) -> Result<Self, HcSr04Error> {
        settings.validate()?;

        let mut chip = Chip::new(&settings.chip).map_err(|source| HcSr04Error::NoDevice {
            what: format!("gpio chip {}", settings.chip.display()),
            source,
        })?;

        let trigger_line = chip
            .get_line(settings.trigger_offset)
            .map_err(|source| HcSr04Error::NoDevice {
                what: format!("trigger line {}", settings.trigger_offset),
                source,
            })?;
        let echo_line = chip
            .get_line(settings.echo_offset)
            .map_err(|source| HcSr04Error::NoDevice {
                what: format!("echo line {}", settings.echo_offset),
                source,
            })?;

        let trigger = trigger_line
            .request(LineRequestFlags::OUTPUT, 0, &format!("{}-trigger", settings.consumer))
            .map_err(|e| HcSr04Error::Config {
                what: format!("trigger line {} as output", settings.trigger_offset),
                reason: e.to_string(),
            })?;

        let events = echo_line
            .events(
                LineRequestFlags::INPUT,
                EventRequestFlags::BOTH_EDGES,
                &format!("{}-echo", settings.consumer),
            )
            .map_err(|e| HcSr04Error::InterruptRegistration(e.to_string()))?;

        let timer = Arc::new(EdgeTimer::new());
        let listener = EchoListener::spawn(events, Arc::clone(&timer), settings.poll_interval())?;
        let session =
            MeasurementSession::new(CdevTrigger::new(trigger), timer).with_clock(KernelClock);

        info!(
            trigger = settings.trigger_offset,
            echo = settings.echo_offset,
            "driver initialized"
        );
        Ok(Self { listener, session })
    }

    /// Perform one ranging.
    pub fn measure(&self) -> Result<Measurement, HcSr04Error> {
        self.session.measure()
    }

    /// Open a read handle yielding one `"<n>cm\n"` line per open.
    pub fn file(&self) -> DistanceFile<'_, CdevTrigger> {
        DistanceFile::new(&self.session)
    }

    pub fn session(&self) -> &MeasurementSession<CdevTrigger> {
        &self.session
    }
}

impl Drop for HcSr04 {
    fn drop(&mut self) {
        self.listener.stop();
        info!("driver removed");
    }
}
