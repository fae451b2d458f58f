//! Character-device style read access to the sensor.

use std::io::{self, Read, Write};

use crate::HcSr04Error;
use crate::hal::TriggerPin;
use crate::session::MeasurementSession;

/// One open handle on the sensor.
///
/// A read at offset zero performs a measurement and returns the formatted
/// token. The read after that reports end of stream and rewinds, so tools
/// like `cat` see a single line per open and a fresh reading next time.
pub struct DistanceFile<'a, T> {
    session: &'a MeasurementSession<T>,
    offset: u64,
}

impl<'a, T: TriggerPin> DistanceFile<'a, T> {
    pub fn new(session: &'a MeasurementSession<T>) -> Self {
        Self { session, offset: 0 }
    }

    /// Bytes delivered since the last rewind.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Measure and copy at most `buf.len()` bytes of the token into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, HcSr04Error> {
        let max_len = buf.len();
        let mut cursor = io::Cursor::new(buf);
        self.read_to(&mut cursor, max_len)
    }

    /// Like [`read`](Self::read), delivering into any writer.
    ///
    /// A failing writer is reported as [`HcSr04Error::CopyFault`] and the
    /// offset is left untouched.
    pub fn read_to<W: Write>(
        &mut self,
        out: &mut W,
        max_len: usize,
    ) -> Result<usize, HcSr04Error> {
        if self.offset > 0 {
            self.offset = 0;
            return Ok(0);
        }

        let token = self.session.measure()?.format();
        let to_copy = max_len.min(token.len());
        out.write_all(&token.as_bytes()[..to_copy])
            .map_err(HcSr04Error::CopyFault)?;

        self.offset += to_copy as u64;
        Ok(to_copy)
    }
}

impl<T: TriggerPin> Read for DistanceFile<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        DistanceFile::read(self, buf).map_err(io::Error::from)
    }
}
