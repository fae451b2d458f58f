mod common;

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;

use common::{Echo, session};
use hcsr04_driver::{DistanceFile, HcSr04Error};

#[test]
fn first_read_measures_second_reports_eof() {
    let (session, pulses) = session(vec![Echo::Pulse(0, 11_600_000)]);
    let mut file = DistanceFile::new(&session);
    let mut buf = [0u8; 64];

    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"200cm\n");
    assert_eq!(file.offset(), 6);

    assert_eq!(file.read(&mut buf).unwrap(), 0);
    assert_eq!(pulses.load(Ordering::SeqCst), 1);
}

#[test]
fn read_after_eof_measures_again() {
    let (session, pulses) = session(vec![Echo::Pulse(0, 580_000), Echo::Pulse(0, 1_160_000)]);
    let mut file = DistanceFile::new(&session);
    let mut buf = [0u8; 16];

    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"10cm\n");
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"20cm\n");
    assert_eq!(pulses.load(Ordering::SeqCst), 2);
}

#[test]
fn short_buffer_truncates_token() {
    let (session, _) = session(vec![Echo::Pulse(0, 11_600_000)]);
    let mut file = DistanceFile::new(&session);
    let mut buf = [0u8; 3];

    assert_eq!(file.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf, b"200");
    assert_eq!(file.read(&mut buf).unwrap(), 0);
}

#[test]
fn errors_leave_offset_at_zero() {
    let (session, _) = session(vec![Echo::StuckHigh, Echo::Pulse(0, 5_800_000)]);
    let mut file = DistanceFile::new(&session);
    let mut buf = [0u8; 16];

    assert!(matches!(file.read(&mut buf), Err(HcSr04Error::Timeout)));
    assert_eq!(file.offset(), 0);
    let n = file.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"100cm\n");
}

struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_delivery_is_copy_fault() {
    let (session, _) = session(vec![Echo::Pulse(0, 11_600_000)]);
    let mut file = DistanceFile::new(&session);

    let err = file.read_to(&mut BrokenSink, 64).unwrap_err();
    assert!(matches!(err, HcSr04Error::CopyFault(_)));
    assert_eq!(err.errno(), libc::EFAULT);
    assert_eq!(file.offset(), 0);
}

#[test]
fn io_read_yields_one_line_per_open() {
    let (session, _) = session(vec![Echo::Pulse(0, 8_700_000)]);
    let mut line = String::new();

    DistanceFile::new(&session).read_to_string(&mut line).unwrap();
    assert_eq!(line, "150cm\n");
}

#[test]
fn io_read_maps_errors_to_os_codes() {
    let (session, _) = session(vec![Echo::Pulse(0, 30_000_000_000), Echo::Silent]);
    let mut file = DistanceFile::new(&session);
    let mut buf = [0u8; 16];

    let err = Read::read(&mut file, &mut buf).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ERANGE));
    let err = Read::read(&mut file, &mut buf).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ETIMEDOUT));
}
