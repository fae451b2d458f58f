//! Linux GPIO character device backend.

use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gpio_cdev::{EventType, LineEventHandle, LineHandle};
use tracing::{debug, error, info, warn};

use crate::HcSr04Error;
use crate::edge_timer::{Edge, EdgeTimer};
use crate::hal::{MonotonicClock, TriggerPin};

/// TRIG output requested through `/dev/gpiochipN`.
pub struct CdevTrigger {
    handle: LineHandle,
}

impl CdevTrigger {
    pub fn new(handle: LineHandle) -> Self {
        Self { handle }
    }
}

impl TriggerPin for CdevTrigger {
    fn set(&mut self, high: bool) -> Result<(), HcSr04Error> {
        self.handle.set_value(u8::from(high))?;
        Ok(())
    }
}

/// `CLOCK_MONOTONIC`, the clock the kernel stamps GPIO line events with
/// (since Linux 5.7; older kernels use `CLOCK_REALTIME`, whose values are
/// always later, so no edge is ever dropped there).
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelClock;

impl MonotonicClock for KernelClock {
    fn now_ns(&self) -> i64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, exclusively borrowed timespec.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            // Cannot fail for CLOCK_MONOTONIC; accept every edge if it does.
            return i64::MIN;
        }
        (ts.tv_sec as i64)
            .saturating_mul(1_000_000_000)
            .saturating_add(ts.tv_nsec as i64)
    }
}

impl From<EventType> for Edge {
    fn from(event: EventType) -> Self {
        match event {
            EventType::RisingEdge => Edge::Rising,
            EventType::FallingEdge => Edge::Falling,
        }
    }
}

fn poll_with_timeout(fd: i32, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN | libc::POLLPRI,
        revents: 0,
    };

    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: `pollfd` is a single valid, exclusively borrowed entry.
    match unsafe { libc::poll(&mut pollfd, 1, timeout_ms) } {
        -1 => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(false)
            } else {
                Err(err)
            }
        }
        0 => Ok(false),
        _ => Ok(true),
    }
}

/// Background thread delivering echo edge events to an [`EdgeTimer`].
///
/// Each event carries the kernel's timestamp taken in the GPIO interrupt
/// handler, so scheduling latency of this thread does not skew the pulse
/// width. The thread wakes every `poll_interval` to check for shutdown.
pub struct EchoListener {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EchoListener {
    pub fn spawn(
        events: LineEventHandle,
        timer: Arc<EdgeTimer>,
        poll_interval: Duration,
    ) -> Result<Self, HcSr04Error> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new()
            .name("hcsr04-echo".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || listen(events, &timer, &stop, poll_interval)
            })
            .map_err(|e| HcSr04Error::InterruptRegistration(e.to_string()))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop delivering edges and release the echo line. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("echo listener panicked");
            }
        }
    }
}

impl Drop for EchoListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(
    mut events: LineEventHandle,
    timer: &EdgeTimer,
    stop: &AtomicBool,
    poll_interval: Duration,
) {
    info!(line = events.line().offset(), "echo listener started");
    let fd = events.as_raw_fd();

    while !stop.load(Ordering::Acquire) {
        match poll_with_timeout(fd, poll_interval) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                error!(error = %e, "polling echo line failed, listener exiting");
                break;
            }
        }

        match events.get_event() {
            Ok(event) => {
                let timestamp_ns = i64::try_from(event.timestamp()).unwrap_or(i64::MAX);
                timer.on_edge(event.event_type().into(), timestamp_ns);
            }
            Err(e) => warn!(error = %e, "dropped echo event"),
        }
    }

    debug!("echo listener stopped");
}
