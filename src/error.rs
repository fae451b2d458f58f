use std::io;

/// Everything that can go wrong while bringing the sensor up or ranging with it.
///
/// The first three variants only happen at startup and are fatal to
/// [`HcSr04::open`](crate::HcSr04::open). The rest are reported per request
/// and leave the driver ready for the next one.
#[derive(thiserror::Error, Debug)]
pub enum HcSr04Error {
    /// A GPIO chip or line could not be acquired.
    #[error("no such device: {what}")]
    NoDevice {
        what: String,
        #[source]
        source: gpio_cdev::Error,
    },
    /// Configuring a line's direction failed, or the startup settings are unusable.
    #[error("failed to configure {what}: {reason}")]
    Config { what: String, reason: String },
    /// The echo line's edge events could not be subscribed to.
    #[error("could not subscribe to echo line edges: {0}")]
    InterruptRegistration(String),
    /// No complete echo pulse arrived within the echo timeout.
    #[error("timed out waiting for echo pulse")]
    Timeout,
    /// The computed distance fell outside the sensor's range.
    #[error("distance out of range: {0} cm")]
    OutOfRange(i64),
    /// The reading could not be delivered to the caller.
    #[error("failed to copy reading to caller: {0}")]
    CopyFault(#[source] io::Error),
    /// Driving the trigger line or reading the echo line failed mid-request.
    #[error("gpio i/o error: {0}")]
    Io(#[from] gpio_cdev::Error),
}

impl HcSr04Error {
    /// Platform errno a character device would hand back for this error.
    pub fn errno(&self) -> i32 {
        match self {
            HcSr04Error::NoDevice { .. } => libc::ENODEV,
            HcSr04Error::Config { .. } => libc::EINVAL,
            HcSr04Error::InterruptRegistration(_) => libc::EBUSY,
            HcSr04Error::Timeout => libc::ETIMEDOUT,
            HcSr04Error::OutOfRange(_) => libc::ERANGE,
            HcSr04Error::CopyFault(_) => libc::EFAULT,
            HcSr04Error::Io(_) => libc::EIO,
        }
    }

    /// Whether a later request could succeed without re-opening the device.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HcSr04Error::Timeout
                | HcSr04Error::OutOfRange(_)
                | HcSr04Error::CopyFault(_)
                | HcSr04Error::Io(_)
        )
    }
}

impl From<HcSr04Error> for io::Error {
    fn from(err: HcSr04Error) -> Self {
        io::Error::from_raw_os_error(err.errno())
    }
}
