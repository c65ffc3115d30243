//! RTC error type

/// RTC operation errors
///
/// Every variant except `DeviceNotReady` is recoverable by retrying the
/// call. When any of these is returned, the instance lock has been
/// released and write protection is back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Value the hardware cannot represent, or an unsupported request
    InvalidArgument,
    /// Another transaction holds the instance lock
    Busy,
    /// A hardware flag did not reach the expected state in time
    Timeout,
    /// Clock subsystem unavailable during bring-up
    DeviceNotReady,
    /// Calendar registers kept changing between consecutive reads
    Inconsistent,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::Busy => write!(f, "RTC busy"),
            Self::Timeout => write!(f, "RTC flag timeout"),
            Self::DeviceNotReady => write!(f, "RTC clock not ready"),
            Self::Inconsistent => write!(f, "RTC registers never settled"),
        }
    }
}

impl core::error::Error for Error {}
