//! Error taxonomy
//!
//! Queue-level full/empty conditions are not errors: `try_push` reports
//! full as `false` and `try_pop` reports empty as `None`. Everything that
//! does escape to a caller is one of the variants below.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = core::result::Result<T, Error>;

/// newlib errno values, for the C-runtime facing edge of the console
pub mod errno {
    pub const EINTR: i32 = 4;
    pub const EBADF: i32 = 9;
    pub const ENOMEM: i32 = 12;
    pub const EBUSY: i32 = 16;
    pub const EINVAL: i32 = 22;
    pub const ETIMEDOUT: i32 = 116;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A blocking queue operation ran out of time
    #[error("timed out waiting on UART queue")]
    Timeout,
    /// A blocked read was released by `cancel_read`
    #[error("blocking read cancelled")]
    Cancelled,
    /// Stream identifier is not stdin/stdout/stderr, or not valid for the direction
    #[error("bad file descriptor {0}")]
    BadDescriptor(i32),
    /// Baud rate the line cannot be configured for
    #[error("invalid baud rate {0}")]
    InvalidBaudRate(u32),
    /// IRQ number outside the dispatch table
    #[error("irq {0} out of range")]
    IrqOutOfRange(usize),
    /// IRQ already has a handler
    #[error("irq {0} already registered")]
    IrqInUse(usize),
    /// Static task table is full
    #[error("task table full")]
    SchedulerFull,
}

impl Error {
    /// errno value a hosted C library would set for this error
    pub fn errno(&self) -> i32 {
        match self {
            Error::Timeout => errno::ETIMEDOUT,
            Error::Cancelled => errno::EINTR,
            Error::BadDescriptor(_) => errno::EBADF,
            Error::InvalidBaudRate(_) | Error::IrqOutOfRange(_) => errno::EINVAL,
            Error::IrqInUse(_) => errno::EBUSY,
            Error::SchedulerFull => errno::ENOMEM,
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            Error::Timeout => ErrorKind::TimedOut,
            Error::Cancelled => ErrorKind::Interrupted,
            Error::BadDescriptor(_) | Error::InvalidBaudRate(_) => ErrorKind::InvalidInput,
            Error::IrqOutOfRange(_) | Error::IrqInUse(_) => ErrorKind::Unsupported,
            Error::SchedulerFull => ErrorKind::OutOfMemory,
        }
    }
}
