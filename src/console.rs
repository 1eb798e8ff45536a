//! Console I/O — standard streams on top of the UART
//!
//! stdin reads from the driver, stdout and stderr write to it, and any
//! other descriptor is refused with `BadDescriptor`. Nothing is buffered
//! here: a byte is on its way to the wire as soon as `write` returns.
//!
//! Author: Moroya Sakamoto

use core::fmt;

use crate::error::{Error, Result};
use crate::uart::SerialStream;

pub const STDIN_FILENO: i32 = 0;
pub const STDOUT_FILENO: i32 = 1;
pub const STDERR_FILENO: i32 = 2;

/// The three standard streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Input,
    Output,
    Error,
}

impl Stream {
    pub fn from_fd(fd: i32) -> Result<Self> {
        match fd {
            STDIN_FILENO => Ok(Stream::Input),
            STDOUT_FILENO => Ok(Stream::Output),
            STDERR_FILENO => Ok(Stream::Error),
            _ => Err(Error::BadDescriptor(fd)),
        }
    }

    pub fn fd(&self) -> i32 {
        match self {
            Stream::Input => STDIN_FILENO,
            Stream::Output => STDOUT_FILENO,
            Stream::Error => STDERR_FILENO,
        }
    }
}

/// Descriptor-level console over a serial stream
pub struct Console<'s, S: ?Sized> {
    serial: &'s S,
}

impl<S: ?Sized> Clone for Console<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for Console<'_, S> {}

impl<'s, S: SerialStream + ?Sized> Console<'s, S> {
    pub const fn new(serial: &'s S) -> Self {
        Self { serial }
    }

    /// `read(2)`: only stdin is readable
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        match Stream::from_fd(fd)? {
            Stream::Input => self.serial.read(buf),
            _ => Err(Error::BadDescriptor(fd)),
        }
    }

    /// `write(2)`: stdout and stderr share the line
    pub fn write(&self, fd: i32, buf: &[u8]) -> Result<usize> {
        match Stream::from_fd(fd)? {
            Stream::Output | Stream::Error => self.serial.write(buf),
            Stream::Input => Err(Error::BadDescriptor(fd)),
        }
    }

    /// `isatty(3)`: every standard stream is the terminal
    pub fn isatty(&self, fd: i32) -> Result<bool> {
        Stream::from_fd(fd).map(|_| true)
    }

    /// stdin bytes that have already arrived, without blocking
    pub fn read_available(&self, buf: &mut [u8]) -> usize {
        self.serial.try_read(buf)
    }

    /// Blocking single-byte read from stdin
    pub fn getchar(&self) -> Result<u8> {
        let mut byte = [0u8; 1];
        match self.read(STDIN_FILENO, &mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(Error::Cancelled),
        }
    }

    /// Single-byte write to stdout
    pub fn putchar(&self, byte: u8) -> Result<()> {
        self.write(STDOUT_FILENO, &[byte]).map(|_| ())
    }

    pub fn stdin(&self) -> ConsoleIn<'s, S> {
        ConsoleIn { serial: self.serial }
    }

    pub fn stdout(&self) -> ConsoleOut<'s, S> {
        ConsoleOut { serial: self.serial, stream: Stream::Output }
    }

    pub fn stderr(&self) -> ConsoleOut<'s, S> {
        ConsoleOut { serial: self.serial, stream: Stream::Error }
    }
}

/// stdin handle
pub struct ConsoleIn<'s, S: ?Sized> {
    serial: &'s S,
}

/// stdout / stderr handle; also a `core::fmt::Write` sink for `write!`
pub struct ConsoleOut<'s, S: ?Sized> {
    serial: &'s S,
    stream: Stream,
}

impl<S: ?Sized> ConsoleOut<'_, S> {
    pub fn stream(&self) -> Stream {
        self.stream
    }
}

impl<S: ?Sized> embedded_io::ErrorType for ConsoleIn<'_, S> {
    type Error = Error;
}

impl<S: ?Sized> embedded_io::ErrorType for ConsoleOut<'_, S> {
    type Error = Error;
}

impl<S: SerialStream + ?Sized> embedded_io::Read for ConsoleIn<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.serial.read(buf)
    }
}

impl<S: SerialStream + ?Sized> embedded_io::Write for ConsoleOut<'_, S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.serial.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.serial.flush()
    }
}

impl<S: SerialStream + ?Sized> fmt::Write for ConsoleOut<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        embedded_io::Write::write_all(self, s.as_bytes()).map_err(|_| fmt::Error)
    }
}
