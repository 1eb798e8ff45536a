//! Echo task — console acceptance loop
//!
//! Prints a banner once, then sends every received byte straight back.
//! `step`/`run` block on stdin and suit a preemptive port; as a
//! `Runnable` it polls instead, so it can share the cooperative kernel
//! with the blink task.
//!
//! Author: Moroya Sakamoto

use embedded_io::Write as _;
use log::debug;

use crate::console::Console;
use crate::error::Result;
use crate::task::Runnable;
use crate::uart::SerialStream;

pub const BANNER: &[u8] = b"UART echo started.\n";

/// Bytes echoed per polled activation
const POLL_CHUNK: usize = 16;

pub struct EchoTask<'s, S: ?Sized> {
    console: Console<'s, S>,
    started: bool,
    echoed: u32,
}

impl<'s, S: SerialStream + ?Sized> EchoTask<'s, S> {
    pub const fn new(console: Console<'s, S>) -> Self {
        Self {
            console,
            started: false,
            echoed: 0,
        }
    }

    /// Send the banner if it has not gone out yet
    pub fn start(&mut self) -> Result<()> {
        if !self.started {
            self.console.stdout().write_all(BANNER)?;
            self.started = true;
        }
        Ok(())
    }

    /// Wait for one byte and echo it
    pub fn step(&mut self) -> Result<u8> {
        self.start()?;
        let byte = self.console.getchar()?;
        self.console.putchar(byte)?;
        self.echoed = self.echoed.wrapping_add(1);
        Ok(byte)
    }

    /// Echo forever
    pub fn run(mut self) -> ! {
        loop {
            if let Err(e) = self.step() {
                debug!("echo: {}", e);
            }
        }
    }

    /// Echo whatever has arrived, without waiting for more
    pub fn poll(&mut self) -> Result<usize> {
        self.start()?;
        let mut buf = [0u8; POLL_CHUNK];
        let n = self.console.read_available(&mut buf);
        if n > 0 {
            self.console.stdout().write_all(&buf[..n])?;
            self.echoed = self.echoed.wrapping_add(n as u32);
        }
        Ok(n)
    }

    /// Bytes echoed so far
    pub fn echoed(&self) -> u32 {
        self.echoed
    }

    pub fn console(&self) -> Console<'s, S> {
        self.console
    }
}

impl<S: SerialStream + ?Sized> Runnable for EchoTask<'_, S> {
    fn run(&mut self, _now: u32) {
        if let Err(e) = self.poll() {
            debug!("echo: {}", e);
        }
    }
}
