//! Polled UART driver
//!
//! The no-interrupt build of the console: no queues, no ISR. `read` spins
//! on RX_NOT_EMPTY for every byte; `write` feeds the data register and
//! waits for TX_COMPLETE before the next one. Useful before the kernel
//! is up, or on parts where the UART vector is not wired.
//!
//! Author: Moroya Sakamoto

use core::cell::RefCell;

use critical_section::Mutex;
use log::info;

use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::hw::{Interrupts, LineConfig, SerialRegisters};
use crate::port::Port;
use crate::timer::{Deadline, Timeout};
use crate::uart::{Gate, SerialStream};

/// Busy-waiting UART driver over the same register boundary
pub struct PolledUart<H, P> {
    hw: Mutex<RefCell<H>>,
    port: P,
    reader: Gate,
    writer: Gate,
    config: DriverConfig,
}

impl<H: SerialRegisters, P: Port> PolledUart<H, P> {
    /// Configure the line as 8-N-1 with every UART interrupt masked
    pub fn initialize(mut hw: H, port: P, config: DriverConfig) -> Result<Self> {
        if config.baud_rate == 0 {
            return Err(Error::InvalidBaudRate(config.baud_rate));
        }

        hw.configure(&LineConfig::eight_n_one(config.baud_rate));
        hw.disable_interrupts(Interrupts::all());
        hw.set_enabled(true);

        info!("uart: {} baud 8N1, polled", config.baud_rate);

        Ok(Self {
            hw: Mutex::new(RefCell::new(hw)),
            port,
            reader: Gate::new(),
            writer: Gate::new(),
            config,
        })
    }

    /// Read up to `buf.len()` bytes straight from the data register.
    ///
    /// Same timeout policy as the interrupt driver: a short `Ok(n)` once
    /// some bytes arrived, `Err(Timeout)` if none did.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let _turn = self.reader.enter(&self.port, self.config.read_timeout)?;
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.poll_until(self.config.read_timeout, Self::take_byte) {
                Ok(byte) => *slot = byte,
                Err(Error::Timeout) if i > 0 => return Ok(i),
                Err(e) => return Err(e),
            }
        }
        Ok(buf.len())
    }

    /// Copy out bytes the receiver already holds
    pub fn try_read(&self, buf: &mut [u8]) -> usize {
        let Some(_turn) = self.reader.try_enter() else {
            return 0;
        };
        let mut n = 0;
        for slot in buf.iter_mut() {
            match critical_section::with(|cs| Self::take_byte(&mut self.hw.borrow_ref_mut(cs))) {
                Some(byte) => {
                    *slot = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Send bytes one at a time, each fully shifted out before the next.
    ///
    /// A byte that cannot be started within `write_timeout` ends the
    /// write: `Ok(n)` if some bytes went out, otherwise `Err(Timeout)`.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let _turn = self.writer.enter(&self.port, Timeout::Forever)?;
        for (i, &byte) in buf.iter().enumerate() {
            let sent = self.poll_until(self.config.write_timeout, |hw| {
                hw.status().contains(Interrupts::TX_EMPTY).then(|| hw.write_data(byte))
            });
            if let Err(e) = sent {
                return if i == 0 { Err(e) } else { Ok(i) };
            }
            if self.wait_tx_complete(self.config.write_timeout).is_err() {
                return Ok(i + 1);
            }
        }
        Ok(buf.len())
    }

    /// Wait until the transmitter is idle
    pub fn flush(&self, timeout: Timeout) -> Result<()> {
        self.wait_tx_complete(timeout)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn wait_tx_complete(&self, timeout: Timeout) -> Result<()> {
        self.poll_until(timeout, |hw| hw.status().contains(Interrupts::TX_COMPLETE).then_some(()))
    }

    fn take_byte(hw: &mut H) -> Option<u8> {
        hw.status()
            .contains(Interrupts::RX_NOT_EMPTY)
            .then(|| hw.read_data())
    }

    /// Retry `f` against the registers until it yields or `timeout` passes
    fn poll_until<T>(&self, timeout: Timeout, mut f: impl FnMut(&mut H) -> Option<T>) -> Result<T> {
        let deadline = Deadline::new(self.port.now(), timeout);
        loop {
            if let Some(value) = critical_section::with(|cs| f(&mut self.hw.borrow_ref_mut(cs))) {
                return Ok(value);
            }
            if deadline.expired(self.port.now()) {
                return Err(Error::Timeout);
            }
            self.port.yield_now();
        }
    }
}

impl<H: SerialRegisters, P: Port> SerialStream for PolledUart<H, P> {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        PolledUart::read(self, buf)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        PolledUart::write(self, buf)
    }

    fn try_read(&self, buf: &mut [u8]) -> usize {
        PolledUart::try_read(self, buf)
    }

    fn flush(&self) -> Result<()> {
        PolledUart::flush(self, Timeout::Forever)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Console;
    use crate::echo::{EchoTask, BANNER};
    use crate::port::HostPort;
    use crate::sim::SimLine;
    use std::vec::Vec;

    fn polled(line: &SimLine, config: DriverConfig) -> PolledUart<crate::sim::SimSerial<'_>, HostPort> {
        PolledUart::initialize(line.serial(), HostPort::new(), config).unwrap()
    }

    fn wire(line: &SimLine) -> Vec<u8> {
        let mut out = [0u8; 256];
        let n = line.drain_transmitted(&mut out);
        out[..n].to_vec()
    }

    /// Register block whose transmitter never frees up and receiver never fills
    struct Stuck;

    impl SerialRegisters for Stuck {
        fn configure(&mut self, _config: &LineConfig) {}
        fn set_enabled(&mut self, _enabled: bool) {}
        fn status(&self) -> Interrupts {
            Interrupts::empty()
        }
        fn read_data(&mut self) -> u8 {
            0
        }
        fn write_data(&mut self, _byte: u8) {}
        fn enable_interrupts(&mut self, _which: Interrupts) {}
        fn disable_interrupts(&mut self, _which: Interrupts) {}
        fn enabled_interrupts(&self) -> Interrupts {
            Interrupts::empty()
        }
    }

    #[test]
    fn test_initialize_masks_interrupts() {
        let line = SimLine::new();
        let uart = polled(&line, DriverConfig::new(115_200));
        assert!(line.is_enabled());
        assert_eq!(line.baud_rate(), 115_200);
        assert_eq!(line.interrupts_enabled(), Interrupts::empty());
        assert_eq!(uart.config().baud_rate, 115_200);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let line = SimLine::new();
        let result = PolledUart::initialize(line.serial(), HostPort::new(), DriverConfig::new(0));
        assert!(matches!(result, Err(Error::InvalidBaudRate(0))));
    }

    #[test]
    fn test_write_goes_straight_to_wire() {
        let line = SimLine::new();
        let uart = polled(&line, DriverConfig::default());
        assert_eq!(uart.write(b"OK\n"), Ok(3));
        assert_eq!(wire(&line), b"OK\n");
        assert_eq!(uart.flush(Timeout::NonBlocking), Ok(()));
    }

    #[test]
    fn test_read_from_data_register() {
        let line = SimLine::new();
        let uart = polled(&line, DriverConfig::default().with_read_timeout(Timeout::Ticks(5)));
        let mut buf = [0u8; 4];
        assert_eq!(uart.read(&mut buf), Err(Error::Timeout));

        line.inject(b"abc");
        assert_eq!(uart.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(line.incoming_len(), 0);
    }

    #[test]
    fn test_try_read_takes_what_is_there() {
        let line = SimLine::new();
        let uart = polled(&line, DriverConfig::default());
        let mut buf = [0u8; 8];
        assert_eq!(uart.try_read(&mut buf), 0);
        line.inject(b"xy");
        assert_eq!(uart.try_read(&mut buf), 2);
        assert_eq!(&buf[..2], b"xy");
    }

    #[test]
    fn test_stuck_transmitter_times_out() {
        let cfg = DriverConfig::default()
            .with_read_timeout(Timeout::NonBlocking)
            .with_write_timeout(Timeout::Ticks(2));
        let uart = PolledUart::initialize(Stuck, HostPort::new(), cfg).unwrap();
        assert_eq!(uart.write(b"x"), Err(Error::Timeout));
        assert_eq!(uart.read(&mut [0u8; 1]), Err(Error::Timeout));
        assert_eq!(uart.flush(Timeout::Ticks(2)), Err(Error::Timeout));
    }

    #[test]
    fn test_echo_over_polled_line() {
        let line = SimLine::new();
        let uart = polled(&line, DriverConfig::default());
        let mut echo = EchoTask::new(Console::new(&uart));
        line.inject(b"z");
        assert_eq!(echo.step(), Ok(b'z'));

        let mut expected = BANNER.to_vec();
        expected.push(b'z');
        assert_eq!(wire(&line), expected);
    }
}
