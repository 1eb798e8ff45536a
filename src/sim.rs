//! Simulated serial line
//!
//! A software register block for host builds and tests. The far end of
//! the wire is two byte queues: `inject` plays a remote sender, and
//! `drain_transmitted` reads what the UART put on the line. Transmit is
//! instantaneous, so TX_EMPTY and TX_COMPLETE are always flagged.
//!
//! Author: Moroya Sakamoto

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::hw::{Interrupts, LineConfig, SerialRegisters};
use crate::queue::ByteQueue;

/// Bytes the line can hold in each direction
pub const SIM_WIRE_SIZE: usize = 256;

/// Shared state of the simulated line
pub struct SimLine {
    incoming: ByteQueue<SIM_WIRE_SIZE>,
    outgoing: ByteQueue<SIM_WIRE_SIZE>,
    enabled_irqs: AtomicU8,
    uart_enabled: AtomicBool,
    baud_rate: AtomicU32,
}

impl SimLine {
    pub const fn new() -> Self {
        Self {
            incoming: ByteQueue::new(),
            outgoing: ByteQueue::new(),
            enabled_irqs: AtomicU8::new(0),
            uart_enabled: AtomicBool::new(false),
            baud_rate: AtomicU32::new(0),
        }
    }

    /// Register handle for the driver
    pub fn serial(&self) -> SimSerial<'_> {
        SimSerial { line: self }
    }

    /// Remote end sends bytes; returns how many fit on the wire
    pub fn inject(&self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|&&b| self.incoming.try_push(b)).count()
    }

    /// Bytes sent but not yet picked up by the UART
    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    /// Collect transmitted bytes into `out`; returns the count
    pub fn drain_transmitted(&self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() {
            match self.outgoing.try_pop() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    pub fn interrupts_enabled(&self) -> Interrupts {
        Interrupts::from_bits_truncate(self.enabled_irqs.load(Ordering::Acquire))
    }

    pub fn is_enabled(&self) -> bool {
        self.uart_enabled.load(Ordering::Acquire)
    }

    /// Configured baud rate, 0 before `configure`
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate.load(Ordering::Acquire)
    }
}

impl Default for SimLine {
    fn default() -> Self {
        Self::new()
    }
}

/// `SerialRegisters` view of a `SimLine`
pub struct SimSerial<'l> {
    line: &'l SimLine,
}

impl SerialRegisters for SimSerial<'_> {
    fn configure(&mut self, config: &LineConfig) {
        self.line.baud_rate.store(config.baud_rate(), Ordering::Release);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.line.uart_enabled.store(enabled, Ordering::Release);
    }

    fn status(&self) -> Interrupts {
        if !self.line.is_enabled() {
            return Interrupts::empty();
        }
        let mut flagged = Interrupts::TX_EMPTY | Interrupts::TX_COMPLETE;
        if !self.line.incoming.is_empty() {
            flagged |= Interrupts::RX_NOT_EMPTY;
        }
        flagged
    }

    fn read_data(&mut self) -> u8 {
        self.line.incoming.try_pop().unwrap_or(0)
    }

    fn write_data(&mut self, byte: u8) {
        // A full wire loses the byte, like a disconnected receiver
        let _ = self.line.outgoing.try_push(byte);
    }

    fn enable_interrupts(&mut self, which: Interrupts) {
        self.line.enabled_irqs.fetch_or(which.bits(), Ordering::AcqRel);
    }

    fn disable_interrupts(&mut self, which: Interrupts) {
        self.line.enabled_irqs.fetch_and(!which.bits(), Ordering::AcqRel);
    }

    fn enabled_interrupts(&self) -> Interrupts {
        self.line.interrupts_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending_while_disabled() {
        let line = SimLine::new();
        let mut serial = line.serial();
        serial.enable_interrupts(Interrupts::all());
        line.inject(b"x");
        assert_eq!(serial.pending(), Interrupts::empty());
        serial.set_enabled(true);
        assert_eq!(serial.pending(), Interrupts::all());
    }

    #[test]
    fn test_pending_masked_by_enables() {
        let line = SimLine::new();
        let mut serial = line.serial();
        serial.set_enabled(true);
        serial.enable_interrupts(Interrupts::RX_NOT_EMPTY);
        assert_eq!(serial.pending(), Interrupts::empty());
        line.inject(b"a");
        assert_eq!(serial.pending(), Interrupts::RX_NOT_EMPTY);
        serial.disable_interrupts(Interrupts::RX_NOT_EMPTY);
        assert_eq!(serial.pending(), Interrupts::empty());
    }

    #[test]
    fn test_status_ignores_enables() {
        let line = SimLine::new();
        let mut serial = line.serial();
        serial.set_enabled(true);
        assert_eq!(serial.status(), Interrupts::TX_EMPTY | Interrupts::TX_COMPLETE);
        line.inject(b"a");
        assert!(serial.status().contains(Interrupts::RX_NOT_EMPTY));
        assert_eq!(serial.pending(), Interrupts::empty());
    }

    #[test]
    fn test_data_register_round_trip() {
        let line = SimLine::new();
        let mut serial = line.serial();
        line.inject(b"hi");
        assert_eq!(serial.read_data(), b'h');
        assert_eq!(serial.read_data(), b'i');
        serial.write_data(b'!');
        let mut out = [0u8; 4];
        assert_eq!(line.drain_transmitted(&mut out), 1);
        assert_eq!(out[0], b'!');
    }

    #[test]
    fn test_configure_records_baud() {
        let line = SimLine::new();
        let mut serial = line.serial();
        serial.configure(&LineConfig::eight_n_one(115_200));
        assert_eq!(line.baud_rate(), 115_200);
    }
}
