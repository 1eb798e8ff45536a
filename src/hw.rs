//! Serial port register boundary
//!
//! One value implementing `SerialRegisters` stands for the peripheral's
//! register block. It is moved into the `UartDriver` at construction and
//! nothing else holds it, so register access outside the driver is not
//! expressible.
//!
//! Author: Moroya Sakamoto

use bitflags::bitflags;

bitflags! {
    /// UART interrupt sources
    ///
    /// Used as the interrupt-enable mask, as the raw line status a
    /// `status()` read reports, and as the `pending()` intersection of the
    /// two.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u8 {
        /// Receive data register holds a byte (RXNE)
        const RX_NOT_EMPTY = 1 << 0;
        /// Transmit data register can take a byte (TXE)
        const TX_EMPTY = 1 << 1;
        /// Last byte has fully left the shift register (TC)
        const TX_COMPLETE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordLength {
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
}

/// Line parameters — the fixed 8-N-1 profile, RX and TX enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    baud_rate: u32,
}

impl LineConfig {
    pub const fn eight_n_one(baud_rate: u32) -> Self {
        Self { baud_rate }
    }

    pub const fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub const fn word_length(&self) -> WordLength {
        WordLength::Eight
    }

    pub const fn stop_bits(&self) -> StopBits {
        StopBits::One
    }

    pub const fn parity(&self) -> Parity {
        Parity::None
    }

    pub const fn flow_control(&self) -> FlowControl {
        FlowControl::None
    }
}

/// Register-level access to one UART
pub trait SerialRegisters: Send {
    /// Program baud rate, framing and mode
    fn configure(&mut self, config: &LineConfig);

    /// Peripheral enable (UE)
    fn set_enabled(&mut self, enabled: bool);

    /// Line status flags, regardless of the enable mask
    fn status(&self) -> Interrupts;

    /// Events that are both flagged and enabled
    fn pending(&self) -> Interrupts {
        self.status() & self.enabled_interrupts()
    }

    /// Read the data register (clears RX_NOT_EMPTY)
    fn read_data(&mut self) -> u8;

    /// Write the data register (starts transmission)
    fn write_data(&mut self, byte: u8);

    fn enable_interrupts(&mut self, which: Interrupts);

    fn disable_interrupts(&mut self, which: Interrupts);

    /// Current interrupt-enable mask
    fn enabled_interrupts(&self) -> Interrupts;
}
