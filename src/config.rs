//! Build-time configuration
//!
//! Fixed constants for the reference board plus the runtime
//! `DriverConfig` handed to `UartDriver::initialize`.
//!
//! Author: Moroya Sakamoto

use crate::task::TaskPriority;
use crate::timer::Timeout;

/// Console baud rate
pub const UART_BAUD: u32 = 9600;

/// Capacity of each UART byte queue (RX and TX)
pub const UART_BUFFER_SIZE: usize = 128;

/// Bounded wait for a single byte to enter a full TX queue
pub const UART_WRITE_TIMEOUT_TICKS: u32 = 0x10;

/// Scheduler tick frequency
pub const TICK_RATE_HZ: u32 = 1000;

/// LED toggle period
pub const BLINK_PERIOD_MS: u32 = 100;

/// Echo task priority
pub const ECHO_TASK_PRIORITY: TaskPriority = TaskPriority::LOW;

/// Blink task priority (runs above echo)
pub const BLINK_TASK_PRIORITY: TaskPriority = TaskPriority::NORMAL;

/// Convert milliseconds to scheduler ticks, rounding down
pub const fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * TICK_RATE_HZ as u64) / 1000) as u32
}

/// Runtime UART driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Line speed in bits per second
    pub baud_rate: u32,
    /// How long `read` waits for each byte
    pub read_timeout: Timeout,
    /// How long `write` waits for room in the TX queue, per byte
    pub write_timeout: Timeout,
}

impl DriverConfig {
    /// Reference configuration at the given baud rate
    pub const fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            read_timeout: Timeout::Forever,
            write_timeout: Timeout::Ticks(UART_WRITE_TIMEOUT_TICKS),
        }
    }

    pub const fn with_read_timeout(mut self, timeout: Timeout) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub const fn with_write_timeout(mut self, timeout: Timeout) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new(UART_BAUD)
    }
}
