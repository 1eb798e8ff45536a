//! ALICE-UART — interrupt-driven console for ALICE-RTOS
//!
//! Byte streams between an interrupt handler and scheduled tasks:
//! - Two lock-free SPSC byte queues (RX: ISR → task, TX: task → ISR)
//! - Blocking `read`/`write` with explicit timeouts, O(1) never-blocking ISR
//! - TX-empty interrupt armed on demand, disarmed when the queue drains
//! - stdin/stdout/stderr adapter with `embedded-io` and `core::fmt` sinks
//! - Static interrupt dispatch table, no weak-symbol overrides
//! - Polled fallback driver over the same register boundary
//! - No heap, no allocation
//!
//! Author: Moroya Sakamoto

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod error;
pub mod timer;
pub mod port;
pub mod queue;
pub mod hw;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod uart;
pub mod polled;
pub mod irq;
pub mod console;
pub mod task;
pub mod scheduler;
pub mod kernel;
pub mod blink;
pub mod echo;

pub use config::DriverConfig;
pub use error::{Error, Result};
pub use timer::{SysTimer, Timeout};
pub use port::{Port, TickPort};
#[cfg(any(test, feature = "std"))]
pub use port::HostPort;
pub use queue::{ByteQueue, CancelToken};
pub use hw::{Interrupts, LineConfig, SerialRegisters};
#[cfg(any(test, feature = "std"))]
pub use sim::{SimLine, SimSerial};
pub use uart::{IsrOutcome, SerialStream, UartDriver};
pub use polled::PolledUart;
pub use irq::{InterruptHandler, InterruptTable};
pub use console::{Console, Stream};
pub use task::{Runnable, Task, TaskPriority, TaskState};
pub use scheduler::Scheduler;
pub use kernel::Kernel;
pub use blink::{BlinkTask, Led};
pub use echo::EchoTask;
