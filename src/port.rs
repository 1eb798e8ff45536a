//! Scheduler port — the only scheduler surface the UART driver consumes
//!
//! Blocking queue operations need a clock and a way to give up the CPU;
//! the interrupt handler needs a way to ask for a context switch when it
//! has made a waiting task runnable. Everything else about scheduling
//! stays on the other side of this trait.
//!
//! Author: Moroya Sakamoto

use core::sync::atomic::{AtomicBool, Ordering};

use crate::timer::SysTimer;

pub trait Port: Sync {
    /// Current scheduler tick
    fn now(&self) -> u32;

    /// Give up the processor from task context
    fn yield_now(&self);

    /// End-of-interrupt hook: request a context switch if the ISR made a
    /// higher-priority task ready. Never blocks.
    fn yield_from_isr(&self, switch_required: bool);
}

/// Bare-metal port over the system tick counter
///
/// `yield_now` spins until the next interrupt; a switch request from an
/// ISR is latched until the kernel collects it.
pub struct TickPort<'t> {
    timer: &'t SysTimer,
    switch_pending: AtomicBool,
}

impl<'t> TickPort<'t> {
    pub const fn new(timer: &'t SysTimer) -> Self {
        Self {
            timer,
            switch_pending: AtomicBool::new(false),
        }
    }

    /// Collect and clear a pending switch request
    pub fn take_switch_request(&self) -> bool {
        self.switch_pending.swap(false, Ordering::AcqRel)
    }
}

impl Port for TickPort<'_> {
    fn now(&self) -> u32 {
        self.timer.now()
    }

    fn yield_now(&self) {
        core::hint::spin_loop();
    }

    fn yield_from_isr(&self, switch_required: bool) {
        if switch_required {
            self.switch_pending.store(true, Ordering::Release);
        }
    }
}

#[cfg(any(test, feature = "std"))]
pub use host::HostPort;

#[cfg(any(test, feature = "std"))]
mod host {
    extern crate std;

    use core::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::Port;

    /// Hosted port: tasks are OS threads, one tick per millisecond
    pub struct HostPort {
        epoch: Instant,
        switch_requests: AtomicU32,
    }

    impl HostPort {
        pub fn new() -> Self {
            Self {
                epoch: Instant::now(),
                switch_requests: AtomicU32::new(0),
            }
        }

        /// Context switches requested by interrupt handlers so far
        pub fn switch_requests(&self) -> u32 {
            self.switch_requests.load(Ordering::Relaxed)
        }
    }

    impl Default for HostPort {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Port for HostPort {
        fn now(&self) -> u32 {
            self.epoch.elapsed().as_millis() as u32
        }

        fn yield_now(&self) {
            std::thread::yield_now();
        }

        fn yield_from_isr(&self, switch_required: bool) {
            if switch_required {
                self.switch_requests.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
