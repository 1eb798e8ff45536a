//! System timer — tick source shared by the tick interrupt and tasks
//!
//! The counter is 32 bits wide so it can be advanced atomically on any
//! 32-bit core. All comparisons use wrapping arithmetic; a `Deadline`
//! stays correct across one counter wrap.
//!
//! Author: Moroya Sakamoto

use core::sync::atomic::{AtomicU32, Ordering};

/// System timer
///
/// Size: 8 bytes
pub struct SysTimer {
    /// Current tick count
    ticks: AtomicU32,
    /// Times the tick count has wrapped
    overflows: AtomicU32,
}

impl SysTimer {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
            overflows: AtomicU32::new(0),
        }
    }

    /// Advance by one tick (tick interrupt)
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Advance by `delta` ticks
    pub fn advance(&self, delta: u32) {
        let old = self.ticks.fetch_add(delta, Ordering::Release);
        if old.checked_add(delta).is_none() {
            self.overflows.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current tick count
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Number of counter wraps
    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Ticks elapsed since a reference point
    pub fn elapsed_since(&self, reference: u32) -> u32 {
        self.now().wrapping_sub(reference)
    }

    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Release);
        self.overflows.store(0, Ordering::Relaxed);
    }
}

impl Default for SysTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// How long a blocking operation may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Try once, never wait
    NonBlocking,
    /// Wait up to this many ticks
    Ticks(u32),
    /// Wait until satisfied
    Forever,
}

/// Absolute expiry point of a `Timeout`
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// Tick the wait started at
    start: u32,
    /// Ticks allowed, `None` = unbounded
    budget: Option<u32>,
}

impl Deadline {
    pub fn new(start: u32, timeout: Timeout) -> Self {
        let budget = match timeout {
            Timeout::NonBlocking => Some(0),
            Timeout::Ticks(t) => Some(t),
            Timeout::Forever => None,
        };
        Self { start, budget }
    }

    /// Has the wait run out at tick `now`?
    pub fn expired(&self, now: u32) -> bool {
        match self.budget {
            Some(budget) => self.elapsed(now) >= budget,
            None => false,
        }
    }

    /// Ticks left before expiry (`None` for an unbounded wait)
    pub fn remaining(&self, now: u32) -> Option<u32> {
        self.budget
            .map(|budget| budget.saturating_sub(self.elapsed(now)))
    }

    /// Ticks since the wait started
    pub fn elapsed(&self, now: u32) -> u32 {
        now.wrapping_sub(self.start)
    }
}
