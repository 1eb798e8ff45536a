//! Kernel — top-level runtime
//!
//! Combines the scheduler with the shared system timer. On hardware the
//! tick interrupt advances the timer and `run` polls forever; tests and
//! simulations drive time explicitly with `tick`.
//!
//! Author: Moroya Sakamoto

use log::error;

use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::task::{Runnable, Task, TaskPriority};
use crate::timer::SysTimer;

pub struct Kernel<'a> {
    /// Task scheduler
    pub scheduler: Scheduler<'a>,
    /// System timer, shared with the tick interrupt and the UART port
    timer: &'a SysTimer,
    /// Kernel state
    running: bool,
    /// Total scheduler passes
    pub total_ticks: u64,
}

impl<'a> Kernel<'a> {
    pub const fn new(timer: &'a SysTimer) -> Self {
        Self {
            scheduler: Scheduler::new(),
            timer,
            running: false,
            total_ticks: 0,
        }
    }

    /// Register a task
    pub fn add_task(
        &mut self,
        name: &[u8],
        body: &'a mut dyn Runnable,
        priority: TaskPriority,
        period: u32,
    ) -> Result<usize> {
        self.scheduler.register(Task::new(name, body, priority, period))
    }

    /// One scheduler pass at the timer's current tick
    pub fn poll(&mut self) -> Option<usize> {
        self.total_ticks += 1;
        self.scheduler.tick(self.timer.now())
    }

    /// Advance time by `delta` ticks, then run one scheduler pass
    ///
    /// Returns the task index that was executed, if any.
    pub fn tick(&mut self, delta: u32) -> Option<usize> {
        self.timer.advance(delta);
        self.poll()
    }

    /// Run the kernel for `total` ticks in steps of `step` (simulation)
    pub fn run_for(&mut self, total: u32, step: u32) -> KernelStats {
        self.running = true;
        let mut elapsed = 0u32;
        let mut tasks_executed = 0u64;

        while elapsed < total && self.running {
            if self.tick(step).is_some() {
                tasks_executed += 1;
            }
            elapsed += step;
        }

        self.running = false;
        KernelStats {
            total_ticks: elapsed,
            scheduler_passes: self.total_ticks,
            tasks_executed,
            context_switches: self.scheduler.context_switches,
            deadline_misses: self.scheduler.deadline_misses(),
        }
    }

    /// Poll forever; time comes from the tick interrupt
    pub fn run(&mut self) -> ! {
        self.running = true;
        loop {
            self.poll();
        }
    }

    /// Stop the kernel
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Is the kernel running?
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current tick
    pub fn now(&self) -> u32 {
        self.timer.now()
    }

    /// Stop here for good: start-up could not bring the system up
    pub fn halt(err: Error) -> ! {
        error!("kernel: halted before scheduler start: {}", err);
        loop {
            core::hint::spin_loop();
        }
    }
}

/// Kernel execution statistics
#[derive(Debug, Clone)]
pub struct KernelStats {
    /// Simulated time (ticks)
    pub total_ticks: u32,
    /// Scheduler passes since creation
    pub scheduler_passes: u64,
    /// Tasks executed
    pub tasks_executed: u64,
    /// Context switches
    pub context_switches: u32,
    /// Deadline misses across all tasks
    pub deadline_misses: u32,
}
