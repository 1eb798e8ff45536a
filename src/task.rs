//! Task definition — static, no-alloc task descriptors
//!
//! Each task is a periodic body with a fixed period and priority. The
//! body is borrowed, not owned, so tasks can live in statics or on the
//! start-up stack.
//!
//! Author: Moroya Sakamoto

/// Maximum tasks the kernel can manage
pub const MAX_TASKS: usize = 8;

/// Work done on each activation
pub trait Runnable {
    /// `now` is the scheduler tick of this activation
    fn run(&mut self, now: u32);
}

/// Task priority (lower number = higher priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskPriority(pub u8);

impl TaskPriority {
    /// Highest priority
    pub const CRITICAL: TaskPriority = TaskPriority(0);
    pub const HIGH: TaskPriority = TaskPriority(1);
    /// LED and other housekeeping
    pub const NORMAL: TaskPriority = TaskPriority(2);
    /// Console traffic
    pub const LOW: TaskPriority = TaskPriority(3);
    /// Background
    pub const IDLE: TaskPriority = TaskPriority(255);
}

/// Task execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Task is ready to run
    Ready,
    /// Task is currently executing
    Running,
    /// Task is waiting for next period
    Sleeping,
    /// Task is suspended
    Suspended,
}

/// Task descriptor
pub struct Task<'a> {
    /// Task name (8 ASCII chars max)
    pub name: [u8; 8],
    body: &'a mut dyn Runnable,
    /// Priority (lower = higher priority)
    pub priority: TaskPriority,
    /// Period in ticks, at least 1
    pub period: u32,
    /// Current state
    pub state: TaskState,
    /// Next activation tick (absolute)
    pub next_activation: u32,
    /// Execution count
    pub exec_count: u32,
    /// Activations that started a full period or more late
    pub deadline_misses: u32,
}

impl<'a> Task<'a> {
    /// Create a new periodic task
    pub fn new(name: &[u8], body: &'a mut dyn Runnable, priority: TaskPriority, period: u32) -> Self {
        let mut n = [0u8; 8];
        let len = name.len().min(8);
        n[..len].copy_from_slice(&name[..len]);

        Self {
            name: n,
            body,
            priority,
            period: period.max(1),
            state: TaskState::Ready,
            next_activation: 0,
            exec_count: 0,
            deadline_misses: 0,
        }
    }

    /// Name without padding
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    /// Run the body once
    pub(crate) fn execute(&mut self, now: u32) {
        self.body.run(now);
    }
}
