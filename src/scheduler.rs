//! Fixed-priority periodic scheduler
//!
//! Static task table, no dynamic allocation. Each tick runs at most one
//! task: the highest-priority one whose activation time has come.
//! Activations follow delay-until semantics, so a late run does not
//! shift the task's phase.
//!
//! Author: Moroya Sakamoto

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::task::{Task, TaskPriority, TaskState, MAX_TASKS};
use crate::timer::{Deadline, Timeout};

pub struct Scheduler<'a> {
    /// Static task table
    tasks: [Option<Task<'a>>; MAX_TASKS],
    /// Number of registered tasks
    task_count: usize,
    /// Currently running task index (None = idle)
    current_task: Option<usize>,
    /// Tick of the last `tick` call
    now: u32,
    /// Total context switches
    pub context_switches: u32,
}

impl<'a> Scheduler<'a> {
    pub const fn new() -> Self {
        Self {
            tasks: [const { None }; MAX_TASKS],
            task_count: 0,
            current_task: None,
            now: 0,
            context_switches: 0,
        }
    }

    /// Register a task, returns slot index. First activation is immediate.
    pub fn register(&mut self, mut task: Task<'a>) -> Result<usize> {
        if self.task_count >= MAX_TASKS {
            return Err(Error::SchedulerFull);
        }
        let idx = self.task_count;
        task.next_activation = self.now;
        debug!(
            "sched: task {} '{}' prio {} period {}",
            idx,
            task.name(),
            task.priority.0,
            task.period
        );
        self.tasks[idx] = Some(task);
        self.task_count += 1;
        Ok(idx)
    }

    /// Bring the scheduler to tick `now` and run the highest-priority due task
    ///
    /// Returns the index of the task that was executed, if any.
    pub fn tick(&mut self, now: u32) -> Option<usize> {
        self.now = now;

        for task in self.tasks.iter_mut().flatten() {
            if task.state == TaskState::Sleeping && is_due(now, task.next_activation) {
                task.state = TaskState::Ready;
            }
        }

        let Some(idx) = self.find_highest_priority_ready() else {
            self.current_task = None;
            return None;
        };

        if self.current_task != Some(idx) {
            self.context_switches += 1;
            self.current_task = Some(idx);
        }

        let task = self.tasks[idx].as_mut()?;

        if Deadline::new(task.next_activation, Timeout::Ticks(task.period)).expired(now) {
            task.deadline_misses += 1;
            warn!("sched: '{}' missed its deadline ({} total)", task.name(), task.deadline_misses);
        }

        task.state = TaskState::Running;
        task.execute(now);
        task.exec_count += 1;

        task.next_activation = task.next_activation.wrapping_add(task.period);
        task.state = TaskState::Sleeping;

        Some(idx)
    }

    /// Find highest-priority (lowest number) ready task
    fn find_highest_priority_ready(&self) -> Option<usize> {
        let mut best_idx = None;
        let mut best_priority = TaskPriority::IDLE;

        for (i, task) in self.tasks.iter().enumerate() {
            if let Some(task) = task {
                if task.state == TaskState::Ready
                    && (best_idx.is_none() || task.priority < best_priority)
                {
                    best_priority = task.priority;
                    best_idx = Some(i);
                }
            }
        }
        best_idx
    }

    /// Number of registered tasks that are not suspended
    pub fn active_task_count(&self) -> usize {
        self.tasks
            .iter()
            .flatten()
            .filter(|t| t.state != TaskState::Suspended)
            .count()
    }

    /// Get task by index
    pub fn get_task(&self, idx: usize) -> Option<&Task<'a>> {
        self.tasks.get(idx)?.as_ref()
    }

    /// Tick of the last `tick`
    pub fn now(&self) -> u32 {
        self.now
    }

    /// Total deadline misses across all tasks
    pub fn deadline_misses(&self) -> u32 {
        self.tasks.iter().flatten().map(|t| t.deadline_misses).sum()
    }

    /// Suspend a task
    pub fn suspend(&mut self, idx: usize) {
        if let Some(Some(task)) = self.tasks.get_mut(idx) {
            task.state = TaskState::Suspended;
        }
    }

    /// Resume a suspended task; it becomes due immediately
    pub fn resume(&mut self, idx: usize) {
        if let Some(Some(task)) = self.tasks.get_mut(idx) {
            if task.state == TaskState::Suspended {
                task.state = TaskState::Ready;
                task.next_activation = self.now;
            }
        }
    }
}

impl Default for Scheduler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Has tick `at` been reached at `now`? Valid while the two are less
/// than half the counter range apart.
fn is_due(now: u32, at: u32) -> bool {
    (now.wrapping_sub(at) as i32) >= 0
}
