//! Lock-free SPSC byte queue — the ISR/task hand-off primitive
//!
//! Fixed-size, no-alloc, interrupt-safe. RX is filled by the UART
//! interrupt and drained by a task, TX the other way round. The producer
//! owns `tail`, the consumer owns `head`, and `count` is the single word
//! both sides update atomically.
//!
//! Each side is claimed for the duration of one push or pop. A second
//! producer (or consumer) that finds its side claimed backs off as if the
//! queue were full (or empty) and retries; it never touches a slot the
//! owner is working on.
//!
//! Author: Moroya Sakamoto

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::timer::{Deadline, Timeout};

/// Bounded FIFO of bytes with all `N` slots usable
pub struct ByteQueue<const N: usize> {
    /// Ring storage
    buffer: UnsafeCell<[u8; N]>,
    /// Next slot to read (owned by consumer)
    head: AtomicUsize,
    /// Next slot to write (owned by producer)
    tail: AtomicUsize,
    /// Occupied slots, 0..=N
    count: AtomicUsize,
    /// Held by the producer inside `try_push`
    push_claim: AtomicBool,
    /// Held by the consumer inside `try_pop`
    pop_claim: AtomicBool,
}

// SAFETY: `push_claim` admits one producer at a time and `pop_claim` one
// consumer at a time, so `tail` and `head` each have a single writer. A
// slot is written only while it is free (count < N observed with Acquire)
// and read only while it is occupied (count > 0 observed with Acquire).
// The Release updates of `count` publish slot contents to the other side;
// the Release on each claim publishes the index to the next claimant.
unsafe impl<const N: usize> Sync for ByteQueue<N> {}

impl<const N: usize> ByteQueue<N> {
    const NONZERO: () = assert!(N > 0, "ByteQueue capacity must be non-zero");

    /// Create a new empty queue
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO;
        Self {
            buffer: UnsafeCell::new([0u8; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
            push_claim: AtomicBool::new(false),
            pop_claim: AtomicBool::new(false),
        }
    }

    /// Push a byte (producer side)
    ///
    /// Returns false and leaves the queue untouched if it is full or
    /// another producer is mid-push.
    pub fn try_push(&self, byte: u8) -> bool {
        if self.push_claim.swap(true, Ordering::Acquire) {
            return false;
        }

        let pushed = self.count.load(Ordering::Acquire) < N;
        if pushed {
            let tail = self.tail.load(Ordering::Relaxed);
            // SAFETY: `tail < N`, the slot is free and we hold the push claim.
            unsafe { self.buffer.get().cast::<u8>().add(tail).write(byte) };
            self.tail.store(Self::advance(tail), Ordering::Relaxed);
            self.count.fetch_add(1, Ordering::Release);
        }

        self.push_claim.store(false, Ordering::Release);
        pushed
    }

    /// Pop the oldest byte (consumer side)
    ///
    /// Returns None if the queue is empty or another consumer is mid-pop.
    pub fn try_pop(&self) -> Option<u8> {
        if self.pop_claim.swap(true, Ordering::Acquire) {
            return None;
        }

        let popped = if self.count.load(Ordering::Acquire) > 0 {
            let head = self.head.load(Ordering::Relaxed);
            // SAFETY: `head < N`, the slot is occupied and we hold the pop claim.
            let byte = unsafe { self.buffer.get().cast::<u8>().add(head).read() };
            self.head.store(Self::advance(head), Ordering::Relaxed);
            self.count.fetch_sub(1, Ordering::Release);
            Some(byte)
        } else {
            None
        };

        self.pop_claim.store(false, Ordering::Release);
        popped
    }

    /// Push from task context, yielding until there is room or `timeout` passes
    pub fn push_blocking<P: Port + ?Sized>(&self, port: &P, byte: u8, timeout: Timeout) -> Result<()> {
        let deadline = Deadline::new(port.now(), timeout);
        loop {
            if self.try_push(byte) {
                return Ok(());
            }
            if deadline.expired(port.now()) {
                return Err(Error::Timeout);
            }
            port.yield_now();
        }
    }

    /// Pop from task context, yielding until a byte arrives or `timeout` passes
    pub fn pop_blocking<P: Port + ?Sized>(&self, port: &P, timeout: Timeout) -> Result<u8> {
        self.wait_pop(port, timeout, None)
    }

    /// Like `pop_blocking`, but also gives up with `Error::Cancelled` once
    /// `cancel` fires. The cancellation is consumed.
    pub fn pop_cancellable<P: Port + ?Sized>(
        &self,
        port: &P,
        timeout: Timeout,
        cancel: &CancelToken,
    ) -> Result<u8> {
        self.wait_pop(port, timeout, Some(cancel))
    }

    fn wait_pop<P: Port + ?Sized>(
        &self,
        port: &P,
        timeout: Timeout,
        cancel: Option<&CancelToken>,
    ) -> Result<u8> {
        let deadline = Deadline::new(port.now(), timeout);
        loop {
            if let Some(byte) = self.try_pop() {
                return Ok(byte);
            }
            if cancel.is_some_and(CancelToken::take) {
                return Err(Error::Cancelled);
            }
            if deadline.expired(port.now()) {
                return Err(Error::Timeout);
            }
            port.yield_now();
        }
    }

    /// Number of bytes queued
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Is every slot occupied?
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Total slots
    pub const fn capacity(&self) -> usize {
        N
    }

    const fn advance(idx: usize) -> usize {
        let next = idx + 1;
        if next == N { 0 } else { next }
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot release for a blocked consumer
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Ask the current (or next) wait to give up
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume a pending cancellation
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
