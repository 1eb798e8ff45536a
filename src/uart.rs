//! Interrupt-driven UART driver
//!
//! Hardware RX event → ISR pushes to the RX queue → task pops in `read`.
//! Task pushes to the TX queue in `write` → ISR pops and feeds the data
//! register, arming and disarming the TX-empty interrupt as the queue
//! fills and drains.
//!
//! The queues are lock-free. The register block sits behind a
//! critical section because both contexts touch the interrupt-enable
//! register: the task arms TX, the ISR disarms it. On the task side each
//! direction has a gate, so any number of tasks may share the driver
//! while one `write` (or `read`) at a time owns its queue end.
//!
//! Author: Moroya Sakamoto

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::Mutex;
use log::{debug, info};

use crate::config::{DriverConfig, UART_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::hw::{Interrupts, LineConfig, SerialRegisters};
use crate::irq::InterruptHandler;
use crate::port::Port;
use crate::queue::{ByteQueue, CancelToken};
use crate::timer::{Deadline, Timeout};

/// Blocking byte-stream view of a serial device
pub trait SerialStream {
    /// Fill `buf` from the receive side, see `UartDriver::read`
    fn read(&self, buf: &mut [u8]) -> Result<usize>;
    /// Queue `buf` for transmission, see `UartDriver::write`
    fn write(&self, buf: &[u8]) -> Result<usize>;
    /// Take whatever has already arrived, never blocks
    fn try_read(&self, buf: &mut [u8]) -> usize;
    /// Wait until everything written has left the queue
    fn flush(&self) -> Result<()>;
}

/// What one pass of the interrupt handler did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsrOutcome {
    /// Byte moved from the data register into the RX queue
    pub received: Option<u8>,
    /// A received byte was lost to a full RX queue
    pub dropped: bool,
    /// Byte moved from the TX queue into the data register
    pub transmitted: Option<u8>,
    /// TX queue found empty, TX-empty interrupt turned off
    pub disarmed: bool,
    /// A task waiting on a queue may now run
    pub switch_required: bool,
}

/// Driver counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub rx_bytes: u32,
    pub rx_dropped: u32,
    pub tx_bytes: u32,
    pub write_timeouts: u32,
}

/// Admits one task at a time to one direction of a driver
pub(crate) struct Gate(AtomicBool);

/// Open gate; closed again on drop
pub(crate) struct GateGuard<'g>(&'g AtomicBool);

impl Gate {
    pub(crate) const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub(crate) fn try_enter(&self) -> Option<GateGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard(&self.0))
    }

    /// Yield until the gate is free or `timeout` passes
    pub(crate) fn enter<P: Port>(&self, port: &P, timeout: Timeout) -> Result<GateGuard<'_>> {
        let deadline = Deadline::new(port.now(), timeout);
        loop {
            if let Some(guard) = self.try_enter() {
                return Ok(guard);
            }
            if deadline.expired(port.now()) {
                return Err(Error::Timeout);
            }
            port.yield_now();
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Counters {
    rx_bytes: AtomicU32,
    rx_dropped: AtomicU32,
    tx_bytes: AtomicU32,
    write_timeouts: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DriverStats {
        DriverStats {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            write_timeouts: self.write_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// UART driver owning the register block and both byte queues
///
/// Lives for the whole program. Tasks use `read`/`write`, the UART
/// interrupt vector calls `handle_interrupt` (usually through an
/// `InterruptTable`).
pub struct UartDriver<H, P, const N: usize = UART_BUFFER_SIZE> {
    hw: Mutex<RefCell<H>>,
    port: P,
    rx: ByteQueue<N>,
    tx: ByteQueue<N>,
    /// Mirrors TX_EMPTY in the interrupt-enable register
    tx_armed: AtomicBool,
    cancel: CancelToken,
    /// Task-side owner of the RX consumer end
    reader: Gate,
    /// Task-side owner of the TX producer end
    writer: Gate,
    config: DriverConfig,
    counters: Counters,
}

impl<H: SerialRegisters, P: Port, const N: usize> UartDriver<H, P, N> {
    /// Configure the line as 8-N-1 at `config.baud_rate`, enable the RX
    /// interrupt and leave TX disarmed.
    ///
    /// Call before the scheduler starts. The interrupt cannot reach the
    /// driver until it is registered with an `InterruptTable`.
    pub fn initialize(mut hw: H, port: P, config: DriverConfig) -> Result<Self> {
        if config.baud_rate == 0 {
            return Err(Error::InvalidBaudRate(config.baud_rate));
        }

        hw.configure(&LineConfig::eight_n_one(config.baud_rate));
        hw.disable_interrupts(Interrupts::TX_EMPTY);
        hw.enable_interrupts(Interrupts::RX_NOT_EMPTY);
        hw.set_enabled(true);

        info!("uart: {} baud 8N1, {}-byte RX/TX queues", config.baud_rate, N);

        Ok(Self {
            hw: Mutex::new(RefCell::new(hw)),
            port,
            rx: ByteQueue::new(),
            tx: ByteQueue::new(),
            tx_armed: AtomicBool::new(false),
            cancel: CancelToken::new(),
            reader: Gate::new(),
            writer: Gate::new(),
            config,
            counters: Counters::default(),
        })
    }

    /// Read up to `buf.len()` bytes, waiting `read_timeout` for each.
    ///
    /// - every byte arrived: `Ok(buf.len())`
    /// - timed out after some bytes: `Ok(n)` short read
    /// - timed out before any byte: `Err(Timeout)`
    /// - released by `cancel_read`: `Ok(n)` with what was collected, possibly 0
    ///
    /// Concurrent readers take turns; waiting for the turn counts against
    /// `read_timeout`.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let _turn = self.reader.enter(&self.port, self.config.read_timeout)?;
        for (i, slot) in buf.iter_mut().enumerate() {
            match self
                .rx
                .pop_cancellable(&self.port, self.config.read_timeout, &self.cancel)
            {
                Ok(byte) => *slot = byte,
                Err(Error::Cancelled) => {
                    debug!("uart: read cancelled after {} bytes", i);
                    return Ok(i);
                }
                Err(Error::Timeout) if i > 0 => return Ok(i),
                Err(e) => return Err(e),
            }
        }
        Ok(buf.len())
    }

    /// Copy out bytes already in the RX queue without waiting
    ///
    /// Returns 0 while another task is reading.
    pub fn try_read(&self, buf: &mut [u8]) -> usize {
        let Some(_turn) = self.reader.try_enter() else {
            return 0;
        };
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.rx.try_pop() {
                Some(byte) => {
                    *slot = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Queue bytes for transmission, waiting `write_timeout` per byte.
    ///
    /// Returns the number actually queued. A byte that cannot be queued
    /// in time ends the write: `Ok(n)` if some bytes made it, otherwise
    /// `Err(Timeout)`. TX is armed after every byte so a write longer than
    /// the queue keeps draining while it waits.
    ///
    /// Concurrent writers take turns, so the bytes of one call reach the
    /// wire contiguously.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let _turn = self.writer.enter(&self.port, Timeout::Forever)?;
        for (i, &byte) in buf.iter().enumerate() {
            if let Err(e) = self
                .tx
                .push_blocking(&self.port, byte, self.config.write_timeout)
            {
                Counters::bump(&self.counters.write_timeouts);
                debug!("uart: short write, {} of {} bytes queued", i, buf.len());
                return if i == 0 { Err(e) } else { Ok(i) };
            }
            self.arm_tx();
        }
        Ok(buf.len())
    }

    /// Wait until the TX queue is empty
    pub fn flush(&self, timeout: Timeout) -> Result<()> {
        let deadline = Deadline::new(self.port.now(), timeout);
        while !self.tx.is_empty() {
            if deadline.expired(self.port.now()) {
                return Err(Error::Timeout);
            }
            self.port.yield_now();
        }
        Ok(())
    }

    /// Release a task blocked in `read`; the next read is released
    /// instead if none is blocked.
    pub fn cancel_read(&self) {
        self.cancel.cancel();
    }

    /// ISR body. O(1): at most one RX push and one TX pop per call.
    pub fn handle_interrupt(&self) -> IsrOutcome {
        let mut outcome = IsrOutcome::default();

        critical_section::with(|cs| {
            let mut hw = self.hw.borrow_ref_mut(cs);
            let pending = hw.pending();

            if pending.contains(Interrupts::RX_NOT_EMPTY) {
                let byte = hw.read_data();
                let was_empty = self.rx.is_empty();
                if self.rx.try_push(byte) {
                    Counters::bump(&self.counters.rx_bytes);
                    outcome.received = Some(byte);
                    outcome.switch_required |= was_empty;
                } else {
                    Counters::bump(&self.counters.rx_dropped);
                    outcome.dropped = true;
                }
            }

            if pending.contains(Interrupts::TX_EMPTY) {
                let was_full = self.tx.is_full();
                match self.tx.try_pop() {
                    Some(byte) => {
                        hw.write_data(byte);
                        Counters::bump(&self.counters.tx_bytes);
                        outcome.transmitted = Some(byte);
                        outcome.switch_required |= was_full;
                    }
                    None => {
                        hw.disable_interrupts(Interrupts::TX_EMPTY);
                        self.tx_armed.store(false, Ordering::Release);
                        outcome.disarmed = true;
                    }
                }
            }
        });

        self.port.yield_from_isr(outcome.switch_required);
        outcome
    }

    /// Enable TX_EMPTY if it is off. Runs inside the same critical section
    /// the ISR drains under, so a byte pushed before this call is either
    /// seen by the ISR or the interrupt is re-armed here.
    fn arm_tx(&self) {
        critical_section::with(|cs| {
            if !self.tx_armed.load(Ordering::Acquire) {
                self.hw
                    .borrow_ref_mut(cs)
                    .enable_interrupts(Interrupts::TX_EMPTY);
                self.tx_armed.store(true, Ordering::Release);
            }
        });
    }

    /// Is the TX-empty interrupt enabled?
    pub fn is_tx_armed(&self) -> bool {
        self.tx_armed.load(Ordering::Acquire)
    }

    /// Bytes waiting to be read
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Bytes waiting to be transmitted
    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    /// Snapshot of the driver counters
    pub fn stats(&self) -> DriverStats {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn port(&self) -> &P {
        &self.port
    }
}

impl<H: SerialRegisters, P: Port, const N: usize> SerialStream for UartDriver<H, P, N> {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        UartDriver::read(self, buf)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        UartDriver::write(self, buf)
    }

    fn try_read(&self, buf: &mut [u8]) -> usize {
        UartDriver::try_read(self, buf)
    }

    fn flush(&self) -> Result<()> {
        UartDriver::flush(self, Timeout::Forever)
    }
}

impl<H: SerialRegisters, P: Port, const N: usize> InterruptHandler for UartDriver<H, P, N> {
    fn on_interrupt(&self) {
        self.handle_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::HostPort;
    use crate::sim::{SimLine, SimSerial};
    use std::thread;
    use std::time::Duration;
    use std::vec::Vec;

    type SimDriver<'l, const N: usize> = UartDriver<SimSerial<'l>, HostPort, N>;

    fn driver<const N: usize>(line: &SimLine, config: DriverConfig) -> SimDriver<'_, N> {
        UartDriver::initialize(line.serial(), HostPort::new(), config).unwrap()
    }

    fn deliver<const N: usize>(line: &SimLine, drv: &SimDriver<'_, N>, bytes: &[u8]) {
        for &b in bytes {
            assert_eq!(line.inject(&[b]), 1);
            drv.handle_interrupt();
        }
    }

    fn transmitted(line: &SimLine) -> Vec<u8> {
        let mut out = [0u8; 256];
        let n = line.drain_transmitted(&mut out);
        out[..n].to_vec()
    }

    #[test]
    fn test_initialize_configures_line() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 128> = driver(&line, DriverConfig::default());
        assert_eq!(line.baud_rate(), 9600);
        assert!(line.is_enabled());
        assert_eq!(line.interrupts_enabled(), Interrupts::RX_NOT_EMPTY);
        assert!(!drv.is_tx_armed());
        assert_eq!(drv.rx_len(), 0);
        assert_eq!(drv.tx_len(), 0);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let line = SimLine::new();
        let result = SimDriver::<'_, 8>::initialize(line.serial(), HostPort::new(), DriverConfig::new(0));
        assert!(matches!(result, Err(Error::InvalidBaudRate(0))));
        assert!(!line.is_enabled());
    }

    #[test]
    fn test_write_arms_then_isr_drains_and_disarms() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 128> = driver(&line, DriverConfig::default());

        assert_eq!(drv.write(b"OK\n"), Ok(3));
        assert!(drv.is_tx_armed());
        assert!(line.interrupts_enabled().contains(Interrupts::TX_EMPTY));

        for expected in *b"OK\n" {
            let outcome = drv.handle_interrupt();
            assert_eq!(outcome.transmitted, Some(expected));
            assert!(!outcome.disarmed);
            assert!(drv.is_tx_armed());
        }

        let outcome = drv.handle_interrupt();
        assert_eq!(outcome.transmitted, None);
        assert!(outcome.disarmed);
        assert!(!drv.is_tx_armed());
        assert!(!line.interrupts_enabled().contains(Interrupts::TX_EMPTY));
        assert_eq!(transmitted(&line), b"OK\n");
        assert_eq!(drv.stats().tx_bytes, 3);
    }

    #[test]
    fn test_idle_interrupt_changes_nothing() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());
        assert_eq!(drv.handle_interrupt(), IsrOutcome::default());
        assert!(!drv.is_tx_armed());
    }

    #[test]
    fn test_rx_interrupt_unblocks_reader() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 128> = driver(&line, DriverConfig::default());

        thread::scope(|s| {
            let reader = s.spawn(|| {
                let mut buf = [0u8; 1];
                let n = drv.read(&mut buf);
                (n, buf)
            });

            thread::sleep(Duration::from_millis(20));
            line.inject(&[0x41]);
            let outcome = drv.handle_interrupt();
            assert_eq!(outcome.received, Some(0x41));
            assert!(outcome.switch_required);

            let (n, buf) = reader.join().unwrap();
            assert_eq!(n, Ok(1));
            assert_eq!(buf, [0x41]);
        });
        assert_eq!(drv.port().switch_requests(), 1);
    }

    #[test]
    fn test_switch_only_on_empty_to_nonempty() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());
        line.inject(b"ab");
        assert!(drv.handle_interrupt().switch_required);
        assert!(!drv.handle_interrupt().switch_required);
        assert_eq!(drv.port().switch_requests(), 1);
    }

    #[test]
    fn test_rx_overload_drops_byte() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 4> = driver(&line, DriverConfig::default());
        deliver(&line, &drv, b"wxyz");
        assert_eq!(drv.rx_len(), 4);

        line.inject(b"!");
        let outcome = drv.handle_interrupt();
        assert!(outcome.dropped);
        assert_eq!(outcome.received, None);
        assert_eq!(drv.rx_len(), 4);
        assert_eq!(line.incoming_len(), 0);
        assert_eq!(drv.stats().rx_dropped, 1);

        let mut buf = [0u8; 4];
        assert_eq!(drv.read(&mut buf), Ok(4));
        assert_eq!(&buf, b"wxyz");
    }

    #[test]
    fn test_short_write_when_tx_full() {
        let line = SimLine::new();
        let cfg = DriverConfig::default().with_write_timeout(Timeout::NonBlocking);
        let drv: SimDriver<'_, 4> = driver(&line, cfg);

        assert_eq!(drv.write(b"abcdef"), Ok(4));
        assert_eq!(drv.tx_len(), 4);
        assert_eq!(drv.write(b"g"), Err(Error::Timeout));
        assert_eq!(drv.stats().write_timeouts, 2);

        while !drv.handle_interrupt().disarmed {}
        assert_eq!(transmitted(&line), b"abcd");
    }

    #[test]
    fn test_write_longer_than_queue_drains_concurrently() {
        let line = SimLine::new();
        let cfg = DriverConfig::default().with_write_timeout(Timeout::Forever);
        let drv: SimDriver<'_, 4> = driver(&line, cfg);
        let message: Vec<u8> = (0..64u8).collect();

        let mut received = Vec::new();
        thread::scope(|s| {
            let writer = s.spawn(|| drv.write(&message));
            while received.len() < message.len() {
                drv.handle_interrupt();
                received.extend_from_slice(&transmitted(&line));
                thread::yield_now();
            }
            assert_eq!(writer.join().unwrap(), Ok(64));
        });

        assert_eq!(received, message);
        assert!(drv.handle_interrupt().disarmed);
        assert!(!drv.is_tx_armed());
    }

    #[test]
    fn test_concurrent_writers_keep_writes_whole() {
        const CHUNK: usize = 8;
        const CALLS: usize = 10;
        let line = SimLine::new();
        let cfg = DriverConfig::default().with_write_timeout(Timeout::Forever);
        let drv: SimDriver<'_, 4> = driver(&line, cfg);
        let done = AtomicBool::new(false);

        let mut received = Vec::new();
        thread::scope(|s| {
            let writers: Vec<_> = [b'x', b'y']
                .into_iter()
                .map(|tag| {
                    let drv = &drv;
                    s.spawn(move || {
                        (0..CALLS)
                            .map(|_| drv.write(&[tag; CHUNK]))
                            .all(|r| r == Ok(CHUNK))
                    })
                })
                .collect();

            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    drv.handle_interrupt();
                    thread::yield_now();
                }
            });

            while received.len() < 2 * CHUNK * CALLS {
                received.extend_from_slice(&transmitted(&line));
                thread::yield_now();
            }
            for w in writers {
                assert!(w.join().unwrap());
            }
            done.store(true, Ordering::Release);
        });

        for chunk in received.chunks(CHUNK) {
            assert!(chunk.iter().all(|&b| b == chunk[0]), "interleaved write {chunk:?}");
        }
        assert_eq!(received.iter().filter(|&&b| b == b'x').count(), CHUNK * CALLS);
        assert_eq!(drv.tx_len(), 0);
        assert_eq!(drv.stats().tx_bytes as usize, 2 * CHUNK * CALLS);
    }

    #[test]
    fn test_concurrent_readers_take_turns() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 16> = driver(&line, DriverConfig::default());

        let mut got = thread::scope(|s| {
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let drv = &drv;
                    s.spawn(move || {
                        let mut buf = [0u8; 4];
                        drv.read(&mut buf).map(|n| buf[..n].to_vec())
                    })
                })
                .collect();

            thread::sleep(Duration::from_millis(20));
            deliver(&line, &drv, b"aaaabbbb");
            readers
                .into_iter()
                .map(|r| r.join().unwrap().unwrap())
                .collect::<Vec<_>>()
        });

        got.sort();
        assert_eq!(got, [b"aaaa".to_vec(), b"bbbb".to_vec()]);
        assert_eq!(drv.rx_len(), 0);
    }

    #[test]
    fn test_empty_buffers_return_at_once() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 4> = driver(&line, DriverConfig::default());
        assert_eq!(drv.read(&mut []), Ok(0));
        assert_eq!(drv.write(&[]), Ok(0));
        assert!(!drv.is_tx_armed());
    }

    #[test]
    fn test_read_timeout_policy() {
        let line = SimLine::new();
        let cfg = DriverConfig::default().with_read_timeout(Timeout::Ticks(5));
        let drv: SimDriver<'_, 8> = driver(&line, cfg);

        let mut buf = [0u8; 4];
        assert_eq!(drv.read(&mut buf), Err(Error::Timeout));

        deliver(&line, &drv, b"hi");
        assert_eq!(drv.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], b"hi");
    }

    #[test]
    fn test_cancel_releases_blocked_read() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());

        thread::scope(|s| {
            let reader = s.spawn(|| {
                let mut buf = [0u8; 8];
                drv.read(&mut buf)
            });
            thread::sleep(Duration::from_millis(20));
            drv.cancel_read();
            assert_eq!(reader.join().unwrap(), Ok(0));
        });
    }

    #[test]
    fn test_cancel_after_partial_read() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());
        deliver(&line, &drv, b"ab");

        thread::scope(|s| {
            let reader = s.spawn(|| {
                let mut buf = [0u8; 8];
                drv.read(&mut buf).map(|n| (n, buf))
            });
            thread::sleep(Duration::from_millis(20));
            drv.cancel_read();
            let (n, buf) = reader.join().unwrap().unwrap();
            assert_eq!(n, 2);
            assert_eq!(&buf[..2], b"ab");
        });
    }

    #[test]
    fn test_try_read_never_blocks() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());
        let mut buf = [0u8; 4];
        assert_eq!(drv.try_read(&mut buf), 0);
        deliver(&line, &drv, b"xyz");
        assert_eq!(drv.try_read(&mut buf), 3);
        assert_eq!(&buf[..3], b"xyz");
    }

    #[test]
    fn test_flush_waits_for_drain() {
        let line = SimLine::new();
        let drv: SimDriver<'_, 8> = driver(&line, DriverConfig::default());
        drv.write(b"abc").unwrap();
        assert_eq!(drv.flush(Timeout::NonBlocking), Err(Error::Timeout));

        thread::scope(|s| {
            s.spawn(|| {
                while !drv.handle_interrupt().disarmed {
                    thread::yield_now();
                }
            });
            assert_eq!(drv.flush(Timeout::Forever), Ok(()));
        });
        assert_eq!(transmitted(&line), b"abc");
    }
}
