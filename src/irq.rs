//! Interrupt dispatch table
//!
//! Handlers are bound to IRQ numbers at start-up instead of overriding
//! weak vector symbols. The vector stub for IRQ `n` calls
//! `TABLE.dispatch(n)`; everything else is ordinary Rust.
//!
//! Author: Moroya Sakamoto

use core::cell::Cell;

use critical_section::Mutex;
use log::debug;

use crate::error::{Error, Result};

/// Something the hardware can interrupt into. Must never block.
pub trait InterruptHandler: Sync {
    fn on_interrupt(&self);
}

type Slot = Mutex<Cell<Option<&'static dyn InterruptHandler>>>;

/// Static table of `N` interrupt lines
pub struct InterruptTable<const N: usize> {
    slots: [Slot; N],
}

impl<const N: usize> InterruptTable<N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { Mutex::new(Cell::new(None)) }; N],
        }
    }

    /// Bind `handler` to `irq`
    pub fn register(&self, irq: usize, handler: &'static dyn InterruptHandler) -> Result<()> {
        let slot = self.slots.get(irq).ok_or(Error::IrqOutOfRange(irq))?;
        critical_section::with(|cs| {
            let cell = slot.borrow(cs);
            if cell.get().is_some() {
                return Err(Error::IrqInUse(irq));
            }
            cell.set(Some(handler));
            Ok(())
        })?;
        debug!("irq: handler bound to line {}", irq);
        Ok(())
    }

    /// Unbind `irq`; returns whether a handler was bound
    pub fn unregister(&self, irq: usize) -> bool {
        match self.slots.get(irq) {
            Some(slot) => critical_section::with(|cs| slot.borrow(cs).take().is_some()),
            None => false,
        }
    }

    pub fn is_registered(&self, irq: usize) -> bool {
        self.slots
            .get(irq)
            .is_some_and(|slot| critical_section::with(|cs| slot.borrow(cs).get().is_some()))
    }

    /// Run the handler bound to `irq`. Returns false for an unbound line.
    pub fn dispatch(&self, irq: usize) -> bool {
        let handler = match self.slots.get(irq) {
            Some(slot) => critical_section::with(|cs| slot.borrow(cs).get()),
            None => None,
        };
        match handler {
            Some(h) => {
                h.on_interrupt();
                true
            }
            None => false,
        }
    }
}

impl<const N: usize> Default for InterruptTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
