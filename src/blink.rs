//! Blink task — toggles a status LED once per period
//!
//! Author: Moroya Sakamoto

use crate::task::Runnable;

/// Anything that can be flipped on and off
pub trait Led {
    fn toggle(&mut self);
}

pub struct BlinkTask<L> {
    led: L,
    toggles: u32,
}

impl<L: Led> BlinkTask<L> {
    pub const fn new(led: L) -> Self {
        Self { led, toggles: 0 }
    }

    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    pub fn led(&self) -> &L {
        &self.led
    }
}

impl<L: Led> Runnable for BlinkTask<L> {
    fn run(&mut self, _now: u32) {
        self.led.toggle();
        self.toggles = self.toggles.wrapping_add(1);
    }
}
