//! Eight LED chase
//!
//! A single lit bit walks along eight LEDs. Two buttons, serviced on their
//! falling edge, pick the direction; the chase loop only reads it.

use core::sync::atomic::{AtomicBool, Ordering};

/// First value shown: LED1 lit
pub const START_VALUE: u8 = 0b0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards LED8 (shift left)
    Forward,
    /// Towards LED1 (shift right)
    Backward,
}

/// Direction shared between the button tasks and the chase loop
#[derive(Debug)]
pub struct ChaseControl {
    backward: AtomicBool,
}

impl ChaseControl {
    pub const fn new() -> Self {
        Self {
            backward: AtomicBool::new(false),
        }
    }

    pub fn set_direction(&self, direction: Direction) {
        self.backward
            .store(direction == Direction::Backward, Ordering::Release);
    }

    pub fn direction(&self) -> Direction {
        if self.backward.load(Ordering::Acquire) {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

impl Default for ChaseControl {
    fn default() -> Self {
        Self::new()
    }
}

/// The walking bit
#[derive(Debug, Clone)]
pub struct Chase {
    value: u8,
}

impl Default for Chase {
    fn default() -> Self {
        Self::new()
    }
}

impl Chase {
    pub fn new() -> Self {
        Self { value: START_VALUE }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Shift one position; a bit falling off one end re-enters at the other
    pub fn advance(&mut self, direction: Direction) -> u8 {
        self.value = match direction {
            Direction::Forward => match self.value << 1 {
                0 => 0b0000_0001,
                shifted => shifted,
            },
            Direction::Backward => match self.value >> 1 {
                0 => 0b1000_0000,
                shifted => shifted,
            },
        };
        self.value
    }
}
