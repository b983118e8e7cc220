//! Four bit binary counter on a push button
//!
//! While the button is held every period blanks the LEDs and counts up,
//! wrapping after 15. Once released the LEDs show the count in binary.

/// Largest value four LEDs can show
pub const MAX_COUNT: u8 = 15;

/// What the LEDs should show for one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDisplay {
    /// Button held: LEDs blanked
    Blank,
    /// Button released: the count
    Value(u8),
}

impl CounterDisplay {
    /// Bit pattern to put on the LED bar
    pub fn bits(&self) -> u8 {
        match self {
            CounterDisplay::Blank => 0,
            CounterDisplay::Value(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinaryCounter {
    value: u8,
}

impl BinaryCounter {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advance one period given the button level (`pressed` = line low)
    pub fn update(&mut self, pressed: bool) -> CounterDisplay {
        if pressed {
            self.value = if self.value >= MAX_COUNT {
                0
            } else {
                self.value + 1
            };
            CounterDisplay::Blank
        } else {
            CounterDisplay::Value(self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_shows_count() {
        let mut counter = BinaryCounter::new();
        assert_eq!(counter.update(false), CounterDisplay::Value(0));
        assert_eq!(counter.update(false), CounterDisplay::Value(0));
    }

    #[test]
    fn test_held_counts_and_blanks() {
        let mut counter = BinaryCounter::new();

        assert_eq!(counter.update(true), CounterDisplay::Blank);
        assert_eq!(counter.update(true), CounterDisplay::Blank);
        assert_eq!(counter.value(), 2);
        assert_eq!(counter.update(false).bits(), 0b0010);
    }

    #[test]
    fn test_wraps_after_fifteen() {
        let mut counter = BinaryCounter::new();
        for _ in 0..MAX_COUNT {
            counter.update(true);
        }
        assert_eq!(counter.value(), 15);
        assert_eq!(counter.update(false).bits(), 0b1111);

        counter.update(true);
        assert_eq!(counter.value(), 0);
    }
}
