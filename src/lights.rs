//! LED outputs
//!
//! Plain GPIO LEDs: a three-lamp traffic head and a bar of LEDs that shows
//! the bits of a byte.

use crate::BoardError;
use embedded_hal::digital::{OutputPin, PinState};

/// Which of the three traffic lamps are lit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightPattern {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

impl LightPattern {
    pub const OFF: Self = Self::new(false, false, false);
    pub const RED: Self = Self::new(true, false, false);
    pub const YELLOW: Self = Self::new(false, true, false);
    pub const GREEN: Self = Self::new(false, false, true);

    /// Forced while the proximity override is active: red only
    pub const ALERT: Self = Self::RED;

    pub const fn new(red: bool, yellow: bool, green: bool) -> Self {
        Self { red, yellow, green }
    }

    /// Number of lit lamps
    pub fn lit_count(&self) -> u8 {
        self.red as u8 + self.yellow as u8 + self.green as u8
    }
}

/// Something that can display a traffic light pattern
pub trait SignalHead {
    fn show(&mut self, pattern: LightPattern) -> Result<(), BoardError>;
}

/// Three GPIO driven lamps
pub struct TrafficLights<P>
where
    P: OutputPin,
{
    red: P,
    yellow: P,
    green: P,
    pattern: LightPattern,
}

impl<P> TrafficLights<P>
where
    P: OutputPin,
{
    /// Pins are expected to start low
    pub fn new(red: P, yellow: P, green: P) -> Self {
        Self {
            red,
            yellow,
            green,
            pattern: LightPattern::OFF,
        }
    }

    /// Last pattern written successfully
    pub fn get_pattern(&self) -> LightPattern {
        self.pattern
    }
}

impl<P> SignalHead for TrafficLights<P>
where
    P: OutputPin,
{
    fn show(&mut self, pattern: LightPattern) -> Result<(), BoardError> {
        self.red
            .set_state(PinState::from(pattern.red))
            .map_err(|_| BoardError::Gpio)?;
        self.yellow
            .set_state(PinState::from(pattern.yellow))
            .map_err(|_| BoardError::Gpio)?;
        self.green
            .set_state(PinState::from(pattern.green))
            .map_err(|_| BoardError::Gpio)?;
        self.pattern = pattern;
        Ok(())
    }
}

/// Row of up to eight LEDs, LED `i` showing bit `i`
pub struct LedBar<P, const N: usize>
where
    P: OutputPin,
{
    leds: [P; N],
}

impl<P, const N: usize> LedBar<P, N>
where
    P: OutputPin,
{
    pub fn new(leds: [P; N]) -> Self {
        Self { leds }
    }

    /// Light the LEDs whose bit is set in `value`; bits beyond the bar are ignored
    pub fn show_bits(&mut self, value: u8) -> Result<(), BoardError> {
        for (i, led) in self.leds.iter_mut().enumerate() {
            let on = i < 8 && (value >> i) & 1 == 1;
            led.set_state(PinState::from(on))
                .map_err(|_| BoardError::Gpio)?;
        }
        Ok(())
    }

    /// Turn every LED off
    pub fn clear(&mut self) -> Result<(), BoardError> {
        self.show_bits(0)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    /// Output pin that remembers its level
    #[derive(Debug, Default)]
    pub struct FakePin {
        pub high: bool,
        pub writes: u32,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    /// Output pin that always fails
    pub struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    /// Signal head that records every pattern it is asked to show
    #[derive(Debug, Default)]
    pub struct RecordingHead {
        pub shown: heapless::Vec<LightPattern, 32>,
        pub fail: bool,
    }

    impl RecordingHead {
        pub fn last(&self) -> Option<LightPattern> {
            self.shown.last().copied()
        }
    }

    impl SignalHead for RecordingHead {
        fn show(&mut self, pattern: LightPattern) -> Result<(), BoardError> {
            if self.fail {
                return Err(BoardError::Gpio);
            }
            self.shown.push(pattern).map_err(|_| BoardError::Gpio)
        }
    }
}
