//! HC-SR04 ultrasonic ranging
//!
//! One blocking request/response measurement: a 10 µs trigger pulse, then
//! the width of the echo pulse is timed against a free running microsecond
//! clock. Distance = echo width / round trip time per meter.

use core::fmt;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

const TRIGGER_LOW_DELAY_US: u32 = 4;
const TRIGGER_HIGH_DELAY_US: u32 = 10;

/// Maximum wait for the echo line to rise after the trigger pulse
pub const PING_TIMEOUT_US: u64 = 6000;

/// Echo time for one meter of distance (there and back), in microseconds
pub const ROUNDTRIP_US_PER_M: f32 = 5800.0;

/// Measurement failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Echo still high from a previous ping
    Ping,
    /// Echo never rose
    PingTimeout,
    /// Echo stayed high past the maximum range
    EchoTimeout,
    /// Trigger or echo pin access failed
    Gpio,
}

impl SensorError {
    /// Numeric code printed next to the description
    pub fn code(&self) -> i32 {
        match self {
            SensorError::Ping => 0x200,
            SensorError::PingTimeout => 0x201,
            SensorError::EchoTimeout => 0x202,
            SensorError::Gpio => -1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SensorError::Ping => "cannot ping (device is in invalid state)",
            SensorError::PingTimeout => "ping timeout (no device found)",
            SensorError::EchoTimeout => "echo timeout (distance too big)",
            SensorError::Gpio => "GPIO error",
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.code(), self.description())
    }
}

/// Free running microsecond time source
pub trait Clock {
    fn now_us(&self) -> u64;
}

impl<C: Clock> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Microseconds since boot from the ESP system timer
#[cfg(feature = "board")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "board")]
impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        esp_hal::time::Instant::now()
            .duration_since_epoch()
            .as_micros()
    }
}

/// HC-SR04 on a trigger output and an echo input
pub struct Ultrasonic<T, E, D, C> {
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
}

impl<T, E, D, C> Ultrasonic<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: Clock,
{
    pub fn new(trigger: T, echo: E, delay: D, clock: C) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
        }
    }

    /// Fire one ping and return the echo pulse width in microseconds
    pub fn measure_raw(&mut self, max_time_us: u64) -> Result<u64, SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(TRIGGER_LOW_DELAY_US);
        self.trigger.set_high().map_err(|_| SensorError::Gpio)?;
        self.delay.delay_us(TRIGGER_HIGH_DELAY_US);
        self.trigger.set_low().map_err(|_| SensorError::Gpio)?;

        if self.echo_high()? {
            return Err(SensorError::Ping);
        }

        let start = self.clock.now_us();
        while !self.echo_high()? {
            if self.clock.now_us().saturating_sub(start) >= PING_TIMEOUT_US {
                return Err(SensorError::PingTimeout);
            }
        }

        let echo_start = self.clock.now_us();
        let mut echo_end = echo_start;
        while self.echo_high()? {
            echo_end = self.clock.now_us();
            if echo_end.saturating_sub(echo_start) >= max_time_us {
                return Err(SensorError::EchoTimeout);
            }
        }

        Ok(echo_end - echo_start)
    }

    /// Distance in meters, bounded by `max_distance_m`
    pub fn measure(&mut self, max_distance_m: f32) -> Result<f32, SensorError> {
        let max_time_us = (max_distance_m * ROUNDTRIP_US_PER_M) as u64;
        let time_us = self.measure_raw(max_time_us)?;
        Ok(time_us as f32 / ROUNDTRIP_US_PER_M)
    }

    fn echo_high(&mut self) -> Result<bool, SensorError> {
        self.echo.is_high().map_err(|_| SensorError::Gpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::test_support::FakePin;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    /// Advances by `step` µs every time it is read
    struct FakeClock {
        now: Cell<u64>,
        step: u64,
    }

    impl FakeClock {
        fn new(step: u64) -> Self {
            Self {
                now: Cell::new(0),
                step,
            }
        }

        fn peek(&self) -> u64 {
            self.now.get()
        }
    }

    impl Clock for FakeClock {
        fn now_us(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    /// Echo line that is high during `[high_from, high_until)`
    struct ScriptedEcho<'a> {
        clock: &'a FakeClock,
        high_from: u64,
        high_until: u64,
    }

    impl ErrorType for ScriptedEcho<'_> {
        type Error = Infallible;
    }

    impl InputPin for ScriptedEcho<'_> {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            let now = self.clock.peek();
            Ok(now >= self.high_from && now < self.high_until)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|high| !high)
        }
    }

    struct BrokenEcho;

    impl ErrorType for BrokenEcho {
        type Error = ErrorKind;
    }

    impl InputPin for BrokenEcho {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Err(ErrorKind::Other)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn sensor<'a>(
        clock: &'a FakeClock,
        high_from: u64,
        high_until: u64,
    ) -> Ultrasonic<FakePin, ScriptedEcho<'a>, NoDelay, &'a FakeClock> {
        let echo = ScriptedEcho {
            clock,
            high_from,
            high_until,
        };
        Ultrasonic::new(FakePin::default(), echo, NoDelay, clock)
    }

    #[test]
    fn test_one_meter_echo() {
        let clock = FakeClock::new(1);
        let mut hcsr04 = sensor(&clock, 100, 100 + 5800);

        let distance = hcsr04.measure(4.0).unwrap();
        assert!((distance - 1.0).abs() < 0.01, "distance = {}", distance);
    }

    #[test]
    fn test_trigger_pulse_ends_low() {
        let clock = FakeClock::new(1);
        let mut hcsr04 = sensor(&clock, 10, 20);
        hcsr04.measure(4.0).unwrap();

        assert!(!hcsr04.trigger.high);
        assert_eq!(hcsr04.trigger.writes, 3);
    }

    #[test]
    fn test_echo_already_high_is_ping_error() {
        let clock = FakeClock::new(1);
        let mut hcsr04 = sensor(&clock, 0, u64::MAX);

        assert_eq!(hcsr04.measure(4.0), Err(SensorError::Ping));
    }

    #[test]
    fn test_no_echo_is_ping_timeout() {
        let clock = FakeClock::new(10);
        let mut hcsr04 = sensor(&clock, u64::MAX, u64::MAX);

        assert_eq!(hcsr04.measure(4.0), Err(SensorError::PingTimeout));
        // Gave up only after the ping window elapsed
        assert!(clock.peek() >= PING_TIMEOUT_US);
    }

    #[test]
    fn test_out_of_range_is_echo_timeout() {
        let clock = FakeClock::new(5);
        let mut hcsr04 = sensor(&clock, 100, u64::MAX);

        assert_eq!(hcsr04.measure(0.5), Err(SensorError::EchoTimeout));
    }

    #[test]
    fn test_pin_failure_is_gpio_error() {
        let clock = FakeClock::new(1);
        let mut hcsr04 = Ultrasonic::new(FakePin::default(), BrokenEcho, NoDelay, &clock);

        assert_eq!(hcsr04.measure(4.0), Err(SensorError::Gpio));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SensorError::Ping.code(), 0x200);
        assert_eq!(SensorError::PingTimeout.code(), 0x201);
        assert_eq!(SensorError::EchoTimeout.code(), 0x202);
        assert_eq!(
            SensorError::EchoTimeout.description(),
            "echo timeout (distance too big)"
        );
    }
}
