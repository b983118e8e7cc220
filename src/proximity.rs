//! Proximity override for the traffic light
//!
//! Two states, NORMAL and ALERT. A reading at or below the threshold while
//! NORMAL forces the alert lamps and pauses the sequencer; a reading above
//! it while ALERT resumes the sequencer. There is no hysteresis band: entry
//! uses `<=`, exit uses `>`.

use crate::config;
use crate::lights::{LightPattern, SignalHead};
use crate::traffic::SequencerControl;
use crate::ultrasonic::SensorError;

/// Override mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideState {
    Normal,
    Alert,
}

/// What one monitor cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorEvent {
    /// NORMAL -> ALERT, sequencer paused
    Alerted { distance: f32 },
    /// ALERT -> NORMAL, sequencer resumed
    Cleared { distance: f32 },
    /// Valid reading, no transition
    Unchanged { distance: f32 },
    /// Measurement failed, nothing changed
    SensorFault(SensorError),
}

/// Signal monitor
#[derive(Debug, Clone)]
pub struct ProximityMonitor {
    threshold_m: f32,
    overridden: bool,
}

impl Default for ProximityMonitor {
    fn default() -> Self {
        Self::new(config::PROXIMITY_THRESHOLD_M)
    }
}

impl ProximityMonitor {
    pub fn new(threshold_m: f32) -> Self {
        Self {
            threshold_m,
            overridden: false,
        }
    }

    pub fn get_state(&self) -> OverrideState {
        if self.overridden {
            OverrideState::Alert
        } else {
            OverrideState::Normal
        }
    }

    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_m
    }

    /// Process one measurement result
    ///
    /// The alert lamps are written before the sequencer is paused. If that
    /// write fails the override is not entered and the next cycle retries.
    pub fn handle<H, S>(
        &mut self,
        reading: Result<f32, SensorError>,
        head: &mut H,
        sequencer: &S,
    ) -> Result<MonitorEvent, crate::BoardError>
    where
        H: SignalHead,
        S: SequencerControl,
    {
        let distance = match reading {
            Ok(distance) => distance,
            Err(err) => return Ok(MonitorEvent::SensorFault(err)),
        };

        if distance <= self.threshold_m && !self.overridden {
            head.show(LightPattern::ALERT)?;
            sequencer.pause();
            self.overridden = true;
            Ok(MonitorEvent::Alerted { distance })
        } else if distance > self.threshold_m && self.overridden {
            sequencer.resume();
            self.overridden = false;
            Ok(MonitorEvent::Cleared { distance })
        } else {
            Ok(MonitorEvent::Unchanged { distance })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::test_support::RecordingHead;
    use crate::traffic::TrafficContext;
    use core::cell::Cell;

    /// Counts pause/resume calls
    #[derive(Default)]
    struct CountingControl {
        pauses: Cell<u32>,
        resumes: Cell<u32>,
    }

    impl SequencerControl for CountingControl {
        fn pause(&self) {
            self.pauses.set(self.pauses.get() + 1);
        }

        fn resume(&self) {
            self.resumes.set(self.resumes.get() + 1);
        }
    }

    #[test]
    fn test_close_reading_enters_alert() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        let event = monitor.handle(Ok(0.99), &mut head, &control).unwrap();

        assert_eq!(event, MonitorEvent::Alerted { distance: 0.99 });
        assert_eq!(monitor.get_state(), OverrideState::Alert);
        assert_eq!(head.last(), Some(LightPattern::ALERT));
        assert_eq!(control.pauses.get(), 1);
    }

    #[test]
    fn test_threshold_enters_alert_from_normal() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        let event = monitor.handle(Ok(1.0), &mut head, &control).unwrap();
        assert_eq!(event, MonitorEvent::Alerted { distance: 1.0 });
    }

    #[test]
    fn test_threshold_does_not_exit_alert() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        monitor.handle(Ok(0.5), &mut head, &control).unwrap();
        let event = monitor.handle(Ok(1.0), &mut head, &control).unwrap();

        assert_eq!(event, MonitorEvent::Unchanged { distance: 1.0 });
        assert!(monitor.is_overridden());
        assert_eq!(control.pauses.get(), 1);
        assert_eq!(control.resumes.get(), 0);
    }

    #[test]
    fn test_just_above_threshold_exits_alert() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        monitor.handle(Ok(0.5), &mut head, &control).unwrap();
        let event = monitor.handle(Ok(1.01), &mut head, &control).unwrap();

        assert_eq!(event, MonitorEvent::Cleared { distance: 1.01 });
        assert_eq!(monitor.get_state(), OverrideState::Normal);
        assert_eq!(control.resumes.get(), 1);
    }

    #[test]
    fn test_far_reading_while_normal_is_noop() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        let event = monitor.handle(Ok(1.01), &mut head, &control).unwrap();

        assert_eq!(event, MonitorEvent::Unchanged { distance: 1.01 });
        assert_eq!(control.resumes.get(), 0);
        assert!(head.shown.is_empty());
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        for _ in 0..5 {
            monitor.handle(Ok(0.3), &mut head, &control).unwrap();
        }

        assert_eq!(control.pauses.get(), 1);
        assert_eq!(head.shown.len(), 1);
    }

    #[test]
    fn test_sensor_fault_changes_nothing() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let control = CountingControl::default();

        for err in [
            SensorError::Ping,
            SensorError::PingTimeout,
            SensorError::EchoTimeout,
            SensorError::Gpio,
        ] {
            let event = monitor.handle(Err(err), &mut head, &control).unwrap();
            assert_eq!(event, MonitorEvent::SensorFault(err));
        }

        assert!(!monitor.is_overridden());
        assert!(head.shown.is_empty());
        assert_eq!(control.pauses.get(), 0);

        // A fault during ALERT keeps the override
        monitor.handle(Ok(0.2), &mut head, &control).unwrap();
        monitor
            .handle(Err(SensorError::EchoTimeout), &mut head, &control)
            .unwrap();
        assert!(monitor.is_overridden());
        assert_eq!(control.resumes.get(), 0);
    }

    #[test]
    fn test_failed_alert_write_is_retried() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead {
            fail: true,
            ..Default::default()
        };
        let control = CountingControl::default();

        assert!(monitor.handle(Ok(0.5), &mut head, &control).is_err());
        assert!(!monitor.is_overridden());
        assert_eq!(control.pauses.get(), 0);

        head.fail = false;
        let event = monitor.handle(Ok(0.5), &mut head, &control).unwrap();
        assert_eq!(event, MonitorEvent::Alerted { distance: 0.5 });
    }

    #[test]
    fn test_reading_sequence_end_to_end() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let context = TrafficContext::new();

        let events: [MonitorEvent; 4] = core::array::from_fn(|i| {
            let distance = [2.0, 0.5, 0.5, 2.0][i];
            monitor.handle(Ok(distance), &mut head, &context).unwrap()
        });

        assert_eq!(
            events,
            [
                MonitorEvent::Unchanged { distance: 2.0 },
                MonitorEvent::Alerted { distance: 0.5 },
                MonitorEvent::Unchanged { distance: 0.5 },
                MonitorEvent::Cleared { distance: 2.0 },
            ]
        );
        assert!(context.is_enabled());
        assert_eq!(monitor.get_state(), OverrideState::Normal);
    }

    #[test]
    fn test_monitor_pauses_real_context() {
        let mut monitor = ProximityMonitor::default();
        let mut head = RecordingHead::default();
        let context = TrafficContext::new();

        monitor.handle(Ok(0.4), &mut head, &context).unwrap();
        assert!(!context.is_enabled());

        monitor.handle(Ok(3.0), &mut head, &context).unwrap();
        assert!(context.is_enabled());
    }
}
