//! Traffic light sequencer
//!
//! Cycles RED -> GREEN -> YELLOW -> RED with a fixed hold per state. The
//! proximity monitor can pause the cycle through a shared [`TrafficContext`];
//! the sequencer checks the enable flag before every step and never talks
//! back to the monitor.

use crate::BoardError;
use crate::lights::{LightPattern, SignalHead};
use core::sync::atomic::{AtomicBool, Ordering};

/// Traffic light output state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficState {
    Red,
    Yellow,
    Green,
}

impl TrafficState {
    /// Fixed cyclic successor
    pub fn next(self) -> Self {
        match self {
            TrafficState::Red => TrafficState::Green,
            TrafficState::Green => TrafficState::Yellow,
            TrafficState::Yellow => TrafficState::Red,
        }
    }

    /// How long this state is held, in whole seconds
    pub fn hold_secs(self) -> u32 {
        match self {
            TrafficState::Red => 5,
            TrafficState::Green => 10,
            TrafficState::Yellow => 1,
        }
    }

    /// Lamps lit while in this state
    pub fn pattern(self) -> LightPattern {
        match self {
            TrafficState::Red => LightPattern::RED,
            TrafficState::Yellow => LightPattern::YELLOW,
            TrafficState::Green => LightPattern::GREEN,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrafficState::Red => "RED",
            TrafficState::Yellow => "YELLOW",
            TrafficState::Green => "GREEN",
        }
    }
}

/// Pause/resume handle the monitor uses on the sequencer
pub trait SequencerControl {
    fn pause(&self);
    fn resume(&self);
}

/// State shared between the monitor and the sequencer
///
/// Only plain atomic loads and stores are used; the ESP32-C3 has no
/// compare-and-swap.
#[derive(Debug)]
pub struct TrafficContext {
    enabled: AtomicBool,
}

impl TrafficContext {
    /// Sequencer starts enabled
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for TrafficContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencerControl for TrafficContext {
    fn pause(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn resume(&self) {
        self.enabled.store(true, Ordering::Release);
    }
}

/// Result of one sequencer loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerTick {
    /// Disabled by the monitor; outputs untouched
    Paused,
    /// Outputs set for `from`, hold for `hold_secs` before the next tick
    Advanced { from: TrafficState, hold_secs: u32 },
}

/// The cyclic state driver
#[derive(Debug, Clone)]
pub struct Sequencer {
    current_state: TrafficState,
    previous_state: Option<TrafficState>,
    was_paused: bool,
    cycles: u32,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            current_state: TrafficState::Red,
            previous_state: None,
            was_paused: false,
            cycles: 0,
        }
    }

    /// State that the next step will display
    pub fn get_current_state(&self) -> TrafficState {
        self.current_state
    }

    /// State displayed by the last step
    pub fn get_previous_state(&self) -> Option<TrafficState> {
        self.previous_state
    }

    /// Completed RED -> GREEN -> YELLOW rounds
    pub fn get_cycles(&self) -> u32 {
        self.cycles
    }

    /// Show the current state, move to its successor and return the hold
    /// time of the state just shown
    ///
    /// On an output error the state is left unchanged.
    pub fn step<H: SignalHead>(&mut self, head: &mut H) -> Result<u32, BoardError> {
        let state = self.current_state;
        head.show(state.pattern())?;

        self.previous_state = Some(state);
        self.current_state = state.next();
        if self.current_state == TrafficState::Red {
            self.cycles = self.cycles.wrapping_add(1);
        }
        Ok(state.hold_secs())
    }

    /// One loop iteration: step unless the context is paused
    ///
    /// Coming back from a pause the cycle restarts at RED, matching the
    /// lamp the override left lit.
    pub fn tick<H: SignalHead>(
        &mut self,
        context: &TrafficContext,
        head: &mut H,
    ) -> Result<SequencerTick, BoardError> {
        if !context.is_enabled() {
            self.was_paused = true;
            return Ok(SequencerTick::Paused);
        }

        if self.was_paused {
            self.was_paused = false;
            self.current_state = TrafficState::Red;
        }

        let from = self.current_state;
        let hold_secs = self.step(head)?;
        Ok(SequencerTick::Advanced { from, hold_secs })
    }

    /// Jump to a state without touching the outputs
    pub fn force_state(&mut self, state: TrafficState) {
        self.previous_state = Some(self.current_state);
        self.current_state = state;
    }
}

/// Next wait while holding a state until `deadline_ms`
///
/// `None` ends the hold: either the deadline has passed or the sequencer
/// was paused. Otherwise the wait never exceeds `poll_ms`, so a pause is
/// noticed within one poll.
pub fn next_hold_slice(now_ms: u64, deadline_ms: u64, poll_ms: u64, enabled: bool) -> Option<u64> {
    if !enabled || now_ms >= deadline_ms {
        return None;
    }
    Some((deadline_ms - now_ms).min(poll_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::test_support::RecordingHead;

    const ALL_STATES: [TrafficState; 3] =
        [TrafficState::Red, TrafficState::Yellow, TrafficState::Green];

    #[test]
    fn test_step_from_every_state() {
        let expected = [
            (TrafficState::Red, TrafficState::Green, 5, LightPattern::RED),
            (TrafficState::Green, TrafficState::Yellow, 10, LightPattern::GREEN),
            (TrafficState::Yellow, TrafficState::Red, 1, LightPattern::YELLOW),
        ];

        for (from, to, hold, pattern) in expected {
            let mut sequencer = Sequencer::new();
            sequencer.force_state(from);
            let mut head = RecordingHead::default();

            assert_eq!(sequencer.step(&mut head), Ok(hold));
            assert_eq!(sequencer.get_current_state(), to);
            assert_eq!(sequencer.get_previous_state(), Some(from));
            assert_eq!(head.last(), Some(pattern));
        }
    }

    #[test]
    fn test_exactly_one_lamp_per_state() {
        for state in ALL_STATES {
            assert_eq!(state.pattern().lit_count(), 1);
        }
    }

    #[test]
    fn test_full_cycle() {
        let mut sequencer = Sequencer::new();
        let mut head = RecordingHead::default();

        let holds = [
            sequencer.step(&mut head).unwrap(),
            sequencer.step(&mut head).unwrap(),
            sequencer.step(&mut head).unwrap(),
        ];

        assert_eq!(holds, [5, 10, 1]);
        assert_eq!(
            head.shown.as_slice(),
            &[LightPattern::RED, LightPattern::GREEN, LightPattern::YELLOW]
        );
        assert_eq!(sequencer.get_current_state(), TrafficState::Red);
        assert_eq!(sequencer.get_cycles(), 1);
    }

    #[test]
    fn test_output_error_keeps_state() {
        let mut sequencer = Sequencer::new();
        let mut head = RecordingHead {
            fail: true,
            ..Default::default()
        };

        assert_eq!(sequencer.step(&mut head), Err(BoardError::Gpio));
        assert_eq!(sequencer.get_current_state(), TrafficState::Red);
    }

    #[test]
    fn test_paused_tick_leaves_outputs_alone() {
        let context = TrafficContext::new();
        let mut sequencer = Sequencer::new();
        let mut head = RecordingHead::default();

        context.pause();
        assert_eq!(sequencer.tick(&context, &mut head), Ok(SequencerTick::Paused));
        assert_eq!(sequencer.tick(&context, &mut head), Ok(SequencerTick::Paused));
        assert!(head.shown.is_empty());
    }

    #[test]
    fn test_resume_restarts_at_red() {
        let context = TrafficContext::new();
        let mut sequencer = Sequencer::new();
        let mut head = RecordingHead::default();

        // RED, then GREEN shown; YELLOW is next
        sequencer.tick(&context, &mut head).unwrap();
        sequencer.tick(&context, &mut head).unwrap();
        assert_eq!(sequencer.get_current_state(), TrafficState::Yellow);

        context.pause();
        sequencer.tick(&context, &mut head).unwrap();
        context.resume();

        assert_eq!(
            sequencer.tick(&context, &mut head),
            Ok(SequencerTick::Advanced {
                from: TrafficState::Red,
                hold_secs: 5
            })
        );
        assert_eq!(sequencer.get_current_state(), TrafficState::Green);
    }

    #[test]
    fn test_context_toggles() {
        let context = TrafficContext::default();
        assert!(context.is_enabled());
        context.pause();
        assert!(!context.is_enabled());
        context.resume();
        assert!(context.is_enabled());
    }

    #[test]
    fn test_hold_is_sliced_into_polls() {
        assert_eq!(next_hold_slice(0, 10_000, 50, true), Some(50));
        assert_eq!(next_hold_slice(9_900, 10_000, 50, true), Some(50));
    }

    #[test]
    fn test_last_slice_is_shorter_than_a_poll() {
        assert_eq!(next_hold_slice(9_980, 10_000, 50, true), Some(20));
    }

    #[test]
    fn test_hold_ends_at_deadline() {
        assert_eq!(next_hold_slice(10_000, 10_000, 50, true), None);
        assert_eq!(next_hold_slice(10_030, 10_000, 50, true), None);
    }

    #[test]
    fn test_pause_cuts_green_hold_short() {
        let context = TrafficContext::new();
        let mut sequencer = Sequencer::new();
        let mut head = RecordingHead::default();
        sequencer.force_state(TrafficState::Green);

        let hold_secs = match sequencer.tick(&context, &mut head) {
            Ok(SequencerTick::Advanced { from, hold_secs }) => {
                assert_eq!(from, TrafficState::Green);
                hold_secs
            }
            other => panic!("unexpected tick {:?}", other),
        };
        let deadline_ms = u64::from(hold_secs) * 1000;

        // Simulated clock: paused 3 s into the 10 s hold
        let mut now_ms = 0;
        while let Some(wait) = next_hold_slice(now_ms, deadline_ms, 50, context.is_enabled()) {
            assert!(wait <= 50);
            now_ms += wait;
            if now_ms == 3_000 {
                context.pause();
            }
        }

        assert_eq!(now_ms, 3_000);
        assert_eq!(sequencer.tick(&context, &mut head), Ok(SequencerTick::Paused));
        assert_eq!(head.last(), Some(LightPattern::GREEN));
        assert_eq!(head.shown.len(), 1);
    }
}
