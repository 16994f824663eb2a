use dp_core::frame::Direction;

use crate::cooldown::CooldownGate;

/// Direction seen on the previous cycle, `None` after a neutral reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heading {
    #[default]
    None,
    Toward,
    Away,
}

impl From<Direction> for Heading {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Toward => Self::Toward,
            Direction::Away => Self::Away,
        }
    }
}

/// Streak state of the classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectionState {
    pub last_direction: Heading,
    pub consistent_count: u32,
}

/// Debounced threshold classifier on the smoothed shift.
///
/// A direction is accepted only on the cycle where its streak reaches exactly
/// `required` consecutive readings, and only if the cooldown gate is open.
/// Longer streaks do not fire again.
///
/// # Example
/// ```
/// use dp_audio::classifier::DirectionClassifier;
/// use dp_audio::cooldown::CooldownGate;
/// use dp_core::frame::Direction;
///
/// let mut classifier = DirectionClassifier::new(5.0, 3);
/// let mut gate = CooldownGate::new(10.0);
/// assert_eq!(classifier.classify(12.0, 0.0, &mut gate), None);
/// assert_eq!(classifier.classify(12.0, 0.1, &mut gate), None);
/// assert_eq!(classifier.classify(12.0, 0.2, &mut gate), Some(Direction::Toward));
/// assert_eq!(classifier.classify(12.0, 0.3, &mut gate), None);
/// ```
#[derive(Clone, Debug)]
pub struct DirectionClassifier {
    shift_threshold: f64,
    required: u32,
    state: DirectionState,
}

impl DirectionClassifier {
    /// Classifier in the neutral state.
    #[must_use]
    pub fn new(shift_threshold: f64, required: u32) -> Self {
        Self {
            shift_threshold,
            required,
            state: DirectionState::default(),
        }
    }

    /// Feed one smoothed shift. Starts `gate` when a direction is accepted.
    pub fn classify(
        &mut self,
        smoothed_shift: f64,
        now: f64,
        gate: &mut CooldownGate,
    ) -> Option<Direction> {
        if smoothed_shift.abs() <= self.shift_threshold {
            self.state = DirectionState::default();
            return None;
        }

        let candidate = Direction::from_shift(smoothed_shift);
        let heading = Heading::from(candidate);
        if heading == self.state.last_direction {
            self.state.consistent_count = self.state.consistent_count.saturating_add(1);
        } else {
            self.state = DirectionState {
                last_direction: heading,
                consistent_count: 1,
            };
        }

        if self.state.consistent_count == self.required && gate.permits(now) {
            gate.start(now);
            return Some(candidate);
        }
        None
    }

    /// Current streak.
    #[must_use]
    pub fn state(&self) -> DirectionState {
        self.state
    }

    /// Back to {None, 0}.
    pub fn reset(&mut self) {
        self.state = DirectionState::default();
    }

    /// Update the neutral band half-width.
    pub fn set_threshold(&mut self, shift_threshold: f64) {
        self.shift_threshold = shift_threshold;
    }

    /// Update the streak length that fires an event.
    pub fn set_required(&mut self, required: u32) {
        self.required = required;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (DirectionClassifier, CooldownGate) {
        (DirectionClassifier::new(5.0, 3), CooldownGate::new(10.0))
    }

    #[test]
    fn neutral_reading_always_resets() {
        let (mut c, mut gate) = fresh();
        for s in [8.0, 9.0, -7.0, -7.0] {
            c.classify(s, 0.0, &mut gate);
            assert_ne!(c.state(), DirectionState::default());
            c.classify(5.0, 0.0, &mut gate);
            assert_eq!(c.state(), DirectionState::default());
            c.classify(-4.9, 0.0, &mut gate);
            assert_eq!(c.state(), DirectionState::default());
        }
    }

    #[test]
    fn interrupted_streak_emits_once_on_second_batch() {
        let (mut c, mut gate) = fresh();
        let readings = [10.0, 10.0, 0.0, 10.0, 10.0, 10.0];
        let emitted: Vec<(usize, Direction)> = readings
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| c.classify(s, i as f64, &mut gate).map(|d| (i, d)))
            .collect();
        assert_eq!(emitted, vec![(5, Direction::Toward)]);
    }

    #[test]
    fn sign_flip_restarts_streak() {
        let (mut c, mut gate) = fresh();
        c.classify(10.0, 0.0, &mut gate);
        c.classify(10.0, 0.1, &mut gate);
        assert_eq!(c.classify(-10.0, 0.2, &mut gate), None);
        assert_eq!(
            c.state(),
            DirectionState {
                last_direction: Heading::Away,
                consistent_count: 1
            }
        );
        c.classify(-10.0, 0.3, &mut gate);
        assert_eq!(c.classify(-10.0, 0.4, &mut gate), Some(Direction::Away));
    }

    #[test]
    fn long_streak_fires_only_at_exact_count() {
        let (mut c, mut gate) = fresh();
        let fired = (0..20)
            .filter(|&i| c.classify(-20.0, f64::from(i) * 100.0, &mut gate).is_some())
            .count();
        assert_eq!(fired, 1);
        assert_eq!(c.state().consistent_count, 20);
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let (mut c, mut gate) = fresh();
        let mut events = Vec::new();
        // A gesture every 4 cycles (3 readings + 1 neutral), 1 s per cycle.
        for i in 0..40 {
            let s = if i % 4 == 3 { 0.0 } else { 15.0 };
            let now = f64::from(i);
            if c.classify(s, now, &mut gate).is_some() {
                events.push(now);
            }
        }
        assert_eq!(events.first(), Some(&2.0));
        assert!(events.windows(2).all(|w| w[1] - w[0] >= 10.0));
        assert_eq!(events, vec![2.0, 14.0, 26.0, 38.0]);
    }

    #[test]
    fn blocked_streak_does_not_start_cooldown() {
        let (mut c, mut gate) = fresh();
        gate.start(0.0);
        for i in 0..3 {
            assert_eq!(c.classify(10.0, 1.0 + f64::from(i), &mut gate), None);
        }
        assert_eq!(gate.last_action_time(), Some(0.0));
    }
}
