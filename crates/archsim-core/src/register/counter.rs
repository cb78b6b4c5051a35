use std::cell::Cell;

use super::RegisterOp;

/// Behaviour of a counter at the edge of its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CounterMode {
    /// Wraps modulo `2^width`; overflow reports the rollover.
    Wrapping,
    /// Clamps at zero or the mask; overflow reports the clamp.
    Saturating,
}

/// Increment/decrement amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CounterStep {
    /// By one.
    One,
    /// By two.
    Two,
    /// By four.
    Four,
    /// By eight.
    Eight,
}

impl CounterStep {
    /// Numeric step.
    #[must_use]
    pub const fn amount(self) -> u64 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Counter {
    mode: CounterMode,
    selected: Option<RegisterOp>,
    overflow: bool,
    staged_overflow: Cell<bool>,
}

impl Counter {
    pub(super) const fn new(mode: CounterMode) -> Self {
        Self {
            mode,
            selected: None,
            overflow: false,
            staged_overflow: Cell::new(false),
        }
    }

    pub(super) const fn mode(&self) -> CounterMode {
        self.mode
    }

    pub(super) const fn overflow(&self) -> bool {
        self.overflow
    }

    pub(super) fn select(&mut self, op: RegisterOp) {
        self.selected = Some(op);
    }

    pub(super) fn next_value(&self, current: u64, mask: u64) -> Option<u64> {
        let (value, overflow) = match self.selected? {
            RegisterOp::Increment(step) => self.increment(current, step.amount(), mask),
            RegisterOp::Decrement(step) => self.decrement(current, step.amount(), mask),
            _ => (0, false),
        };
        self.staged_overflow.set(overflow);
        Some(value)
    }

    const fn increment(&self, current: u64, step: u64, mask: u64) -> (u64, bool) {
        match self.mode {
            CounterMode::Wrapping => {
                let next = current.wrapping_add(step) & mask;
                (next, next < step)
            }
            CounterMode::Saturating => {
                if current > mask.saturating_sub(step) {
                    (mask, true)
                } else {
                    (current + step, false)
                }
            }
        }
    }

    const fn decrement(&self, current: u64, step: u64, mask: u64) -> (u64, bool) {
        match self.mode {
            CounterMode::Wrapping => (current.wrapping_sub(step) & mask, current < step),
            CounterMode::Saturating => {
                if current < step {
                    (0, true)
                } else {
                    (current - step, false)
                }
            }
        }
    }

    /// Overflow changes only on cycles where the register was updated.
    pub(super) fn commit(&mut self, updated: bool) {
        let staged = self.staged_overflow.take();
        if updated {
            self.overflow = staged;
        }
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Counter, CounterMode, CounterStep};
    use crate::register::RegisterOp;

    fn run(mode: CounterMode, current: u64, op: RegisterOp, width_mask: u64) -> (u64, bool) {
        let mut counter = Counter::new(mode);
        counter.select(op);
        let value = counter.next_value(current, width_mask).expect("operation selected");
        counter.commit(true);
        (value, counter.overflow())
    }

    #[rstest]
    #[case(CounterMode::Wrapping, 0xE, RegisterOp::Increment(CounterStep::One), (0xF, false))]
    #[case(CounterMode::Wrapping, 0xF, RegisterOp::Increment(CounterStep::One), (0x0, true))]
    #[case(CounterMode::Wrapping, 0xE, RegisterOp::Increment(CounterStep::Four), (0x2, true))]
    #[case(CounterMode::Wrapping, 0x0, RegisterOp::Decrement(CounterStep::One), (0xF, true))]
    #[case(CounterMode::Wrapping, 0x9, RegisterOp::Decrement(CounterStep::Eight), (0x1, false))]
    #[case(CounterMode::Saturating, 0xE, RegisterOp::Increment(CounterStep::Two), (0xF, true))]
    #[case(CounterMode::Saturating, 0xD, RegisterOp::Increment(CounterStep::Two), (0xF, false))]
    #[case(CounterMode::Saturating, 0x1, RegisterOp::Decrement(CounterStep::Two), (0x0, true))]
    #[case(CounterMode::Saturating, 0x7, RegisterOp::Clear, (0x0, false))]
    fn counter_steps_within_four_bits(
        #[case] mode: CounterMode,
        #[case] current: u64,
        #[case] op: RegisterOp,
        #[case] expected: (u64, bool),
    ) {
        assert_eq!(run(mode, current, op, 0xF), expected);
    }

    #[test]
    fn overflow_only_changes_on_update() {
        let mut counter = Counter::new(CounterMode::Wrapping);
        counter.select(RegisterOp::Increment(CounterStep::One));
        assert_eq!(counter.next_value(0xF, 0xF), Some(0));
        counter.commit(true);
        assert!(counter.overflow());

        assert_eq!(counter.next_value(0, 0xF), None);
        counter.commit(false);
        assert!(counter.overflow());
    }
}
