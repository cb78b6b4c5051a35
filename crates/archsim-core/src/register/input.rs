use std::collections::VecDeque;
use std::fmt;

use crate::entity::mask_for;

/// Host-supplied values for input-port registers.
///
/// An input port asks for one value each time it is pulled from.
pub trait InputSource: fmt::Debug {
    /// Next value for the `width`-bit port `register`, or `None` when the
    /// source has run dry.
    fn next_value(&mut self, register: &str, width: u32) -> Option<u64>;
}

/// A fixed queue of values handed out in order to whichever port asks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedInput {
    values: VecDeque<u64>,
}

impl ScriptedInput {
    /// Queues `values` for delivery.
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Values not yet delivered.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_value(&mut self, _register: &str, _width: u32) -> Option<u64> {
        self.values.pop_front()
    }
}

/// Accepts `raw` when it fits `width` bits unsigned, or when every bit from
/// the sign bit up is set (a sign-extended negative).
pub(super) const fn accept(raw: u64, width: u32) -> Option<u64> {
    let mask = mask_for(width);
    let negative = !(mask >> 1);
    if raw & !mask == 0 || raw & negative == negative {
        Some(raw & mask)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{accept, InputSource, ScriptedInput};

    #[rstest]
    #[case(0x00, 8, Some(0x00))]
    #[case(0xFF, 8, Some(0xFF))]
    #[case(0x100, 8, None)]
    #[case(0xFFFF_FFFF_FFFF_FF80, 8, Some(0x80))]
    #[case(0xFFFF_FFFF_FFFF_FF7F, 8, None)]
    #[case(0x8000_0000_0000_0000, 64, Some(0x8000_0000_0000_0000))]
    #[case(0x3, 1, None)]
    #[case(u64::MAX, 1, Some(1))]
    fn input_range_check(#[case] raw: u64, #[case] width: u32, #[case] expected: Option<u64>) {
        assert_eq!(accept(raw, width), expected);
    }

    #[test]
    fn scripted_input_drains_in_order() {
        let mut source = ScriptedInput::new([3, 1]);
        assert_eq!(source.next_value("in", 8), Some(3));
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.next_value("other", 4), Some(1));
        assert_eq!(source.next_value("in", 8), None);
    }
}
