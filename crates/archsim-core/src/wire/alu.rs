use std::cell::Cell;
use std::fmt;

use crate::circuit::Circuit;
use crate::edge::Port;
use crate::entity::{mask_for, sign_bit, AluId, Computable, EdgeId, EntityInfo, Named, WORD_BITS};
use crate::trace::TraceEvent;
use crate::ArchError;

/// ALU operations and their numeric codes.
///
/// Code `0` means "no operation" and has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AluOp {
    /// `op1 + op2`.
    Add,
    /// `op1 - op2`.
    Subtract,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Bitwise complement of `op1`.
    Not,
    /// Sign-extend `op1` using `op2` as a one-hot sign-bit mask.
    ExtendSign,
    /// `op1` shifted left by `op2`.
    ShiftLeft,
    /// `op1` shifted right by `op2`, zero filled.
    ShiftRight,
    /// `op1` shifted right by `op2`, sign filled.
    ShiftRightArith,
    /// Passes `op1`.
    PassFirst,
    /// Passes `op2`.
    PassSecond,
    /// Constant zero.
    Zero,
    /// Constant one.
    One,
}

impl AluOp {
    /// Every operation in code order.
    pub const ALL: [Self; 14] = [
        Self::Add,
        Self::Subtract,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Not,
        Self::ExtendSign,
        Self::ShiftLeft,
        Self::ShiftRight,
        Self::ShiftRightArith,
        Self::PassFirst,
        Self::PassSecond,
        Self::Zero,
        Self::One,
    ];

    /// Numeric code, `1..=14`.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Add => 1,
            Self::Subtract => 2,
            Self::And => 3,
            Self::Or => 4,
            Self::Xor => 5,
            Self::Not => 6,
            Self::ExtendSign => 7,
            Self::ShiftLeft => 8,
            Self::ShiftRight => 9,
            Self::ShiftRightArith => 10,
            Self::PassFirst => 11,
            Self::PassSecond => 12,
            Self::Zero => 13,
            Self::One => 14,
        }
    }

    /// Operation for `code`; `None` for `0` and for unknown codes.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Mnemonic used in traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
            Self::ExtendSign => "extendSign",
            Self::ShiftLeft => "lshift",
            Self::ShiftRight => "rshift",
            Self::ShiftRightArith => "rashift",
            Self::PassFirst => "rop1",
            Self::PassSecond => "rop2",
            Self::Zero => "zero",
            Self::One => "one",
        }
    }

    const fn reads_first(self) -> bool {
        !matches!(self, Self::PassSecond | Self::Zero | Self::One)
    }

    const fn reads_second(self) -> bool {
        !matches!(self, Self::Not | Self::PassFirst | Self::Zero | Self::One)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value and flags produced by one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AluOutcome {
    /// Result, masked to the ALU width.
    pub value: u64,
    /// Carry out of the top bit.
    pub carry: bool,
    /// Two's-complement overflow.
    pub overflow: bool,
}

impl AluOutcome {
    const fn plain(value: u64) -> Self {
        Self {
            value,
            carry: false,
            overflow: false,
        }
    }
}

const fn top(value: u64, width: u32) -> u64 {
    (value >> (width - 1)) & 1
}

/// Flags from the sign bits of both addends and the sum.
const fn add_flags(x1: u64, y1: u64, z1: u64) -> (bool, bool) {
    let overflow = x1 == y1 && z1 != x1;
    let carry = x1 + y1 == 2 || (x1 + y1 == 1 && z1 == 0);
    (carry, overflow)
}

fn add(a: u64, b: u64, width: u32) -> AluOutcome {
    let value = a.wrapping_add(b) & mask_for(width);
    let (carry, overflow) = add_flags(top(a, width), top(b, width), top(value, width));
    AluOutcome {
        value,
        carry,
        overflow,
    }
}

/// Two-pass subtraction: negate `b`, then add.
///
/// Flags from the negation are kept and the addition can only set more, so
/// `b == 0` always carries and the most negative `b` always overflows.
fn subtract(a: u64, b: u64, width: u32) -> AluOutcome {
    let mask = mask_for(width);
    let inverted = !b;
    let negated = inverted.wrapping_add(1) & mask;
    let (y1, z1) = (top(inverted, width), top(negated, width));
    let mut overflow = y1 == 0 && z1 != 0;
    let mut carry = y1 == 1 && z1 == 0;

    let value = a.wrapping_add(negated) & mask;
    let (sum_carry, sum_overflow) = add_flags(top(a, width), z1, top(value, width));
    carry |= sum_carry;
    overflow |= sum_overflow;
    AluOutcome {
        value,
        carry,
        overflow,
    }
}

/// Sign-extends `value` from the bit selected by `sign_mask`.
///
/// When that bit is set, every bit from the mask upward is set; otherwise
/// every bit above the mask's highest bit is cleared. A zero mask yields 0.
#[must_use]
pub const fn extend_sign(value: u64, sign_mask: u64, width: u32) -> u64 {
    let extended = if value & sign_mask != 0 {
        value | (u64::MAX << sign_mask.trailing_zeros())
    } else if sign_mask == 0 {
        0
    } else {
        value & (u64::MAX >> sign_mask.leading_zeros())
    };
    extended & mask_for(width)
}

fn shift_count(amount: u64) -> u64 {
    amount.min(u64::from(WORD_BITS))
}

fn shift_left(mut value: u64, amount: u64, mask: u64) -> u64 {
    for _ in 0..shift_count(amount) {
        value = (value << 1) & mask;
    }
    value
}

fn shift_right(mut value: u64, amount: u64) -> u64 {
    for _ in 0..shift_count(amount) {
        value >>= 1;
    }
    value
}

fn shift_right_arith(mut value: u64, amount: u64, width: u32) -> u64 {
    let sign = value & sign_bit(width);
    for _ in 0..shift_count(amount) {
        value = (value >> 1) | sign;
    }
    value
}

/// Applies `op` to `a` and `b` at `width` bits.
///
/// Operands are masked to the width first.
#[must_use]
pub fn evaluate(op: AluOp, a: u64, b: u64, width: u32) -> AluOutcome {
    let mask = mask_for(width);
    let (a, b) = (a & mask, b & mask);
    match op {
        AluOp::Add => add(a, b, width),
        AluOp::Subtract => subtract(a, b, width),
        AluOp::And => AluOutcome::plain(a & b),
        AluOp::Or => AluOutcome::plain(a | b),
        AluOp::Xor => AluOutcome::plain(a ^ b),
        AluOp::Not => AluOutcome::plain(!a & mask),
        AluOp::ExtendSign => AluOutcome::plain(extend_sign(a, b, width)),
        AluOp::ShiftLeft => AluOutcome::plain(shift_left(a, b, mask)),
        AluOp::ShiftRight => AluOutcome::plain(shift_right(a, b)),
        AluOp::ShiftRightArith => AluOutcome::plain(shift_right_arith(a, b, width)),
        AluOp::PassFirst => AluOutcome::plain(a),
        AluOp::PassSecond => AluOutcome::plain(b),
        AluOp::Zero => AluOutcome::plain(0),
        AluOp::One => AluOutcome::plain(1 & mask),
    }
}

/// Combinational arithmetic/logic unit.
///
/// Result, carry, and overflow are separate sources. Each pull re-evaluates
/// the selected operation from the current operand bindings.
#[derive(Debug)]
pub struct Alu {
    id: AluId,
    info: EntityInfo,
    op1: EdgeId,
    op2: EdgeId,
    result: EdgeId,
    carry: EdgeId,
    overflow: EdgeId,
    selected: Option<AluOp>,
    last_operands: Cell<Option<(u64, u64)>>,
}

/// Edges of a freshly constructed ALU, in port order.
pub(crate) struct AluEdges {
    pub(crate) op1: EdgeId,
    pub(crate) op2: EdgeId,
    pub(crate) result: EdgeId,
    pub(crate) carry: EdgeId,
    pub(crate) overflow: EdgeId,
}

impl Alu {
    pub(crate) const fn new(id: AluId, info: EntityInfo, edges: AluEdges) -> Self {
        Self {
            id,
            info,
            op1: edges.op1,
            op2: edges.op2,
            result: edges.result,
            carry: edges.carry,
            overflow: edges.overflow,
            selected: None,
            last_operands: Cell::new(None),
        }
    }

    /// First operand sink.
    #[must_use]
    pub const fn op1(&self) -> EdgeId {
        self.op1
    }

    /// Second operand sink.
    #[must_use]
    pub const fn op2(&self) -> EdgeId {
        self.op2
    }

    /// Result source.
    #[must_use]
    pub const fn result(&self) -> EdgeId {
        self.result
    }

    /// One-bit carry source.
    #[must_use]
    pub const fn carry(&self) -> EdgeId {
        self.carry
    }

    /// One-bit overflow source.
    #[must_use]
    pub const fn overflow(&self) -> EdgeId {
        self.overflow
    }

    /// Operation selected for the current cycle.
    #[must_use]
    pub const fn selected(&self) -> Option<AluOp> {
        self.selected
    }

    /// Operands of the most recent evaluation.
    #[must_use]
    pub fn last_operands(&self) -> Option<(u64, u64)> {
        self.last_operands.get()
    }

    /// Selects `op` for the current cycle.
    pub fn perform(&mut self, op: AluOp) {
        self.selected = Some(op);
    }

    /// Selects an operation by numeric code; `0` deselects.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::IllegalOperation`] for codes above 14.
    pub fn perform_code(&mut self, code: u8) -> Result<(), ArchError> {
        if code == 0 {
            self.selected = None;
            return Ok(());
        }
        let op = AluOp::from_code(code).ok_or_else(|| ArchError::IllegalOperation {
            unit: self.info.name().to_owned(),
            code,
        })?;
        self.selected = Some(op);
        Ok(())
    }

    pub(crate) fn end_cycle(&mut self) {
        self.selected = None;
    }
}

impl Named for Alu {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

impl Computable for Alu {
    fn compute(&self, port: Port, net: &Circuit) -> Result<u64, ArchError> {
        let op = self.selected.ok_or_else(|| ArchError::NoOperationSelected {
            alu: self.info.name().to_owned(),
        })?;
        let a = if op.reads_first() { net.read(self.op1)? } else { 0 };
        let b = if op.reads_second() { net.read(self.op2)? } else { 0 };
        let outcome = evaluate(op, a, b, self.info.width());
        let mask = self.info.mask();
        self.last_operands.set(Some((a & mask, b & mask)));
        net.tracer().step_event(TraceEvent::AluEvaluated {
            alu: self.id,
            op,
            op1: a & mask,
            op2: b & mask,
            result: outcome.value,
            carry: outcome.carry,
            overflow: outcome.overflow,
        });
        Ok(match port {
            Port::Carry => u64::from(outcome.carry),
            Port::Overflow => u64::from(outcome.overflow),
            _ => outcome.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{evaluate, extend_sign, AluOp, AluOutcome};

    fn outcome(value: u64, carry: bool, overflow: bool) -> AluOutcome {
        AluOutcome {
            value,
            carry,
            overflow,
        }
    }

    #[rstest]
    #[case(AluOp::Add, 0x7, 0x1, outcome(0x8, false, true))]
    #[case(AluOp::Add, 0xF, 0x1, outcome(0x0, true, false))]
    #[case(AluOp::Add, 0x8, 0x8, outcome(0x0, true, true))]
    #[case(AluOp::Subtract, 0x5, 0x3, outcome(0x2, true, false))]
    #[case(AluOp::Subtract, 0x3, 0x5, outcome(0xE, false, false))]
    #[case(AluOp::Subtract, 0x0, 0x0, outcome(0x0, true, false))]
    #[case(AluOp::Subtract, 0x8, 0x1, outcome(0x7, true, true))]
    #[case(AluOp::Subtract, 0x0, 0x8, outcome(0x8, false, true))]
    #[case(AluOp::Not, 0x5, 0x0, outcome(0xA, false, false))]
    #[case(AluOp::ShiftLeft, 0x3, 0x2, outcome(0xC, false, false))]
    #[case(AluOp::ShiftLeft, 0x3, 0x40, outcome(0x3, false, false))]
    #[case(AluOp::ShiftRight, 0xC, 0x2, outcome(0x3, false, false))]
    #[case(AluOp::ShiftRightArith, 0x8, 0x2, outcome(0xE, false, false))]
    #[case(AluOp::ShiftRightArith, 0x8, 0xFF, outcome(0xF, false, false))]
    #[case(AluOp::PassSecond, 0x1, 0x2, outcome(0x2, false, false))]
    #[case(AluOp::One, 0x0, 0x0, outcome(0x1, false, false))]
    fn four_bit_operations(
        #[case] op: AluOp,
        #[case] a: u64,
        #[case] b: u64,
        #[case] expected: AluOutcome,
    ) {
        assert_eq!(evaluate(op, a, b, 4), expected);
    }

    #[rstest]
    #[case(AluOp::ShiftLeft, 0x01, 0x40, 0x00)]
    #[case(AluOp::ShiftLeft, 0x81, 0xFF, 0x00)]
    #[case(AluOp::ShiftRight, 0x80, 0x40, 0x00)]
    #[case(AluOp::ShiftRightArith, 0x80, 0x40, 0xFF)]
    #[case(AluOp::ShiftRightArith, 0x7F, 0xFF, 0x00)]
    fn shift_counts_past_the_width_drain_the_word(
        #[case] op: AluOp,
        #[case] a: u64,
        #[case] count: u64,
        #[case] expected: u64,
    ) {
        assert_eq!(evaluate(op, a, count, 8).value, expected);
    }

    #[test]
    fn extend_sign_sets_or_clears_upper_bits() {
        assert_eq!(extend_sign(0x80, 0x80, 16), 0xFF80);
        assert_eq!(extend_sign(0x7F, 0x80, 16), 0x007F);
        assert_eq!(extend_sign(0xAB7F, 0x80, 16), 0x007F);
        assert_eq!(extend_sign(0x1234, 0, 16), 0);
        assert_eq!(extend_sign(1, 1, 64), u64::MAX);
    }

    #[test]
    fn codes_round_trip_and_reject_unknowns() {
        for op in AluOp::ALL {
            assert_eq!(AluOp::from_code(op.code()), Some(op));
        }
        assert_eq!(AluOp::from_code(0), None);
        assert_eq!(AluOp::from_code(15), None);
        assert_eq!(AluOp::ExtendSign.to_string(), "extendSign");
    }

    #[test]
    fn full_word_add_does_not_panic() {
        let sum = evaluate(AluOp::Add, u64::MAX, 1, 64);
        assert_eq!(sum, outcome(0, true, false));
    }
}
