//! ALU property suite: flag laws, shift counts, and result widths.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use archsim_core::{evaluate, mask_for, sign_bit, AluOp};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_test as _;

fn signed(value: u64, width: u32) -> i128 {
    let value = i128::from(value);
    if width < 64 && value & (1 << (width - 1)) != 0 {
        value - (1_i128 << width)
    } else if width == 64 && value >= 1_i128 << 63 {
        value - (1_i128 << 64)
    } else {
        value
    }
}

fn fits(value: i128, width: u32) -> bool {
    let bound = 1_i128 << (width - 1);
    (-bound..bound).contains(&value)
}

fn operands() -> impl Strategy<Value = (u32, u64, u64)> {
    (1_u32..=64).prop_flat_map(|width| {
        let mask = mask_for(width);
        (Just(width), 0..=mask, 0..=mask)
    })
}

proptest! {
    #[test]
    fn add_carry_is_the_unsigned_carry_out((width, a, b) in operands()) {
        let outcome = evaluate(AluOp::Add, a, b, width);
        let sum = u128::from(a) + u128::from(b);
        prop_assert_eq!(outcome.value, (sum as u64) & mask_for(width));
        prop_assert_eq!(outcome.carry, sum > u128::from(mask_for(width)));
    }

    #[test]
    fn add_overflow_is_the_signed_overflow((width, a, b) in operands()) {
        let outcome = evaluate(AluOp::Add, a, b, width);
        let top = sign_bit(width);
        let expected = (a & top) == (b & top) && (outcome.value & top) != (a & top);
        prop_assert_eq!(outcome.overflow, expected);
        prop_assert_eq!(outcome.overflow, !fits(signed(a, width) + signed(b, width), width));
    }

    #[test]
    fn subtract_carry_means_no_borrow((width, a, b) in operands()) {
        let outcome = evaluate(AluOp::Subtract, a, b, width);
        prop_assert_eq!(outcome.value, a.wrapping_sub(b) & mask_for(width));
        prop_assert_eq!(outcome.carry, a >= b);
    }

    #[test]
    fn subtract_overflow_includes_negating_the_minimum((width, a, b) in operands()) {
        let outcome = evaluate(AluOp::Subtract, a, b, width);
        let true_overflow = !fits(signed(a, width) - signed(b, width), width);
        prop_assert_eq!(outcome.overflow, b == sign_bit(width) || true_overflow);
    }

    #[test]
    fn arithmetic_shift_keeps_the_sign(
        (width, a, _) in operands(),
        amount in 0_u64..64,
    ) {
        let amount = amount % u64::from(width);
        let outcome = evaluate(AluOp::ShiftRightArith, a, amount, width);
        let expected = (signed(a, width) >> amount) as u64 & mask_for(width);
        prop_assert_eq!(outcome.value, expected);
        prop_assert_eq!(outcome.value & sign_bit(width), a & sign_bit(width));
    }

    #[test]
    fn zero_shift_is_identity((width, a, _) in operands()) {
        for op in [AluOp::ShiftLeft, AluOp::ShiftRight, AluOp::ShiftRightArith] {
            prop_assert_eq!(evaluate(op, a, 0, width).value, a);
        }
    }

    #[test]
    fn every_result_fits_the_width((width, a, b) in operands()) {
        for op in AluOp::ALL {
            let outcome = evaluate(op, a, b, width);
            prop_assert_eq!(outcome.value & !mask_for(width), 0, "{} overflowed", op);
        }
    }

    #[test]
    fn logical_ops_match_bitwise((width, a, b) in operands()) {
        let mask = mask_for(width);
        prop_assert_eq!(evaluate(AluOp::And, a, b, width).value, a & b);
        prop_assert_eq!(evaluate(AluOp::Or, a, b, width).value, a | b);
        prop_assert_eq!(evaluate(AluOp::Xor, a, b, width).value, a ^ b);
        prop_assert_eq!(evaluate(AluOp::Not, a, b, width).value, !a & mask);
    }
}
