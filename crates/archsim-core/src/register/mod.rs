//! Clocked storage: plain registers and their clearable, counting, shifting,
//! input-port, and output-port variants.
//!
//! A register stages its next value in phase one and publishes it in phase
//! two, so every reader within a tick observes the value from before the
//! tick. The next value comes from, in priority order, a variant operation,
//! a direct [`Register::set`], or the source edge bound for this cycle.

mod counter;
mod input;
mod shift;

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;

pub use counter::{CounterMode, CounterStep};
pub use input::{InputSource, ScriptedInput};
pub use shift::SerialInput;

use counter::Counter;
use shift::ShiftRegister;

use crate::circuit::Circuit;
use crate::entity::{Clocked, EdgeId, EntityInfo, Named, RegisterId};
use crate::trace::{Diagnostic, TraceEvent, Tracer};
use crate::ArchError;

/// Register flavour selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterVariant {
    /// Loads only through a bound source or [`Register::set`].
    Plain,
    /// Adds clear-to-zero and set-to-all-ones.
    Clearable,
    /// Adds clear, increment, and decrement with an overflow flag.
    Counter(CounterMode),
    /// Adds one-bit shifts with optional serial inputs.
    Shift,
    /// Publishes every committed value to the trace sink.
    Output,
    /// Takes a value from the circuit's [`InputSource`] each time it is
    /// pulled from; never loaded by the clock or the host.
    Input,
}

impl RegisterVariant {
    const fn label(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Clearable => "clearable",
            Self::Counter(_) => "counter",
            Self::Shift => "shift",
            Self::Output => "output",
            Self::Input => "input",
        }
    }
}

/// Variant operations selected for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterOp {
    /// Next value is zero. Clearable and counter registers.
    Clear,
    /// Next value is all ones. Clearable registers.
    SetAll,
    /// Count up. Counter registers.
    Increment(CounterStep),
    /// Count down. Counter registers.
    Decrement(CounterStep),
    /// Shift toward the most significant bit. Shift registers.
    ShiftLeft,
    /// Logical shift toward bit zero. Shift registers.
    ShiftRight,
    /// Arithmetic shift toward bit zero. Shift registers.
    ShiftRightArith,
}

impl RegisterOp {
    /// Human-readable operation name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::SetAll => "set",
            Self::Increment(_) => "increment",
            Self::Decrement(_) => "decrement",
            Self::ShiftLeft => "shift left",
            Self::ShiftRight => "shift right",
            Self::ShiftRightArith => "arithmetic shift right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Behavior {
    Plain,
    Clearable(Option<RegisterOp>),
    Counter(Counter),
    Shift(ShiftRegister),
    Output(Vec<u64>),
    Input,
}

impl Behavior {
    fn new(variant: RegisterVariant) -> Self {
        match variant {
            RegisterVariant::Plain => Self::Plain,
            RegisterVariant::Clearable => Self::Clearable(None),
            RegisterVariant::Counter(mode) => Self::Counter(Counter::new(mode)),
            RegisterVariant::Shift => Self::Shift(ShiftRegister::default()),
            RegisterVariant::Output => Self::Output(Vec::new()),
            RegisterVariant::Input => Self::Input,
        }
    }

    fn variant(&self) -> RegisterVariant {
        match self {
            Self::Plain => RegisterVariant::Plain,
            Self::Clearable(_) => RegisterVariant::Clearable,
            Self::Counter(counter) => RegisterVariant::Counter(counter.mode()),
            Self::Shift(_) => RegisterVariant::Shift,
            Self::Output(_) => RegisterVariant::Output,
            Self::Input => RegisterVariant::Input,
        }
    }

    /// Accepts `op` if this variant supports it.
    fn select(&mut self, op: RegisterOp) -> bool {
        match (self, op) {
            (Self::Clearable(selected), RegisterOp::Clear | RegisterOp::SetAll) => {
                *selected = Some(op);
                true
            }
            (Self::Counter(counter), RegisterOp::Clear)
            | (Self::Counter(counter), RegisterOp::Increment(_))
            | (Self::Counter(counter), RegisterOp::Decrement(_)) => {
                counter.select(op);
                true
            }
            (Self::Shift(shift), RegisterOp::ShiftLeft)
            | (Self::Shift(shift), RegisterOp::ShiftRight)
            | (Self::Shift(shift), RegisterOp::ShiftRightArith) => {
                shift.select(op);
                true
            }
            _ => false,
        }
    }

    fn next_value(&self, info: &EntityInfo, current: u64, net: &Circuit) -> Result<Option<u64>, ArchError> {
        match self {
            Self::Plain | Self::Output(_) | Self::Input => Ok(None),
            Self::Clearable(selected) => Ok(selected.map(|op| match op {
                RegisterOp::SetAll => info.mask(),
                _ => 0,
            })),
            Self::Counter(counter) => Ok(counter.next_value(current, info.mask())),
            Self::Shift(shift) => shift.next_value(info, current, net),
        }
    }
}

/// A clocked storage cell of `width` bits.
#[derive(Debug)]
pub struct Register {
    id: RegisterId,
    info: EntityInfo,
    value: u64,
    pending: Cell<Option<u64>>,
    wired: BTreeSet<EdgeId>,
    bound: Option<EdgeId>,
    behavior: Behavior,
    back_door_used: bool,
}

impl Register {
    pub(crate) fn new(
        id: RegisterId,
        info: EntityInfo,
        initial: u64,
        variant: RegisterVariant,
        tracer: &Tracer,
    ) -> Self {
        let value = initial & info.mask();
        if value != initial {
            tracer.diagnostic(
                Diagnostic::InitialValueTruncated {
                    register: id,
                    requested: initial,
                    stored: value,
                },
                format_args!(
                    "{}: initial value {initial:#x} truncated to {value:#x} by its {}-bit width",
                    info.name(),
                    info.width()
                ),
            );
        }
        Self {
            id,
            info,
            value,
            pending: Cell::new(None),
            wired: BTreeSet::new(),
            bound: None,
            behavior: Behavior::new(variant),
            back_door_used: false,
        }
    }

    /// Handle of this register.
    #[must_use]
    pub const fn id(&self) -> RegisterId {
        self.id
    }

    /// Variant chosen at construction.
    #[must_use]
    pub fn variant(&self) -> RegisterVariant {
        self.behavior.variant()
    }

    /// Committed value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Committed value sign-extended from the register width.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn value_signed(&self) -> i64 {
        let unused = u64::BITS - self.info.width();
        ((self.value << unused) as i64) >> unused
    }

    /// Whether the committed value is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Most significant bit of the committed value.
    #[must_use]
    pub fn msb(&self) -> bool {
        (self.value >> (self.info.width() - 1)) & 1 == 1
    }

    /// Bit `index` of the committed value.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::BitRange`] when `index` is not below the width.
    pub fn bit(&self, index: u32) -> Result<bool, ArchError> {
        self.extract(index, index).map(|bit| bit == 1)
    }

    /// Bits `hi..=lo` of the committed value, shifted down to bit zero.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::BitRange`] when `hi` is not below the width or
    /// `hi < lo`.
    pub fn extract(&self, hi: u32, lo: u32) -> Result<u64, ArchError> {
        let width = self.info.width();
        if hi >= width || hi < lo {
            return Err(ArchError::BitRange {
                register: self.info.name().to_owned(),
                hi,
                lo,
                top: width - 1,
            });
        }
        Ok((self.value >> lo) & crate::entity::mask_for(hi - lo + 1))
    }

    /// Source edge bound for the current cycle, if any.
    #[must_use]
    pub const fn bound_source(&self) -> Option<EdgeId> {
        self.bound
    }

    /// Whether `edge` was declared legal for this register.
    #[must_use]
    pub fn is_wired_to(&self, edge: EdgeId) -> bool {
        self.wired.contains(&edge)
    }

    /// Overflow flag of a counter; `false` for other variants.
    #[must_use]
    pub const fn overflow(&self) -> bool {
        match &self.behavior {
            Behavior::Counter(counter) => counter.overflow(),
            _ => false,
        }
    }

    /// Values published so far by an output port; empty for other variants.
    #[must_use]
    pub fn outputs(&self) -> &[u64] {
        match &self.behavior {
            Behavior::Output(values) => values,
            _ => &[],
        }
    }

    /// Whether the back door was ever used on this register.
    #[must_use]
    pub const fn back_door_used(&self) -> bool {
        self.back_door_used
    }

    /// Stages `value` as the next committed value.
    ///
    /// Counts as an operation: it takes precedence over a bound source.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnsupportedOperation`] for an input port.
    pub fn set(&mut self, value: u64) -> Result<(), ArchError> {
        self.assignable("set")?;
        self.pending.set(Some(value & self.info.mask()));
        Ok(())
    }

    /// Writes `value` immediately, bypassing the clock.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnsupportedOperation`] for an input port.
    pub fn back_door(&mut self, value: u64) -> Result<(), ArchError> {
        self.assignable("back door")?;
        self.value = value & self.info.mask();
        self.back_door_used = true;
        Ok(())
    }

    fn assignable(&self, operation: &'static str) -> Result<(), ArchError> {
        if matches!(self.behavior, Behavior::Input) {
            return Err(ArchError::UnsupportedOperation {
                register: self.info.name().to_owned(),
                operation,
                kind: RegisterVariant::Input.label(),
            });
        }
        Ok(())
    }

    /// Selects a variant operation for the current cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnsupportedOperation`] when the variant does not
    /// implement `op`.
    pub fn perform(&mut self, op: RegisterOp) -> Result<(), ArchError> {
        if self.behavior.select(op) {
            return Ok(());
        }
        Err(ArchError::UnsupportedOperation {
            register: self.info.name().to_owned(),
            operation: op.name(),
            kind: self.behavior.variant().label(),
        })
    }

    /// Shorthand for [`RegisterOp::Clear`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn clear(&mut self) -> Result<(), ArchError> {
        self.perform(RegisterOp::Clear)
    }

    /// Shorthand for [`RegisterOp::SetAll`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn set_all(&mut self) -> Result<(), ArchError> {
        self.perform(RegisterOp::SetAll)
    }

    /// Shorthand for [`RegisterOp::Increment`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn increment(&mut self, step: CounterStep) -> Result<(), ArchError> {
        self.perform(RegisterOp::Increment(step))
    }

    /// Shorthand for [`RegisterOp::Decrement`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn decrement(&mut self, step: CounterStep) -> Result<(), ArchError> {
        self.perform(RegisterOp::Decrement(step))
    }

    /// Shorthand for [`RegisterOp::ShiftLeft`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn shift_left(&mut self) -> Result<(), ArchError> {
        self.perform(RegisterOp::ShiftLeft)
    }

    /// Shorthand for [`RegisterOp::ShiftRight`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn shift_right(&mut self) -> Result<(), ArchError> {
        self.perform(RegisterOp::ShiftRight)
    }

    /// Shorthand for [`RegisterOp::ShiftRightArith`].
    ///
    /// # Errors
    ///
    /// See [`Register::perform`].
    pub fn shift_right_arith(&mut self) -> Result<(), ArchError> {
        self.perform(RegisterOp::ShiftRightArith)
    }

    pub(crate) fn declare(&mut self, edge: EdgeId) {
        self.wired.insert(edge);
    }

    pub(crate) fn bind(&mut self, edge: EdgeId) -> Result<(), ArchError> {
        self.assignable("latch")?;
        self.bound = Some(edge);
        Ok(())
    }

    /// Range-checks a value drawn from the input source and makes it the
    /// committed value at once.
    pub(crate) fn accept_input(&mut self, raw: u64, tracer: &Tracer) -> Result<(), ArchError> {
        let value = input::accept(raw, self.info.width()).ok_or_else(|| {
            ArchError::InputOutOfRange {
                register: self.info.name().to_owned(),
                value: raw,
                width: self.info.width(),
            }
        })?;
        self.value = value;
        tracer.input(self.info.name(), self.id, value);
        Ok(())
    }

    pub(crate) fn set_serial_input(
        &mut self,
        side: SerialInput,
        feed: RegisterId,
    ) -> Result<(), ArchError> {
        match &mut self.behavior {
            Behavior::Shift(shift) => {
                shift.set_input(side, feed);
                Ok(())
            }
            other => Err(ArchError::UnsupportedOperation {
                register: self.info.name().to_owned(),
                operation: side.operation_name(),
                kind: other.variant().label(),
            }),
        }
    }
}

impl Named for Register {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

impl Clocked for Register {
    fn compute_and_stage(&self, net: &Circuit) -> Result<(), ArchError> {
        let operation = self
            .behavior
            .next_value(&self.info, self.value, net)?
            .or_else(|| self.pending.get());
        let mask = self.info.mask();
        match (operation, self.bound) {
            (Some(value), Some(edge)) => {
                net.tracer().diagnostic(
                    Diagnostic::OperationOverridesBinding {
                        register: self.id,
                        edge,
                    },
                    format_args!(
                        "{}: operation overrides binding to {}",
                        self.info.name(),
                        net.edge(edge)?.name()
                    ),
                );
                self.pending.set(Some(value & mask));
            }
            (Some(value), None) => self.pending.set(Some(value & mask)),
            (None, Some(edge)) => {
                let value = net.read(edge)? & mask;
                net.tracer().step_event(TraceEvent::Latched {
                    register: self.id,
                    value,
                });
                self.pending.set(Some(value));
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn commit(&mut self, tracer: &Tracer) {
        let staged = self.pending.take();
        if let Some(value) = staged {
            self.value = value;
        }
        match &mut self.behavior {
            Behavior::Plain | Behavior::Input => {}
            Behavior::Clearable(selected) => *selected = None,
            Behavior::Counter(counter) => counter.commit(staged.is_some()),
            Behavior::Shift(shift) => shift.reset(),
            Behavior::Output(values) => {
                if let Some(value) = staged {
                    values.push(value);
                    tracer.output(self.info.name(), self.id, value);
                }
            }
        }
        self.bound = None;
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.info.width().div_ceil(4) as usize;
        write!(f, "{}[{:0digits$x}]", self.info.name(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Register, RegisterOp, RegisterVariant};
    use crate::config::KernelConfig;
    use crate::entity::{Clocked, EdgeId, EntityInfo, RegisterId};
    use crate::trace::{Diagnostic, SharedTrace, TraceEvent, Tracer};
    use crate::{ArchError, ErrorClass};

    fn register(width: u32, initial: u64, variant: RegisterVariant) -> Register {
        let tracer = Tracer::new(&KernelConfig::default());
        let info = EntityInfo::new("r", width).expect("valid width");
        Register::new(RegisterId(0), info, initial, variant, &tracer)
    }

    #[test]
    fn initial_value_is_masked_with_diagnostic() {
        let tracer = Tracer::new(&KernelConfig::default());
        let log = SharedTrace::new();
        tracer.replace_sink(Some(Box::new(log.clone())));
        let info = EntityInfo::new("r", 4).expect("valid width");
        let reg = Register::new(RegisterId(0), info, 0x1F, RegisterVariant::Plain, &tracer);
        assert_eq!(reg.value(), 0xF);
        assert_eq!(
            log.diagnostics(),
            vec![Diagnostic::InitialValueTruncated {
                register: RegisterId(0),
                requested: 0x1F,
                stored: 0xF,
            }]
        );
    }

    #[test]
    fn extract_and_bit_queries() {
        let reg = register(16, 0xABCD, RegisterVariant::Plain);
        assert_eq!(reg.extract(15, 12), Ok(0xA));
        assert_eq!(reg.extract(7, 0), Ok(0xCD));
        assert_eq!(reg.bit(0), Ok(true));
        assert_eq!(reg.bit(1), Ok(false));
        assert!(reg.msb());
        assert_eq!(reg.value_signed(), 0xABCD_i64 - 0x1_0000);

        let err = reg.extract(16, 0).expect_err("hi past width");
        assert_eq!(err.class(), ErrorClass::Extraction);
        let err = reg.extract(3, 5).expect_err("hi below lo");
        assert_eq!(
            err,
            ArchError::BitRange {
                register: "r".into(),
                hi: 3,
                lo: 5,
                top: 15,
            }
        );
    }

    #[test]
    fn unsupported_operation_names_variant() {
        let mut reg = register(8, 0, RegisterVariant::Plain);
        let err = reg.perform(RegisterOp::Clear).expect_err("plain cannot clear");
        assert_eq!(
            err,
            ArchError::UnsupportedOperation {
                register: "r".into(),
                operation: "clear",
                kind: "plain",
            }
        );
        let mut reg = register(8, 0, RegisterVariant::Clearable);
        assert!(reg.shift_left().is_err());
        assert!(reg.set_all().is_ok());
    }

    #[test]
    fn back_door_is_visible_without_a_tick() {
        let mut reg = register(8, 0, RegisterVariant::Plain);
        reg.back_door(0x1AB).expect("plain register");
        assert_eq!(reg.value(), 0xAB);
        assert!(reg.back_door_used());
    }

    #[test]
    fn direct_set_waits_for_commit() {
        let tracer = Tracer::new(&KernelConfig::default());
        let mut reg = register(8, 1, RegisterVariant::Plain);
        reg.set(0x42).expect("plain register");
        assert_eq!(reg.value(), 1);
        reg.commit(&tracer);
        assert_eq!(reg.value(), 0x42);
    }

    #[test]
    fn input_port_refuses_assignment() {
        let mut reg = register(8, 0, RegisterVariant::Input);
        for (err, operation) in [
            (reg.set(1).expect_err("set"), "set"),
            (reg.back_door(1).expect_err("back door"), "back door"),
            (reg.bind(EdgeId(0)).expect_err("latch"), "latch"),
        ] {
            assert_eq!(
                err,
                ArchError::UnsupportedOperation {
                    register: "r".into(),
                    operation,
                    kind: "input",
                }
            );
        }
        assert!(!reg.back_door_used());
        assert_eq!(reg.bound_source(), None);
    }

    #[test]
    fn input_port_takes_sampled_values_at_once() {
        let tracer = Tracer::new(&KernelConfig::default());
        let log = SharedTrace::new();
        tracer.replace_sink(Some(Box::new(log.clone())));
        let mut reg = register(4, 0, RegisterVariant::Input);

        reg.accept_input(0xFFFF_FFFF_FFFF_FFFA, &tracer).expect("negative fits");
        assert_eq!(reg.value(), 0xA);
        let err = reg.accept_input(0x1A, &tracer).expect_err("five bits");
        assert_eq!(
            err,
            ArchError::InputOutOfRange {
                register: "r".into(),
                value: 0x1A,
                width: 4,
            }
        );
        assert_eq!(err.class(), ErrorClass::Operation);
        assert_eq!(reg.value(), 0xA);
        assert_eq!(
            log.events(),
            vec![TraceEvent::Input {
                register: RegisterId(0),
                value: 0xA,
            }]
        );
    }

    #[test]
    fn display_pads_hex_to_width() {
        let reg = register(12, 0x3, RegisterVariant::Plain);
        assert_eq!(reg.to_string(), "r[003]");
    }
}
