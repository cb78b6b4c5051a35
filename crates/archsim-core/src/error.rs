use thiserror::Error;

use crate::edge::Direction;
use crate::memory::ImageError;

/// Error classes used for reporting and for deciding how a driver reacts.
///
/// Every class is terminal to the current run; the class only tells a driver
/// which part of the circuit description was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// An entity could not be created.
    Construction,
    /// Static or dynamic wiring was violated.
    Wiring,
    /// A component was asked to do something it cannot do this cycle.
    Operation,
    /// A memory image addressed a location outside the memory.
    Addressing,
    /// A bit range outside a register was requested.
    Extraction,
    /// A memory image could not be read or parsed.
    Image,
}

/// The single failure type raised by the kernel.
///
/// Each variant carries the names of the entities involved so that its
/// `Display` output is a complete human-readable report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchError {
    /// Entity width outside `1..=64`.
    #[error("{name}: {width} bits is out of range (1..=64)")]
    WidthOutOfRange {
        /// Entity name.
        name: String,
        /// Requested width in bits.
        width: u32,
    },
    /// Entity created after the first clock tick.
    #[error(
        "attempt to create {name} after start of simulation (step {step}); \
         all entities must be created before the first clock tick"
    )]
    LateConstruction {
        /// Entity name.
        name: String,
        /// Step counter at the time of the attempt.
        step: u64,
    },
    /// Static wiring declared after the first clock tick.
    #[error(
        "attempt to connect {register} and {edge} after start of simulation (step {step}); \
         all connections must be established before the first clock tick"
    )]
    LateWiring {
        /// Register name.
        register: String,
        /// Edge name.
        edge: String,
        /// Step counter at the time of the attempt.
        step: u64,
    },
    /// Dynamic binding to an edge that was never declared legal.
    #[error("{register} is trying to connect to {edge}, but they are not wired together")]
    IllegalWiring {
        /// Register name.
        register: String,
        /// Edge name.
        edge: String,
    },
    /// A sink was used where a source was required, or the reverse.
    #[error("{register} cannot use {edge} here: a {expected} edge is required")]
    DirectionMismatch {
        /// Register name.
        register: String,
        /// Edge name.
        edge: String,
        /// Direction the operation needed.
        expected: Direction,
    },
    /// A sink was read while nothing was bound to it this cycle.
    #[error("{edge} was asked for a value without having been told to pull from anything")]
    DisconnectedRead {
        /// Edge name.
        edge: String,
    },
    /// A handle did not refer to an entity of this circuit.
    #[error("unknown {kind} handle #{index}")]
    UnknownHandle {
        /// Entity kind of the handle.
        kind: &'static str,
        /// Raw arena index.
        index: usize,
    },
    /// An ALU output was read in a cycle with no operation selected.
    #[error("{alu}: value requested but no operation was selected in this cycle")]
    NoOperationSelected {
        /// ALU name.
        alu: String,
    },
    /// An operation code that does not name any operation.
    #[error("{unit}: illegal operation code {code}")]
    IllegalOperation {
        /// Component name.
        unit: String,
        /// The rejected code.
        code: u8,
    },
    /// A register operation requested from a register variant that lacks it.
    #[error("{register}: {operation} is not supported by a {kind} register")]
    UnsupportedOperation {
        /// Register name.
        register: String,
        /// Requested operation.
        operation: &'static str,
        /// Register variant.
        kind: &'static str,
    },
    /// An input port was pulled from while no input source was installed.
    #[error("input port {register} was pulled from but the circuit has no input source")]
    NoInputSource {
        /// Register name.
        register: String,
    },
    /// The input source had no value left for an input port.
    #[error("input port {register}: the input source ran out of values")]
    InputExhausted {
        /// Register name.
        register: String,
    },
    /// An input value did not fit the port width.
    #[error("input port {register}: value {value:#x} is out of range for {width} bits")]
    InputOutOfRange {
        /// Register name.
        register: String,
        /// Value supplied by the source.
        value: u64,
        /// Port width.
        width: u32,
    },
    /// Shift register serial inputs that cannot be combined.
    #[error("shift register {register}: {reason}")]
    ConflictingShiftInput {
        /// Register name.
        register: String,
        /// What was combined.
        reason: &'static str,
    },
    /// Memory larger than the configured unit limit.
    #[error("{memory}: {units}-unit memory is too large (limit {limit})")]
    MemoryTooLarge {
        /// Memory name.
        memory: String,
        /// Requested unit count.
        units: u64,
        /// Configured limit.
        limit: usize,
    },
    /// Maximum address not representable in the address width.
    #[error("{memory}: maximum address {max_address:#x} does not fit in {address_bits} address bits")]
    MaxAddressTooLarge {
        /// Memory name.
        memory: String,
        /// Requested maximum address.
        max_address: u64,
        /// Address register width.
        address_bits: u32,
    },
    /// Load default value wider than a memory unit.
    #[error("{memory}: default value {value:#x} does not fit in {unit_bits}-bit units")]
    DefaultValueTooLarge {
        /// Memory name.
        memory: String,
        /// Requested default.
        value: u64,
        /// Unit width.
        unit_bits: u32,
    },
    /// Memory image addressed a unit past the maximum address.
    #[error("{memory}: load address {address:#x} is out of range (maximum {max_address:#x})")]
    LoadAddressOutOfRange {
        /// Memory name.
        memory: String,
        /// Offending address.
        address: u64,
        /// Highest valid address.
        max_address: u64,
    },
    /// Memory image text could not be parsed.
    #[error("{memory}: malformed image: {source}")]
    MalformedImage {
        /// Memory name.
        memory: String,
        /// Parse failure.
        #[source]
        source: ImageError,
    },
    /// Memory image file could not be read.
    #[error("{memory}: cannot read image {path}: {message}")]
    ImageUnreadable {
        /// Memory name.
        memory: String,
        /// Image path.
        path: String,
        /// Operating-system message.
        message: String,
    },
    /// Bit extraction outside the register.
    #[error("{register}: the bit range <{hi},{lo}> is not within {top} to 0")]
    BitRange {
        /// Register name.
        register: String,
        /// Requested high bit.
        hi: u32,
        /// Requested low bit.
        lo: u32,
        /// Highest valid bit index.
        top: u32,
    },
}

impl ArchError {
    /// Returns the reporting class for this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::WidthOutOfRange { .. }
            | Self::LateConstruction { .. }
            | Self::MemoryTooLarge { .. }
            | Self::MaxAddressTooLarge { .. }
            | Self::DefaultValueTooLarge { .. } => ErrorClass::Construction,
            Self::LateWiring { .. }
            | Self::IllegalWiring { .. }
            | Self::DirectionMismatch { .. }
            | Self::DisconnectedRead { .. }
            | Self::UnknownHandle { .. } => ErrorClass::Wiring,
            Self::NoOperationSelected { .. }
            | Self::IllegalOperation { .. }
            | Self::UnsupportedOperation { .. }
            | Self::ConflictingShiftInput { .. }
            | Self::NoInputSource { .. }
            | Self::InputExhausted { .. }
            | Self::InputOutOfRange { .. } => ErrorClass::Operation,
            Self::LoadAddressOutOfRange { .. } => ErrorClass::Addressing,
            Self::BitRange { .. } => ErrorClass::Extraction,
            Self::MalformedImage { .. } | Self::ImageUnreadable { .. } => ErrorClass::Image,
        }
    }
}
