//! Cycle-stepped simulation kernel for synchronous digital circuits.

/// Circuit arena, wiring, and the two-phase clock.
pub mod circuit;
pub use circuit::Circuit;

/// Kernel-wide configuration.
pub mod config;
pub use config::{KernelConfig, DEFAULT_MAX_MEMORY_UNITS};

/// Directed wiring endpoints.
pub mod edge;
pub use edge::{Direction, Edge, EdgeOwner, Port};

/// Entity identity, handles, and capability traits.
pub mod entity;
pub use entity::{
    mask_for, sign_bit, AluId, BusId, Clocked, Computable, ConstantId, EdgeId, EntityInfo,
    MemoryId, Named, RegisterId, WORD_BITS,
};

/// Error taxonomy.
pub mod error;
pub use error::{ArchError, ErrorClass};

/// Addressable memory and memory images.
pub mod memory;
pub use memory::{
    Image, ImageError, ImageRecord, Memory, MemoryGeometry, MemoryOp, UnitOrder,
};

/// Clocked storage and its variants.
pub mod register;
pub use register::{
    CounterMode, CounterStep, InputSource, Register, RegisterOp, RegisterVariant, ScriptedInput,
    SerialInput,
};

/// Clocked-entity registry and step counter.
pub mod scheduler;
pub use scheduler::{Announcement, ClockedHandle, Scheduler};

/// Deterministic trace events and sinks.
pub mod trace;
pub use trace::{Diagnostic, SharedTrace, TraceEvent, TraceSink, Tracer};

/// Combinational components.
pub mod wire;
pub use wire::{evaluate, extend_sign, Alu, AluOp, AluOutcome, Bus, Constant};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tracing_test as _;
