//! Directed wiring endpoints between registers and combinational components.

use std::fmt;

use crate::entity::{AluId, BusId, ConstantId, MemoryId, RegisterId};

/// Direction of an edge, seen from the register that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Produces values a register can latch.
    Source,
    /// Accepts values from a register bound to it.
    Sink,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Sink => "sink",
        })
    }
}

/// Component port an edge is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Port {
    /// Value input of a bus.
    Input,
    /// Primary value output.
    Output,
    /// First ALU operand.
    Operand1,
    /// Second ALU operand.
    Operand2,
    /// ALU carry flag.
    Carry,
    /// ALU overflow flag.
    Overflow,
    /// Memory write data.
    WriteData,
}

/// Component that owns an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EdgeOwner {
    /// A bus.
    Bus(BusId),
    /// A constant.
    Constant(ConstantId),
    /// An ALU.
    Alu(AluId),
    /// A memory.
    Memory(MemoryId),
}

/// A named, width-tagged endpoint.
///
/// Sink edges carry at most one register binding, set by
/// [`Circuit::pull_from`](crate::Circuit::pull_from) and cleared at the end
/// of every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    name: String,
    width: u32,
    direction: Direction,
    owner: EdgeOwner,
    port: Port,
    pub(crate) binding: Option<RegisterId>,
}

impl Edge {
    pub(crate) fn new(
        name: String,
        width: u32,
        direction: Direction,
        owner: EdgeOwner,
        port: Port,
    ) -> Self {
        Self {
            name,
            width,
            direction,
            owner,
            port,
            binding: None,
        }
    }

    /// Edge name, `<owner>.<port>`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the values carried.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Direction seen from a register.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Owning component.
    #[must_use]
    pub const fn owner(&self) -> EdgeOwner {
        self.owner
    }

    /// Port on the owning component.
    #[must_use]
    pub const fn port(&self) -> Port {
        self.port
    }

    /// Register currently bound to this sink, if any.
    #[must_use]
    pub const fn binding(&self) -> Option<RegisterId> {
        self.binding
    }
}
