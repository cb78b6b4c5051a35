//! Combinational components evaluated on demand: buses, constants, and ALUs.

mod alu;

pub(crate) use alu::AluEdges;
pub use alu::{evaluate, extend_sign, Alu, AluOp, AluOutcome};

use crate::circuit::Circuit;
use crate::edge::Port;
use crate::entity::{Computable, EdgeId, EntityInfo, Named};
use crate::ArchError;

/// A wire with one input sink and one output source.
///
/// Pulling the output pulls whatever register is bound to the input this
/// cycle, masked to the bus width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bus {
    info: EntityInfo,
    input: EdgeId,
    output: EdgeId,
}

impl Bus {
    pub(crate) const fn new(info: EntityInfo, input: EdgeId, output: EdgeId) -> Self {
        Self {
            info,
            input,
            output,
        }
    }

    /// Sink a register drives with [`Circuit::pull_from`].
    #[must_use]
    pub const fn input(&self) -> EdgeId {
        self.input
    }

    /// Source a register latches from.
    #[must_use]
    pub const fn output(&self) -> EdgeId {
        self.output
    }
}

impl Named for Bus {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

impl Computable for Bus {
    fn compute(&self, _port: Port, net: &Circuit) -> Result<u64, ArchError> {
        Ok(net.read(self.input)? & self.info.mask())
    }
}

/// A fixed value with one output source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    info: EntityInfo,
    value: u64,
    output: EdgeId,
}

impl Constant {
    pub(crate) const fn new(info: EntityInfo, value: u64, output: EdgeId) -> Self {
        Self {
            info,
            value,
            output,
        }
    }

    /// The constant value, masked to the width.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Source a register latches from.
    #[must_use]
    pub const fn output(&self) -> EdgeId {
        self.output
    }
}

impl Named for Constant {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

impl Computable for Constant {
    fn compute(&self, _port: Port, _net: &Circuit) -> Result<u64, ArchError> {
        Ok(self.value)
    }
}
