//! Entity identity, width masks, and the capability traits shared by components.

use std::fmt;

use crate::circuit::Circuit;
use crate::edge::Port;
use crate::trace::Tracer;
use crate::ArchError;

/// Number of bits in the simulated machine word.
pub const WORD_BITS: u32 = 64;

/// Returns the mask with the low `width` bits set.
#[must_use]
pub const fn mask_for(width: u32) -> u64 {
    if width >= WORD_BITS {
        u64::MAX
    } else {
        (1_u64 << width) - 1
    }
}

/// Returns the sign bit of a `width`-bit value.
#[must_use]
pub const fn sign_bit(width: u32) -> u64 {
    if width == 0 {
        0
    } else {
        1_u64 << (width - 1)
    }
}

/// Rejects widths outside `1..=WORD_BITS`.
pub(crate) fn check_width(name: &str, width: u32) -> Result<(), ArchError> {
    if width == 0 || width > WORD_BITS {
        return Err(ArchError::WidthOutOfRange {
            name: name.to_owned(),
            width,
        });
    }
    Ok(())
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub(crate) const KIND: &'static str = $kind;

            /// Returns the arena index behind this handle.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

handle!(
    /// Handle to a register owned by a [`Circuit`].
    RegisterId,
    "register"
);
handle!(
    /// Handle to a bus owned by a [`Circuit`].
    BusId,
    "bus"
);
handle!(
    /// Handle to a constant owned by a [`Circuit`].
    ConstantId,
    "constant"
);
handle!(
    /// Handle to an ALU owned by a [`Circuit`].
    AluId,
    "alu"
);
handle!(
    /// Handle to a memory owned by a [`Circuit`].
    MemoryId,
    "memory"
);
handle!(
    /// Handle to a wiring edge owned by a [`Circuit`].
    EdgeId,
    "edge"
);

/// Name and bit width shared by every entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    name: String,
    width: u32,
    mask: u64,
}

impl EntityInfo {
    /// Creates identity for a `width`-bit entity.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] when `width` is outside `1..=64`.
    pub fn new(name: impl Into<String>, width: u32) -> Result<Self, ArchError> {
        let name = name.into();
        check_width(&name, width)?;
        Ok(Self {
            name,
            width,
            mask: mask_for(width),
        })
    }

    /// Entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity width in bits.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask with the low `width` bits set.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        self.mask
    }
}

/// Anything that carries an [`EntityInfo`].
pub trait Named {
    /// Identity of this entity.
    fn info(&self) -> &EntityInfo;

    /// Entity name.
    fn name(&self) -> &str {
        self.info().name()
    }

    /// Entity width in bits.
    fn width(&self) -> u32 {
        self.info().width()
    }

    /// Mask with the low `width` bits set.
    fn mask(&self) -> u64 {
        self.info().mask()
    }
}

/// Participant in the two-phase clock.
///
/// Phase one reads the whole circuit through a shared borrow and may only
/// stage values; phase two makes the staged values visible.
pub trait Clocked: Named {
    /// Phase one: compute the next value and stage it.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the pull evaluation it triggers.
    fn compute_and_stage(&self, net: &Circuit) -> Result<(), ArchError>;

    /// Phase two: publish the staged value and reset per-cycle state.
    fn commit(&mut self, tracer: &Tracer);
}

/// Entity that produces values on demand for its source edges.
pub trait Computable: Named {
    /// Evaluates the value presented on `port`.
    ///
    /// # Errors
    ///
    /// Propagates failures from upstream pulls or from the entity itself.
    fn compute(&self, port: Port, net: &Circuit) -> Result<u64, ArchError>;
}

#[cfg(test)]
mod tests {
    use super::{mask_for, sign_bit, EntityInfo, RegisterId};
    use crate::{ArchError, ErrorClass};

    #[test]
    fn masks_cover_full_word_range() {
        assert_eq!(mask_for(1), 0x1);
        assert_eq!(mask_for(4), 0xF);
        assert_eq!(mask_for(63), u64::MAX >> 1);
        assert_eq!(mask_for(64), u64::MAX);
        assert_eq!(sign_bit(8), 0x80);
        assert_eq!(sign_bit(64), 1 << 63);
    }

    #[test]
    fn width_outside_word_is_rejected() {
        for width in [0, 65] {
            let err = EntityInfo::new("r", width).expect_err("width must be rejected");
            assert_eq!(err, ArchError::WidthOutOfRange { name: "r".into(), width });
            assert_eq!(err.class(), ErrorClass::Construction);
        }
        let info = EntityInfo::new("acc", 12).expect("valid width");
        assert_eq!(info.name(), "acc");
        assert_eq!(info.mask(), 0xFFF);
    }

    #[test]
    fn handles_display_kind_and_index() {
        assert_eq!(RegisterId(3).to_string(), "register#3");
        assert_eq!(RegisterId(3).index(), 3);
    }
}
