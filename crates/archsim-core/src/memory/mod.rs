//! Addressable memory with a dedicated address register.
//!
//! A memory is addressed through `<name>.MAR`, a register it owns. Reads
//! are combinational: pulling the read source in the cycle a read is
//! selected assembles the transfer from the MAR's current value. Writes are
//! captured in phase one and applied in phase two. Transfers that run past
//! the maximum address set the range-error flag instead of failing.

mod dump;
mod image;

use std::cell::Cell;

pub use image::{Image, ImageError, ImageRecord};

use crate::circuit::Circuit;
use crate::edge::Port;
use crate::entity::{mask_for, Clocked, Computable, EdgeId, EntityInfo, MemoryId, Named, RegisterId};
use crate::trace::{Diagnostic, TraceEvent, Tracer};
use crate::ArchError;

/// Unit order within a multi-unit transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum UnitOrder {
    /// Lowest address holds the most significant unit.
    #[default]
    MostSignificantFirst,
    /// Lowest address holds the least significant unit.
    LeastSignificantFirst,
}

/// Shape of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryGeometry {
    /// Width of the address register.
    pub address_bits: u32,
    /// Width of one addressable unit.
    pub unit_bits: u32,
    /// Highest valid address; defaults to the address mask.
    pub max_address: Option<u64>,
    /// Units moved by one read or write.
    pub units_per_transfer: u32,
    /// Unit order within a transfer.
    pub order: UnitOrder,
}

impl MemoryGeometry {
    /// One unit per transfer, full address range.
    #[must_use]
    pub const fn new(address_bits: u32, unit_bits: u32) -> Self {
        Self {
            address_bits,
            unit_bits,
            max_address: None,
            units_per_transfer: 1,
            order: UnitOrder::MostSignificantFirst,
        }
    }

    /// Sets the highest valid address.
    #[must_use]
    pub const fn with_max_address(mut self, max_address: u64) -> Self {
        self.max_address = Some(max_address);
        self
    }

    /// Sets the units moved per transfer.
    #[must_use]
    pub const fn with_units_per_transfer(mut self, units: u32) -> Self {
        self.units_per_transfer = units;
        self
    }

    /// Sets the unit order.
    #[must_use]
    pub const fn with_order(mut self, order: UnitOrder) -> Self {
        self.order = order;
        self
    }

    /// Width of one transfer.
    #[must_use]
    pub const fn data_bits(&self) -> u32 {
        self.units_per_transfer.saturating_mul(self.unit_bits)
    }

    /// Validates the shape and returns the highest valid address.
    pub(crate) fn high_point(&self, name: &str, unit_limit: usize) -> Result<u64, ArchError> {
        let address_mask = mask_for(self.address_bits);
        let high_point = self.max_address.unwrap_or(address_mask);
        if high_point > address_mask {
            return Err(ArchError::MaxAddressTooLarge {
                memory: name.to_owned(),
                max_address: high_point,
                address_bits: self.address_bits,
            });
        }
        let units = high_point.checked_add(1);
        let fits = matches!(
            units.and_then(|units| usize::try_from(units).ok()),
            Some(units) if units <= unit_limit
        );
        if !fits {
            return Err(ArchError::MemoryTooLarge {
                memory: name.to_owned(),
                units: units.unwrap_or(u64::MAX),
                limit: unit_limit,
            });
        }
        Ok(high_point)
    }
}

/// Memory operations selected for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryOp {
    /// Present the staged entry address on the read source.
    Load,
    /// Present the addressed transfer on the read source.
    Read,
    /// Store the write sink at the addressed transfer.
    Write,
}

/// Edges and address register of a freshly constructed memory.
pub(crate) struct MemoryPorts {
    pub(crate) mar: RegisterId,
    pub(crate) write: EdgeId,
    pub(crate) read: EdgeId,
}

/// Unit-addressed storage.
#[derive(Debug)]
pub struct Memory {
    id: MemoryId,
    info: EntityInfo,
    geometry: MemoryGeometry,
    high_point: u64,
    units: Vec<u64>,
    mar: RegisterId,
    write: EdgeId,
    read: EdgeId,
    selected: Option<MemoryOp>,
    entry: u64,
    captured: Cell<Option<(u64, u64)>>,
    range_error: Cell<bool>,
}

impl Memory {
    pub(crate) fn new(
        id: MemoryId,
        info: EntityInfo,
        geometry: MemoryGeometry,
        high_point: u64,
        ports: MemoryPorts,
    ) -> Self {
        let slots = usize::try_from(high_point).map_or(0, |high| high + 1);
        Self {
            id,
            info,
            geometry,
            high_point,
            units: vec![0; slots],
            mar: ports.mar,
            write: ports.write,
            read: ports.read,
            selected: None,
            entry: 0,
            captured: Cell::new(None),
            range_error: Cell::new(false),
        }
    }

    /// Handle of this memory.
    #[must_use]
    pub const fn id(&self) -> MemoryId {
        self.id
    }

    /// Shape chosen at construction.
    #[must_use]
    pub const fn geometry(&self) -> &MemoryGeometry {
        &self.geometry
    }

    /// Highest valid address.
    #[must_use]
    pub const fn max_address(&self) -> u64 {
        self.high_point
    }

    /// Address register.
    #[must_use]
    pub const fn mar(&self) -> RegisterId {
        self.mar
    }

    /// Write-data sink.
    #[must_use]
    pub const fn write_edge(&self) -> EdgeId {
        self.write
    }

    /// Read-data source.
    #[must_use]
    pub const fn read_edge(&self) -> EdgeId {
        self.read
    }

    /// Operation selected for the current cycle.
    #[must_use]
    pub const fn selected(&self) -> Option<MemoryOp> {
        self.selected
    }

    /// Entry address staged by the last image load.
    #[must_use]
    pub const fn entry(&self) -> u64 {
        self.entry
    }

    /// Whether the last completed transfer ran past the maximum address.
    #[must_use]
    pub fn range_error(&self) -> bool {
        self.range_error.get()
    }

    /// Unit at `address`, or `None` past the maximum address.
    #[must_use]
    pub fn peek(&self, address: u64) -> Option<u64> {
        self.slot(address).map(|slot| self.units[slot])
    }

    /// Selects `op` for the current cycle.
    pub fn perform(&mut self, op: MemoryOp) {
        self.selected = Some(op);
    }

    /// Shorthand for [`MemoryOp::Read`].
    pub fn read(&mut self) {
        self.perform(MemoryOp::Read);
    }

    /// Shorthand for [`MemoryOp::Write`].
    pub fn write(&mut self) {
        self.perform(MemoryOp::Write);
    }

    const fn unit_mask(&self) -> u64 {
        mask_for(self.geometry.unit_bits)
    }

    fn slot(&self, address: u64) -> Option<usize> {
        if address > self.high_point {
            return None;
        }
        usize::try_from(address).ok()
    }

    /// Unit slots covered by a transfer starting at `address`.
    fn span(&self, address: u64) -> Option<std::ops::RangeInclusive<usize>> {
        let extra = u64::from(self.geometry.units_per_transfer.saturating_sub(1));
        let last = self.slot(address.checked_add(extra)?)?;
        Some(self.slot(address)?..=last)
    }

    fn assemble(&self, address: u64) -> Option<u64> {
        let cells = &self.units[self.span(address)?];
        let unit_bits = self.geometry.unit_bits;
        let join = |acc: u64, unit: &u64| acc.checked_shl(unit_bits).unwrap_or(0) | unit;
        Some(match self.geometry.order {
            UnitOrder::MostSignificantFirst => cells.iter().fold(0, join),
            UnitOrder::LeastSignificantFirst => cells.iter().rev().fold(0, join),
        })
    }

    fn store(&mut self, address: u64, value: u64) -> bool {
        let Some(span) = self.span(address) else {
            return false;
        };
        let unit_bits = self.geometry.unit_bits;
        let unit_mask = self.unit_mask();
        let order = self.geometry.order;
        let cells = &mut self.units[span];
        let mut rest = value;
        let mut put = |cell: &mut u64| {
            *cell = rest & unit_mask;
            rest = rest.checked_shr(unit_bits).unwrap_or(0);
        };
        match order {
            UnitOrder::MostSignificantFirst => cells.iter_mut().rev().for_each(&mut put),
            UnitOrder::LeastSignificantFirst => cells.iter_mut().for_each(&mut put),
        }
        true
    }

    /// Fills memory from `image` and stages its entry address.
    pub(crate) fn load(
        &mut self,
        image: &Image,
        default: u64,
        tracer: &Tracer,
    ) -> Result<u64, ArchError> {
        let address_bits = self.geometry.address_bits;
        let unit_mask = self.unit_mask();
        if default & !unit_mask != 0 {
            return Err(ArchError::DefaultValueTooLarge {
                memory: self.info.name().to_owned(),
                value: default,
                unit_bits: self.geometry.unit_bits,
            });
        }
        self.units.fill(default);
        for record in &image.records {
            for (offset, unit) in (0_u64..).zip(&record.units) {
                let (address, slot) = match record.start.checked_add(offset) {
                    Some(address) => (address, self.slot(address)),
                    None => (u64::MAX, None),
                };
                let slot = slot.ok_or_else(|| ArchError::LoadAddressOutOfRange {
                    memory: self.info.name().to_owned(),
                    address,
                    max_address: self.high_point,
                })?;
                self.units[slot] = unit & unit_mask;
                tracer.load_unit(self.id, address, unit & unit_mask);
            }
        }
        if self.info.width() < address_bits {
            tracer.diagnostic(
                Diagnostic::EntryAddressTruncated {
                    memory: self.id,
                    data_bits: self.info.width(),
                    address_bits,
                },
                format_args!(
                    "{}: data path of {} bits is narrower than the {address_bits}-bit address; \
                     the starting address will be truncated",
                    self.info.name(),
                    self.info.width()
                ),
            );
        }
        self.entry = image.entry & mask_for(address_bits);
        self.selected = Some(MemoryOp::Load);
        tracer.step_event(TraceEvent::MemoryLoaded {
            memory: self.id,
            entry: self.entry,
            units_written: image.unit_count(),
        });
        Ok(self.entry)
    }
}

impl Named for Memory {
    fn info(&self) -> &EntityInfo {
        &self.info
    }
}

impl Clocked for Memory {
    fn compute_and_stage(&self, net: &Circuit) -> Result<(), ArchError> {
        match self.selected {
            Some(MemoryOp::Write) => {
                let address = net.register(self.mar)?.value();
                let value = net.read(self.write)?;
                self.captured.set(Some((address, value)));
            }
            Some(MemoryOp::Read) => {}
            Some(MemoryOp::Load) | None => self.range_error.set(false),
        }
        Ok(())
    }

    fn commit(&mut self, tracer: &Tracer) {
        match self.selected {
            Some(MemoryOp::Write) => {
                if let Some((address, value)) = self.captured.take() {
                    let stored = self.store(address, value);
                    self.range_error.set(!stored);
                    if stored {
                        tracer.step_event(TraceEvent::MemoryWrite {
                            memory: self.id,
                            address,
                            value,
                        });
                    }
                }
            }
            Some(MemoryOp::Read | MemoryOp::Load) | None => {}
        }
        self.selected = None;
    }
}

impl Computable for Memory {
    fn compute(&self, _port: Port, net: &Circuit) -> Result<u64, ArchError> {
        match self.selected {
            Some(MemoryOp::Load) => Ok(self.entry),
            Some(MemoryOp::Read) => {
                let address = net.register(self.mar)?.value();
                let Some(value) = self.assemble(address) else {
                    self.range_error.set(true);
                    return Ok(0);
                };
                self.range_error.set(false);
                net.tracer().step_event(TraceEvent::MemoryRead {
                    memory: self.id,
                    address,
                    value,
                });
                Ok(value)
            }
            Some(MemoryOp::Write) | None => {
                net.tracer().diagnostic(
                    Diagnostic::IdleMemoryRead { memory: self.id },
                    format_args!(
                        "{}: read requested but no read operation was selected",
                        self.info.name()
                    ),
                );
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryGeometry, UnitOrder};
    use crate::{ArchError, ErrorClass};

    #[test]
    fn default_max_address_is_the_address_mask() {
        let geometry = MemoryGeometry::new(8, 8);
        assert_eq!(geometry.high_point("m", 0x10_0000), Ok(0xFF));
        assert_eq!(geometry.data_bits(), 8);
    }

    #[test]
    fn oversized_geometries_are_rejected() {
        let wide = MemoryGeometry::new(24, 8);
        let err = wide.high_point("m", 0x10_0000).expect_err("too many units");
        assert_eq!(
            err,
            ArchError::MemoryTooLarge {
                memory: "m".into(),
                units: 0x100_0000,
                limit: 0x10_0000,
            }
        );
        assert_eq!(err.class(), ErrorClass::Construction);

        let bad_max = MemoryGeometry::new(4, 8).with_max_address(0x10);
        assert!(matches!(
            bad_max.high_point("m", 0x10_0000),
            Err(ArchError::MaxAddressTooLarge { max_address: 0x10, .. })
        ));

        let full_word = MemoryGeometry::new(64, 8);
        assert!(full_word.high_point("m", usize::MAX).is_err());
    }

    #[test]
    fn builder_sets_transfer_shape() {
        let geometry = MemoryGeometry::new(16, 8)
            .with_units_per_transfer(4)
            .with_order(UnitOrder::LeastSignificantFirst)
            .with_max_address(0x3FF);
        assert_eq!(geometry.data_bits(), 32);
        assert_eq!(geometry.max_address, Some(0x3FF));
    }
}
