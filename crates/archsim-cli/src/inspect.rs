use std::fmt;
use std::path::PathBuf;

use archsim_core::{
    ArchError, Circuit, KernelConfig, MemoryGeometry, MemoryId, SharedTrace, TraceEvent,
};
use tracing::debug;

/// Largest range printed when no end address is given.
pub const DEFAULT_DUMP_SPAN: u64 = 0x7F;

/// Where an image lives and the memory it is loaded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Image file.
    pub path: PathBuf,
    /// Shape of the target memory.
    pub geometry: MemoryGeometry,
    /// Value of units the image does not cover.
    pub default: u64,
}

/// Facts about a successfully loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entry address staged by the load.
    pub entry: u64,
    /// Units written by image records.
    pub units_written: usize,
    /// Highest valid address of the memory.
    pub max_address: u64,
    /// Width of one transfer.
    pub data_bits: u32,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "entry:         {:#x}", self.entry)?;
        writeln!(f, "units written: {}", self.units_written)?;
        writeln!(f, "max address:   {:#x}", self.max_address)?;
        write!(f, "data path:     {} bits", self.data_bits)
    }
}

/// An image loaded into a circuit that is never ticked.
#[derive(Debug)]
pub struct LoadedImage {
    circuit: Circuit,
    memory: MemoryId,
    summary: LoadSummary,
}

impl LoadedImage {
    /// Builds a one-memory circuit and loads `source` into it.
    ///
    /// # Errors
    ///
    /// Returns any construction or image error from the kernel.
    pub fn load(source: &ImageSource) -> Result<Self, ArchError> {
        let config = KernelConfig {
            tracing_enabled: true,
            report_stats: false,
            ..KernelConfig::default()
        };
        let mut circuit = Circuit::new(config);
        let log = SharedTrace::new();
        circuit.set_trace_sink(Box::new(log.clone()));

        let memory = circuit.add_memory("image", source.geometry)?;
        let entry = circuit.load_file(memory, &source.path, source.default)?;
        let units_written = log
            .events()
            .iter()
            .find_map(|event| match event {
                TraceEvent::MemoryLoaded { units_written, .. } => Some(*units_written),
                _ => None,
            })
            .unwrap_or_default();
        let mem = circuit.memory(memory)?;
        let summary = LoadSummary {
            entry,
            units_written,
            max_address: mem.max_address(),
            data_bits: source.geometry.data_bits(),
        };
        debug!(path = %source.path.display(), entry, units_written, "image loaded");
        Ok(Self {
            circuit,
            memory,
            summary,
        })
    }

    /// Facts gathered while loading.
    #[must_use]
    pub const fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// Renders units `from..=to` in the full or lite dump format.
    ///
    /// Without `to`, the range ends at the maximum address or
    /// [`DEFAULT_DUMP_SPAN`] units past `from`, whichever comes first.
    ///
    /// # Errors
    ///
    /// Propagates [`ArchError::UnknownHandle`] from the memory lookup.
    pub fn dump(&self, from: u64, to: Option<u64>, lite: bool) -> Result<String, ArchError> {
        let memory = self.circuit.memory(self.memory)?;
        let to = to.unwrap_or_else(|| {
            from.saturating_add(DEFAULT_DUMP_SPAN)
                .min(memory.max_address())
        });
        Ok(if lite {
            let mut line = memory.dump_lite(from, to);
            line.push('\n');
            line
        } else {
            memory.dump(from, to)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use archsim_core::{ArchError, ErrorClass, MemoryGeometry, UnitOrder};

    use super::{ImageSource, LoadSummary, LoadedImage};

    fn source_for(dir: &tempfile::TempDir, text: &str, geometry: MemoryGeometry) -> ImageSource {
        let path = dir.path().join("prog.img");
        fs::write(&path, text).expect("write image");
        ImageSource {
            path,
            geometry,
            default: 0,
        }
    }

    #[test]
    fn summary_reports_entry_and_units() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_for(
            &dir,
            "0 4 de ad be ef\n40 2 1 2\n10",
            MemoryGeometry::new(8, 8).with_units_per_transfer(2),
        );
        let image = LoadedImage::load(&source).expect("load");
        assert_eq!(
            *image.summary(),
            LoadSummary {
                entry: 0x10,
                units_written: 6,
                max_address: 0xFF,
                data_bits: 16,
            }
        );
    }

    #[test]
    fn default_dump_range_stops_at_max_address() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = source_for(
            &dir,
            "0 2 a b 0",
            MemoryGeometry::new(4, 8).with_order(UnitOrder::LeastSignificantFirst),
        );
        let image = LoadedImage::load(&source).expect("load");
        let lite = image.dump(0xE, None, true).expect("dump");
        assert_eq!(lite, " 00/ 00/\n");
        let full = image.dump(0, Some(1), false).expect("dump");
        assert_eq!(full, "MEMORY DUMP\n-----------\n0 0a 0b\n");
    }

    #[test]
    fn missing_file_is_an_image_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = ImageSource {
            path: dir.path().join("absent.img"),
            geometry: MemoryGeometry::new(8, 8),
            default: 0,
        };
        let err = LoadedImage::load(&source).expect_err("missing file");
        assert!(matches!(err, ArchError::ImageUnreadable { .. }));
        assert_eq!(err.class(), ErrorClass::Image);
    }
}
