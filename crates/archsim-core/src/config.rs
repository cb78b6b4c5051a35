//! Kernel-wide configuration.

/// Largest memory, in addressable units, that may be constructed by default.
pub const DEFAULT_MAX_MEMORY_UNITS: usize = 0x10_0000;

/// Immutable configuration for a circuit instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct KernelConfig {
    /// Enables per-step trace events (latches, ALU evaluations, memory traffic).
    pub tracing_enabled: bool,
    /// Additionally emits an event for every entity in both clock phases.
    pub trace_phases: bool,
    /// Emits a trace event for every unit written by a memory image load.
    pub trace_memory_load: bool,
    /// Reports the simulated time when the circuit is torn down.
    pub report_stats: bool,
    /// Upper bound on the number of units a single memory may hold.
    pub max_memory_units: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: false,
            trace_phases: false,
            trace_memory_load: false,
            report_stats: true,
            max_memory_units: DEFAULT_MAX_MEMORY_UNITS,
        }
    }
}

impl KernelConfig {
    /// Returns a configuration with every trace category switched on.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            tracing_enabled: true,
            trace_phases: true,
            trace_memory_load: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KernelConfig, DEFAULT_MAX_MEMORY_UNITS};

    #[test]
    fn default_config_is_quiet_and_reports_stats() {
        let config = KernelConfig::default();
        assert!(!config.tracing_enabled);
        assert!(!config.trace_phases);
        assert!(!config.trace_memory_load);
        assert!(config.report_stats);
        assert_eq!(config.max_memory_units, DEFAULT_MAX_MEMORY_UNITS);
    }

    #[test]
    fn verbose_config_keeps_memory_limit() {
        let config = KernelConfig::verbose();
        assert!(config.tracing_enabled && config.trace_phases && config.trace_memory_load);
        assert_eq!(config.max_memory_units, DEFAULT_MAX_MEMORY_UNITS);
    }
}
