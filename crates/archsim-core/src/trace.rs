//! Deterministic trace events and the host-facing sink contract.
//!
//! Events are forwarded to an optional [`TraceSink`] and mirrored to the
//! `tracing` ecosystem. Diagnostics are non-fatal and always delivered;
//! per-step events are gated by [`KernelConfig`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use crate::config::KernelConfig;
use crate::entity::{AluId, EdgeId, MemoryId, RegisterId};
use crate::scheduler::ClockedHandle;
use crate::wire::AluOp;

/// Non-fatal conditions the kernel reports and then continues past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Diagnostic {
    /// A clocked entity was announced to the scheduler more than once.
    DuplicateRegistration {
        /// The repeated entity.
        entity: ClockedHandle,
    },
    /// A register operation was performed while the register was also bound.
    OperationOverridesBinding {
        /// Register whose binding was ignored.
        register: RegisterId,
        /// The ignored source edge.
        edge: EdgeId,
    },
    /// A register initial value did not fit its width.
    InitialValueTruncated {
        /// The register.
        register: RegisterId,
        /// Value asked for.
        requested: u64,
        /// Value stored after masking.
        stored: u64,
    },
    /// A memory read port was pulled while no read or load was selected.
    IdleMemoryRead {
        /// The memory.
        memory: MemoryId,
    },
    /// The memory data path is narrower than its address register.
    EntryAddressTruncated {
        /// The memory.
        memory: MemoryId,
        /// Data path width.
        data_bits: u32,
        /// Address register width.
        address_bits: u32,
    },
}

/// Ordered events observed while building and clocking a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TraceEvent {
    /// First entity of a circuit was created.
    SimulationStarted,
    /// Circuit was torn down.
    SimulationEnded {
        /// Ticks executed.
        steps: u64,
        /// Whether any register was written through the back door.
        back_door_used: bool,
    },
    /// A tick began.
    StepStarted {
        /// Step counter before the tick.
        step: u64,
    },
    /// An entity ran phase one.
    PhaseOne {
        /// The entity.
        entity: ClockedHandle,
    },
    /// An entity ran phase two.
    PhaseTwo {
        /// The entity.
        entity: ClockedHandle,
    },
    /// A register pulled a value through its bound source.
    Latched {
        /// The register.
        register: RegisterId,
        /// Value staged.
        value: u64,
    },
    /// An ALU output was evaluated.
    AluEvaluated {
        /// The ALU.
        alu: AluId,
        /// Operation applied.
        op: AluOp,
        /// First operand after masking.
        op1: u64,
        /// Second operand after masking.
        op2: u64,
        /// Result value.
        result: u64,
        /// Carry flag.
        carry: bool,
        /// Overflow flag.
        overflow: bool,
    },
    /// A memory read was assembled.
    MemoryRead {
        /// The memory.
        memory: MemoryId,
        /// First unit address.
        address: u64,
        /// Assembled value.
        value: u64,
    },
    /// A memory write was committed.
    MemoryWrite {
        /// The memory.
        memory: MemoryId,
        /// First unit address.
        address: u64,
        /// Value split into units.
        value: u64,
    },
    /// One unit written by an image load.
    MemoryLoadUnit {
        /// The memory.
        memory: MemoryId,
        /// Unit address.
        address: u64,
        /// Unit value.
        value: u64,
    },
    /// An image load completed.
    MemoryLoaded {
        /// The memory.
        memory: MemoryId,
        /// Entry address from the image.
        entry: u64,
        /// Units written by image records.
        units_written: usize,
    },
    /// An output port published a committed value.
    Output {
        /// The output register.
        register: RegisterId,
        /// Published value.
        value: u64,
    },
    /// An input port took a value from the input source.
    Input {
        /// The input register.
        register: RegisterId,
        /// Accepted value.
        value: u64,
    },
    /// A non-fatal diagnostic.
    Diagnostic(Diagnostic),
}

/// Host-provided trace sink for deterministic kernel events.
pub trait TraceSink {
    /// Records an event in emission order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Cloneable in-memory sink; every clone observes the same event log.
#[derive(Debug, Clone, Default)]
pub struct SharedTrace(Rc<RefCell<Vec<TraceEvent>>>);

impl SharedTrace {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.borrow().clone()
    }

    /// Returns only the diagnostics recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Diagnostic(diagnostic) => Some(*diagnostic),
                _ => None,
            })
            .collect()
    }
}

impl TraceSink for SharedTrace {
    fn on_event(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

/// Event router owned by a circuit.
pub struct Tracer {
    sink: RefCell<Option<Box<dyn TraceSink>>>,
    steps: bool,
    phases: bool,
    load_units: bool,
    report_stats: bool,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("has_sink", &self.sink.borrow().is_some())
            .field("steps", &self.steps)
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

impl Tracer {
    pub(crate) fn new(config: &KernelConfig) -> Self {
        Self {
            sink: RefCell::new(None),
            steps: config.tracing_enabled,
            phases: config.trace_phases,
            load_units: config.trace_memory_load,
            report_stats: config.report_stats,
        }
    }

    pub(crate) fn replace_sink(
        &self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        self.sink.replace(sink)
    }

    fn forward(&self, event: TraceEvent) {
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            sink.on_event(event);
        }
    }

    /// Reports a diagnostic with a human-readable explanation.
    pub(crate) fn diagnostic(&self, diagnostic: Diagnostic, detail: fmt::Arguments<'_>) {
        warn!(?diagnostic, "{detail}");
        self.forward(TraceEvent::Diagnostic(diagnostic));
    }

    /// Per-step event, delivered only while step tracing is enabled.
    pub(crate) fn step_event(&self, event: TraceEvent) {
        if self.steps {
            debug!(?event, "step event");
            self.forward(event);
        }
    }

    pub(crate) fn phase_event(&self, event: TraceEvent) {
        if self.phases {
            trace!(?event, "phase event");
            self.forward(event);
        }
    }

    pub(crate) fn load_unit(&self, memory: MemoryId, address: u64, value: u64) {
        if self.load_units {
            trace!(%memory, address, value, "image unit");
            self.forward(TraceEvent::MemoryLoadUnit {
                memory,
                address,
                value,
            });
        }
    }

    pub(crate) fn output(&self, name: &str, register: RegisterId, value: u64) {
        info!(output = name, value, "output port");
        self.forward(TraceEvent::Output { register, value });
    }

    pub(crate) fn input(&self, name: &str, register: RegisterId, value: u64) {
        info!(input = name, value, "input port");
        self.forward(TraceEvent::Input { register, value });
    }

    pub(crate) fn started(&self) {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            "archsim simulation kernel started"
        );
        self.forward(TraceEvent::SimulationStarted);
    }

    pub(crate) fn ended(&self, steps: u64, back_door_used: bool) {
        if self.report_stats {
            info!(steps, "simulated time {steps} cycle(s)");
        }
        if back_door_used {
            info!("one or more registers were modified through the back door");
        }
        self.forward(TraceEvent::SimulationEnded {
            steps,
            back_door_used,
        });
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::{Diagnostic, SharedTrace, TraceEvent, TraceSink, Tracer};
    use crate::config::KernelConfig;
    use crate::entity::{EdgeId, RegisterId};

    #[test]
    fn step_events_are_gated_by_config() {
        let quiet = Tracer::new(&KernelConfig::default());
        let log = SharedTrace::new();
        quiet.replace_sink(Some(Box::new(log.clone())));
        quiet.step_event(TraceEvent::StepStarted { step: 0 });
        assert!(log.events().is_empty());

        let loud = Tracer::new(&KernelConfig::verbose());
        loud.replace_sink(Some(Box::new(log.clone())));
        loud.step_event(TraceEvent::StepStarted { step: 0 });
        assert_eq!(log.events(), vec![TraceEvent::StepStarted { step: 0 }]);
    }

    #[test]
    #[traced_test]
    fn diagnostics_are_always_delivered_and_logged() {
        let tracer = Tracer::new(&KernelConfig::default());
        let log = SharedTrace::new();
        tracer.replace_sink(Some(Box::new(log.clone())));
        let diagnostic = Diagnostic::OperationOverridesBinding {
            register: RegisterId(0),
            edge: EdgeId(2),
        };
        tracer.diagnostic(diagnostic, format_args!("acc: operation overrides binding"));
        assert_eq!(log.diagnostics(), vec![diagnostic]);
        assert!(logs_contain("operation overrides binding"));
    }

    #[test]
    fn shared_trace_clones_observe_one_log() {
        let log = SharedTrace::new();
        let mut writer = log.clone();
        writer.on_event(TraceEvent::SimulationStarted);
        assert_eq!(log.events(), vec![TraceEvent::SimulationStarted]);
    }
}
