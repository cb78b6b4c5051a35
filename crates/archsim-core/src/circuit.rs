//! The circuit arena: owns every entity and edge and drives the clock.

use std::path::Path;

use crate::config::KernelConfig;
use crate::edge::{Direction, Edge, EdgeOwner, Port};
use crate::entity::{
    check_width, AluId, BusId, Clocked, Computable, ConstantId, EdgeId, EntityInfo, MemoryId,
    Named, RegisterId,
};
use crate::memory::{Image, Memory, MemoryGeometry, MemoryPorts};
use crate::register::{InputSource, Register, RegisterVariant, SerialInput};
use crate::scheduler::{Announcement, ClockedHandle, Scheduler};
use crate::trace::{Diagnostic, TraceEvent, TraceSink, Tracer};
use crate::wire::{Alu, AluEdges, Bus, Constant};
use crate::ArchError;

fn lookup<'a, T>(items: &'a [T], index: usize, kind: &'static str) -> Result<&'a T, ArchError> {
    items.get(index).ok_or(ArchError::UnknownHandle { kind, index })
}

fn lookup_mut<'a, T>(
    items: &'a mut [T],
    index: usize,
    kind: &'static str,
) -> Result<&'a mut T, ArchError> {
    items
        .get_mut(index)
        .ok_or(ArchError::UnknownHandle { kind, index })
}

/// A synchronous circuit and its clock.
///
/// Entities and static wiring may only be added before the first
/// [`tick`](Self::tick). Each tick runs phase one over every clocked entity
/// in registration order, then phase two in the same order, then clears
/// per-cycle state (sink bindings and ALU operation selections).
#[derive(Debug)]
pub struct Circuit {
    config: KernelConfig,
    scheduler: Scheduler,
    registers: Vec<Register>,
    buses: Vec<Bus>,
    constants: Vec<Constant>,
    alus: Vec<Alu>,
    memories: Vec<Memory>,
    edges: Vec<Edge>,
    population: usize,
    tracer: Tracer,
    input: Option<Box<dyn InputSource>>,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Circuit {
    /// Creates an empty circuit at step 0.
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        let tracer = Tracer::new(&config);
        Self {
            config,
            scheduler: Scheduler::new(),
            registers: Vec::new(),
            buses: Vec::new(),
            constants: Vec::new(),
            alus: Vec::new(),
            memories: Vec::new(),
            edges: Vec::new(),
            population: 0,
            tracer,
            input: None,
        }
    }

    /// Configuration this circuit was built with.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Installs a trace sink, returning the previous one.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) -> Option<Box<dyn TraceSink>> {
        self.tracer.replace_sink(Some(sink))
    }

    /// Removes and returns the installed trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.tracer.replace_sink(None)
    }

    /// Installs the source input ports draw from, returning the previous one.
    pub fn set_input_source(
        &mut self,
        source: Box<dyn InputSource>,
    ) -> Option<Box<dyn InputSource>> {
        self.input.replace(source)
    }

    /// Removes and returns the installed input source.
    pub fn take_input_source(&mut self) -> Option<Box<dyn InputSource>> {
        self.input.take()
    }

    pub(crate) const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Clocked entities in registration order.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.scheduler.current_step()
    }

    /// Number of entities created so far.
    #[must_use]
    pub const fn population(&self) -> usize {
        self.population
    }

    fn admit(&self, name: &str, width: u32) -> Result<EntityInfo, ArchError> {
        let info = EntityInfo::new(name, width)?;
        let step = self.current_step();
        if step > 0 {
            return Err(ArchError::LateConstruction {
                name: name.to_owned(),
                step,
            });
        }
        Ok(info)
    }

    fn enlist(&mut self) {
        if self.population == 0 {
            self.tracer.started();
        }
        self.population += 1;
    }

    fn add_edge(
        &mut self,
        name: String,
        width: u32,
        direction: Direction,
        owner: EdgeOwner,
        port: Port,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge::new(name, width, direction, owner, port));
        id
    }

    /// Adds a clocked entity to the schedule.
    ///
    /// Every register and memory is announced on construction. Announcing
    /// again reports a diagnostic and still appends, so the entity is
    /// clocked once per entry.
    pub fn announce(&mut self, entity: ClockedHandle) {
        if self.scheduler.announce(entity) == Announcement::Duplicate {
            self.tracer.diagnostic(
                Diagnostic::DuplicateRegistration { entity },
                format_args!("{entity} was announced to the clock more than once"),
            );
        }
    }

    /// Creates a register holding `initial` (masked to `width`).
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] or
    /// [`ArchError::LateConstruction`].
    pub fn add_register(
        &mut self,
        name: impl Into<String>,
        width: u32,
        initial: u64,
        variant: RegisterVariant,
    ) -> Result<RegisterId, ArchError> {
        let info = self.admit(&name.into(), width)?;
        let id = RegisterId(self.registers.len());
        let register = Register::new(id, info, initial, variant, &self.tracer);
        self.registers.push(register);
        self.enlist();
        self.announce(ClockedHandle::Register(id));
        Ok(id)
    }

    /// Creates a bus with sink `<name>.IN` and source `<name>.OUT`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] or
    /// [`ArchError::LateConstruction`].
    pub fn add_bus(&mut self, name: impl Into<String>, width: u32) -> Result<BusId, ArchError> {
        let name = name.into();
        let info = self.admit(&name, width)?;
        let id = BusId(self.buses.len());
        let owner = EdgeOwner::Bus(id);
        let input = self.add_edge(format!("{name}.IN"), width, Direction::Sink, owner, Port::Input);
        let output =
            self.add_edge(format!("{name}.OUT"), width, Direction::Source, owner, Port::Output);
        self.buses.push(Bus::new(info, input, output));
        self.enlist();
        Ok(id)
    }

    /// Creates a constant with source `<name>.OUT`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] or
    /// [`ArchError::LateConstruction`].
    pub fn add_constant(
        &mut self,
        name: impl Into<String>,
        width: u32,
        value: u64,
    ) -> Result<ConstantId, ArchError> {
        let name = name.into();
        let info = self.admit(&name, width)?;
        let id = ConstantId(self.constants.len());
        let output = self.add_edge(
            format!("{name}.OUT"),
            width,
            Direction::Source,
            EdgeOwner::Constant(id),
            Port::Output,
        );
        let value = value & info.mask();
        self.constants.push(Constant::new(info, value, output));
        self.enlist();
        Ok(id)
    }

    /// Creates an ALU with operand sinks `Op1`/`Op2` and sources
    /// `Result`, `Carry`, and `Overflow`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] or
    /// [`ArchError::LateConstruction`].
    pub fn add_alu(&mut self, name: impl Into<String>, width: u32) -> Result<AluId, ArchError> {
        let name = name.into();
        let info = self.admit(&name, width)?;
        let id = AluId(self.alus.len());
        let owner = EdgeOwner::Alu(id);
        let edges = AluEdges {
            op1: self.add_edge(format!("{name}.Op1"), width, Direction::Sink, owner, Port::Operand1),
            op2: self.add_edge(format!("{name}.Op2"), width, Direction::Sink, owner, Port::Operand2),
            result: self.add_edge(
                format!("{name}.Result"),
                width,
                Direction::Source,
                owner,
                Port::Output,
            ),
            carry: self.add_edge(format!("{name}.Carry"), 1, Direction::Source, owner, Port::Carry),
            overflow: self.add_edge(
                format!("{name}.Overflow"),
                1,
                Direction::Source,
                owner,
                Port::Overflow,
            ),
        };
        self.alus.push(Alu::new(id, info, edges));
        self.enlist();
        Ok(id)
    }

    /// Creates a memory, its address register `<name>.MAR`, the write sink
    /// `<name>.MemoryWrite`, and the read source `<name>.MemoryRead`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::WidthOutOfRange`] for a bad address, unit, or
    /// transfer width, [`ArchError::MaxAddressTooLarge`],
    /// [`ArchError::MemoryTooLarge`], or [`ArchError::LateConstruction`].
    pub fn add_memory(
        &mut self,
        name: impl Into<String>,
        geometry: MemoryGeometry,
    ) -> Result<MemoryId, ArchError> {
        let name = name.into();
        check_width(&name, geometry.address_bits)?;
        check_width(&name, geometry.unit_bits)?;
        let info = self.admit(&name, geometry.data_bits())?;
        let high_point = geometry.high_point(&name, self.config.max_memory_units)?;

        let id = MemoryId(self.memories.len());
        self.announce(ClockedHandle::Memory(id));
        let mar = self.add_register(
            format!("{name}.MAR"),
            geometry.address_bits,
            0,
            RegisterVariant::Plain,
        )?;
        let owner = EdgeOwner::Memory(id);
        let data_bits = info.width();
        let ports = MemoryPorts {
            mar,
            write: self.add_edge(
                format!("{name}.MemoryWrite"),
                data_bits,
                Direction::Sink,
                owner,
                Port::WriteData,
            ),
            read: self.add_edge(
                format!("{name}.MemoryRead"),
                data_bits,
                Direction::Source,
                owner,
                Port::Output,
            ),
        };
        self.memories
            .push(Memory::new(id, info, geometry, high_point, ports));
        self.enlist();
        Ok(id)
    }

    /// Register behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn register(&self, id: RegisterId) -> Result<&Register, ArchError> {
        lookup(&self.registers, id.0, RegisterId::KIND)
    }

    /// Mutable register behind `id`, for operations and direct writes.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn register_mut(&mut self, id: RegisterId) -> Result<&mut Register, ArchError> {
        lookup_mut(&mut self.registers, id.0, RegisterId::KIND)
    }

    /// Bus behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn bus(&self, id: BusId) -> Result<&Bus, ArchError> {
        lookup(&self.buses, id.0, BusId::KIND)
    }

    /// Constant behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn constant(&self, id: ConstantId) -> Result<&Constant, ArchError> {
        lookup(&self.constants, id.0, ConstantId::KIND)
    }

    /// ALU behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn alu(&self, id: AluId) -> Result<&Alu, ArchError> {
        lookup(&self.alus, id.0, AluId::KIND)
    }

    /// Mutable ALU behind `id`, for selecting operations.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn alu_mut(&mut self, id: AluId) -> Result<&mut Alu, ArchError> {
        lookup_mut(&mut self.alus, id.0, AluId::KIND)
    }

    /// Memory behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn memory(&self, id: MemoryId) -> Result<&Memory, ArchError> {
        lookup(&self.memories, id.0, MemoryId::KIND)
    }

    /// Mutable memory behind `id`, for selecting operations.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn memory_mut(&mut self, id: MemoryId) -> Result<&mut Memory, ArchError> {
        lookup_mut(&mut self.memories, id.0, MemoryId::KIND)
    }

    /// Edge behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownHandle`] for a foreign handle.
    pub fn edge(&self, id: EdgeId) -> Result<&Edge, ArchError> {
        lookup(&self.edges, id.0, EdgeId::KIND)
    }

    fn require_direction(
        &self,
        register: RegisterId,
        edge: EdgeId,
        expected: Direction,
    ) -> Result<(), ArchError> {
        let reg = self.register(register)?;
        let wire = self.edge(edge)?;
        if wire.direction() != expected {
            return Err(ArchError::DirectionMismatch {
                register: reg.name().to_owned(),
                edge: wire.name().to_owned(),
                expected,
            });
        }
        if !reg.is_wired_to(edge) {
            return Err(ArchError::IllegalWiring {
                register: reg.name().to_owned(),
                edge: wire.name().to_owned(),
            });
        }
        Ok(())
    }

    /// Declares that `register` may use `edge`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::LateWiring`] after the first tick, or
    /// [`ArchError::UnknownHandle`].
    pub fn declare_legal(&mut self, register: RegisterId, edge: EdgeId) -> Result<(), ArchError> {
        let step = self.current_step();
        let edge_name = self.edge(edge)?.name().to_owned();
        let reg = self.register_mut(register)?;
        if step > 0 {
            return Err(ArchError::LateWiring {
                register: reg.name().to_owned(),
                edge: edge_name,
                step,
            });
        }
        reg.declare(edge);
        Ok(())
    }

    /// Routes `register`'s next value from the source `edge` this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::DirectionMismatch`] for a sink,
    /// [`ArchError::IllegalWiring`] for an undeclared edge.
    pub fn bind_source(&mut self, register: RegisterId, edge: EdgeId) -> Result<(), ArchError> {
        self.require_direction(register, edge, Direction::Source)?;
        self.register_mut(register)?.bind(edge)
    }

    /// Drives the sink `edge` with `register`'s current value this cycle.
    ///
    /// An input port first draws a fresh value from the input source.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::DirectionMismatch`] for a source,
    /// [`ArchError::IllegalWiring`] for an undeclared edge, and
    /// [`ArchError::NoInputSource`], [`ArchError::InputExhausted`], or
    /// [`ArchError::InputOutOfRange`] when an input port cannot be sampled.
    pub fn pull_from(&mut self, edge: EdgeId, register: RegisterId) -> Result<(), ArchError> {
        self.require_direction(register, edge, Direction::Sink)?;
        if self.register(register)?.variant() == RegisterVariant::Input {
            self.sample_input(register)?;
        }
        lookup_mut(&mut self.edges, edge.0, EdgeId::KIND)?.binding = Some(register);
        Ok(())
    }

    fn sample_input(&mut self, id: RegisterId) -> Result<(), ArchError> {
        let Self {
            registers,
            tracer,
            input,
            ..
        } = self;
        let register = lookup_mut(registers, id.0, RegisterId::KIND)?;
        let source = input.as_mut().ok_or_else(|| ArchError::NoInputSource {
            register: register.name().to_owned(),
        })?;
        let raw = source
            .next_value(register.name(), register.width())
            .ok_or_else(|| ArchError::InputExhausted {
                register: register.name().to_owned(),
            })?;
        register.accept_input(raw, tracer)
    }

    /// Feeds a shift register's serial input from `feed` this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnsupportedOperation`] when `register` is not a
    /// shift register, or [`ArchError::UnknownHandle`].
    pub fn set_serial_input(
        &mut self,
        register: RegisterId,
        side: SerialInput,
        feed: RegisterId,
    ) -> Result<(), ArchError> {
        self.register(feed)?;
        self.register_mut(register)?.set_serial_input(side, feed)
    }

    /// Evaluates `edge` now.
    ///
    /// A sink yields the value of the register bound to it; a source
    /// evaluates its owner, recursively pulling upstream.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::DisconnectedRead`] for an unbound sink, and
    /// propagates any failure of the owner's evaluation.
    pub fn read(&self, edge: EdgeId) -> Result<u64, ArchError> {
        let wire = self.edge(edge)?;
        match wire.direction() {
            Direction::Sink => {
                let register = wire.binding.ok_or_else(|| ArchError::DisconnectedRead {
                    edge: wire.name().to_owned(),
                })?;
                Ok(self.register(register)?.value())
            }
            Direction::Source => match wire.owner() {
                EdgeOwner::Bus(id) => self.bus(id)?.compute(wire.port(), self),
                EdgeOwner::Constant(id) => self.constant(id)?.compute(wire.port(), self),
                EdgeOwner::Alu(id) => self.alu(id)?.compute(wire.port(), self),
                EdgeOwner::Memory(id) => self.memory(id)?.compute(wire.port(), self),
            },
        }
    }

    /// Parses `image` into memory `id` and stages its entry address.
    ///
    /// Units not covered by the image hold `default`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::LateConstruction`] after the first tick,
    /// [`ArchError::MalformedImage`], [`ArchError::DefaultValueTooLarge`], or
    /// [`ArchError::LoadAddressOutOfRange`].
    pub fn load_image(&mut self, id: MemoryId, image: &str, default: u64) -> Result<u64, ArchError> {
        let step = self.current_step();
        let memory = self.memory(id)?;
        if step > 0 {
            return Err(ArchError::LateConstruction {
                name: memory.name().to_owned(),
                step,
            });
        }
        let parsed: Image = image.parse().map_err(|source| ArchError::MalformedImage {
            memory: memory.name().to_owned(),
            source,
        })?;
        let Self {
            memories, tracer, ..
        } = self;
        lookup_mut(memories, id.0, MemoryId::KIND)?.load(&parsed, default, tracer)
    }

    /// Reads the image file at `path` and loads it like [`load_image`](Self::load_image).
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::ImageUnreadable`] when the file cannot be read,
    /// otherwise as [`load_image`](Self::load_image).
    pub fn load_file(
        &mut self,
        id: MemoryId,
        path: impl AsRef<Path>,
        default: u64,
    ) -> Result<u64, ArchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ArchError::ImageUnreadable {
            memory: self
                .memory(id)
                .map_or_else(|_| id.to_string(), |memory| memory.name().to_owned()),
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.load_image(id, &text, default)
    }

    fn clocked(&self, entity: ClockedHandle) -> Result<&dyn Clocked, ArchError> {
        let clocked: &dyn Clocked = match entity {
            ClockedHandle::Register(id) => self.register(id)?,
            ClockedHandle::Memory(id) => self.memory(id)?,
        };
        Ok(clocked)
    }

    /// Advances simulated time by one clock step.
    ///
    /// # Errors
    ///
    /// Propagates the first failure raised while staging; the circuit must
    /// not be ticked again afterwards.
    pub fn tick(&mut self) -> Result<(), ArchError> {
        let step = self.current_step();
        self.tracer.step_event(TraceEvent::StepStarted { step });

        for &entity in self.scheduler.order() {
            self.tracer.phase_event(TraceEvent::PhaseOne { entity });
            self.clocked(entity)?.compute_and_stage(self)?;
        }

        let Self {
            scheduler,
            registers,
            memories,
            edges,
            alus,
            tracer,
            ..
        } = self;
        for &entity in scheduler.order() {
            tracer.phase_event(TraceEvent::PhaseTwo { entity });
            match entity {
                ClockedHandle::Register(id) => {
                    lookup_mut(registers, id.0, RegisterId::KIND)?.commit(tracer);
                }
                ClockedHandle::Memory(id) => {
                    lookup_mut(memories, id.0, MemoryId::KIND)?.commit(tracer);
                }
            }
        }

        for edge in edges.iter_mut() {
            edge.binding = None;
        }
        for alu in alus.iter_mut() {
            alu.end_cycle();
        }
        scheduler.advance();
        Ok(())
    }

    /// Ticks `steps` times, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first [`tick`](Self::tick) failure.
    pub fn run(&mut self, steps: u64) -> Result<(), ArchError> {
        for _ in 0..steps {
            self.tick()?;
        }
        Ok(())
    }
}

impl Drop for Circuit {
    fn drop(&mut self) {
        if self.population > 0 {
            let back_door_used = self.registers.iter().any(Register::back_door_used);
            self.tracer.ended(self.current_step(), back_door_used);
        }
    }
}
