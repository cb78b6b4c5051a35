//! Deterministic trace fingerprint of a small accumulator datapath.
//!
//! Sums the bytes of a memory image into an accumulator, three cycles per
//! byte, and hashes every trace event the run produces.

use archsim_core::{
    AluOp, ArchError, Circuit, CounterMode, CounterStep, KernelConfig, MemoryGeometry,
    RegisterVariant, SharedTrace,
};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_test as _;

const IMAGE: &str = "0 6 1 2 3 4 5 6 0";

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> Result<(String, u64), ArchError> {
    let mut circuit = Circuit::new(KernelConfig::verbose());
    let log = SharedTrace::new();
    circuit.set_trace_sink(Box::new(log.clone()));

    let ram = circuit.add_memory("ram", MemoryGeometry::new(8, 8))?;
    let pc = circuit.add_register("pc", 8, 0, RegisterVariant::Counter(CounterMode::Wrapping))?;
    let mdr = circuit.add_register("mdr", 8, 0, RegisterVariant::Plain)?;
    let acc = circuit.add_register("acc", 8, 0, RegisterVariant::Plain)?;
    let abus = circuit.add_bus("abus", 8)?;
    let alu = circuit.add_alu("alu", 8)?;

    let (mar, read) = {
        let memory = circuit.memory(ram)?;
        (memory.mar(), memory.read_edge())
    };
    let (abus_in, abus_out) = {
        let bus = circuit.bus(abus)?;
        (bus.input(), bus.output())
    };
    let (op1, op2, result) = {
        let unit = circuit.alu(alu)?;
        (unit.op1(), unit.op2(), unit.result())
    };
    for (register, edge) in [
        (pc, abus_in),
        (mar, abus_out),
        (pc, read),
        (mdr, read),
        (acc, op1),
        (mdr, op2),
        (acc, result),
    ] {
        circuit.declare_legal(register, edge)?;
    }

    circuit.load_image(ram, IMAGE, 0)?;
    circuit.bind_source(pc, read)?;
    circuit.tick()?;

    for _ in 0..6 {
        circuit.pull_from(abus_in, pc)?;
        circuit.bind_source(mar, abus_out)?;
        circuit.register_mut(pc)?.increment(CounterStep::One)?;
        circuit.tick()?;

        circuit.memory_mut(ram)?.read();
        circuit.bind_source(mdr, read)?;
        circuit.tick()?;

        circuit.pull_from(op1, acc)?;
        circuit.pull_from(op2, mdr)?;
        circuit.alu_mut(alu)?.perform(AluOp::Add);
        circuit.bind_source(acc, result)?;
        circuit.tick()?;
    }

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for event in log.events() {
        hash_bytes(&mut hash, format!("{event:?}").as_bytes());
    }
    let total = circuit.register(acc)?.value();
    hash_bytes(&mut hash, &total.to_le_bytes());
    Ok((format!("{hash:016x}"), total))
}

fn main() -> Result<(), ArchError> {
    let (fingerprint, total) = fingerprint()?;
    println!("{fingerprint} acc={total:#x}");
    Ok(())
}
