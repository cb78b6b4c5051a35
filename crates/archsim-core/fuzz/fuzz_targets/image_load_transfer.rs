#![no_main]

use archsim_core::{evaluate, AluOp, Circuit, Image, MemoryGeometry, RegisterVariant, UnitOrder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    let a = u64::from(u16::from_be_bytes([data[0], data[1]]));
    let b = u64::from(u16::from_be_bytes([data[2], data[3]]));
    let width = u32::from(data[4] % 64) + 1;
    for op in AluOp::ALL {
        let _ = evaluate(op, a, b, width);
    }

    let order = if data[5] & 1 == 0 {
        UnitOrder::MostSignificantFirst
    } else {
        UnitOrder::LeastSignificantFirst
    };
    let geometry = MemoryGeometry::new(8, 8)
        .with_units_per_transfer(u32::from(data[5] >> 6) + 1)
        .with_order(order);

    let Ok(text) = std::str::from_utf8(&data[6..]) else {
        return;
    };
    let _ = text.parse::<Image>();

    let mut circuit = Circuit::default();
    let Ok(memory) = circuit.add_memory("fuzz", geometry) else {
        return;
    };
    let Ok(out) = circuit.add_register("out", geometry.data_bits(), 0, RegisterVariant::Plain) else {
        return;
    };
    if circuit.load_image(memory, text, 0).is_err() {
        return;
    }
    let Ok(read) = circuit.memory(memory).map(archsim_core::Memory::read_edge) else {
        return;
    };
    if circuit.declare_legal(out, read).is_err() || circuit.bind_source(out, read).is_err() {
        return;
    }
    let _ = circuit.tick();
    if let Ok(mem) = circuit.memory(memory) {
        let _ = mem.dump_lite(0, 0x20);
    }
});
