//! Property-based tests of the bounding invariants
//!
//! These generate random pointer widths, raw address values, and folded
//! offsets, and verify that the address arithmetic synthesized by the
//! pass can never name memory outside the sandbox region (general path)
//! or the sandbox-plus-guard region (folded path).

mod common;

use std::collections::HashMap;

use common::{all_insts, eval};
use proptest::prelude::*;
use sfi_sandbox::{Function, Module, Opcode, SandboxMemoryAccesses, Type, ValueKind};

fn general_path_load() -> Function {
    let mut func = Function::new("probe", vec![Type::I32]);
    let addr = func.arg(0);
    let cast = func.push_inst(
        0,
        Opcode::IntToPtr,
        vec![addr],
        Some(Type::ptr_to(Type::I32)),
    );
    let ptr = func.result(cast);
    func.push_inst(0, Opcode::Load, vec![ptr], Some(Type::I32));
    func
}

fn folded_path_load(offset: i32) -> Function {
    let mut func = Function::new("probe", vec![Type::I32]);
    let x = func.arg(0);
    let c = func.const_i32(offset);
    let add = func.push_inst(0, Opcode::Add, vec![x, c], Some(Type::I32));
    let add_v = func.result(add);
    let cast = func.push_inst(
        0,
        Opcode::IntToPtr,
        vec![add_v],
        Some(Type::ptr_to(Type::I32)),
    );
    let ptr = func.result(cast);
    func.push_inst(0, Opcode::Load, vec![ptr], Some(Type::I32));
    func
}

fn rewritten_load_address(module: &Module, raw: u64, base: u64) -> u64 {
    let func = &module.functions[0];
    let load = all_insts(func)
        .into_iter()
        .find(|&inst| {
            func.inst(inst).opcode == Opcode::Load
                && func.value(func.inst(inst).operands[0]).ty.is_pointer()
                && !matches!(
                    func.value(func.inst(inst).operands[0]).kind,
                    ValueKind::Global(_)
                )
        })
        .unwrap();
    let ptr = func.inst(load).operands[0];
    let mut args = HashMap::new();
    args.insert(0, raw);
    eval(func, module, ptr, base, &args)
}

proptest! {
    // General path: the address always lands inside [base, base + 2^W).
    #[test]
    fn prop_general_path_stays_in_region(
        width in 1u32..=32,
        raw: u32,
        base in 0u64..(1u64 << 40),
    ) {
        let mut module = Module::new("unit");
        module.add_function(general_path_load());
        let pass = SandboxMemoryAccesses::new(width).unwrap();
        pass.run(&mut module).unwrap();

        let addr = rewritten_load_address(&module, u64::from(raw), base);
        prop_assert!(addr >= base);
        prop_assert!(addr < base + (1u64 << width));
    }

    // Folded path: the constant is added after the mask, so the address
    // may pass the region end but never the end of the guard region.
    #[test]
    fn prop_folded_path_stays_in_guard(
        width in 3u32..=32,
        raw: u32,
        base in 0u64..(1u64 << 40),
        offset_seed: u32,
    ) {
        let subspace = 1u64 << width;
        let max_offset = (subspace - Type::I32.store_size()) as u32;
        let offset = (offset_seed % (max_offset + 1)) as i64;
        // Offsets above i32::MAX cannot appear in a 32-bit add constant.
        let offset = offset.min(i64::from(i32::MAX)) as i32;

        let mut module = Module::new("unit");
        module.add_function(folded_path_load(offset));
        let pass = SandboxMemoryAccesses::new(width).unwrap();
        pass.run(&mut module).unwrap();

        let func = &module.functions[0];
        // The shape must actually have been folded away.
        prop_assert_eq!(
            all_insts(func)
                .into_iter()
                .filter(|&inst| func.inst(inst).opcode == Opcode::PtrToInt)
                .count(),
            0
        );

        let addr = rewritten_load_address(&module, u64::from(raw), base);
        prop_assert!(addr >= base);
        prop_assert!(addr < base + 2 * subspace);
    }

    // Length masking: a rewritten bulk-operation length never exceeds the
    // mask.
    #[test]
    fn prop_length_never_exceeds_mask(
        width in 1u32..32,
        len: u32,
        dst: u32,
    ) {
        let mut func = Function::new("fill", vec![Type::I32, Type::I32]);
        let a = func.arg(0);
        let cast = func.push_inst(0, Opcode::IntToPtr, vec![a], Some(Type::ptr_to(Type::I8)));
        let ptr = func.result(cast);
        let byte = func.const_i32(0);
        let len_v = func.arg(1);
        func.push_inst(0, Opcode::MemSet, vec![ptr, byte, len_v], None);

        let mut module = Module::new("unit");
        module.add_function(func);
        let pass = SandboxMemoryAccesses::new(width).unwrap();
        pass.run(&mut module).unwrap();

        let func = &module.functions[0];
        let memset = all_insts(func)
            .into_iter()
            .find(|&inst| func.inst(inst).opcode == Opcode::MemSet)
            .unwrap();
        let mut args = HashMap::new();
        args.insert(0, u64::from(dst));
        args.insert(1, u64::from(len));
        let masked = eval(func, &module, func.inst(memset).operands[2], 0, &args);
        prop_assert!(masked <= u64::from((1u32 << width) - 1));
    }
}
