//! Shared helpers for sandboxing integration tests

// Each test binary compiles this module; not all of them use every helper.
#![allow(dead_code)]

use std::collections::HashMap;

use sfi_sandbox::{
    Function, Module, Opcode, Type, ValueId, ValueKind, MEMORY_BASE_SYMBOL,
};

/// Evaluate the address arithmetic synthesized by the pass.
///
/// Understands exactly the value kinds the rewrite produces: constants,
/// arguments (bound via `args`), the one load of the memory-base global
/// (bound to `base`), and the cast/mask/extend/add chain. Anything else
/// is a test failure.
pub fn eval(
    func: &Function,
    module: &Module,
    value: ValueId,
    base: u64,
    args: &HashMap<usize, u64>,
) -> u64 {
    let data = func.value(value);
    match data.kind {
        ValueKind::Const(c) => match data.ty {
            Type::I32 => c as u32 as u64,
            _ => c as u64,
        },
        ValueKind::Argument(idx) => args[&(idx as usize)],
        ValueKind::Global(_) => panic!("global addresses are not numeric in this model"),
        ValueKind::Inst(inst) => {
            let inst_data = func.inst(inst);
            let operand = |i: usize| eval(func, module, inst_data.operands[i], base, args);
            match inst_data.opcode {
                Opcode::Load => {
                    // Only the synthesized load of the base global is
                    // evaluable.
                    match func.value(inst_data.operands[0]).kind {
                        ValueKind::Global(global)
                            if module.global(global).name == MEMORY_BASE_SYMBOL =>
                        {
                            base
                        }
                        _ => panic!("cannot evaluate a load from program memory"),
                    }
                }
                Opcode::PtrToInt => operand(0) as u32 as u64,
                Opcode::ZExt => operand(0) as u32 as u64,
                Opcode::IntToPtr => operand(0),
                Opcode::And => {
                    let result = operand(0) & operand(1);
                    match data.ty {
                        Type::I32 => result as u32 as u64,
                        _ => result,
                    }
                }
                Opcode::Add => {
                    let result = operand(0).wrapping_add(operand(1));
                    match data.ty {
                        Type::I32 => result as u32 as u64,
                        _ => result,
                    }
                }
                other => panic!("unexpected opcode in sandboxed address chain: {other}"),
            }
        }
    }
}

/// All instruction ids of a function, in program order
pub fn all_insts(func: &Function) -> Vec<sfi_sandbox::InstId> {
    func.blocks
        .iter()
        .flat_map(|block| block.insts.iter().copied())
        .collect()
}

/// Count instructions with the given opcode
pub fn count_opcode(func: &Function, opcode: Opcode) -> usize {
    all_insts(func)
        .into_iter()
        .filter(|&inst| func.inst(inst).opcode == opcode)
        .count()
}
