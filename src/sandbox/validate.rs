//! Closed-world pointer-operand validation
//!
//! Every instruction kind capable of touching memory is handled
//! explicitly by the rewrite; anything else reaching this check with a
//! pointer-typed operand is either a defect in an earlier pipeline stage
//! or unsupported input, and must not pass through unsandboxed.

use crate::error::{Error, Result};
use crate::ir::{Function, InstId, Opcode};

/// Fail if the instruction carries any pointer-typed operand.
///
/// Calls are checked argument-by-argument only: the callee operand
/// necessarily has pointer type and its integrity is guaranteed by the
/// later control-flow-integrity stage.
pub(super) fn check_no_pointer_operands(func: &Function, inst: InstId) -> Result<()> {
    let data = func.inst(inst);
    let skip_callee = data.opcode == Opcode::Call;

    let mut has_pointer = false;
    for (idx, &op) in data.operands.iter().enumerate() {
        if skip_callee && idx == 0 {
            continue;
        }
        has_pointer |= func.value(op).ty.is_pointer();
    }

    if has_pointer {
        return Err(Error::UnhandledPointerOperand {
            function: func.name.clone(),
            instruction: data.opcode.to_string(),
        });
    }
    Ok(())
}
