//! # Memory-Access Sandboxing Pass
//!
//! Applies software-fault isolation to every memory access in a module.
//! Pointers are truncated to a configured number of bits and shifted into
//! a memory region allocated by the runtime. The runtime reads the
//! pointer bit size from the exported [`POINTER_SIZE_SYMBOL`] constant
//! and stores the base of the correspondingly sized region into the
//! imported [`MEMORY_BASE_SYMBOL`] global.
//!
//! Sandboxed instructions:
//! - `load`, `store`
//! - `memcpy`, `memmove`, `memset` (pointer operands and length)
//! - `atomic_load`, `atomic_store`, `atomic_rmw`, `atomic_cmpxchg`,
//!   `atomic_is_lock_free`
//!
//! Whitelisted instructions: `ptrtoint`, `inttoptr`, `bitcast` (they do
//! not access memory). Every other instruction must not carry a
//! pointer-typed operand; if one does, the pass fails with
//! [`crate::Error::UnhandledPointerOperand`] and the compilation must be
//! abandoned. For calls only the arguments are checked, since the callee
//! target is validated by the later control-flow-integrity stage.
//!
//! The pass recognizes the add-then-cast pointer arithmetic left by the
//! earlier address-expansion stage and reuses its integer value to save
//! instructions. That optimization, like the bulk memory intrinsics, is
//! safe only if the runtime places a guard region at least as large as
//! the memory region directly after it.
//!
//! The synthesized pointer arithmetic always uses 64-bit integers; on
//! 32-bit targets the backend is expected to fold away the top bits
//! during the final cast back to a pointer.
//!
//! The pass must run once per module. Re-running it would sandbox the
//! already-bounded addresses a second time.

mod rewrite;
mod validate;

use tracing::{debug, trace};

use crate::error::Result;
use crate::ir::{Function, GlobalData, GlobalId, Linkage, Module, Opcode, Type, ValueId};

/// Symbol of the imported 64-bit global holding the sandbox base address.
/// Defined and initialized by the runtime.
pub const MEMORY_BASE_SYMBOL: &str = "__sfi_memory_base";

/// Symbol of the exported read-only 32-bit constant holding the
/// configured pointer size in bits. Read by the runtime to size the
/// sandbox region.
pub const POINTER_SIZE_SYMBOL: &str = "__sfi_pointer_size";

/// The sandboxing pass, configured with the sandbox pointer width.
///
/// ```
/// use sfi_sandbox::{Module, SandboxMemoryAccesses};
///
/// # fn main() -> sfi_sandbox::Result<()> {
/// let mut module = Module::new("unit");
/// let pass = SandboxMemoryAccesses::new(24)?;
/// pass.run(&mut module)?;
/// # Ok(())
/// # }
/// ```
pub struct SandboxMemoryAccesses {
    pointer_size: u32,
    mask: Option<u32>,
}

impl SandboxMemoryAccesses {
    /// Create the pass for a `pointer_size`-bit address subspace.
    ///
    /// Widths outside `1..=32` are rejected. A width of 32 uses the full
    /// 32-bit range without masking; smaller widths mask pointer and
    /// length values with `(1 << pointer_size) - 1`.
    pub fn new(pointer_size: u32) -> Result<Self> {
        if !(1..=32).contains(&pointer_size) {
            return Err(crate::Error::InvalidPointerSize { bits: pointer_size });
        }
        let mask = if pointer_size < 32 {
            Some((1u32 << pointer_size) - 1)
        } else {
            None
        };
        Ok(Self { pointer_size, mask })
    }

    /// Configured pointer width in bits
    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    /// Size in bytes of the address subspace, `2^pointer_size`
    pub fn address_subspace_size(&self) -> u64 {
        1u64 << self.pointer_size
    }

    /// Mask applied to pointers and lengths, if the subspace is smaller
    /// than 32 bits
    pub fn mask(&self) -> Option<u32> {
        self.mask
    }

    /// Rewrite every memory access in the module.
    ///
    /// Declares the memory-base import, defines the pointer-size export,
    /// then processes each function in order. On error the module is
    /// partially rewritten and must be discarded.
    pub fn run(&self, module: &mut Module) -> Result<()> {
        debug!(
            module = %module.name,
            pointer_size = self.pointer_size,
            "sandboxing memory accesses"
        );

        // The base address lives in a global defined and initialized by
        // the runtime. All original globals are assumed to have been
        // removed by the earlier data-segment-allocation stage.
        let mem_base = module.get_or_insert_global(MEMORY_BASE_SYMBOL, Type::I64);

        module.define_global(GlobalData {
            name: POINTER_SIZE_SYMBOL.to_string(),
            ty: Type::I32,
            is_constant: true,
            linkage: Linkage::Export,
            initializer: Some(i64::from(self.pointer_size)),
        });

        for func in &mut module.functions {
            self.run_on_function(func, mem_base)?;
        }
        Ok(())
    }

    fn run_on_function(&self, func: &mut Function, mem_base_global: GlobalId) -> Result<()> {
        trace!(function = %func.name, "sandboxing function");

        // Lazily populated with the loaded base value; one load per
        // function, shared by every sandboxing site in it.
        let mut mem_base: Option<ValueId> = None;

        for block in 0..func.blocks.len() {
            let mut idx = 0;
            while idx < func.blocks[block].insts.len() {
                let inst = func.blocks[block].insts[idx];
                match func.inst(inst).opcode {
                    Opcode::Load => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 0, true, &mut mem_base, mem_base_global,
                        );
                    }
                    Opcode::Store => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 1, true, &mut mem_base, mem_base_global,
                        );
                    }
                    Opcode::MemCpy | Opcode::MemMove => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 0, false, &mut mem_base, mem_base_global,
                        );
                        self.sandbox_ptr_operand(
                            func, block, inst, 1, false, &mut mem_base, mem_base_global,
                        );
                        self.sandbox_len_operand(func, block, inst, 2);
                    }
                    Opcode::MemSet => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 0, false, &mut mem_base, mem_base_global,
                        );
                        self.sandbox_len_operand(func, block, inst, 2);
                    }
                    Opcode::AtomicLoad | Opcode::AtomicCmpXchg => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 0, true, &mut mem_base, mem_base_global,
                        );
                    }
                    Opcode::AtomicStore | Opcode::AtomicRmw | Opcode::AtomicIsLockFree => {
                        self.sandbox_ptr_operand(
                            func, block, inst, 1, true, &mut mem_base, mem_base_global,
                        );
                    }
                    // Casts do not access memory.
                    Opcode::PtrToInt | Opcode::IntToPtr | Opcode::BitCast => {}
                    _ => validate::check_no_pointer_operands(func, inst)?,
                }
                // Rewriting inserts instructions before `inst` and may
                // erase instructions before it; recompute its position
                // and continue with whatever follows it. Synthesized
                // instructions are never re-visited.
                idx = match func.position(block, inst) {
                    Some(pos) => pos + 1,
                    None => idx + 1,
                };
            }
        }
        Ok(())
    }
}
