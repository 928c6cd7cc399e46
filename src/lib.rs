//! # sfi-sandbox - Software-Fault Isolation for Memory Accesses
//!
//! A single transformation stage in an ahead-of-time compilation
//! pipeline: it rewrites every memory-accessing instruction in a module
//! so that, whatever address value the program computes at runtime, the
//! effective address stays inside a fixed-size sandbox region (plus an
//! equally sized guard region directly after it). Untrusted compiled
//! code can then run inside a host process without a hardware protection
//! boundary.
//!
//! ## Quick Start
//!
//! ```rust
//! use sfi_sandbox::{Function, Module, Opcode, SandboxMemoryAccesses, Type};
//!
//! # fn main() -> sfi_sandbox::Result<()> {
//! // A function loading through a raw pointer computed from its argument.
//! let mut func = Function::new("read", vec![Type::I32]);
//! let addr = func.arg(0);
//! let cast = func.push_inst(
//!     0,
//!     Opcode::IntToPtr,
//!     vec![addr],
//!     Some(Type::ptr_to(Type::I32)),
//! );
//! let ptr = func.result(cast);
//! func.push_inst(0, Opcode::Load, vec![ptr], Some(Type::I32));
//!
//! let mut module = Module::new("unit");
//! module.add_function(func);
//!
//! // Confine every access to a 16 MiB (24-bit) subspace.
//! let pass = SandboxMemoryAccesses::new(24)?;
//! pass.run(&mut module)?;
//! # Ok(())
//! # }
//! ```
//!
//! After the pass, the load's address is
//! `base + zext(ptrtoint(ptr) & 0x00ff_ffff)`, where `base` is read once
//! per function from the imported `__sfi_memory_base` global, and the
//! module exports the configured width under `__sfi_pointer_size`.
//!
//! ## Architecture
//!
//! ```text
//! Module ──▶ SandboxMemoryAccesses::run
//!              ├─ module init: declare base import, define width export
//!              ├─ per function: walk instructions in program order
//!              │    ├─ load/store/atomics   → sandbox pointer operand
//!              │    ├─ memcpy/memmove/memset→ sandbox pointers, mask length
//!              │    ├─ ptrtoint/inttoptr/bitcast → allowed, untouched
//!              │    └─ everything else     → must have no pointer operand
//!              └─ fatal on any unhandled pointer operand
//! ```
//!
//! ### Main Components
//!
//! - [`Module`] / [`Function`] - The IR the pass rewrites in place
//! - [`SandboxMemoryAccesses`] - The pass, configured with the sandbox
//!   pointer width (1-32 bits)
//! - [`Error`] - `UnhandledPointerOperand` aborts the compilation;
//!   there is no partial output
//!
//! ## Contracts
//!
//! Input modules are expected in canonical pre-sandboxing form: user
//! globals already lowered away, and structured address computations
//! already expanded into the add-then-cast integer pattern the pass
//! recognizes and folds. The runtime must allocate the region named by
//! `__sfi_memory_base` and back it with a guard region at least as large
//! as the region itself; the folded-offset optimization and the bulk
//! memory intrinsics rely on that guard.
//!
//! The pass is deterministic and purely CPU-bound. Functions share no
//! per-function state, so distinct functions could be processed in
//! parallel once the module-level symbols exist; the pass itself runs
//! single-threaded.

pub mod error;
pub mod ir;
pub mod sandbox;

// Re-export main types
pub use error::{Error, Result};
pub use ir::{
    BasicBlock, Function, GlobalData, GlobalId, InstData, InstId, Linkage, Module, Opcode,
    SourceLoc, Type, ValueData, ValueId, ValueKind,
};
pub use sandbox::{SandboxMemoryAccesses, MEMORY_BASE_SYMBOL, POINTER_SIZE_SYMBOL};
