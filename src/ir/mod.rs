//! # Intermediate Representation for the Sandboxing Pass
//!
//! A small typed IR in canonical pre-sandboxing form: modules own
//! functions and globals, functions own basic blocks, blocks own ordered
//! instruction lists. The pass mutates it in place.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # Type (integers, floats, typed pointers)
//! ├── value.rs        # ValueId, GlobalId, ValueKind, ValueData
//! ├── instruction.rs  # InstId, Opcode, InstData, SourceLoc
//! └── module.rs       # Module, Function, BasicBlock, GlobalData
//! ```
//!
//! ## Key Types
//!
//! - [`Module`] - Compilation unit: functions plus module-level globals
//! - [`Function`] - Flat value/instruction tables plus ordered blocks,
//!   with explicit use counts on every value
//! - [`Opcode`] - Closed opcode enumeration the pass dispatches over
//! - [`ValueId`] / [`InstId`] - Stable handles into a function's tables
//!
//! ## Mutation Model
//!
//! Instruction lists mutate in place: the rewrite inserts synthesized
//! instructions immediately before the instruction being rewritten,
//! replaces single operands via [`Function::set_operand`] (which keeps
//! use counts exact), and erases instructions that became unused with
//! [`Function::erase_inst`], dependent before dependency.

mod instruction;
mod module;
mod types;
mod value;

pub use instruction::{InstData, InstId, Opcode, SourceLoc};
pub use module::{BasicBlock, Function, GlobalData, Linkage, Module};
pub use types::Type;
pub use value::{GlobalId, ValueData, ValueId, ValueKind};
