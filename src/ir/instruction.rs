//! IR instruction definitions

use std::fmt;

use super::value::ValueId;

/// Handle to an instruction inside a function's instruction table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub(crate) u32);

impl InstId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Closed instruction opcode enumeration.
///
/// The sandboxing pass dispatches on this enum and treats every opcode it
/// does not explicitly handle as "must not carry pointer operands", so
/// adding an opcode here forces a decision in the pass dispatch.
///
/// Operand layouts for the memory-touching opcodes:
///
/// | Opcode | Operands |
/// |---|---|
/// | `Load` | `(ptr)` |
/// | `Store` | `(value, ptr)` |
/// | `MemCpy` / `MemMove` | `(dst, src, len)` |
/// | `MemSet` | `(dst, byte, len)` |
/// | `AtomicLoad` | `(ptr, order)` |
/// | `AtomicStore` | `(value, ptr, order)` |
/// | `AtomicRmw` | `(op, ptr, value, order)` |
/// | `AtomicCmpXchg` | `(ptr, expected, desired, order_ok, order_fail)` |
/// | `AtomicIsLockFree` | `(size, ptr)` |
/// | `Call` | `(callee, args...)` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Load from memory
    Load,
    /// Store to memory
    Store,
    /// Bulk copy (non-overlapping)
    MemCpy,
    /// Bulk copy (overlap allowed)
    MemMove,
    /// Bulk fill
    MemSet,
    /// Atomic load
    AtomicLoad,
    /// Atomic store
    AtomicStore,
    /// Atomic read-modify-write
    AtomicRmw,
    /// Atomic compare-exchange
    AtomicCmpXchg,
    /// Atomic lock-freedom query
    AtomicIsLockFree,
    /// Pointer-to-integer cast
    PtrToInt,
    /// Integer-to-pointer cast
    IntToPtr,
    /// Reinterpreting cast
    BitCast,
    /// Zero extension
    ZExt,
    /// Sign extension
    SExt,
    /// Integer truncation
    Trunc,
    /// Integer addition
    Add,
    /// Integer subtraction
    Sub,
    /// Integer multiplication
    Mul,
    /// Bitwise AND
    And,
    /// Bitwise OR
    Or,
    /// Bitwise XOR
    Xor,
    /// Integer comparison (result 0 or 1)
    Icmp,
    /// Two-way select
    Select,
    /// Function call; operand 0 is the callee
    Call,
    /// Unconditional branch (targets on the basic block)
    Br,
    /// Conditional branch on operand 0
    CondBr,
    /// Return with optional value operand
    Ret,
}

impl Opcode {
    /// Lowercase mnemonic used in diagnostics and the printer
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::MemCpy => "memcpy",
            Opcode::MemMove => "memmove",
            Opcode::MemSet => "memset",
            Opcode::AtomicLoad => "atomic_load",
            Opcode::AtomicStore => "atomic_store",
            Opcode::AtomicRmw => "atomic_rmw",
            Opcode::AtomicCmpXchg => "atomic_cmpxchg",
            Opcode::AtomicIsLockFree => "atomic_is_lock_free",
            Opcode::PtrToInt => "ptrtoint",
            Opcode::IntToPtr => "inttoptr",
            Opcode::BitCast => "bitcast",
            Opcode::ZExt => "zext",
            Opcode::SExt => "sext",
            Opcode::Trunc => "trunc",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Icmp => "icmp",
            Opcode::Select => "select",
            Opcode::Call => "call",
            Opcode::Br => "br",
            Opcode::CondBr => "cond_br",
            Opcode::Ret => "ret",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Source location carried through the rewrite for debuggability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    /// Line number in the original source
    pub line: u32,
    /// Column number in the original source
    pub col: u32,
}

/// An instruction: opcode, ordered operand list, optional result value
#[derive(Debug, Clone)]
pub struct InstData {
    /// Opcode of the instruction
    pub opcode: Opcode,
    /// Ordered operand list (references into the function's value table)
    pub operands: Vec<ValueId>,
    /// Result value, for value-producing instructions
    pub result: Option<ValueId>,
    /// Optional source location
    pub loc: Option<SourceLoc>,
}
