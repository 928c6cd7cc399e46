//! IR value definitions
//!
//! A value is anything an instruction can take as an operand: a constant,
//! a function argument, the address of a module global, or the result of
//! another instruction. Values are owned by their containing [`Function`]
//! and referenced by index.
//!
//! [`Function`]: super::Function

use super::instruction::InstId;
use super::types::Type;

/// Handle to a value inside a function's value table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a global inside a module's global table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub(crate) u32);

impl GlobalId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// What produces a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer constant. Stored sign-extended to 64 bits; the value's
    /// type gives the nominal width.
    Const(i64),
    /// Function argument (by position)
    Argument(u32),
    /// Address of a module global
    Global(GlobalId),
    /// Result of an instruction
    Inst(InstId),
}

/// A value together with its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueData {
    /// Type of the value
    pub ty: Type,
    /// Producer of the value
    pub kind: ValueKind,
}
