//! IR type definitions

use std::fmt;

/// First-class IR type.
///
/// Pointers are typed (they know their pointee) so that the sandboxing
/// rewrite can preserve the pointee type and query its storage size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// 8-bit integer
    I8,
    /// 16-bit integer
    I16,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Typed pointer
    Ptr(Box<Type>),
}

impl Type {
    /// Builds a pointer type to the given pointee
    pub fn ptr_to(pointee: Type) -> Self {
        Type::Ptr(Box::new(pointee))
    }

    /// Returns true if this is a pointer type
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    /// Returns the pointee type for pointers, `None` otherwise
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    /// Storage size in bytes.
    ///
    /// Pointers in the sandboxed program model are 32-bit, so they store
    /// as 4 bytes. The pointer arithmetic synthesized by the pass is
    /// 64-bit regardless; the backend truncates it on 32-bit targets.
    pub fn store_size(&self) -> u64 {
        match self {
            Type::I8 => 1,
            Type::I16 => 2,
            Type::I32 | Type::F32 | Type::Ptr(_) => 4,
            Type::I64 | Type::F64 => 8,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I8 => write!(f, "i8"),
            Type::I16 => write!(f, "i16"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
            Type::F32 => write!(f, "f32"),
            Type::F64 => write!(f, "f64"),
            Type::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}
