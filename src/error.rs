//! Error types for the sandboxing pass

use thiserror::Error;

/// Sandboxing pass errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Instruction with a pointer-typed operand outside the closed set of
    /// sandboxed instruction kinds.
    ///
    /// **Triggered by:** any instruction other than the load/store/bulk
    /// memory/atomic/cast kinds carrying a pointer-typed operand (for
    /// calls, a pointer-typed argument; the callee operand is validated
    /// by the later control-flow-integrity stage instead)
    /// **Recovery:** none. This indicates a defect in an earlier pipeline
    /// stage; the whole compilation must be abandoned and partially
    /// rewritten output must not be used.
    #[error("unhandled pointer operand on `{instruction}` in function `{function}`")]
    UnhandledPointerOperand {
        /// Name of the function containing the offending instruction
        function: String,
        /// Mnemonic of the offending instruction
        instruction: String,
    },

    /// Configured sandbox pointer width outside the supported range.
    ///
    /// **Triggered by:** constructing the pass with a width of 0 or more
    /// than 32 bits
    /// **Prevention:** validate configuration before building the pass
    #[error("invalid sandbox pointer size: {bits} bits (supported range: 1-32)")]
    InvalidPointerSize {
        /// The rejected width in bits
        bits: u32,
    },
}

/// Result type for sandboxing operations
pub type Result<T> = std::result::Result<T, Error>;
