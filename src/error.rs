//! Error types for the simulation core

use thiserror::Error;

/// Result type for stacksim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building effect tables or driving a simulation.
///
/// All of these are fatal to the simulation they occur in: the simulator
/// records the message and moves to its terminal `Errored` state. Recovery
/// is the caller's job, typically by restoring an earlier snapshot.
#[derive(Error, Debug)]
pub enum Error {
    #[error("contract violation: expected {expected}, found {found}")]
    ContractViolation { expected: String, found: String },

    #[error("cannot pop from empty stack")]
    StackUnderflow,

    #[error("cannot push past declared stack size of {max} slots")]
    StackOverflow { max: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unsupported opcode: {mnemonic}")]
    UnsupportedOpcode { mnemonic: String },

    #[error("unsupported constant kind: {kind}")]
    UnsupportedConstant { kind: String },

    #[error("invalid descriptor: {descriptor}")]
    BadDescriptor { descriptor: String },

    #[error("invalid jump target: {label}")]
    InvalidJumpTarget { label: String },

    #[error("local slot {index} outside of range {max}")]
    LocalOutOfRange { index: usize, max: usize },

    #[error("cannot read {expected} from local slot {index}, found {found}")]
    InvalidLocal {
        index: usize,
        expected: String,
        found: String,
    },
}
