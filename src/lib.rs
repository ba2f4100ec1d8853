//! Interpreter and opcode-identification engine for the chronal wrist
//! device's 16-instruction register machine.
//!
//! Two engines share the instruction set core ([`isa`]):
//!
//! - [`exec`] runs `#ip`-bound programs, keeping one general register
//!   synchronized with the instruction pointer so programs can rewrite
//!   their own control flow.
//! - [`identify`] recovers the numeric-opcode table of an unlabeled device
//!   dump from before/after register samples, by candidate-set intersection
//!   and a finalize-and-eliminate worklist.
//!
//! [`decode`] parses both text formats; [`state`] holds the bounds-checked
//! register file both engines mutate.

use thiserror::Error;

pub mod decode;
pub mod exec;
pub mod identify;
pub mod isa;
pub mod state;

pub use decode::{parse_device_dump, parse_program, parse_samples, DecodeError};
pub use exec::{ExecError, Machine, Program, StepOutcome, PROGRAM_REGISTERS};
pub use identify::{
    count_ambiguous, matching_opcodes, resolve_opcode_mapping, run_identified_program,
    IdentifyError, OpcodeSet, RawInstruction, Sample,
};
pub use isa::{Instruction, Opcode, UnknownMnemonic};
pub use state::{RegisterError, Registers};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Aggregate error for callers that drive both engines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Identify(#[from] IdentifyError),
}
