//! Shared types for working with NCS compiled scripts.
//!
//! This crate owns the binary format: the instruction set, operand
//! layouts, the single-pass decoder, and the [`Script`] container the
//! analysis and decompilation crates consume. Nothing here executes
//! scripts; decoding is a pure function from bytes to structure.

pub mod error;
pub mod instruction;
pub mod opcode;
pub mod qualifier;
pub mod script;

mod decoder;

pub use error::DecodeError;
pub use instruction::{Instruction, Operands};
pub use opcode::Opcode;
pub use qualifier::Qualifier;
pub use script::{Script, ScriptHeader, HEADER_LEN, MAGIC, SIZE_MARKER};
