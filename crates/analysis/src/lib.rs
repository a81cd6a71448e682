//! Stack emulation and control-flow discovery over decoded scripts.
//!
//! [`analyze`] is the entry point: it partitions a [`Script`] into
//! subroutines, replays each one through the typed stack emulator and
//! classifies its branches into conditionals, loops and exit jumps.
//! Anything that cannot be classified is demoted to a raw block and
//! surfaced through [`Diagnostic`]s; analysis itself never fails.
//!
//! [`Script`]: ncsdc_common::Script

pub mod diag;
pub mod flow;
pub mod stack;

pub use diag::{DiagKind, Diagnostic};
pub use flow::{analyze, Analysis, ControlShape, Resolution, Subroutine};
pub use stack::{emulate, CellType, EmulateAbort, Emulation};
