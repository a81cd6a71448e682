//! Decode errors for NCS instruction streams.
//!
//! All variants are fatal: once the decoder reports one of these the
//! instruction stream cannot be trusted past the named offset.

use thiserror::Error;

/// Errors that occur while decoding a compiled script buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer is shorter than the fixed 13-byte header.
    #[error("buffer too short for header: {0} bytes (need 13)")]
    TruncatedHeader(usize),

    /// The 8-byte magic is not `"NCS V1.0"`.
    #[error("bad magic: expected \"NCS V1.0\"")]
    BadMagic,

    /// The size-marker byte after the magic is not `0x42`.
    #[error("bad size marker: {0:#04x} (expected 0x42)")]
    BadSizeMarker(u8),

    /// Opcode byte is not in the instruction set.
    #[error("unknown opcode {byte:#04x} at offset {offset:#010x}")]
    UnknownOpcode { offset: u32, byte: u8 },

    /// Qualifier byte is not legal for the decoded opcode.
    #[error("illegal qualifier {qualifier:#04x} for {mnemonic} at offset {offset:#010x}")]
    IllegalQualifier {
        offset: u32,
        mnemonic: &'static str,
        qualifier: u8,
    },

    /// An operand read would run past the end of the buffer.
    #[error("truncated operand at offset {offset:#010x}: need {needed} bytes, {remaining} remain")]
    TruncatedOperand {
        offset: u32,
        needed: usize,
        remaining: usize,
    },
}
