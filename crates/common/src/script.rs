//! Decoded script container.

use crate::decoder;
use crate::error::DecodeError;
use crate::instruction::{Instruction, Operands};
use crate::opcode::Opcode;
use crate::qualifier::Qualifier;

/// Fixed header length: 8-byte magic, marker byte, u32 size.
pub const HEADER_LEN: usize = 13;

/// The 8-byte magic at the start of every compiled script.
pub const MAGIC: &[u8; 8] = b"NCS V1.0";

/// Marker byte preceding the declared total size.
pub const SIZE_MARKER: u8 = 0x42;

/// Header fields of a compiled script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptHeader {
    /// Total file size as declared in the header, header included.
    pub declared_size: u32,
}

/// A fully decoded compiled script: header plus the instruction list.
///
/// Instructions are stored in offset order. Every byte of the input
/// body belongs to exactly one instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub header: ScriptHeader,
    pub instructions: Vec<Instruction>,
}

impl Script {
    /// Decode a script from its on-disk byte representation.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decoder::decode_script(bytes)
    }

    /// Assemble a script from opcode triples, assigning offsets as the
    /// decoder would. The declared size matches the encoded length.
    pub fn assemble(parts: Vec<(Opcode, Qualifier, Operands)>) -> Self {
        let mut offset = HEADER_LEN as u32;
        let mut instructions = Vec::with_capacity(parts.len());
        for (opcode, qualifier, operands) in parts {
            let inst = Instruction::new(offset, opcode, qualifier, operands);
            offset = inst.next_offset();
            instructions.push(inst);
        }
        Script {
            header: ScriptHeader {
                declared_size: offset,
            },
            instructions,
        }
    }

    /// Re-encode the script to bytes. Decoding the result yields an
    /// equal `Script`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.declared_size as usize);
        out.extend_from_slice(MAGIC);
        out.push(SIZE_MARKER);
        out.extend_from_slice(&self.header.declared_size.to_be_bytes());
        for inst in &self.instructions {
            inst.encode(&mut out);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Offset one past the last instruction (or the header end when
    /// the body is empty). A branch landing exactly here is valid.
    pub fn end_offset(&self) -> u32 {
        self.instructions
            .last()
            .map(Instruction::next_offset)
            .unwrap_or(HEADER_LEN as u32)
    }

    /// Index of the instruction starting at `offset`, if any starts
    /// exactly there.
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |inst| inst.offset)
            .ok()
    }

    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.index_of(offset).map(|i| &self.instructions[i])
    }
}
