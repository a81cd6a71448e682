//! Instruction representation for NCS compiled scripts.
//!
//! Unlike fixed-width instruction sets, NCS instructions are variable
//! length: `opcode: u8`, `qualifier: u8`, then a per-opcode operand
//! layout, all multi-byte fields big-endian. An [`Instruction`] is
//! immutable once decoded and keyed by its byte offset in the buffer.

use crate::opcode::Opcode;
use crate::qualifier::Qualifier;

/// Typed operand payload of one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    /// No operands.
    None,
    /// CPDOWNSP/CPTOPSP/CPDOWNBP/CPTOPBP: relative cell offset and byte size.
    StackCopy { offset: i32, size: u16 },
    /// CONST·I payload.
    ConstInt(i32),
    /// CONST·F payload.
    ConstFloat(f32),
    /// CONST·S payload (length-prefixed on the wire).
    ConstString(String),
    /// CONST·O payload (object id).
    ConstObject(u32),
    /// ACTION: engine routine id and argument count.
    Action { routine: u16, arg_count: u8 },
    /// EQ/NEQ with the struct qualifier: compared byte size.
    StructSize(u16),
    /// MOVSP/INCSP/DECSP/INCBP/DECBP: signed byte offset.
    Adjust(i32),
    /// JMP/JSR/JZ/JNZ: signed byte offset relative to the instruction address.
    Branch(i32),
    /// DESTRUCT: removed size, kept sub-range offset and size (bytes).
    Destruct {
        size: u16,
        keep_offset: i16,
        keep_size: u16,
    },
    /// STORESTATE: saved base and stack region sizes in bytes.
    State { base_size: u32, stack_size: u32 },
}

impl Operands {
    /// Encoded operand size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Operands::None => 0,
            Operands::StackCopy { .. } => 6,
            Operands::ConstInt(_) | Operands::ConstFloat(_) | Operands::ConstObject(_) => 4,
            Operands::ConstString(s) => 2 + s.len(),
            Operands::Action { .. } => 3,
            Operands::StructSize(_) => 2,
            Operands::Adjust(_) | Operands::Branch(_) => 4,
            Operands::Destruct { .. } => 6,
            Operands::State { .. } => 8,
        }
    }
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of this instruction in the buffer. Unique and
    /// monotonically increasing within a script.
    pub offset: u32,
    /// The operation to perform.
    pub opcode: Opcode,
    /// Type qualifier narrowing operand interpretation.
    pub qualifier: Qualifier,
    /// Decoded operand payload.
    pub operands: Operands,
}

impl Instruction {
    /// Create a new instruction.
    pub fn new(offset: u32, opcode: Opcode, qualifier: Qualifier, operands: Operands) -> Self {
        Self {
            offset,
            opcode,
            qualifier,
            operands,
        }
    }

    /// Total encoded length in bytes (opcode + qualifier + operands).
    pub fn byte_len(&self) -> usize {
        2 + self.operands.byte_len()
    }

    /// Byte offset one past this instruction.
    pub fn next_offset(&self) -> u32 {
        self.offset + self.byte_len() as u32
    }

    /// Absolute branch target for branch opcodes, `None` otherwise.
    ///
    /// Computed in `i64` so an out-of-range relative operand still
    /// produces a value the caller can bounds-check.
    pub fn branch_target(&self) -> Option<i64> {
        match self.operands {
            Operands::Branch(rel) if self.opcode.is_branch() => {
                Some(self.offset as i64 + rel as i64)
            }
            _ => None,
        }
    }

    /// Semantic re-encoding of this instruction (big-endian).
    ///
    /// Supports tests and tooling; bit-exact round-tripping of compiler
    /// output is out of scope.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        out.push(self.qualifier as u8);
        match &self.operands {
            Operands::None => {}
            Operands::StackCopy { offset, size } => {
                out.extend_from_slice(&offset.to_be_bytes());
                out.extend_from_slice(&size.to_be_bytes());
            }
            Operands::ConstInt(v) => out.extend_from_slice(&v.to_be_bytes()),
            Operands::ConstFloat(v) => out.extend_from_slice(&v.to_be_bytes()),
            Operands::ConstString(s) => {
                out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Operands::ConstObject(v) => out.extend_from_slice(&v.to_be_bytes()),
            Operands::Action { routine, arg_count } => {
                out.extend_from_slice(&routine.to_be_bytes());
                out.push(*arg_count);
            }
            Operands::StructSize(size) => out.extend_from_slice(&size.to_be_bytes()),
            Operands::Adjust(v) | Operands::Branch(v) => {
                out.extend_from_slice(&v.to_be_bytes());
            }
            Operands::Destruct {
                size,
                keep_offset,
                keep_size,
            } => {
                out.extend_from_slice(&size.to_be_bytes());
                out.extend_from_slice(&keep_offset.to_be_bytes());
                out.extend_from_slice(&keep_size.to_be_bytes());
            }
            Operands::State {
                base_size,
                stack_size,
            } => {
                out.extend_from_slice(&base_size.to_be_bytes());
                out.extend_from_slice(&stack_size.to_be_bytes());
            }
        }
    }

    /// Render one disassembly-style line: offset, mnemonic with qualifier
    /// suffix, operands. Branch targets print as absolute offsets.
    pub fn fmt_line(&self) -> String {
        let head = format!(
            "{:08x}  {}{}",
            self.offset,
            self.opcode.mnemonic(),
            self.qualifier.suffix()
        );
        match &self.operands {
            Operands::None => head,
            Operands::StackCopy { offset, size } => format!("{head} {offset}, {size}"),
            Operands::ConstInt(v) => format!("{head} {v}"),
            Operands::ConstFloat(v) => format!("{head} {v:?}"),
            Operands::ConstString(s) => format!("{head} {s:?}"),
            Operands::ConstObject(v) => format!("{head} {v:#x}"),
            Operands::Action { routine, arg_count } => {
                format!("{head} {routine}, {arg_count}")
            }
            Operands::StructSize(size) => format!("{head} {size}"),
            Operands::Adjust(v) => format!("{head} {v}"),
            Operands::Branch(_) => {
                // branch_target is Some for every branch opcode
                let target = self.branch_target().unwrap_or_default();
                format!("{head} off_{target:08x}")
            }
            Operands::Destruct {
                size,
                keep_offset,
                keep_size,
            } => format!("{head} {size}, {keep_offset}, {keep_size}"),
            Operands::State {
                base_size,
                stack_size,
            } => format!("{head} {base_size}, {stack_size}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_covers_all_layouts() {
        let cases = [
            (Operands::None, 2),
            (Operands::StackCopy { offset: -4, size: 4 }, 8),
            (Operands::ConstInt(5), 6),
            (Operands::ConstFloat(1.5), 6),
            (Operands::ConstString("hi".into()), 6),
            (Operands::ConstObject(0), 6),
            (
                Operands::Action {
                    routine: 1,
                    arg_count: 0,
                },
                5,
            ),
            (Operands::StructSize(8), 4),
            (Operands::Adjust(-4), 6),
            (Operands::Branch(10), 6),
            (
                Operands::Destruct {
                    size: 12,
                    keep_offset: 4,
                    keep_size: 4,
                },
                8,
            ),
            (
                Operands::State {
                    base_size: 0,
                    stack_size: 4,
                },
                10,
            ),
        ];
        for (operands, expected) in cases {
            let inst = Instruction::new(13, Opcode::Nop, Qualifier::None, operands);
            assert_eq!(inst.byte_len(), expected, "{:?}", inst.operands);
        }
    }

    #[test]
    fn branch_target_is_relative_to_instruction() {
        let inst = Instruction::new(20, Opcode::Jz, Qualifier::None, Operands::Branch(-7));
        assert_eq!(inst.branch_target(), Some(13));
    }

    #[test]
    fn branch_target_none_for_non_branch() {
        let inst = Instruction::new(13, Opcode::Ret, Qualifier::None, Operands::None);
        assert_eq!(inst.branch_target(), None);
    }

    #[test]
    fn next_offset_advances_by_length() {
        let inst = Instruction::new(13, Opcode::Const, Qualifier::Int, Operands::ConstInt(5));
        assert_eq!(inst.next_offset(), 19);
    }

    #[test]
    fn fmt_line_const_int() {
        let inst = Instruction::new(13, Opcode::Const, Qualifier::Int, Operands::ConstInt(5));
        assert_eq!(inst.fmt_line(), "0000000d  CONSTI 5");
    }

    #[test]
    fn fmt_line_branch_shows_absolute_target() {
        let inst = Instruction::new(13, Opcode::Jsr, Qualifier::None, Operands::Branch(29));
        assert_eq!(inst.fmt_line(), "0000000d  JSR off_0000002a");
    }

    #[test]
    fn fmt_line_no_operands() {
        let inst = Instruction::new(13, Opcode::Ret, Qualifier::None, Operands::None);
        assert_eq!(inst.fmt_line(), "0000000d  RETN");
    }

    #[test]
    fn fmt_line_pair_qualifier_suffix() {
        let inst = Instruction::new(25, Opcode::Add, Qualifier::IntInt, Operands::None);
        assert_eq!(inst.fmt_line(), "00000019  ADDII");
    }

    #[test]
    fn fmt_line_string_is_quoted() {
        let inst = Instruction::new(
            13,
            Opcode::Const,
            Qualifier::Str,
            Operands::ConstString("hi".into()),
        );
        assert_eq!(inst.fmt_line(), "0000000d  CONSTS \"hi\"");
    }
}
