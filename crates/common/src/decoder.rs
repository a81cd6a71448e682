//! Single-pass instruction decoder.
//!
//! Walks the buffer left to right from the end of the 13-byte header,
//! producing an instruction for every byte range with no gaps or
//! overlaps. The decoder never reads ahead past the operand bytes of
//! the instruction currently being decoded.

use crate::error::DecodeError;
use crate::instruction::{Instruction, Operands};
use crate::opcode::Opcode;
use crate::qualifier::Qualifier;
use crate::script::{Script, ScriptHeader, HEADER_LEN, MAGIC, SIZE_MARKER};

/// Big-endian cursor over the input buffer.
///
/// Every read is bounds-checked against the buffer and reported against
/// the offset of the instruction being decoded.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize, at: u32) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TruncatedOperand {
                offset: at,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self, at: u32) -> Result<u8, DecodeError> {
        Ok(self.take(1, at)?[0])
    }

    fn read_u16(&mut self, at: u32) -> Result<u16, DecodeError> {
        let b = self.take(2, at)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i16(&mut self, at: u32) -> Result<i16, DecodeError> {
        let b = self.take(2, at)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self, at: u32) -> Result<u32, DecodeError> {
        let b = self.take(4, at)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self, at: u32) -> Result<i32, DecodeError> {
        let b = self.take(4, at)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self, at: u32) -> Result<f32, DecodeError> {
        let b = self.take(4, at)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode a whole compiled-script buffer.
pub(crate) fn decode_script(bytes: &[u8]) -> Result<Script, DecodeError> {
    let header = decode_header(bytes)?;

    let mut cursor = Cursor::new(bytes, HEADER_LEN);
    let mut instructions = Vec::new();
    while cursor.remaining() > 0 {
        instructions.push(decode_instruction(&mut cursor)?);
    }

    Ok(Script {
        header,
        instructions,
    })
}

fn decode_header(bytes: &[u8]) -> Result<ScriptHeader, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedHeader(bytes.len()));
    }
    if &bytes[..8] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if bytes[8] != SIZE_MARKER {
        return Err(DecodeError::BadSizeMarker(bytes[8]));
    }
    let declared_size = u32::from_be_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);
    Ok(ScriptHeader { declared_size })
}

fn decode_instruction(cursor: &mut Cursor<'_>) -> Result<Instruction, DecodeError> {
    let at = cursor.pos as u32;

    let opcode_byte = cursor.read_u8(at)?;
    let opcode = Opcode::from_byte(opcode_byte).ok_or(DecodeError::UnknownOpcode {
        offset: at,
        byte: opcode_byte,
    })?;

    let qual_byte = cursor.read_u8(at)?;
    let qualifier = match opcode {
        // Raw size marker in the qualifier slot; consumed, not validated.
        Opcode::StoreState | Opcode::StoreStateAll => Qualifier::None,
        _ => {
            let qualifier =
                Qualifier::from_byte(qual_byte).ok_or(DecodeError::IllegalQualifier {
                    offset: at,
                    mnemonic: opcode.mnemonic(),
                    qualifier: qual_byte,
                })?;
            if !opcode.legal_qualifiers().contains(&qualifier) {
                return Err(DecodeError::IllegalQualifier {
                    offset: at,
                    mnemonic: opcode.mnemonic(),
                    qualifier: qual_byte,
                });
            }
            qualifier
        }
    };

    let operands = match opcode {
        Opcode::CopyDownSp | Opcode::CopyTopSp | Opcode::CopyDownBp | Opcode::CopyTopBp => {
            Operands::StackCopy {
                offset: cursor.read_i32(at)?,
                size: cursor.read_u16(at)?,
            }
        }
        Opcode::Const => match qualifier {
            Qualifier::Int => Operands::ConstInt(cursor.read_i32(at)?),
            Qualifier::Float => Operands::ConstFloat(cursor.read_f32(at)?),
            Qualifier::Str => {
                let len = cursor.read_u16(at)? as usize;
                let raw = cursor.take(len, at)?;
                // Game strings use assorted legacy encodings; lossy is
                // the only total choice for display purposes.
                Operands::ConstString(String::from_utf8_lossy(raw).into_owned())
            }
            Qualifier::Object => Operands::ConstObject(cursor.read_u32(at)?),
            // Unreachable: legal_qualifiers for CONST admits only the above.
            _ => Operands::None,
        },
        Opcode::Action => Operands::Action {
            routine: cursor.read_u16(at)?,
            arg_count: cursor.read_u8(at)?,
        },
        Opcode::Equal | Opcode::NotEqual if qualifier == Qualifier::StructStruct => {
            Operands::StructSize(cursor.read_u16(at)?)
        }
        Opcode::MoveSp | Opcode::DecSp | Opcode::IncSp | Opcode::DecBp | Opcode::IncBp => {
            Operands::Adjust(cursor.read_i32(at)?)
        }
        Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz => {
            Operands::Branch(cursor.read_i32(at)?)
        }
        Opcode::Destruct => Operands::Destruct {
            size: cursor.read_u16(at)?,
            keep_offset: cursor.read_i16(at)?,
            keep_size: cursor.read_u16(at)?,
        },
        Opcode::StoreState => Operands::State {
            base_size: cursor.read_u32(at)?,
            stack_size: cursor.read_u32(at)?,
        },
        _ => Operands::None,
    };

    Ok(Instruction::new(at, opcode, qualifier, operands))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(body: &[u8]) -> Vec<u8> {
        let total = (HEADER_LEN + body.len()) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(SIZE_MARKER);
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn empty_body_decodes_to_no_instructions() {
        let script = decode_script(&with_header(&[])).unwrap();
        assert!(script.instructions.is_empty());
        assert_eq!(script.header.declared_size, 13);
    }

    #[test]
    fn header_too_short() {
        assert_eq!(
            decode_script(b"NCS "),
            Err(DecodeError::TruncatedHeader(4))
        );
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = with_header(&[]);
        bytes[0] = b'X';
        assert_eq!(decode_script(&bytes), Err(DecodeError::BadMagic));
    }

    #[test]
    fn bad_size_marker_rejected() {
        let mut bytes = with_header(&[]);
        bytes[8] = 0x00;
        assert_eq!(decode_script(&bytes), Err(DecodeError::BadSizeMarker(0x00)));
    }

    #[test]
    fn const_int_decodes() {
        // CONST·I 5
        let bytes = with_header(&[0x04, 0x03, 0, 0, 0, 5]);
        let script = decode_script(&bytes).unwrap();
        assert_eq!(script.instructions.len(), 1);
        let inst = &script.instructions[0];
        assert_eq!(inst.offset, 13);
        assert_eq!(inst.opcode, Opcode::Const);
        assert_eq!(inst.qualifier, Qualifier::Int);
        assert_eq!(inst.operands, Operands::ConstInt(5));
    }

    #[test]
    fn const_string_decodes() {
        let bytes = with_header(&[0x04, 0x05, 0, 2, b'h', b'i']);
        let script = decode_script(&bytes).unwrap();
        assert_eq!(
            script.instructions[0].operands,
            Operands::ConstString("hi".into())
        );
    }

    #[test]
    fn sequence_has_no_gaps() {
        // CONST·I 5, CONST·I 3, ADD·II, RETN
        let bytes = with_header(&[
            0x04, 0x03, 0, 0, 0, 5, //
            0x04, 0x03, 0, 0, 0, 3, //
            0x14, 0x20, //
            0x20, 0x00,
        ]);
        let script = decode_script(&bytes).unwrap();
        assert_eq!(script.instructions.len(), 4);
        let mut expected = HEADER_LEN as u32;
        for inst in &script.instructions {
            assert_eq!(inst.offset, expected);
            expected = inst.next_offset();
        }
        assert_eq!(expected as usize, bytes.len());
    }

    #[test]
    fn unknown_opcode_reports_offset() {
        let bytes = with_header(&[0x2D, 0x00, 0x7F, 0x00]);
        assert_eq!(
            decode_script(&bytes),
            Err(DecodeError::UnknownOpcode {
                offset: 15,
                byte: 0x7F,
            })
        );
    }

    #[test]
    fn illegal_qualifier_for_opcode() {
        // ADD with a unary Int qualifier is not legal.
        let bytes = with_header(&[0x14, 0x03]);
        assert_eq!(
            decode_script(&bytes),
            Err(DecodeError::IllegalQualifier {
                offset: 13,
                mnemonic: "ADD",
                qualifier: 0x03,
            })
        );
    }

    #[test]
    fn unknown_qualifier_byte() {
        let bytes = with_header(&[0x14, 0x7E]);
        assert!(matches!(
            decode_script(&bytes),
            Err(DecodeError::IllegalQualifier {
                offset: 13,
                qualifier: 0x7E,
                ..
            })
        ));
    }

    #[test]
    fn truncated_operand_reports_offset() {
        // CONST·I with only two operand bytes.
        let bytes = with_header(&[0x04, 0x03, 0, 0]);
        assert_eq!(
            decode_script(&bytes),
            Err(DecodeError::TruncatedOperand {
                offset: 13,
                needed: 4,
                remaining: 2,
            })
        );
    }

    #[test]
    fn truncated_string_payload() {
        // CONST·S claiming 5 bytes with only 2 present.
        let bytes = with_header(&[0x04, 0x05, 0, 5, b'h', b'i']);
        assert_eq!(
            decode_script(&bytes),
            Err(DecodeError::TruncatedOperand {
                offset: 13,
                needed: 5,
                remaining: 2,
            })
        );
    }

    #[test]
    fn store_state_qualifier_byte_is_raw() {
        // STORESTATE with 0x10 in the qualifier slot (a size marker).
        let bytes = with_header(&[0x2C, 0x10, 0, 0, 0, 8, 0, 0, 0, 4]);
        let script = decode_script(&bytes).unwrap();
        assert_eq!(
            script.instructions[0].operands,
            Operands::State {
                base_size: 8,
                stack_size: 4,
            }
        );
    }

    #[test]
    fn struct_equality_carries_size() {
        let bytes = with_header(&[0x0B, 0x24, 0, 12]);
        let script = decode_script(&bytes).unwrap();
        assert_eq!(script.instructions[0].operands, Operands::StructSize(12));
    }
}
