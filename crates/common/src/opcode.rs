//! Opcode definitions for the NCS instruction set.
//!
//! Byte values, mnemonics, and per-opcode legal qualifiers follow the
//! published `.ncs` instruction set and must stay bit-exact for
//! compatibility with compiled game scripts.

use crate::qualifier::Qualifier;

/// Identifies the operation an instruction performs.
///
/// `#[repr(u8)]` pins each variant to its wire byte value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Copy the top cells down the stack (assignment to a local).
    CopyDownSp = 0x01,
    /// Reserve one cell of the qualifier's type on the stack.
    Reserve = 0x02,
    /// Copy cells from within the stack to the top (read a local).
    CopyTopSp = 0x03,
    /// Push a constant of the qualifier's type.
    Const = 0x04,
    /// Call an engine routine by id, consuming its arguments.
    Action = 0x05,
    /// Logical AND of two ints.
    LogAnd = 0x06,
    /// Logical OR of two ints.
    LogOr = 0x07,
    /// Bitwise inclusive OR of two ints.
    IncOr = 0x08,
    /// Bitwise exclusive OR of two ints.
    ExcOr = 0x09,
    /// Bitwise AND of two ints.
    BoolAnd = 0x0A,
    /// Equality comparison.
    Equal = 0x0B,
    /// Inequality comparison.
    NotEqual = 0x0C,
    /// Greater-or-equal comparison.
    GreaterEq = 0x0D,
    /// Greater-than comparison.
    Greater = 0x0E,
    /// Less-than comparison.
    Less = 0x0F,
    /// Less-or-equal comparison.
    LessEq = 0x10,
    /// Shift left.
    ShLeft = 0x11,
    /// Arithmetic shift right.
    ShRight = 0x12,
    /// Logical shift right.
    UShRight = 0x13,
    /// Addition (also string and vector forms).
    Add = 0x14,
    /// Subtraction.
    Sub = 0x15,
    /// Multiplication (also vector scaling).
    Mul = 0x16,
    /// Division.
    Div = 0x17,
    /// Integer remainder.
    Mod = 0x18,
    /// Arithmetic negation.
    Neg = 0x19,
    /// Bitwise complement.
    Comp = 0x1A,
    /// Adjust the stack pointer (release cells).
    MoveSp = 0x1B,
    /// Deprecated whole-state store.
    StoreStateAll = 0x1C,
    /// Unconditional jump, target relative to this instruction.
    Jmp = 0x1D,
    /// Jump to subroutine, target relative to this instruction.
    Jsr = 0x1E,
    /// Jump if the popped int is zero.
    Jz = 0x1F,
    /// Return from subroutine.
    Ret = 0x20,
    /// Remove cells from within the stack, keeping a sub-range.
    Destruct = 0x21,
    /// Logical NOT of one int.
    Not = 0x22,
    /// Decrement the int at a stack-relative offset.
    DecSp = 0x23,
    /// Increment the int at a stack-relative offset.
    IncSp = 0x24,
    /// Jump if the popped int is nonzero.
    Jnz = 0x25,
    /// Copy the top cells down relative to the base pointer.
    CopyDownBp = 0x26,
    /// Copy cells relative to the base pointer to the top.
    CopyTopBp = 0x27,
    /// Decrement the int at a base-relative offset.
    DecBp = 0x28,
    /// Increment the int at a base-relative offset.
    IncBp = 0x29,
    /// Save the stack pointer as the new base pointer.
    SaveBp = 0x2A,
    /// Restore the previous base pointer.
    RestoreBp = 0x2B,
    /// Store resumable state for a deferred action argument.
    StoreState = 0x2C,
    /// No operation.
    Nop = 0x2D,
}

/// All valid opcodes, in byte order. Useful for exhaustive testing.
pub const ALL_OPCODES: [Opcode; 45] = [
    Opcode::CopyDownSp,
    Opcode::Reserve,
    Opcode::CopyTopSp,
    Opcode::Const,
    Opcode::Action,
    Opcode::LogAnd,
    Opcode::LogOr,
    Opcode::IncOr,
    Opcode::ExcOr,
    Opcode::BoolAnd,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterEq,
    Opcode::Greater,
    Opcode::Less,
    Opcode::LessEq,
    Opcode::ShLeft,
    Opcode::ShRight,
    Opcode::UShRight,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Neg,
    Opcode::Comp,
    Opcode::MoveSp,
    Opcode::StoreStateAll,
    Opcode::Jmp,
    Opcode::Jsr,
    Opcode::Jz,
    Opcode::Ret,
    Opcode::Destruct,
    Opcode::Not,
    Opcode::DecSp,
    Opcode::IncSp,
    Opcode::Jnz,
    Opcode::CopyDownBp,
    Opcode::CopyTopBp,
    Opcode::DecBp,
    Opcode::IncBp,
    Opcode::SaveBp,
    Opcode::RestoreBp,
    Opcode::StoreState,
    Opcode::Nop,
];

const INT_PAIR: &[Qualifier] = &[Qualifier::IntInt];
const NUM_PAIR: &[Qualifier] = &[Qualifier::IntInt, Qualifier::FloatFloat];
const COPY: &[Qualifier] = &[Qualifier::Copy];
const NONE: &[Qualifier] = &[Qualifier::None];

impl Opcode {
    /// Decode an opcode byte. Returns `None` for bytes outside the table.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if (0x01..=0x2D).contains(&byte) {
            // Contiguous table, safe by the range check above.
            Some(ALL_OPCODES[(byte - 1) as usize])
        } else {
            None
        }
    }

    /// Returns the assembly mnemonic for this opcode.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::CopyDownSp => "CPDOWNSP",
            Opcode::Reserve => "RSADD",
            Opcode::CopyTopSp => "CPTOPSP",
            Opcode::Const => "CONST",
            Opcode::Action => "ACTION",
            Opcode::LogAnd => "LOGAND",
            Opcode::LogOr => "LOGOR",
            Opcode::IncOr => "INCOR",
            Opcode::ExcOr => "EXCOR",
            Opcode::BoolAnd => "BOOLAND",
            Opcode::Equal => "EQ",
            Opcode::NotEqual => "NEQ",
            Opcode::GreaterEq => "GEQ",
            Opcode::Greater => "GT",
            Opcode::Less => "LT",
            Opcode::LessEq => "LEQ",
            Opcode::ShLeft => "SHLEFT",
            Opcode::ShRight => "SHRIGHT",
            Opcode::UShRight => "USHRIGHT",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::Comp => "COMP",
            Opcode::MoveSp => "MOVSP",
            Opcode::StoreStateAll => "STORESTATEALL",
            Opcode::Jmp => "JMP",
            Opcode::Jsr => "JSR",
            Opcode::Jz => "JZ",
            Opcode::Ret => "RETN",
            Opcode::Destruct => "DESTRUCT",
            Opcode::Not => "NOT",
            Opcode::DecSp => "DECSP",
            Opcode::IncSp => "INCSP",
            Opcode::Jnz => "JNZ",
            Opcode::CopyDownBp => "CPDOWNBP",
            Opcode::CopyTopBp => "CPTOPBP",
            Opcode::DecBp => "DECBP",
            Opcode::IncBp => "INCBP",
            Opcode::SaveBp => "SAVEBP",
            Opcode::RestoreBp => "RESTOREBP",
            Opcode::StoreState => "STORESTATE",
            Opcode::Nop => "NOP",
        }
    }

    /// Qualifier bytes legal for this opcode.
    ///
    /// `STORESTATE`/`STORESTATEALL` carry a raw size marker in the
    /// qualifier position; the decoder consumes it without validation,
    /// so they are not listed here.
    pub fn legal_qualifiers(&self) -> &'static [Qualifier] {
        match self {
            Opcode::CopyDownSp
            | Opcode::CopyTopSp
            | Opcode::CopyDownBp
            | Opcode::CopyTopBp
            | Opcode::Destruct => COPY,

            Opcode::Reserve => &[
                Qualifier::Int,
                Qualifier::Float,
                Qualifier::Str,
                Qualifier::Object,
                Qualifier::Effect,
                Qualifier::Event,
                Qualifier::Location,
                Qualifier::Talent,
            ],

            Opcode::Const => &[
                Qualifier::Int,
                Qualifier::Float,
                Qualifier::Str,
                Qualifier::Object,
            ],

            Opcode::LogAnd
            | Opcode::LogOr
            | Opcode::IncOr
            | Opcode::ExcOr
            | Opcode::BoolAnd
            | Opcode::ShLeft
            | Opcode::ShRight
            | Opcode::UShRight
            | Opcode::Mod => INT_PAIR,

            Opcode::Equal | Opcode::NotEqual => &[
                Qualifier::IntInt,
                Qualifier::FloatFloat,
                Qualifier::ObjectObject,
                Qualifier::StrStr,
                Qualifier::StructStruct,
                Qualifier::EffectEffect,
                Qualifier::EventEvent,
                Qualifier::LocationLocation,
                Qualifier::TalentTalent,
            ],

            Opcode::GreaterEq | Opcode::Greater | Opcode::Less | Opcode::LessEq => NUM_PAIR,

            Opcode::Add => &[
                Qualifier::IntInt,
                Qualifier::IntFloat,
                Qualifier::FloatInt,
                Qualifier::FloatFloat,
                Qualifier::StrStr,
                Qualifier::VecVec,
            ],
            Opcode::Sub => &[
                Qualifier::IntInt,
                Qualifier::IntFloat,
                Qualifier::FloatInt,
                Qualifier::FloatFloat,
                Qualifier::VecVec,
            ],
            Opcode::Mul => &[
                Qualifier::IntInt,
                Qualifier::IntFloat,
                Qualifier::FloatInt,
                Qualifier::FloatFloat,
                Qualifier::VecFloat,
                Qualifier::FloatVec,
            ],
            Opcode::Div => &[
                Qualifier::IntInt,
                Qualifier::IntFloat,
                Qualifier::FloatInt,
                Qualifier::FloatFloat,
                Qualifier::VecFloat,
            ],

            Opcode::Neg => &[Qualifier::Int, Qualifier::Float],
            Opcode::Comp | Opcode::Not | Opcode::DecSp | Opcode::IncSp | Opcode::DecBp
            | Opcode::IncBp => &[Qualifier::Int],

            Opcode::Action
            | Opcode::MoveSp
            | Opcode::Jmp
            | Opcode::Jsr
            | Opcode::Jz
            | Opcode::Jnz
            | Opcode::Ret
            | Opcode::SaveBp
            | Opcode::RestoreBp
            | Opcode::Nop => NONE,

            // Raw size byte in the qualifier slot, never validated.
            Opcode::StoreState | Opcode::StoreStateAll => &[],
        }
    }

    /// Returns true for branch opcodes (relative i32 target operand).
    pub fn is_branch(&self) -> bool {
        matches!(self, Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz)
    }

    /// Returns true for the conditional branches.
    pub fn is_conditional_branch(&self) -> bool {
        matches!(self, Opcode::Jz | Opcode::Jnz)
    }
}
