//! Type qualifier codes for NCS instructions.
//!
//! The qualifier byte narrows how an opcode interprets its operands: a
//! unary code names the type of one stack cell, a pair code names the
//! types of the two operands of a binary operation.

/// The type qualifier of an instruction.
///
/// Byte values follow the published `.ncs` instruction set. Any other
/// byte in the qualifier position is rejected by the decoder.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// No type context (control flow, stack bookkeeping).
    None = 0x00,
    /// Raw cell copy (CPDOWNSP/CPTOPSP/CPDOWNBP/CPTOPBP/DESTRUCT).
    Copy = 0x01,
    /// Signed 32-bit integer cell.
    Int = 0x03,
    /// IEEE 754 32-bit float cell.
    Float = 0x04,
    /// String cell.
    Str = 0x05,
    /// Object-reference cell.
    Object = 0x06,
    /// Engine structure: effect.
    Effect = 0x10,
    /// Engine structure: event.
    Event = 0x11,
    /// Engine structure: location.
    Location = 0x12,
    /// Engine structure: talent.
    Talent = 0x13,
    /// Binary int × int.
    IntInt = 0x20,
    /// Binary float × float.
    FloatFloat = 0x21,
    /// Binary object × object.
    ObjectObject = 0x22,
    /// Binary string × string.
    StrStr = 0x23,
    /// Binary struct × struct (byte size in a trailing operand).
    StructStruct = 0x24,
    /// Binary int × float.
    IntFloat = 0x25,
    /// Binary float × int.
    FloatInt = 0x26,
    /// Binary effect × effect.
    EffectEffect = 0x30,
    /// Binary event × event.
    EventEvent = 0x31,
    /// Binary location × location.
    LocationLocation = 0x32,
    /// Binary talent × talent.
    TalentTalent = 0x33,
    /// Binary vector × vector (three float cells each).
    VecVec = 0x3A,
    /// Binary vector × float.
    VecFloat = 0x3B,
    /// Binary float × vector.
    FloatVec = 0x3C,
}

/// All valid qualifiers, in byte order.
pub const ALL_QUALIFIERS: [Qualifier; 24] = [
    Qualifier::None,
    Qualifier::Copy,
    Qualifier::Int,
    Qualifier::Float,
    Qualifier::Str,
    Qualifier::Object,
    Qualifier::Effect,
    Qualifier::Event,
    Qualifier::Location,
    Qualifier::Talent,
    Qualifier::IntInt,
    Qualifier::FloatFloat,
    Qualifier::ObjectObject,
    Qualifier::StrStr,
    Qualifier::StructStruct,
    Qualifier::IntFloat,
    Qualifier::FloatInt,
    Qualifier::EffectEffect,
    Qualifier::EventEvent,
    Qualifier::LocationLocation,
    Qualifier::TalentTalent,
    Qualifier::VecVec,
    Qualifier::VecFloat,
    Qualifier::FloatVec,
];

impl Qualifier {
    /// Decode a qualifier byte. Returns `None` for bytes outside the table.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Qualifier::None),
            0x01 => Some(Qualifier::Copy),
            0x03 => Some(Qualifier::Int),
            0x04 => Some(Qualifier::Float),
            0x05 => Some(Qualifier::Str),
            0x06 => Some(Qualifier::Object),
            0x10 => Some(Qualifier::Effect),
            0x11 => Some(Qualifier::Event),
            0x12 => Some(Qualifier::Location),
            0x13 => Some(Qualifier::Talent),
            0x20 => Some(Qualifier::IntInt),
            0x21 => Some(Qualifier::FloatFloat),
            0x22 => Some(Qualifier::ObjectObject),
            0x23 => Some(Qualifier::StrStr),
            0x24 => Some(Qualifier::StructStruct),
            0x25 => Some(Qualifier::IntFloat),
            0x26 => Some(Qualifier::FloatInt),
            0x30 => Some(Qualifier::EffectEffect),
            0x31 => Some(Qualifier::EventEvent),
            0x32 => Some(Qualifier::LocationLocation),
            0x33 => Some(Qualifier::TalentTalent),
            0x3A => Some(Qualifier::VecVec),
            0x3B => Some(Qualifier::VecFloat),
            0x3C => Some(Qualifier::FloatVec),
            _ => None,
        }
    }

    /// Returns the mnemonic suffix for this qualifier (e.g. `ADD` + `II`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Qualifier::None | Qualifier::Copy => "",
            Qualifier::Int => "I",
            Qualifier::Float => "F",
            Qualifier::Str => "S",
            Qualifier::Object => "O",
            Qualifier::Effect => "EFF",
            Qualifier::Event => "EVT",
            Qualifier::Location => "LOC",
            Qualifier::Talent => "TAL",
            Qualifier::IntInt => "II",
            Qualifier::FloatFloat => "FF",
            Qualifier::ObjectObject => "OO",
            Qualifier::StrStr => "SS",
            Qualifier::StructStruct => "TT",
            Qualifier::IntFloat => "IF",
            Qualifier::FloatInt => "FI",
            Qualifier::EffectEffect => "EFFEFF",
            Qualifier::EventEvent => "EVTEVT",
            Qualifier::LocationLocation => "LOCLOC",
            Qualifier::TalentTalent => "TALTAL",
            Qualifier::VecVec => "VV",
            Qualifier::VecFloat => "VF",
            Qualifier::FloatVec => "FV",
        }
    }

    /// Returns true for the binary pair codes (two operands on the stack).
    pub fn is_pair(&self) -> bool {
        (*self as u8) >= 0x20
    }
}
