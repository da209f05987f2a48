use crate::opcode::{Form, Opcode};
use crate::unpack;
use keel_types::{
    Immediate24, Immediate32, Immediate40, PoolIndex, StackSlot, Word,
};

bitflags::bitflags! {
    /// The flags byte of an instruction word.
    pub struct Flags: u8 {
        /// The branch displacement in `dest` is taken backwards.
        const BACKWARD = 0b0000_0001;
    }
}

/// The opcode byte of a raw word names no catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid opcode byte 0x{0:02x}")]
pub struct InvalidOpcode(pub u8);

/// Bit position a relocated pool index is OR-ed into.
///
/// Emission leaves the field zero and records one of these alongside the
/// symbolic name; linking shifts the resolved index into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewriteSlot {
    /// The 16-bit `dest` field.
    Dest,
    /// The 16-bit `src1` field.
    Src1,
    /// The 16-bit `src2` field.
    Src2,
    /// The 24-bit immediate field.
    Imm24,
    /// The 32-bit immediate field.
    Imm32,
}

impl RewriteSlot {
    /// Bit offset of the field inside the word.
    pub const fn shift(self) -> u32 {
        match self {
            Self::Dest => 0,
            Self::Src1 | Self::Imm32 => 16,
            Self::Src2 | Self::Imm24 => 32,
        }
    }

    /// OR a resolved pool index into this field of an emitted word.
    pub const fn apply(self, word: Word, index: PoolIndex) -> Word {
        word | ((index as Word) << self.shift())
    }
}

/// Decoded view of a 64-bit instruction word.
///
/// Every field view is populated on decode; which ones are meaningful is
/// determined by the opcode's [`Form`]. Re-encoding through [`word`] uses
/// only the fields of that form, so decode followed by re-encode is the
/// identity on well-formed words.
///
/// [`word`]: Instruction::word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    op: Opcode,
    flags: u8,
    dest: StackSlot,
    src1: StackSlot,
    src2: StackSlot,
    imm24: Immediate24,
    imm32: Immediate32,
    imm40: Immediate40,
}

impl Instruction {
    /// Size of an encoded instruction in bytes.
    pub const LEN: usize = 8;

    /// Opcode
    pub const fn opcode(&self) -> Opcode {
        self.op
    }

    /// Raw flags byte
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Whether the branch-direction bit is set.
    pub const fn is_backward(&self) -> bool {
        self.flags & Flags::BACKWARD.bits() != 0
    }

    /// Destination slot (or absolute branch displacement)
    pub const fn dest(&self) -> StackSlot {
        self.dest
    }

    /// First source slot
    pub const fn src1(&self) -> StackSlot {
        self.src1
    }

    /// Second source slot
    pub const fn src2(&self) -> StackSlot {
        self.src2
    }

    /// Immediate with 24 bits
    pub const fn imm24(&self) -> Immediate24 {
        self.imm24
    }

    /// Immediate with 32 bits
    pub const fn imm32(&self) -> Immediate32 {
        self.imm32
    }

    /// Immediate with 40 bits
    pub const fn imm40(&self) -> Immediate40 {
        self.imm40
    }

    /// Re-encode through the opcode's form.
    pub fn word(&self) -> Word {
        let flags = Flags::from_bits_truncate(self.flags);
        match self.op.form() {
            Form::Reg => {
                crate::pack::reg_word(self.op, flags, self.dest, self.src1, self.src2)
            }
            Form::Imm24 => {
                crate::pack::imm24_word(self.op, self.dest, self.src1, self.imm24)
            }
            Form::Imm32 => crate::pack::imm32_word(self.op, flags, self.dest, self.imm32),
            Form::Imm40 => crate::pack::imm40_word(self.op, self.dest, self.imm40),
        }
    }
}

impl TryFrom<Word> for Instruction {
    type Error = InvalidOpcode;

    fn try_from(word: Word) -> Result<Self, Self::Error> {
        let byte = unpack::op_byte_from_word(word);
        let op = Opcode::from_repr(byte).ok_or(InvalidOpcode(byte))?;
        Ok(Self {
            op,
            flags: unpack::flags_from_word(word),
            dest: unpack::dest_from_word(word),
            src1: unpack::src1_from_word(word),
            src2: unpack::src2_from_word(word),
            imm24: unpack::imm24_from_word(word),
            imm32: unpack::imm32_from_word(word),
            imm40: unpack::imm40_from_word(word),
        })
    }
}

impl From<Instruction> for Word {
    fn from(instruction: Instruction) -> Word {
        instruction.word()
    }
}
