use keel_types::TypeTag;

/// Byte representation of an opcode.
///
/// Typed families enumerate their variants in the fixed order
/// `CHAR, SHORT, INT, LONG, FLOAT, DOUBLE, REF`, so the variant for an
/// operand type is always `base + (type_tag - base_tag)`. The catalogue
/// order is stable; renumbering breaks every compiled class file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::FromRepr, strum::Display, strum::EnumIter, strum::EnumCount)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms, missing_docs)]
#[repr(u8)]
#[non_exhaustive]
pub enum Opcode {
    NOP = 0x00,

    // Scalar arithmetic, register form
    IADD = 0x01,
    LADD = 0x02,
    FADD = 0x03,
    DADD = 0x04,
    ISUB = 0x05,
    LSUB = 0x06,
    FSUB = 0x07,
    DSUB = 0x08,
    IMUL = 0x09,
    LMUL = 0x0a,
    FMUL = 0x0b,
    DMUL = 0x0c,
    IDIV = 0x0d,
    LDIV = 0x0e,
    FDIV = 0x0f,
    DDIV = 0x10,
    IDIVU = 0x11,
    LDIVU = 0x12,

    // Scalar arithmetic, 24-bit-immediate form
    IADDI = 0x13,
    LADDI = 0x14,
    FADDI = 0x15,
    DADDI = 0x16,
    ISUBI = 0x17,
    LSUBI = 0x18,
    FSUBI = 0x19,
    DSUBI = 0x1a,
    IMULI = 0x1b,
    LMULI = 0x1c,
    FMULI = 0x1d,
    DMULI = 0x1e,
    IDIVI = 0x1f,
    LDIVI = 0x20,
    FDIVI = 0x21,
    DDIVI = 0x22,
    IDIVUI = 0x23,
    LDIVUI = 0x24,

    INEG = 0x25,
    LNEG = 0x26,
    FNEG = 0x27,
    DNEG = 0x28,

    // Immediate loads
    LDI = 0x29,
    LUI = 0x2a,
    LNL = 0x2b,

    // Scalar casts, source-major order
    ICSTL = 0x2c,
    ICSTF = 0x2d,
    ICSTD = 0x2e,
    LCSTI = 0x2f,
    LCSTF = 0x30,
    LCSTD = 0x31,
    FCSTI = 0x32,
    FCSTL = 0x33,
    FCSTD = 0x34,
    DCSTI = 0x35,
    DCSTL = 0x36,
    DCSTF = 0x37,

    // Integer bitwise, register form
    IAND = 0x38,
    LAND = 0x39,
    IOR = 0x3a,
    LOR = 0x3b,
    IXOR = 0x3c,
    LXOR = 0x3d,
    ISLL = 0x3e,
    LSLL = 0x3f,
    ISRL = 0x40,
    LSRL = 0x41,
    ISRA = 0x42,
    LSRA = 0x43,

    // Integer bitwise, 24-bit-immediate form
    IANDI = 0x44,
    LANDI = 0x45,
    IORI = 0x46,
    LORI = 0x47,
    IXORI = 0x48,
    LXORI = 0x49,
    ISLLI = 0x4a,
    LSLLI = 0x4b,
    ISRLI = 0x4c,
    LSRLI = 0x4d,
    ISRAI = 0x4e,
    LSRAI = 0x4f,

    // Conditional branches, register form
    IBGE = 0x50,
    LBGE = 0x51,
    FBGE = 0x52,
    DBGE = 0x53,
    IBLT = 0x54,
    LBLT = 0x55,
    FBLT = 0x56,
    DBLT = 0x57,
    IBLE = 0x58,
    LBLE = 0x59,
    FBLE = 0x5a,
    DBLE = 0x5b,
    IBGT = 0x5c,
    LBGT = 0x5d,
    FBGT = 0x5e,
    DBGT = 0x5f,
    IBEQ = 0x60,
    LBEQ = 0x61,
    FBEQ = 0x62,
    DBEQ = 0x63,
    VBEQ = 0x64,
    IBNEQ = 0x65,
    LBNEQ = 0x66,
    FBNEQ = 0x67,
    DBNEQ = 0x68,
    VBNEQ = 0x69,

    // Conditional branches, 16-bit-immediate form
    IBGEI = 0x6a,
    LBGEI = 0x6b,
    FBGEI = 0x6c,
    DBGEI = 0x6d,
    IBLTI = 0x6e,
    LBLTI = 0x6f,
    FBLTI = 0x70,
    DBLTI = 0x71,
    IBLEI = 0x72,
    LBLEI = 0x73,
    FBLEI = 0x74,
    DBLEI = 0x75,
    IBGTI = 0x76,
    LBGTI = 0x77,
    FBGTI = 0x78,
    DBGTI = 0x79,
    IBEQI = 0x7a,
    LBEQI = 0x7b,
    FBEQI = 0x7c,
    DBEQI = 0x7d,
    VBEQI = 0x7e,
    IBNEQI = 0x7f,
    LBNEQI = 0x80,
    FBNEQI = 0x81,
    DBNEQI = 0x82,
    VBNEQI = 0x83,

    // Compare-and-branch and address branches; interpreter-side only
    IBCMP = 0x84,
    LBCMP = 0x85,
    FBCMP = 0x86,
    DBCMP = 0x87,
    BADR = 0x88,
    BU = 0x89,

    // Instance-field loads and stores
    CVLLD = 0x8a,
    SVLLD = 0x8b,
    IVLLD = 0x8c,
    LVLLD = 0x8d,
    FVLLD = 0x8e,
    DVLLD = 0x8f,
    VVLLD = 0x90,
    CVLSR = 0x91,
    SVLSR = 0x92,
    IVLSR = 0x93,
    LVLSR = 0x94,
    FVLSR = 0x95,
    DVLSR = 0x96,
    VVLSR = 0x97,

    // Array loads and stores
    CALD = 0x98,
    SALD = 0x99,
    IALD = 0x9a,
    LALD = 0x9b,
    FALD = 0x9c,
    DALD = 0x9d,
    VALD = 0x9e,
    CASR = 0x9f,
    SASR = 0xa0,
    IASR = 0xa1,
    LASR = 0xa2,
    FASR = 0xa3,
    DASR = 0xa4,
    VASR = 0xa5,

    // Static-field loads and stores
    CSTLD = 0xa6,
    SSTLD = 0xa7,
    ISTLD = 0xa8,
    LSTLD = 0xa9,
    FSTLD = 0xaa,
    DSTLD = 0xab,
    VSTLD = 0xac,
    CSTSR = 0xad,
    SSTSR = 0xae,
    ISTSR = 0xaf,
    LSTSR = 0xb0,
    FSTSR = 0xb1,
    DSTSR = 0xb2,
    VSTSR = 0xb3,

    // Allocation and type tests
    VNEW = 0xb4,
    CANEW = 0xb5,
    SANEW = 0xb6,
    IANEW = 0xb7,
    LANEW = 0xb8,
    FANEW = 0xb9,
    DANEW = 0xba,
    VANEW = 0xbb,
    IOF = 0xbc,

    // Invokes
    VINV = 0xbd,
    SINV = 0xbe,
    IINV = 0xbf,

    // Returns
    IRET = 0xc0,
    LRET = 0xc1,
    FRET = 0xc2,
    DRET = 0xc3,
    VRET = 0xc4,

    EXC = 0xc5,
}

/// Operand encoding of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    /// `[dest:16][src1:16][src2:16][flags:8][opcode:8]`
    Reg,
    /// `[dest:16][src1:16][imm24:24][opcode:8]`
    Imm24,
    /// `[dest:16][imm32:32][flags:8][opcode:8]`
    Imm32,
    /// `[dest:16][imm40:40][opcode:8]`
    Imm40,
}

impl Opcode {
    /// Operand encoding used by this opcode.
    pub const fn form(self) -> Form {
        use Opcode::*;
        match self {
            NOP | LUI | LNL => Form::Imm40,

            LDI | BADR | BU | CSTLD | SSTLD | ISTLD | LSTLD | FSTLD | DSTLD
            | VSTLD | CSTSR | SSTSR | ISTSR | LSTSR | FSTSR | DSTSR | VSTSR
            | SINV => Form::Imm32,

            IADDI | LADDI | FADDI | DADDI | ISUBI | LSUBI | FSUBI | DSUBI
            | IMULI | LMULI | FMULI | DMULI | IDIVI | LDIVI | FDIVI | DDIVI
            | IDIVUI | LDIVUI | IANDI | LANDI | IORI | LORI | IXORI | LXORI
            | ISLLI | LSLLI | ISRLI | LSRLI | ISRAI | LSRAI | CVLLD | SVLLD
            | IVLLD | LVLLD | FVLLD | DVLLD | VVLLD | CVLSR | SVLSR | IVLSR
            | LVLSR | FVLSR | DVLSR | VVLSR | VNEW | IOF | VINV | IINV => {
                Form::Imm24
            }

            _ => Form::Reg,
        }
    }

    /// Select the variant of an `{I, L, F, D}` family. `self` must be the
    /// `INT` variant; returns `None` when the tag is not a scalar.
    pub fn for_scalar(self, tag: TypeTag) -> Option<Self> {
        if !tag.is_scalar() {
            return None;
        }
        Self::from_repr((self as u8).wrapping_add(scalar_offset(tag)))
    }

    /// Select the variant of an `{I, L}` family. `self` must be the `INT`
    /// variant; returns `None` when the tag is not an integer.
    pub fn for_integer(self, tag: TypeTag) -> Option<Self> {
        if !tag.is_integer() {
            return None;
        }
        Self::from_repr((self as u8).wrapping_add(scalar_offset(tag)))
    }

    /// Select the variant of an `{I, L, F, D, V}` family. `self` must be
    /// the `INT` variant; returns `None` for `char` and `short`.
    pub fn for_comparable(self, tag: TypeTag) -> Option<Self> {
        if !tag.is_scalar() && tag != TypeTag::Ref {
            return None;
        }
        Self::from_repr((self as u8).wrapping_add(scalar_offset(tag)))
    }

    /// Select the variant of a full `{C, S, I, L, F, D, V}` family. `self`
    /// must be the `CHAR` variant; defined for every tag.
    pub fn for_typed(self, tag: TypeTag) -> Option<Self> {
        Self::from_repr((self as u8).wrapping_add(tag as u8))
    }

    /// The scalar-to-scalar cast opcode, or `None` when the pair has no
    /// cast (identical types, or either side not a scalar).
    pub fn cast(src: TypeTag, dest: TypeTag) -> Option<Self> {
        use Opcode::*;
        use TypeTag::*;
        let op = match (src, dest) {
            (Int, Long) => ICSTL,
            (Int, Float) => ICSTF,
            (Int, Double) => ICSTD,
            (Long, Int) => LCSTI,
            (Long, Float) => LCSTF,
            (Long, Double) => LCSTD,
            (Float, Int) => FCSTI,
            (Float, Long) => FCSTL,
            (Float, Double) => FCSTD,
            (Double, Int) => DCSTI,
            (Double, Long) => DCSTL,
            (Double, Float) => DCSTF,
            _ => return None,
        };
        Some(op)
    }
}

const fn scalar_offset(tag: TypeTag) -> u8 {
    (tag as u8).wrapping_sub(TypeTag::Int as u8)
}
