use crate::StackSlot;

/// 4-bit type tag carried by every stack value.
///
/// The discriminants are part of the class-file format: argument-type
/// vectors pack them as little-endian nybbles, and typed opcode families
/// enumerate their variants in exactly this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::FromRepr, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TypeTag {
    /// 8-bit character
    Char = 0,
    /// 16-bit signed integer
    Short = 1,
    /// 32-bit signed integer
    Int = 2,
    /// 64-bit signed integer
    Long = 3,
    /// IEEE-754 single
    Float = 4,
    /// IEEE-754 double
    Double = 5,
    /// Object reference
    Ref = 6,
}

impl TypeTag {
    /// Parse a primitive type name. Returns `None` for anything else, in
    /// which case callers treat the name as a class and the type as [`Ref`].
    ///
    /// [`Ref`]: TypeTag::Ref
    pub fn primitive(name: &str) -> Option<Self> {
        match name {
            "char" => Some(Self::Char),
            "short" => Some(Self::Short),
            "int" => Some(Self::Int),
            "long" => Some(Self::Long),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// Resolve a declared type name: a primitive keyword or a class name.
    pub fn of_declared(name: &str) -> Self {
        Self::primitive(name).unwrap_or(Self::Ref)
    }

    /// Width of a value of this type in 32-bit stack slots. References are
    /// native-pointer wide, two slots on the 64-bit target.
    pub const fn slot_width(self) -> StackSlot {
        match self {
            Self::Char | Self::Short | Self::Int | Self::Float => 1,
            Self::Long | Self::Double | Self::Ref => 2,
        }
    }

    /// Whether arithmetic applies to this type.
    pub const fn is_scalar(self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Float | Self::Double)
    }

    /// Whether bitwise and unsigned operations apply to this type.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Long)
    }
}

/// Dispatch kind recorded in a compiled method's type word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr)]
#[repr(u8)]
pub enum MethodType {
    /// Dispatched through the receiver's vtable.
    Virtual = 4,
    /// Dispatched by pool index alone.
    Static = 5,
}
