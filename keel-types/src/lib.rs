//! Atomic types shared by the keel assembler and class-file tooling.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod tag;

pub use tag::{MethodType, TypeTag};

/// Machine word type; every emitted instruction occupies one word.
pub type Word = u64;

/// Stack-relative operand: offset of a 32-bit slot in a method frame.
pub type StackSlot = u16;

/// 16-bits immediate value type
pub type Immediate16 = u16;

/// 24-bits immediate value type
pub type Immediate24 = u32;

/// 32-bits immediate value type
pub type Immediate32 = u32;

/// 40-bits immediate value type
pub type Immediate40 = u64;

/// Index into a class-file constant pool.
pub type PoolIndex = u32;

/// Pool indices `0..6` name the primitive types and are never materialized
/// in the classes pool; the class under compilation always gets this index.
pub const FIRST_USER_CLASS: PoolIndex = 6;
