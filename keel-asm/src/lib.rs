//! Instruction set of the keel VM.
//!
//! Every instruction occupies exactly 64 bits. Three operand encodings share
//! the byte layout `[dest:16][src1:16][src2:16][flags:8][opcode:8]`, ordered
//! from least- to most-significant byte; immediate forms overlay the middle
//! fields with 24-, 32- or 40-bit immediates. [`pack`] builds raw words,
//! [`Instruction`] is the decoded view, and [`Opcode`] is the catalogue.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod instruction;
mod opcode;
pub mod pack;
mod unpack;

#[cfg(test)]
mod encoding_tests;

pub use instruction::{Flags, Instruction, InvalidOpcode, RewriteSlot};
pub use opcode::{Form, Opcode};
