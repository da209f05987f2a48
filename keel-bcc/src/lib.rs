//! keel bytecode class compiler.
//!
//! Turns textual class descriptions into binary class files for the keel
//! VM: the [`parse`] module builds the syntax tree, [`compiler`] lowers
//! each procedure to 64-bit instruction words in two passes, [`linker`]
//! assigns constant-pool indices and resolves thunks, and [`writer`] lays
//! the file out and persists it through a memory mapping. [`driver`] ties
//! the phases together for the `keelc` binary.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod compiler;
pub mod driver;
pub mod error;
pub mod lex;
pub mod linker;
pub mod parse;
pub mod symbols;
pub mod writer;
