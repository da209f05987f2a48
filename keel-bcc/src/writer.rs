//! Class-file layout and the memory-mapped writer.
//!
//! Offsets are computed up front, the output file is created at exactly its
//! final size and every section is written straight into the mapping. All
//! multi-byte integers are native byte order; class files do not travel
//! across endiannesses.

use crate::compiler::CompiledMethod;
use crate::error::WriteError;
use crate::linker::{LinkedClass, PoolMember};
use itertools::Itertools;
use keel_types::Word;
use std::path::Path;

mod mapping;

use mapping::OutputMapping;

/// Six `u64` section offsets.
pub const HEADER_LEN: u64 = 48;

/// Byte offsets of every section and pooled string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Classes-pool offset.
    pub classes: u64,
    /// Methods-pool offset.
    pub methods: u64,
    /// Statics-pool offset.
    pub statics: u64,
    /// Instances-pool offset.
    pub instances: u64,
    /// Bytecode-section offset.
    pub bytecode: u64,
    /// String-pool offset.
    pub strings: u64,
    /// Total file size.
    pub file_size: u64,
    string_offsets: Vec<u64>,
}

impl Layout {
    /// Compute the section placement for a linked class. Pools are arrays
    /// of 8- and 16-byte records behind an 8-byte count header, so every
    /// section start stays 8-byte aligned by construction.
    pub fn of(cls: &LinkedClass) -> Self {
        let classes = HEADER_LEN;
        let methods = classes + 8 + cls.classes.len() as u64 * 8;
        let statics = methods + 8 + cls.methods.len() as u64 * 16;
        let instances = statics + 8 + cls.statics.len() as u64 * 16;
        let bytecode = instances + 8 + cls.instances.len() as u64 * 16;
        let code_size: u64 = cls.code.iter().map(CompiledMethod::on_disk_size).sum();
        let strings = bytecode + 8 + code_size;

        let mut string_offsets = Vec::new();
        let mut at = strings;
        for text in pooled_strings(cls) {
            string_offsets.push(at);
            at += string_entry_len(text);
        }
        Self {
            classes,
            methods,
            statics,
            instances,
            bytecode,
            strings,
            file_size: at,
            string_offsets,
        }
    }
}

/// Write `cls` to `path` through a sized file mapping. The mapping is
/// flushed and released on success and dropped (releasing the view and
/// handles) on every error path.
pub fn write(cls: &LinkedClass, path: &Path) -> Result<Layout, WriteError> {
    let layout = Layout::of(cls);
    let mut out = OutputMapping::create(path, layout.file_size)?;
    fill(cls, &layout, out.bytes());
    out.finish()?;
    Ok(layout)
}

fn fill(cls: &LinkedClass, layout: &Layout, buf: &mut [u8]) {
    put_u64(buf, 0x00, layout.classes);
    put_u64(buf, 0x08, layout.methods);
    put_u64(buf, 0x10, layout.statics);
    put_u64(buf, 0x18, layout.instances);
    put_u64(buf, 0x20, layout.bytecode);
    put_u64(buf, 0x28, layout.strings);

    let mut strings = layout.string_offsets.iter().copied();

    put_u32(buf, layout.classes, cls.classes.len() as u32);
    put_u32(buf, layout.classes + 4, cls.implements_count);
    let mut at = layout.classes + 8;
    for _ in &cls.classes {
        put_u64(buf, at, strings.next().unwrap_or(0));
        at += 8;
    }

    put_members(
        buf,
        layout.methods,
        &cls.methods,
        cls.static_method_count,
        &mut strings,
    );
    put_members(buf, layout.statics, &cls.statics, cls.own_static_count, &mut strings);
    put_members(
        buf,
        layout.instances,
        &cls.instances,
        cls.own_instance_count,
        &mut strings,
    );

    let code_size: u64 = cls.code.iter().map(CompiledMethod::on_disk_size).sum();
    put_u64(buf, layout.bytecode, code_size);
    let mut at = layout.bytecode + 8;
    for method in &cls.code {
        at = put_method(buf, at, method);
    }

    for (text, offset) in pooled_strings(cls).zip(layout.string_offsets.iter()) {
        put_u32(buf, *offset, text.len() as u32);
        let start = *offset as usize + 4;
        buf[start..start + text.len()].copy_from_slice(text.as_bytes());
    }
}

fn put_members(
    buf: &mut [u8],
    base: u64,
    members: &[PoolMember],
    second: u32,
    strings: &mut impl Iterator<Item = u64>,
) {
    put_u32(buf, base, members.len() as u32);
    put_u32(buf, base + 4, second);
    let mut at = base + 8;
    for member in members {
        put_u32(buf, at, member.owner);
        put_u32(buf, at + 4, 0); // reserved
        put_u64(buf, at + 8, strings.next().unwrap_or(0));
        at += 16;
    }
}

fn put_method(buf: &mut [u8], start: u64, method: &CompiledMethod) -> u64 {
    let mut at = start;
    put_u64(buf, at, method.on_disk_size());
    at += 8;
    put_u16(buf, at, method.instructions.len() as u16);
    put_u16(buf, at + 2, method.stack_size);
    put_u16(
        buf,
        at + 4,
        method.return_type as u16 | (method.method_type as u16) << 4,
    );
    put_u16(buf, at + 6, method.arg_types.len() as u16);
    at += 8;

    // Argument type tags, sixteen little-endian nybbles per word.
    for chunk in method.arg_types.chunks(16) {
        let mut word: Word = 0;
        for (i, tag) in chunk.iter().enumerate() {
            word |= (*tag as Word) << (4 * i);
        }
        put_u64(buf, at, word);
        at += 8;
    }

    for instruction in &method.instructions {
        put_u64(buf, at, *instruction);
        at += 8;
    }

    // Runtime pointer placeholder; the loader owns this word.
    put_u64(buf, at, 0);
    at += 8;

    // Handle count then handle offsets, four u16 lanes per word with the
    // count occupying the first lane.
    let lanes = std::iter::once(method.handle_map.len() as u16)
        .chain(method.handle_map.iter().copied());
    for chunk in &lanes.chunks(4) {
        let mut word: Word = 0;
        for (i, lane) in chunk.enumerate() {
            word |= (lane as Word) << (16 * i);
        }
        put_u64(buf, at, word);
        at += 8;
    }
    at
}

/// Pooled strings in pointer order: classes, methods, statics, instances.
fn pooled_strings(cls: &LinkedClass) -> impl Iterator<Item = &str> {
    cls.classes
        .iter()
        .map(String::as_str)
        .chain(cls.methods.iter().map(|m| m.name.as_str()))
        .chain(cls.statics.iter().map(|m| m.name.as_str()))
        .chain(cls.instances.iter().map(|m| m.name.as_str()))
}

/// `u32` length, the bytes, zero padding to the next 4-byte boundary.
fn string_entry_len(text: &str) -> u64 {
    4 + ((text.len() as u64 + 3) & !3)
}

fn put_u16(buf: &mut [u8], at: u64, value: u16) {
    let at = at as usize;
    buf[at..at + 2].copy_from_slice(&value.to_ne_bytes());
}

fn put_u32(buf: &mut [u8], at: u64, value: u32) {
    let at = at as usize;
    buf[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

fn put_u64(buf: &mut [u8], at: u64, value: u64) {
    let at = at as usize;
    buf[at..at + 8].copy_from_slice(&value.to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::linker::link;
    use crate::parse::parse;

    fn linked(src: &str) -> LinkedClass {
        let (ast, errors) = parse(src);
        assert!(errors.is_empty(), "{errors:?}");
        let code = ast
            .procedures
            .iter()
            .map(|p| compile(p).expect("compiles"))
            .collect();
        let (cls, errors) = link(&ast, code);
        assert!(errors.is_empty(), "{errors:?}");
        cls
    }

    const SRC: &str = "\
CLZ demo.Box
IMP CLZ other.Other
IVAR int held

PROC static int take (int v)
    RET v
EPROC
";

    #[test]
    fn sections_are_contiguous_and_aligned() {
        let cls = linked(SRC);
        let layout = Layout::of(&cls);
        assert_eq!(layout.classes, HEADER_LEN);
        assert_eq!(layout.methods, layout.classes + 8 + 2 * 8);
        assert_eq!(layout.statics, layout.methods + 8 + 16);
        assert_eq!(layout.instances, layout.statics + 8);
        assert_eq!(layout.bytecode, layout.instances + 8 + 16);
        for offset in [
            layout.classes,
            layout.methods,
            layout.statics,
            layout.instances,
            layout.bytecode,
            layout.strings,
        ] {
            assert_eq!(offset % 8, 0);
        }
    }

    #[test]
    fn bytecode_section_obeys_the_size_law() {
        let cls = linked(SRC);
        let layout = Layout::of(&cls);
        let sum: u64 = cls.code.iter().map(CompiledMethod::on_disk_size).sum();
        assert_eq!(sum, layout.strings - layout.bytecode - 8);
    }

    #[test]
    fn string_entries_are_padded_to_four_bytes() {
        assert_eq!(string_entry_len(""), 4);
        assert_eq!(string_entry_len("abc"), 8);
        assert_eq!(string_entry_len("abcd"), 8);
        assert_eq!(string_entry_len("abcde"), 12);
    }

    #[test]
    fn file_size_covers_every_pooled_string() {
        let cls = linked(SRC);
        let layout = Layout::of(&cls);
        let pool: u64 = pooled_strings(&cls).map(string_entry_len).sum();
        assert_eq!(layout.file_size, layout.strings + pool);
    }
}
