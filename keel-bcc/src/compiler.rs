//! Two-pass method compiler.
//!
//! Pass 1 collects locals and assigns instruction addresses; the second
//! pass type-checks each mnemonic, selects the opcode variant by operand
//! type and emits 64-bit words. Addresses must be known up front because
//! wide `LI` loads expand to two words and invokes trail packed-argument
//! words. Names that resolve only at link time leave a zero field and a
//! [`Thunk`] naming the bit slot to rewrite.

use crate::error::{CompileError, ErrorKind, SourcePos};
use crate::parse::{split_qualified, Instr, Mnemonic, Procedure};
use crate::symbols::{Local, Locals};
use itertools::Itertools;
use keel_asm::{pack, Flags, Opcode, RewriteSlot};
use keel_types::{MethodType, StackSlot, TypeTag, Word};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

pub mod imm;

#[cfg(test)]
mod tests;

/// Which pool the linker must consult for a thunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThunkKind {
    /// Classes pool.
    Class,
    /// Methods pool.
    Method,
    /// Static-fields pool.
    StaticField,
    /// Instance-fields pool.
    InstanceField,
}

/// Deferred relocation: a symbolic name embedded in an emitted word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thunk {
    /// Owning class, or `None` for the enclosing class. Always `None` for
    /// [`ThunkKind::Class`], whose `name` is the full dotted class name.
    pub class: Option<String>,
    /// Member or class name.
    pub name: String,
    /// Index of the target word in the method's instruction vector.
    pub instruction: u32,
    /// Bit slot the resolved index is OR-ed into.
    pub slot: RewriteSlot,
    /// Pool to resolve against.
    pub kind: ThunkKind,
    /// Anchor of the referencing instruction.
    pub pos: SourcePos,
}

/// A method lowered to instruction words, ready for linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    /// Method name.
    pub name: String,
    /// Virtual or static dispatch.
    pub method_type: MethodType,
    /// Declared return type.
    pub return_type: TypeTag,
    /// Parameter type tags in declaration order.
    pub arg_types: Vec<TypeTag>,
    /// Frame size in slots.
    pub stack_size: StackSlot,
    /// Emitted words; thunk fields still zero.
    pub instructions: Vec<Word>,
    /// Relocations to resolve against the class pools.
    pub thunks: Vec<Thunk>,
    /// Slots holding references.
    pub handle_map: Vec<StackSlot>,
}

impl CompiledMethod {
    /// Bytes this record occupies in the bytecode section, its own size
    /// field included.
    pub fn on_disk_size(&self) -> u64 {
        let arg_words = (self.arg_types.len() as u64 + 15) / 16;
        let handle_words = (self.handle_map.len() as u64 + 1 + 3) / 4;
        8 + 8 + (arg_words + self.instructions.len() as u64 + 1 + handle_words) * 8
    }
}

/// Compile one procedure. Any error drops the method from the output, but
/// every problem in the body is reported.
pub fn compile(proc: &Procedure) -> Result<CompiledMethod, Vec<CompileError>> {
    let mut cx = Context {
        proc,
        locals: Locals::default(),
        labels: HashMap::new(),
        return_type: TypeTag::of_declared(&proc.return_type),
        instructions: Vec::new(),
        thunks: Vec::new(),
        errors: Vec::new(),
    };
    cx.collect_locals();
    cx.assign_labels();
    cx.emit();

    let Context {
        locals,
        instructions,
        thunks,
        errors,
        return_type,
        ..
    } = cx;
    if !errors.is_empty() {
        return Err(errors
            .into_iter()
            .map(|e| e.in_method(&proc.name))
            .collect());
    }
    Ok(CompiledMethod {
        name: proc.name.clone(),
        method_type: if proc.is_static {
            MethodType::Static
        } else {
            MethodType::Virtual
        },
        return_type,
        arg_types: proc
            .params
            .iter()
            .map(|p| TypeTag::of_declared(&p.type_name))
            .collect(),
        stack_size: locals.stack_size(),
        instructions,
        thunks,
        handle_map: locals.into_handle_map(),
    })
}

struct Context<'a> {
    proc: &'a Procedure,
    locals: Locals,
    labels: HashMap<String, u32>,
    return_type: TypeTag,
    instructions: Vec<Word>,
    thunks: Vec<Thunk>,
    errors: Vec<CompileError>,
}

impl<'a> Context<'a> {
    /// Parameters first, then `DEF`s in source order. The table is complete
    /// before address assignment so `LI` widths never depend on token order.
    fn collect_locals(&mut self) {
        let proc = self.proc;
        for param in &proc.params {
            let tag = TypeTag::of_declared(&param.type_name);
            if let Err(kind) = self.locals.define(&param.name, tag) {
                self.errors.push(CompileError::new(kind, proc.pos));
            }
        }
        for instr in &proc.body {
            if instr.mnemonic == Mnemonic::Def {
                let tag = TypeTag::of_declared(&instr.operands[0]);
                if let Err(kind) = self.locals.define(&instr.operands[1], tag) {
                    self.errors.push(CompileError::new(kind, instr.pos));
                }
            }
        }
    }

    fn assign_labels(&mut self) {
        let proc = self.proc;
        let mut pc: u32 = 0;
        for instr in &proc.body {
            match instr.mnemonic {
                Mnemonic::Lbl => match self.labels.entry(instr.operands[0].clone()) {
                    Entry::Occupied(_) => self.errors.push(CompileError::new(
                        ErrorKind::RedefinedLabel(instr.operands[0].clone()),
                        instr.pos,
                    )),
                    Entry::Vacant(entry) => {
                        entry.insert(pc);
                    }
                },
                Mnemonic::Def => {}
                _ => pc += self.width_of(instr),
            }
        }
    }

    /// Words the instruction will occupy once emitted.
    fn width_of(&self, instr: &Instr) -> u32 {
        match instr.mnemonic {
            Mnemonic::Lbl | Mnemonic::Def => 0,
            Mnemonic::Li => self.li_width(instr),
            Mnemonic::Sinv => 1 + arg_words(instr.operands.len() - 2),
            Mnemonic::Iinv | Mnemonic::Vinv => 1 + arg_words(instr.operands.len() - 3),
            _ => 1,
        }
    }

    /// A long or double load is two words unless the low 24 bits are clear.
    /// Unparseable literals count one word; emission reports them.
    fn li_width(&self, instr: &Instr) -> u32 {
        let Ok(local) = self.locals.lookup(&instr.operands[0]) else {
            return 1;
        };
        let value = match local.tag {
            TypeTag::Long => imm::parse_i64(&instr.operands[1]).map(|v| v as u64),
            TypeTag::Double => imm::parse_f64(&instr.operands[1]).map(f64::to_bits),
            _ => return 1,
        };
        match value {
            Ok(v) if v & 0x00ff_ffff != 0 => 2,
            _ => 1,
        }
    }

    fn emit(&mut self) {
        let proc = self.proc;
        for instr in &proc.body {
            if let Err(error) = self.lower(instr) {
                self.errors.push(error);
            }
        }
    }

    fn lower(&mut self, instr: &Instr) -> Result<(), CompileError> {
        use Mnemonic::*;
        let ops = &instr.operands;
        let pos = instr.pos;
        match instr.mnemonic {
            Def | Lbl => Ok(()),
            Nop => {
                self.push(pack::imm40_word(Opcode::NOP, 0, 0));
                Ok(())
            }

            Add => self.arith(Opcode::IADD, ops, pos),
            Sub => self.arith(Opcode::ISUB, ops, pos),
            Mul => self.arith(Opcode::IMUL, ops, pos),
            Div => self.arith(Opcode::IDIV, ops, pos),
            Divu => self.bitwise(Opcode::IDIVU, ops, pos),
            And => self.bitwise(Opcode::IAND, ops, pos),
            Or => self.bitwise(Opcode::IOR, ops, pos),
            Xor => self.bitwise(Opcode::IXOR, ops, pos),
            Sll => self.bitwise(Opcode::ISLL, ops, pos),
            Srl => self.bitwise(Opcode::ISRL, ops, pos),
            Sra => self.bitwise(Opcode::ISRA, ops, pos),

            Addi => self.arith_imm(Opcode::IADDI, ops, pos),
            Subi => self.arith_imm(Opcode::ISUBI, ops, pos),
            Muli => self.arith_imm(Opcode::IMULI, ops, pos),
            Divi => self.arith_imm(Opcode::IDIVI, ops, pos),
            Divui => self.bitwise_imm(Opcode::IDIVUI, ops, pos),
            Andi => self.bitwise_imm(Opcode::IANDI, ops, pos),
            Ori => self.bitwise_imm(Opcode::IORI, ops, pos),
            Xori => self.bitwise_imm(Opcode::IXORI, ops, pos),
            Slli => self.bitwise_imm(Opcode::ISLLI, ops, pos),
            Srli => self.bitwise_imm(Opcode::ISRLI, ops, pos),
            Srai => self.bitwise_imm(Opcode::ISRAI, ops, pos),

            Neg => self.neg(ops, pos),
            Li => self.li(ops, pos),
            Cst => self.cst(ops, pos),

            Beq => self.branch(Opcode::IBEQ, true, ops, pos),
            Bneq => self.branch(Opcode::IBNEQ, true, ops, pos),
            Blt => self.branch(Opcode::IBLT, false, ops, pos),
            Bgt => self.branch(Opcode::IBGT, false, ops, pos),
            Ble => self.branch(Opcode::IBLE, false, ops, pos),
            Bge => self.branch(Opcode::IBGE, false, ops, pos),
            Beqi => self.branch_imm(Opcode::IBEQI, true, ops, pos),
            Bneqi => self.branch_imm(Opcode::IBNEQI, true, ops, pos),
            Blti => self.branch_imm(Opcode::IBLTI, false, ops, pos),
            Bgti => self.branch_imm(Opcode::IBGTI, false, ops, pos),
            Blei => self.branch_imm(Opcode::IBLEI, false, ops, pos),
            Bgei => self.branch_imm(Opcode::IBGEI, false, ops, pos),
            Bu => self.bu(ops, pos),

            Anew => self.anew(ops, pos),
            Vnew => self.vnew(ops, pos),
            Iof => self.iof(ops, pos),
            Ald => self.ald(ops, pos),
            Asr => self.asr(ops, pos),
            Alen => self.alen(ops, pos),
            Vlld => self.vlld(ops, pos),
            Vlsr => self.vlsr(ops, pos),
            Stld => self.stld(ops, pos),
            Stsr => self.stsr(ops, pos),

            Sinv => self.invoke_static(ops, pos),
            Iinv => self.invoke_instance(Opcode::IINV, ops, pos),
            Vinv => self.invoke_instance(Opcode::VINV, ops, pos),
            Ret => self.ret(ops, pos),
        }
    }

    fn push(&mut self, word: Word) {
        self.instructions.push(word);
    }

    fn pc(&self) -> u32 {
        self.instructions.len() as u32
    }

    fn local(&self, name: &str, pos: SourcePos) -> Result<Local, CompileError> {
        self.locals
            .lookup(name)
            .map_err(|kind| CompileError::new(kind, pos))
    }

    fn local_of(
        &self,
        name: &str,
        expected: TypeTag,
        pos: SourcePos,
    ) -> Result<Local, CompileError> {
        let local = self.local(name, pos)?;
        if local.tag != expected {
            return Err(CompileError::new(
                ErrorKind::TypeMismatch {
                    expected,
                    found: local.tag,
                },
                pos,
            ));
        }
        Ok(local)
    }

    fn check_same(
        &self,
        expected: TypeTag,
        found: TypeTag,
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        if expected != found {
            return Err(CompileError::new(
                ErrorKind::TypeMismatch { expected, found },
                pos,
            ));
        }
        Ok(())
    }

    fn inapplicable(tag: TypeTag, pos: SourcePos) -> CompileError {
        CompileError::new(ErrorKind::InapplicableType(tag), pos)
    }

    fn member_thunk(&mut self, kind: ThunkKind, path: &str, slot: RewriteSlot, pos: SourcePos) {
        let (class, name) = split_qualified(path);
        self.thunks.push(Thunk {
            class: class.map(str::to_owned),
            name: name.to_owned(),
            instruction: self.pc() - 1,
            slot,
            kind,
            pos,
        });
    }

    fn class_thunk(&mut self, name: &str, slot: RewriteSlot, pos: SourcePos) {
        self.thunks.push(Thunk {
            class: None,
            name: name.to_owned(),
            instruction: self.pc() - 1,
            slot,
            kind: ThunkKind::Class,
            pos,
        });
    }

    /// Three same-typed scalar operands, register form.
    fn arith(&mut self, base: Opcode, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let (dest, src1, src2, tag) = self.same_typed3(ops, pos)?;
        let op = base
            .for_scalar(tag)
            .ok_or_else(|| Self::inapplicable(tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), dest, src1, src2));
        Ok(())
    }

    /// Three same-typed integer operands, register form.
    fn bitwise(&mut self, base: Opcode, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let (dest, src1, src2, tag) = self.same_typed3(ops, pos)?;
        let op = base
            .for_integer(tag)
            .ok_or_else(|| Self::inapplicable(tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), dest, src1, src2));
        Ok(())
    }

    fn same_typed3(
        &self,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(StackSlot, StackSlot, StackSlot, TypeTag), CompileError> {
        let src2 = self.local(&ops[2], pos)?;
        let src1 = self.local(&ops[1], pos)?;
        self.check_same(src2.tag, src1.tag, pos)?;
        let dest = self.local(&ops[0], pos)?;
        self.check_same(src2.tag, dest.tag, pos)?;
        Ok((dest.slot, src1.slot, src2.slot, src2.tag))
    }

    fn arith_imm(
        &mut self,
        base: Opcode,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        let (dest, src1, imm, tag) = self.imm_operands(ops, pos)?;
        let op = base
            .for_scalar(tag)
            .ok_or_else(|| Self::inapplicable(tag, pos))?;
        self.push(pack::imm24_word(op, dest, src1, imm));
        Ok(())
    }

    fn bitwise_imm(
        &mut self,
        base: Opcode,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        let (dest, src1, imm, tag) = self.imm_operands(ops, pos)?;
        let op = base
            .for_integer(tag)
            .ok_or_else(|| Self::inapplicable(tag, pos))?;
        self.push(pack::imm24_word(op, dest, src1, imm));
        Ok(())
    }

    fn imm_operands(
        &self,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(StackSlot, StackSlot, u32, TypeTag), CompileError> {
        let src1 = self.local(&ops[1], pos)?;
        let dest = self.local(&ops[0], pos)?;
        self.check_same(src1.tag, dest.tag, pos)?;
        let imm = imm::to_imm24(&ops[2]).map_err(|kind| CompileError::new(kind, pos))?;
        Ok((dest.slot, src1.slot, imm, src1.tag))
    }

    fn neg(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let src = self.local(&ops[1], pos)?;
        let dest = self.local(&ops[0], pos)?;
        self.check_same(src.tag, dest.tag, pos)?;
        let op = Opcode::INEG
            .for_scalar(src.tag)
            .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), dest.slot, src.slot, 0));
        Ok(())
    }

    fn li(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let literal = ops[1].as_str();
        let fail = |kind| CompileError::new(kind, pos);
        match dest.tag {
            TypeTag::Int => {
                let bits = imm::int_immediate(literal).map_err(fail)?;
                self.push(pack::imm32_word(Opcode::LDI, Flags::empty(), dest.slot, bits));
            }
            TypeTag::Float => {
                let bits = imm::parse_f32(literal).map_err(fail)?.to_bits();
                self.push(pack::imm32_word(Opcode::LDI, Flags::empty(), dest.slot, bits));
            }
            TypeTag::Long => {
                let value = imm::parse_i64(literal).map_err(fail)? as u64;
                self.load_wide(dest.slot, value);
            }
            TypeTag::Double => {
                let value = imm::parse_f64(literal).map_err(fail)?.to_bits();
                self.load_wide(dest.slot, value);
            }
            TypeTag::Ref => {
                if literal != "null" {
                    return Err(fail(ErrorKind::UnparseableLiteral {
                        literal: literal.to_owned(),
                        wanted: "null",
                    }));
                }
                self.push(pack::imm40_word(Opcode::LNL, dest.slot, 0));
            }
            tag => return Err(Self::inapplicable(tag, pos)),
        }
        Ok(())
    }

    /// `LUI` loads the upper 40 bits shifted into place; when the low 24
    /// bits are populated a trailing `LADDI` adds them sign-extended, so
    /// the upper immediate compensates for the borrow.
    fn load_wide(&mut self, slot: StackSlot, value: u64) {
        let lo = value & 0x00ff_ffff;
        if lo == 0 {
            self.push(pack::imm40_word(Opcode::LUI, slot, value >> 24));
        } else {
            let sext = ((lo << 40) as i64 >> 40) as u64;
            let hi = value.wrapping_sub(sext) >> 24;
            self.push(pack::imm40_word(Opcode::LUI, slot, hi));
            self.push(pack::imm24_word(Opcode::LADDI, slot, slot, lo as u32));
        }
    }

    fn cst(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let src = self.local(&ops[1], pos)?;
        let dest = self.local(&ops[0], pos)?;
        let op = Opcode::cast(src.tag, dest.tag).ok_or_else(|| {
            if src.tag == dest.tag {
                CompileError::new(ErrorKind::IdentityCast(src.tag), pos)
            } else if !src.tag.is_scalar() {
                Self::inapplicable(src.tag, pos)
            } else {
                Self::inapplicable(dest.tag, pos)
            }
        })?;
        self.push(pack::reg_word(op, Flags::empty(), dest.slot, src.slot, 0));
        Ok(())
    }

    /// Displacement is relative to the word after the branch; the stored
    /// field is its magnitude with the direction in the flags byte.
    fn branch_target(
        &self,
        label: &str,
        pos: SourcePos,
    ) -> Result<(Flags, StackSlot), CompileError> {
        let target = *self
            .labels
            .get(label)
            .ok_or_else(|| CompileError::new(ErrorKind::UndefinedLabel(label.to_owned()), pos))?;
        let disp = i64::from(self.pc()) + 1 - i64::from(target);
        let flags = if disp > 0 {
            Flags::BACKWARD
        } else {
            Flags::empty()
        };
        let magnitude = disp.unsigned_abs();
        if magnitude > u64::from(u16::MAX) {
            return Err(CompileError::new(
                ErrorKind::BranchOutOfRange(label.to_owned()),
                pos,
            ));
        }
        Ok((flags, magnitude as StackSlot))
    }

    fn branch(
        &mut self,
        base: Opcode,
        refs_allowed: bool,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        let src2 = self.local(&ops[2], pos)?;
        let src1 = self.local(&ops[1], pos)?;
        self.check_same(src2.tag, src1.tag, pos)?;
        let op = if refs_allowed {
            base.for_comparable(src2.tag)
        } else {
            base.for_scalar(src2.tag)
        }
        .ok_or_else(|| Self::inapplicable(src2.tag, pos))?;
        let (flags, disp) = self.branch_target(&ops[0], pos)?;
        self.push(pack::reg_word(op, flags, disp, src1.slot, src2.slot));
        Ok(())
    }

    /// Register-shaped branch with a 16-bit immediate in the `src2` field.
    /// Reference comparisons only admit the literal `null`.
    fn branch_imm(
        &mut self,
        base: Opcode,
        refs_allowed: bool,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        let src = self.local(&ops[1], pos)?;
        let (op, imm) = if src.tag == TypeTag::Ref {
            if !refs_allowed {
                return Err(Self::inapplicable(src.tag, pos));
            }
            if ops[2] != "null" {
                return Err(CompileError::new(
                    ErrorKind::UnparseableLiteral {
                        literal: ops[2].clone(),
                        wanted: "null",
                    },
                    pos,
                ));
            }
            let op = base
                .for_comparable(TypeTag::Ref)
                .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
            (op, 0)
        } else {
            let op = base
                .for_scalar(src.tag)
                .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
            let imm = imm::to_imm16(&ops[2]).map_err(|kind| CompileError::new(kind, pos))?;
            (op, imm)
        };
        let (flags, disp) = self.branch_target(&ops[0], pos)?;
        self.push(pack::reg_word(op, flags, disp, src.slot, imm));
        Ok(())
    }

    fn bu(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let (flags, disp) = self.branch_target(&ops[0], pos)?;
        self.push(pack::imm32_word(Opcode::BU, flags, disp, 0));
        Ok(())
    }

    fn anew(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local_of(&ops[0], TypeTag::Ref, pos)?;
        let length = self.local_of(&ops[2], TypeTag::Int, pos)?;
        match TypeTag::primitive(&ops[1]) {
            Some(tag) => {
                let op = Opcode::CANEW
                    .for_typed(tag)
                    .ok_or_else(|| Self::inapplicable(tag, pos))?;
                self.push(pack::reg_word(op, Flags::empty(), dest.slot, length.slot, 0));
            }
            None => {
                self.push(pack::reg_word(
                    Opcode::VANEW,
                    Flags::empty(),
                    dest.slot,
                    length.slot,
                    0,
                ));
                self.class_thunk(&ops[1], RewriteSlot::Src2, pos);
            }
        }
        Ok(())
    }

    fn vnew(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local_of(&ops[0], TypeTag::Ref, pos)?;
        self.push(pack::imm24_word(Opcode::VNEW, dest.slot, 0, 0));
        self.class_thunk(&ops[1], RewriteSlot::Imm24, pos);
        Ok(())
    }

    fn iof(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local_of(&ops[0], TypeTag::Int, pos)?;
        let src = self.local_of(&ops[1], TypeTag::Ref, pos)?;
        self.push(pack::imm24_word(Opcode::IOF, dest.slot, src.slot, 0));
        self.class_thunk(&ops[2], RewriteSlot::Imm24, pos);
        Ok(())
    }

    fn ald(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let arr = self.local_of(&ops[1], TypeTag::Ref, pos)?;
        let idx = self.local_of(&ops[2], TypeTag::Int, pos)?;
        let op = Opcode::CALD
            .for_typed(dest.tag)
            .ok_or_else(|| Self::inapplicable(dest.tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), dest.slot, arr.slot, idx.slot));
        Ok(())
    }

    fn asr(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let arr = self.local_of(&ops[0], TypeTag::Ref, pos)?;
        let idx = self.local_of(&ops[1], TypeTag::Int, pos)?;
        let src = self.local(&ops[2], pos)?;
        let op = Opcode::CASR
            .for_typed(src.tag)
            .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), src.slot, arr.slot, idx.slot));
        Ok(())
    }

    /// Array length reads as the instance field at index zero.
    fn alen(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local_of(&ops[0], TypeTag::Int, pos)?;
        let arr = self.local_of(&ops[1], TypeTag::Ref, pos)?;
        self.push(pack::imm24_word(Opcode::IVLLD, dest.slot, arr.slot, 0));
        Ok(())
    }

    fn vlld(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let obj = self.local_of(&ops[1], TypeTag::Ref, pos)?;
        let op = Opcode::CVLLD
            .for_typed(dest.tag)
            .ok_or_else(|| Self::inapplicable(dest.tag, pos))?;
        self.push(pack::imm24_word(op, dest.slot, obj.slot, 0));
        self.member_thunk(ThunkKind::InstanceField, &ops[2], RewriteSlot::Imm24, pos);
        Ok(())
    }

    fn vlsr(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let obj = self.local_of(&ops[0], TypeTag::Ref, pos)?;
        let src = self.local(&ops[1], pos)?;
        let op = Opcode::CVLSR
            .for_typed(src.tag)
            .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
        self.push(pack::imm24_word(op, src.slot, obj.slot, 0));
        self.member_thunk(ThunkKind::InstanceField, &ops[2], RewriteSlot::Imm24, pos);
        Ok(())
    }

    fn stld(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let op = Opcode::CSTLD
            .for_typed(dest.tag)
            .ok_or_else(|| Self::inapplicable(dest.tag, pos))?;
        self.push(pack::imm32_word(op, Flags::empty(), dest.slot, 0));
        self.member_thunk(ThunkKind::StaticField, &ops[1], RewriteSlot::Imm32, pos);
        Ok(())
    }

    fn stsr(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let src = self.local(&ops[0], pos)?;
        let op = Opcode::CSTSR
            .for_typed(src.tag)
            .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
        self.push(pack::imm32_word(op, Flags::empty(), src.slot, 0));
        self.member_thunk(ThunkKind::StaticField, &ops[1], RewriteSlot::Imm32, pos);
        Ok(())
    }

    fn invoke_static(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let args = self.arg_slots(&ops[2..], pos)?;
        self.push(pack::imm32_word(Opcode::SINV, Flags::empty(), dest.slot, 0));
        self.member_thunk(ThunkKind::Method, &ops[1], RewriteSlot::Imm32, pos);
        self.push_args(&args);
        Ok(())
    }

    fn invoke_instance(
        &mut self,
        op: Opcode,
        ops: &[String],
        pos: SourcePos,
    ) -> Result<(), CompileError> {
        let dest = self.local(&ops[0], pos)?;
        let recv = self.local_of(&ops[1], TypeTag::Ref, pos)?;
        let args = self.arg_slots(&ops[3..], pos)?;
        self.push(pack::imm24_word(op, dest.slot, recv.slot, 0));
        self.member_thunk(ThunkKind::Method, &ops[2], RewriteSlot::Imm24, pos);
        self.push_args(&args);
        Ok(())
    }

    fn arg_slots(&self, args: &[String], pos: SourcePos) -> Result<Vec<StackSlot>, CompileError> {
        args.iter().map(|a| Ok(self.local(a, pos)?.slot)).collect()
    }

    /// Four 16-bit argument slot references per trailing word, the first
    /// argument in the least-significant position.
    fn push_args(&mut self, slots: &[StackSlot]) {
        for chunk in &slots.iter().chunks(4) {
            let mut word: Word = 0;
            for (i, slot) in chunk.enumerate() {
                word |= (*slot as Word) << (16 * i);
            }
            self.push(word);
        }
    }

    fn ret(&mut self, ops: &[String], pos: SourcePos) -> Result<(), CompileError> {
        let src = self.local(&ops[0], pos)?;
        if src.tag != self.return_type {
            return Err(CompileError::new(
                ErrorKind::ReturnTypeMismatch {
                    expected: self.return_type,
                    found: src.tag,
                },
                pos,
            ));
        }
        let op = Opcode::IRET
            .for_comparable(src.tag)
            .ok_or_else(|| Self::inapplicable(src.tag, pos))?;
        self.push(pack::reg_word(op, Flags::empty(), 0, src.slot, 0));
        Ok(())
    }
}

fn arg_words(count: usize) -> u32 {
    (count as u32 + 3) / 4
}
