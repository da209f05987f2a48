use crate::*;
use keel_types::Word;
use proptest::prelude::*;
use strum::IntoEnumIterator;

fn ops_with(form: Form) -> Vec<Opcode> {
    Opcode::iter().filter(|op| op.form() == form).collect()
}

proptest! {
    #[test]
    fn reg_words_round_trip(
        op in prop::sample::select(ops_with(Form::Reg)),
        backward: bool,
        dest: u16,
        src1: u16,
        src2: u16,
    ) {
        let flags = if backward { Flags::BACKWARD } else { Flags::empty() };
        let word = pack::reg_word(op, flags, dest, src1, src2);
        let ins = Instruction::try_from(word).unwrap();
        prop_assert_eq!(ins.opcode(), op);
        prop_assert_eq!(ins.flags(), flags.bits());
        prop_assert_eq!(ins.is_backward(), backward);
        prop_assert_eq!((ins.dest(), ins.src1(), ins.src2()), (dest, src1, src2));
        prop_assert_eq!(ins.word(), word);
    }

    #[test]
    fn imm24_words_round_trip(
        op in prop::sample::select(ops_with(Form::Imm24)),
        dest: u16,
        src1: u16,
        imm in 0u32..1 << 24,
    ) {
        let word = pack::imm24_word(op, dest, src1, imm);
        let ins = Instruction::try_from(word).unwrap();
        prop_assert_eq!(ins.opcode(), op);
        prop_assert_eq!((ins.dest(), ins.src1(), ins.imm24()), (dest, src1, imm));
        prop_assert_eq!(ins.word(), word);
    }

    #[test]
    fn imm32_words_round_trip(
        op in prop::sample::select(ops_with(Form::Imm32)),
        backward: bool,
        dest: u16,
        imm: u32,
    ) {
        let flags = if backward { Flags::BACKWARD } else { Flags::empty() };
        let word = pack::imm32_word(op, flags, dest, imm);
        let ins = Instruction::try_from(word).unwrap();
        prop_assert_eq!(ins.opcode(), op);
        prop_assert_eq!(ins.flags(), flags.bits());
        prop_assert_eq!((ins.dest(), ins.imm32()), (dest, imm));
        prop_assert_eq!(ins.word(), word);
    }

    #[test]
    fn imm40_words_round_trip(
        op in prop::sample::select(ops_with(Form::Imm40)),
        dest: u16,
        imm in 0u64..1 << 40,
    ) {
        let word = pack::imm40_word(op, dest, imm);
        let ins = Instruction::try_from(word).unwrap();
        prop_assert_eq!(ins.opcode(), op);
        prop_assert_eq!((ins.dest(), ins.imm40()), (dest, imm));
        prop_assert_eq!(ins.word(), word);
    }
}

#[test]
fn every_opcode_byte_decodes() {
    for op in Opcode::iter() {
        let word = (op as Word) << 56;
        let ins = Instruction::try_from(word).unwrap();
        assert_eq!(ins.opcode(), op);
        assert_eq!(ins.word(), word);
    }
}

#[test]
fn unassigned_opcode_bytes_fail() {
    use strum::EnumCount;
    for byte in (Opcode::COUNT as u8)..=u8::MAX {
        let word = (byte as Word) << 56;
        assert_eq!(Instruction::try_from(word), Err(InvalidOpcode(byte)));
    }
}

#[test]
fn rewrite_slots_land_in_their_fields() {
    // A field load awaiting its instance-field index: the 24-bit immediate
    // sits in bits 32..56 and the operand slots stay untouched.
    let word = pack::imm24_word(Opcode::IVLLD, 4, 8, 0);
    let patched = RewriteSlot::Imm24.apply(word, 3);
    assert_eq!((patched >> 32) & 0x00ff_ffff, 3);
    let ins = Instruction::try_from(patched).unwrap();
    assert_eq!(ins.dest(), 4);
    assert_eq!(ins.src1(), 8);
    assert_eq!(ins.imm24(), 3);
    assert_eq!(ins.opcode(), Opcode::IVLLD);

    let word = pack::imm32_word(Opcode::SINV, Flags::empty(), 2, 0);
    let patched = RewriteSlot::Imm32.apply(word, 17);
    assert_eq!(Instruction::try_from(patched).unwrap().imm32(), 17);

    let word = pack::reg_word(Opcode::VANEW, Flags::empty(), 1, 3, 0);
    let patched = RewriteSlot::Src2.apply(word, 9);
    assert_eq!(Instruction::try_from(patched).unwrap().src2(), 9);
}

#[test]
fn flags_byte_is_shared_between_reg_and_imm32_branches() {
    let reg = pack::reg_word(Opcode::IBEQ, Flags::BACKWARD, 3, 0, 1);
    let imm = pack::imm32_word(Opcode::BU, Flags::BACKWARD, 3, 0);
    assert_eq!((reg >> 48) & 0xff, (imm >> 48) & 0xff);
    assert!(Instruction::try_from(imm).unwrap().is_backward());
}
