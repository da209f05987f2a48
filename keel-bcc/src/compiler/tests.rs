use super::*;
use keel_asm::Instruction;
use rstest::rstest;

fn proc_of(src: &str) -> Procedure {
    let (ast, errors) = crate::parse::parse(src);
    assert!(errors.is_empty(), "parse failed: {errors:?}");
    ast.procedures.into_iter().next().unwrap()
}

fn method(header: &str, body: &str) -> Result<CompiledMethod, Vec<CompileError>> {
    let src = format!("CLZ t.T\nPROC {header}\n{body}\nEPROC\n");
    compile(&proc_of(&src))
}

fn decode(word: Word) -> Instruction {
    Instruction::try_from(word).expect("emitted word must decode")
}

#[test]
fn identity_method_compiles_to_a_single_ret() {
    let mtd = method("static int nop (int r)", "RET r").unwrap();
    assert_eq!(mtd.method_type, MethodType::Static);
    assert_eq!(mtd.arg_types, [TypeTag::Int]);
    assert_eq!(mtd.stack_size, 1);
    assert_eq!(mtd.instructions.len(), 1);
    assert!(mtd.thunks.is_empty());
    let ins = decode(mtd.instructions[0]);
    assert_eq!(ins.opcode(), Opcode::IRET);
    assert_eq!((ins.dest(), ins.src1(), ins.flags()), (0, 0, 0));
}

#[rstest]
#[case("int", Opcode::IADD)]
#[case("long", Opcode::LADD)]
#[case("float", Opcode::FADD)]
#[case("double", Opcode::DADD)]
fn add_selects_the_variant_by_operand_type(#[case] ty: &str, #[case] expected: Opcode) {
    let body = format!("DEF {ty} a\nDEF {ty} b\nDEF {ty} c\nADD c a b");
    let mtd = method("static int f ()", &body).unwrap();
    assert_eq!(decode(mtd.instructions[0]).opcode(), expected);
}

#[test]
fn operand_fields_follow_slot_assignment() {
    let mtd = method(
        "static int f (int a, long b)",
        "DEF int c\nADD c a a\nAND c c a",
    )
    .unwrap();
    // a at 0, b at 1..2, c at 3
    let add = decode(mtd.instructions[0]);
    assert_eq!((add.dest(), add.src1(), add.src2()), (3, 0, 0));
    assert_eq!(decode(mtd.instructions[1]).opcode(), Opcode::IAND);
    assert_eq!(mtd.stack_size, 4);
}

#[test]
fn wide_long_literal_expands_to_two_words() {
    let value: u64 = 0x1234_5678_90ab_cdef;
    let mtd = method("static int f ()", "DEF long x\nLI x 0x1234567890ABCDEF").unwrap();
    assert_eq!(mtd.instructions.len(), 2);
    let lui = decode(mtd.instructions[0]);
    let addi = decode(mtd.instructions[1]);
    assert_eq!(lui.opcode(), Opcode::LUI);
    assert_eq!(addi.opcode(), Opcode::LADDI);
    assert_eq!(addi.imm24(), (value & 0x00ff_ffff) as u32);
    // The interpreter shifts the upper load into place and wrapping-adds
    // the sign-extended tail; the pair must reconstruct the literal.
    let sext = ((addi.imm24() as u64) << 40) as i64 >> 40;
    assert_eq!(
        (lui.imm40() << 24).wrapping_add(sext as u64),
        value
    );
}

#[test]
fn aligned_long_literal_needs_one_word() {
    let mtd = method("static int f ()", "DEF long x\nLI x 0x7700000000").unwrap();
    assert_eq!(mtd.instructions.len(), 1);
    let lui = decode(mtd.instructions[0]);
    assert_eq!(lui.opcode(), Opcode::LUI);
    assert_eq!(lui.imm40(), 0x77_0000_0000 >> 24);
}

#[test]
fn float_and_null_loads() {
    let mtd = method(
        "static int f ()",
        "DEF float x\nDEF t.Obj o\nLI x 1.5\nLI o null",
    )
    .unwrap();
    let ldi = decode(mtd.instructions[0]);
    assert_eq!(ldi.opcode(), Opcode::LDI);
    assert_eq!(ldi.imm32(), 1.5f32.to_bits());
    let lnl = decode(mtd.instructions[1]);
    assert_eq!(lnl.opcode(), Opcode::LNL);
    assert_eq!(lnl.imm40(), 0);
    assert_eq!(mtd.handle_map, [1]);
}

#[test]
fn char_literal_loads_into_int() {
    let mtd = method("static int f ()", "DEF int c\nLI c 'ab'").unwrap();
    assert_eq!(decode(mtd.instructions[0]).imm32(), 0x6162);
}

#[test]
fn forward_branch_displacement_counts_from_the_next_word() {
    let body = "DEF int a\nDEF int b\n\
                BEQ end a b\nNOP\nNOP\nNOP\nNOP\nNOP\nNOP\nLBL end\nRET a";
    let mtd = method("static int f ()", body).unwrap();
    let beq = decode(mtd.instructions[0]);
    assert_eq!(beq.opcode(), Opcode::IBEQ);
    assert_eq!(beq.flags(), 0);
    assert_eq!(beq.dest(), 6);
    // Label soundness: pc + 1 + disp lands on the target.
    assert_eq!(0 + 1 + 6, 7);
    assert_eq!(decode(mtd.instructions[7]).opcode(), Opcode::IRET);
}

#[test]
fn backward_branch_sets_the_direction_flag() {
    let body = "DEF int a\nLBL top\nNOP\nBU top";
    let mtd = method("static int f ()", body).unwrap();
    let bu = decode(mtd.instructions[1]);
    assert_eq!(bu.opcode(), Opcode::BU);
    assert!(bu.is_backward());
    // branch at pc 1, target 0: disp = 1 + 1 - 0
    assert_eq!(bu.dest(), 2);
}

#[test]
fn ref_equality_branches_use_the_v_variants() {
    let body = "DEF t.A p\nDEF t.A q\nLBL top\nBEQ top p q\nBNEQI top p null";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(decode(mtd.instructions[0]).opcode(), Opcode::VBEQ);
    let bneqi = decode(mtd.instructions[1]);
    assert_eq!(bneqi.opcode(), Opcode::VBNEQI);
    assert_eq!(bneqi.src2(), 0);
}

#[test]
fn ordered_branches_reject_references() {
    let body = "DEF t.A p\nDEF t.A q\nLBL top\nBLT top p q";
    let errors = method("static int f ()", body).unwrap_err();
    assert!(matches!(
        errors[0].kind,
        ErrorKind::InapplicableType(TypeTag::Ref)
    ));
}

#[test]
fn invoke_packs_four_argument_slots_per_word() {
    let body = "DEF int a\nDEF int b\nDEF int c\nDEF int d\nDEF int e\nDEF int dst\n\
                SINV dst other.Cls.m a b c d e";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(mtd.instructions.len(), 3);
    let sinv = decode(mtd.instructions[0]);
    assert_eq!(sinv.opcode(), Opcode::SINV);
    assert_eq!(sinv.dest(), 5);
    // a..d little-endian in the first word, e alone in the second.
    assert_eq!(
        mtd.instructions[1],
        0 | (1 << 16) | (2 << 32) | (3 << 48)
    );
    assert_eq!(mtd.instructions[2], 4);
    let thunk = &mtd.thunks[0];
    assert_eq!(thunk.kind, ThunkKind::Method);
    assert_eq!(thunk.slot, RewriteSlot::Imm32);
    assert_eq!(thunk.instruction, 0);
    assert_eq!(thunk.class.as_deref(), Some("other.Cls"));
    assert_eq!(thunk.name, "m");
}

#[test]
fn instance_invoke_carries_receiver_and_method_thunk() {
    let body = "DEF t.A recv\nDEF int dst\nDEF int a\nIINV dst recv t.A.go a";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(mtd.instructions.len(), 2);
    let iinv = decode(mtd.instructions[0]);
    assert_eq!(iinv.opcode(), Opcode::IINV);
    assert_eq!((iinv.dest(), iinv.src1()), (2, 0));
    assert_eq!(mtd.thunks[0].slot, RewriteSlot::Imm24);
}

#[test]
fn field_access_emits_typed_opcodes_and_thunks() {
    let body = "DEF t.A obj\nDEF int v\nDEF long w\n\
                VLLD v obj other.B.count\nVLSR obj w other.B.total\n\
                STLD v other.B.flag\nSTSR w other.B.sum";
    let mtd = method("static int f ()", body).unwrap();
    let vlld = decode(mtd.instructions[0]);
    assert_eq!(vlld.opcode(), Opcode::IVLLD);
    assert_eq!((vlld.dest(), vlld.src1()), (2, 0));
    assert_eq!(decode(mtd.instructions[1]).opcode(), Opcode::LVLSR);
    assert_eq!(decode(mtd.instructions[2]).opcode(), Opcode::ISTLD);
    assert_eq!(decode(mtd.instructions[3]).opcode(), Opcode::LSTSR);
    let kinds: Vec<_> = mtd.thunks.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [
            ThunkKind::InstanceField,
            ThunkKind::InstanceField,
            ThunkKind::StaticField,
            ThunkKind::StaticField
        ]
    );
    assert_eq!(mtd.thunks[2].slot, RewriteSlot::Imm32);
}

#[test]
fn array_ops_choose_opcode_by_value_type() {
    let body = "DEF t.A arr\nDEF int i\nDEF double d\n\
                ANEW arr double i\nALD d arr i\nASR arr i d\nALEN i arr";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(decode(mtd.instructions[0]).opcode(), Opcode::DANEW);
    let ald = decode(mtd.instructions[1]);
    assert_eq!(ald.opcode(), Opcode::DALD);
    assert_eq!((ald.dest(), ald.src1(), ald.src2()), (3, 0, 2));
    let asr = decode(mtd.instructions[2]);
    assert_eq!(asr.opcode(), Opcode::DASR);
    assert_eq!((asr.dest(), asr.src1(), asr.src2()), (3, 0, 2));
    // ALEN lowers to the zero-index instance-field load, no thunk.
    let alen = decode(mtd.instructions[3]);
    assert_eq!(alen.opcode(), Opcode::IVLLD);
    assert_eq!(alen.imm24(), 0);
    assert!(mtd.thunks.is_empty());
}

#[test]
fn ref_array_allocation_thunks_the_element_class() {
    let body = "DEF t.A arr\nDEF int n\nANEW arr other.Elem n";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(decode(mtd.instructions[0]).opcode(), Opcode::VANEW);
    let thunk = &mtd.thunks[0];
    assert_eq!(thunk.kind, ThunkKind::Class);
    assert_eq!(thunk.slot, RewriteSlot::Src2);
    assert_eq!(thunk.name, "other.Elem");
    assert_eq!(thunk.class, None);
}

#[test]
fn casts_pick_the_pairwise_opcode() {
    let body = "DEF int i\nDEF double d\nCST d i";
    let mtd = method("static int f ()", body).unwrap();
    assert_eq!(decode(mtd.instructions[0]).opcode(), Opcode::ICSTD);

    let errors = method("static int f ()", "DEF int a\nDEF int b\nCST a b").unwrap_err();
    assert!(matches!(
        errors[0].kind,
        ErrorKind::IdentityCast(TypeTag::Int)
    ));
}

#[test]
fn return_type_must_match_the_declaration() {
    let errors = method("static long f (int x)", "RET x").unwrap_err();
    assert_eq!(
        errors[0].kind,
        ErrorKind::ReturnTypeMismatch {
            expected: TypeTag::Long,
            found: TypeTag::Int,
        }
    );
}

#[test]
fn errors_accumulate_across_the_body() {
    let body = "ADD a b c\nDEF int x\nLI x 99999999999\nBU nowhere";
    let errors = method("static int f ()", body).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0].kind, ErrorKind::UndefinedLocal(_)));
    assert!(matches!(
        errors[1].kind,
        ErrorKind::ImmediateOverflow { bits: 32, .. }
    ));
    assert!(matches!(errors[2].kind, ErrorKind::UndefinedLabel(_)));
    assert!(errors.iter().all(|e| e.method.as_deref() == Some("f")));
}

#[test]
fn duplicate_locals_and_labels_are_rejected() {
    let body = "DEF int x\nDEF long x\nLBL l\nLBL l\nRET x";
    let errors = method("static int f ()", body).unwrap_err();
    assert!(matches!(errors[0].kind, ErrorKind::RedefinedLocal(_)));
    assert!(matches!(errors[1].kind, ErrorKind::RedefinedLabel(_)));
}

#[test]
fn handle_map_collects_every_reference_slot_once() {
    let mtd = method(
        "static int f (t.A p, int n, t.B q)",
        "DEF t.C r\nDEF int k\nRET n",
    )
    .unwrap();
    // p 0..2, n 2, q 3..5, r 5..7, k 7
    assert_eq!(mtd.handle_map, [0, 3, 5]);
    assert_eq!(mtd.stack_size, 8);
    assert_eq!(
        mtd.arg_types,
        [TypeTag::Ref, TypeTag::Int, TypeTag::Ref]
    );
}

#[test]
fn on_disk_size_accounts_for_every_section_piece() {
    let mtd = method("static int nop (int r)", "RET r").unwrap();
    // size + counts + one arg word + one instruction + pointer + handle word
    assert_eq!(mtd.on_disk_size(), 8 + 8 + 8 + 8 + 8 + 8);

    let empty = method("static int f ()", "NOP").unwrap();
    // no arg words when there are no parameters
    assert_eq!(empty.on_disk_size(), 8 + 8 + 8 + 8 + 8);
}

#[test]
fn li_width_is_stable_across_passes() {
    // The wide load sits before the label; a mis-sized pass 1 would skew
    // the displacement.
    let body = "DEF long x\nDEF int a\n\
                LI x 0x1234567890ABCDEF\nBU end\nNOP\nLBL end\nRET a";
    let mtd = method("static int f ()", body).unwrap();
    // words: 0 LUI, 1 LADDI, 2 BU, 3 NOP, target 4
    let bu = decode(mtd.instructions[2]);
    assert_eq!(bu.flags(), 0);
    assert_eq!(bu.dest(), 1);
    assert_eq!(mtd.instructions.len(), 5);
}
