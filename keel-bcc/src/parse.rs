//! Parser producing the class syntax tree the compiler consumes.
//!
//! The grammar is line-oriented: class-level declarations, then procedures
//! bracketed by `PROC`/`EPROC` whose bodies are mnemonic lines. Errors are
//! accumulated and parsing continues, so one run reports every problem.

use crate::error::{CompileError, ErrorKind, SourcePos};
use crate::lex::{lex, Token};
use itertools::Itertools;
use std::str::FromStr;

/// Instruction mnemonics and the two body-level pseudo statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumString, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Mnemonic {
    /// No operation.
    Nop,
    /// `ADD dest src1 src2`
    Add,
    /// `SUB dest src1 src2`
    Sub,
    /// `MUL dest src1 src2`
    Mul,
    /// `DIV dest src1 src2`
    Div,
    /// `DIVU dest src1 src2`
    Divu,
    /// `ADDI dest src1 imm`
    Addi,
    /// `SUBI dest src1 imm`
    Subi,
    /// `MULI dest src1 imm`
    Muli,
    /// `DIVI dest src1 imm`
    Divi,
    /// `DIVUI dest src1 imm`
    Divui,
    /// `NEG dest src`
    Neg,
    /// `LI dest literal`
    Li,
    /// `CST dest src`
    Cst,
    /// `AND dest src1 src2`
    And,
    /// `OR dest src1 src2`
    Or,
    /// `XOR dest src1 src2`
    Xor,
    /// `SLL dest src1 src2`
    Sll,
    /// `SRL dest src1 src2`
    Srl,
    /// `SRA dest src1 src2`
    Sra,
    /// `ANDI dest src1 imm`
    Andi,
    /// `ORI dest src1 imm`
    Ori,
    /// `XORI dest src1 imm`
    Xori,
    /// `SLLI dest src1 imm`
    Slli,
    /// `SRLI dest src1 imm`
    Srli,
    /// `SRAI dest src1 imm`
    Srai,
    /// `BGE label src1 src2`
    Bge,
    /// `BLT label src1 src2`
    Blt,
    /// `BLE label src1 src2`
    Ble,
    /// `BGT label src1 src2`
    Bgt,
    /// `BEQ label src1 src2`
    Beq,
    /// `BNEQ label src1 src2`
    Bneq,
    /// `BGEI label src imm`
    Bgei,
    /// `BLTI label src imm`
    Blti,
    /// `BLEI label src imm`
    Blei,
    /// `BGTI label src imm`
    Bgti,
    /// `BEQI label src imm`
    Beqi,
    /// `BNEQI label src imm`
    Bneqi,
    /// `BU label`
    Bu,
    /// `VLLD dest obj class.field`
    Vlld,
    /// `VLSR obj src class.field`
    Vlsr,
    /// `ALD dest arr idx`
    Ald,
    /// `ASR arr idx src`
    Asr,
    /// `ALEN dest arr`
    Alen,
    /// `STLD dest class.field`
    Stld,
    /// `STSR src class.field`
    Stsr,
    /// `VNEW dest class`
    Vnew,
    /// `ANEW dest type length`
    Anew,
    /// `IOF dest src class`
    Iof,
    /// `VINV dest recv class.method args...`
    Vinv,
    /// `SINV dest class.method args...`
    Sinv,
    /// `IINV dest recv class.method args...`
    Iinv,
    /// `RET src`
    Ret,
    /// `DEF type name`
    Def,
    /// `LBL name`
    Lbl,
}

impl Mnemonic {
    /// Minimum operand count and, for fixed-arity mnemonics, the maximum.
    pub fn arity(self) -> (usize, Option<usize>) {
        use Mnemonic::*;
        match self {
            Nop => (0, Some(0)),
            Bu | Ret | Lbl => (1, Some(1)),
            Neg | Li | Cst | Alen | Stld | Stsr | Vnew | Def => (2, Some(2)),
            Sinv => (2, None),
            Iinv | Vinv => (3, None),
            _ => (3, Some(3)),
        }
    }
}

/// One symbolic instruction as parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    /// The mnemonic.
    pub mnemonic: Mnemonic,
    /// Raw operand tokens, in order.
    pub operands: Vec<String>,
    /// Anchor of the mnemonic token.
    pub pos: SourcePos,
}

/// A procedure parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Declared type: a primitive keyword or class name.
    pub type_name: String,
    /// Parameter name.
    pub name: String,
}

/// One `PROC` ... `EPROC` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    /// Procedure name.
    pub name: String,
    /// Whether declared `static`.
    pub is_static: bool,
    /// Declared return type name.
    pub return_type: String,
    /// Parameters in declaration order.
    pub params: Vec<Param>,
    /// Body instructions in source order.
    pub body: Vec<Instr>,
    /// Anchor of the `PROC` line.
    pub pos: SourcePos,
}

/// An imported method or field: `class.name`, qualifier optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedMember {
    /// Owning class, or `None` for the enclosing class.
    pub class: Option<String>,
    /// Member name (methods may keep a signature suffix).
    pub name: String,
    /// Anchor of the declaration.
    pub pos: SourcePos,
}

/// An `IVAR`/`SVAR` field declared on the class under compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Declared type name.
    pub type_name: String,
    /// Field name.
    pub name: String,
    /// Anchor of the declaration.
    pub pos: SourcePos,
}

/// The parsed class: declarations plus procedures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassAst {
    /// Dotted name of the class under compilation.
    pub name: String,
    /// Superclass, if declared.
    pub extends: Option<String>,
    /// Superinterfaces in declaration order.
    pub implements: Vec<String>,
    /// `IMP CLZ` imports in declaration order.
    pub imported_classes: Vec<(String, SourcePos)>,
    /// `IMP PROC` imports in declaration order.
    pub imported_methods: Vec<ImportedMember>,
    /// `IMP SVAR` imports in declaration order.
    pub imported_statics: Vec<ImportedMember>,
    /// `IMP IVAR` imports in declaration order.
    pub imported_instances: Vec<ImportedMember>,
    /// Own static fields in declaration order.
    pub static_fields: Vec<FieldDecl>,
    /// Own instance fields in declaration order.
    pub instance_fields: Vec<FieldDecl>,
    /// Procedures in declaration order.
    pub procedures: Vec<Procedure>,
}

/// Split a qualified path at the final `.` preceding the first `(`.
///
/// Method names may embed a signature suffix in parentheses, and that
/// suffix may itself contain dots, so only the prefix is searched.
pub fn split_qualified(path: &str) -> (Option<&str>, &str) {
    let head_len = path.find('(').unwrap_or(path.len());
    match path[..head_len].rfind('.') {
        Some(dot) => (Some(&path[..dot]), &path[dot + 1..]),
        None => (None, path),
    }
}

const CLASS_KEYWORDS: [&str; 7] = ["CLZ", "EXT", "IMPL", "IMP", "IVAR", "SVAR", "PROC"];

#[derive(PartialEq)]
enum Header {
    ExpectClz,
    ExtAllowed,
    ImplAllowed,
    Body,
}

/// Parse a source file into its syntax tree, accumulating every error.
pub fn parse(source: &str) -> (ClassAst, Vec<CompileError>) {
    let mut ast = ClassAst::default();
    let mut errors = Vec::new();
    let mut current: Option<Procedure> = None;
    let mut header = Header::ExpectClz;
    let mut last_pos = SourcePos::new(1, 1);

    for line in lex(source) {
        let head = line[0];
        last_pos = head.pos;
        if current.is_some() {
            parse_body_line(&line, &mut current, &mut ast, &mut errors);
            continue;
        }

        match head.text {
            "CLZ" => {
                if header != Header::ExpectClz {
                    errors.push(CompileError::new(ErrorKind::ClassNotFirst, head.pos));
                }
                if let Some(name) = expect_operands::<1>(&line, &mut errors) {
                    if ast.name.is_empty() {
                        ast.name = name[0].text.to_owned();
                    }
                }
                header = Header::ExtAllowed;
            }
            "EXT" => {
                if header != Header::ExtAllowed {
                    errors.push(CompileError::new(
                        ErrorKind::MisplacedHeader("EXT".into()),
                        head.pos,
                    ));
                }
                if let Some(ops) = expect_operands::<1>(&line, &mut errors) {
                    ast.extends = Some(ops[0].text.to_owned());
                }
                header = Header::ImplAllowed;
            }
            "IMPL" => {
                if !matches!(header, Header::ExtAllowed | Header::ImplAllowed) {
                    errors.push(CompileError::new(
                        ErrorKind::MisplacedHeader("IMPL".into()),
                        head.pos,
                    ));
                }
                if let Some(ops) = expect_operands::<1>(&line, &mut errors) {
                    ast.implements.push(ops[0].text.to_owned());
                }
                header = Header::ImplAllowed;
            }
            "IMP" => {
                header = Header::Body;
                parse_import(&line, &mut ast, &mut errors);
            }
            "IVAR" | "SVAR" => {
                header = Header::Body;
                if let Some(ops) = expect_operands::<2>(&line, &mut errors) {
                    let field = FieldDecl {
                        type_name: ops[0].text.to_owned(),
                        name: ops[1].text.to_owned(),
                        pos: head.pos,
                    };
                    if head.text == "IVAR" {
                        ast.instance_fields.push(field);
                    } else {
                        ast.static_fields.push(field);
                    }
                }
            }
            "PROC" => {
                header = Header::Body;
                match parse_proc_header(&line) {
                    Ok(proc) => current = Some(proc),
                    Err(err) => errors.push(err),
                }
            }
            "EPROC" => {
                errors.push(CompileError::new(ErrorKind::UnbalancedProc, head.pos));
            }
            other => {
                let kind = if Mnemonic::from_str(other).is_ok() {
                    ErrorKind::MisplacedAtClassLevel(other.to_owned())
                } else {
                    ErrorKind::UnknownKeyword(other.to_owned())
                };
                errors.push(CompileError::new(kind, head.pos));
            }
        }
    }

    if let Some(open) = current.take() {
        errors.push(CompileError::new(ErrorKind::UnbalancedProc, last_pos).in_method(&open.name));
        ast.procedures.push(open);
    }
    if ast.name.is_empty() {
        errors.push(CompileError::new(
            ErrorKind::ClassNotFirst,
            SourcePos::new(1, 1),
        ));
    }

    (ast, errors)
}

fn parse_body_line(
    line: &[Token<'_>],
    current: &mut Option<Procedure>,
    ast: &mut ClassAst,
    errors: &mut Vec<CompileError>,
) {
    let head = line[0];
    let Some(proc) = current.as_mut() else {
        return;
    };
    if head.text == "EPROC" {
        if line.len() != 1 {
            errors.push(wrong_arity("EPROC", "0", line.len() - 1, head.pos));
        }
        if let Some(done) = current.take() {
            ast.procedures.push(done);
        }
        return;
    }
    if CLASS_KEYWORDS.contains(&head.text) {
        errors.push(
            CompileError::new(
                ErrorKind::MisplacedInProcedure(head.text.to_owned()),
                head.pos,
            )
            .in_method(&proc.name),
        );
        return;
    }
    match Mnemonic::from_str(head.text) {
        Ok(mnemonic) => {
            let found = line.len() - 1;
            let (min, max) = mnemonic.arity();
            if found < min || max.is_some_and(|m| found > m) {
                let expected = match max {
                    Some(m) if m == min => format!("{min}"),
                    _ => format!("at least {min}"),
                };
                errors.push(
                    wrong_arity(head.text, &expected, found, head.pos).in_method(&proc.name),
                );
                return;
            }
            proc.body.push(Instr {
                mnemonic,
                operands: line[1..].iter().map(|t| t.text.to_owned()).collect(),
                pos: head.pos,
            });
        }
        Err(_) => errors.push(
            CompileError::new(ErrorKind::UnknownKeyword(head.text.to_owned()), head.pos)
                .in_method(&proc.name),
        ),
    }
}

fn parse_import(line: &[Token<'_>], ast: &mut ClassAst, errors: &mut Vec<CompileError>) {
    let head = line[0];
    let Some(ops) = expect_operands::<2>(line, errors) else {
        return;
    };
    let target = ops[1].text;
    match ops[0].text {
        "CLZ" => ast
            .imported_classes
            .push((target.to_owned(), head.pos)),
        kind @ ("PROC" | "IVAR" | "SVAR") => {
            let (class, name) = split_qualified(target);
            let member = ImportedMember {
                class: class.map(str::to_owned),
                name: name.to_owned(),
                pos: head.pos,
            };
            match kind {
                "PROC" => ast.imported_methods.push(member),
                "IVAR" => ast.imported_instances.push(member),
                _ => ast.imported_statics.push(member),
            }
        }
        other => errors.push(CompileError::new(
            ErrorKind::UnknownKeyword(format!("IMP {other}")),
            head.pos,
        )),
    }
}

/// `PROC [static] ret_type name (type arg, ...)`. The parameter list may be
/// glued to the name or spread over several tokens; it is re-joined and
/// split on parentheses, commas and whitespace.
fn parse_proc_header(line: &[Token<'_>]) -> Result<Procedure, CompileError> {
    let head = line[0];
    let mut rest = &line[1..];
    let is_static = rest.first().is_some_and(|t| t.text == "static");
    if is_static {
        rest = &rest[1..];
    }
    let [return_type, tail @ ..] = rest else {
        return Err(wrong_arity("PROC", "at least 3", line.len() - 1, head.pos));
    };
    let signature = tail.iter().map(|t| t.text).join(" ");
    let open = signature
        .find('(')
        .ok_or_else(|| CompileError::new(ErrorKind::MalformedParams, head.pos))?;
    let name = signature[..open].trim();
    let params_src = signature[open..].trim();
    if name.is_empty() || name.contains(' ') || !params_src.ends_with(')') {
        return Err(CompileError::new(ErrorKind::MalformedParams, head.pos));
    }
    let inner = &params_src[1..params_src.len() - 1];
    let mut words = inner
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty());
    let mut params = Vec::new();
    while let Some(type_name) = words.next() {
        let name = words
            .next()
            .ok_or_else(|| CompileError::new(ErrorKind::MalformedParams, head.pos))?;
        params.push(Param {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(Procedure {
        name: name.to_owned(),
        is_static,
        return_type: return_type.text.to_owned(),
        params,
        body: Vec::new(),
        pos: head.pos,
    })
}

fn expect_operands<'l, 'a, const N: usize>(
    line: &'l [Token<'a>],
    errors: &mut Vec<CompileError>,
) -> Option<&'l [Token<'a>]> {
    if line.len() != N + 1 {
        errors.push(wrong_arity(
            line[0].text,
            &format!("{N}"),
            line.len() - 1,
            line[0].pos,
        ));
        return None;
    }
    Some(&line[1..])
}

fn wrong_arity(keyword: &str, expected: &str, found: usize, pos: SourcePos) -> CompileError {
    CompileError::new(
        ErrorKind::WrongArity {
            keyword: keyword.to_owned(),
            expected: expected.to_owned(),
            found,
        },
        pos,
    )
}
