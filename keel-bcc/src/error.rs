//! Diagnostics are values: every recoverable failure is a [`CompileError`]
//! with a kind and a source anchor, accumulated so one run reports every
//! problem in a file. Only output I/O aborts, through [`WriteError`].

use keel_types::TypeTag;
use std::fmt;
use std::path::PathBuf;

/// Line/column anchor inside the source file, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    /// 1-based source line.
    pub line: u32,
    /// 1-based column of the offending token.
    pub col: u32,
}

impl SourcePos {
    /// Anchor at `line:col`.
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// What went wrong, without location context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Keyword or mnemonic the lexer does not know.
    #[error("unknown keyword '{0}'")]
    UnknownKeyword(String),
    /// A known keyword with the wrong operand count.
    #[error("'{keyword}' expects {expected} operands, found {found}")]
    WrongArity {
        /// The keyword.
        keyword: String,
        /// Human-readable expected count ("3", "at least 2", ...).
        expected: String,
        /// Count actually present.
        found: usize,
    },
    /// Class-level keyword encountered inside a procedure.
    #[error("'{0}' is not valid inside a procedure")]
    MisplacedInProcedure(String),
    /// Procedure-level keyword encountered at class level.
    #[error("'{0}' is only valid inside a procedure")]
    MisplacedAtClassLevel(String),
    /// The `CLZ` declaration was missing or not first.
    #[error("the class declaration must be the first statement")]
    ClassNotFirst,
    /// `EXT`/`IMPL` appearing after other declarations.
    #[error("'{0}' must directly follow the class declaration")]
    MisplacedHeader(String),
    /// Parameter list that does not parse as `(type name, ...)`.
    #[error("malformed parameter list")]
    MalformedParams,
    /// `EPROC` without an open procedure, or EOF inside one.
    #[error("unbalanced procedure delimiters")]
    UnbalancedProc,

    /// Local variable used before any `DEF`.
    #[error("undefined local variable '{0}'")]
    UndefinedLocal(String),
    /// Second definition of a local name.
    #[error("local variable '{0}' is already defined")]
    RedefinedLocal(String),
    /// Branch target never defined by `LBL`.
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),
    /// Second definition of a label name.
    #[error("label '{0}' is already defined")]
    RedefinedLabel(String),
    /// The same class imported twice.
    #[error("duplicate import of class '{0}'")]
    DuplicateImport(String),
    /// Two pool members with the same owner and name.
    #[error("duplicate declaration of '{0}'")]
    DuplicateMember(String),
    /// A method frame outgrew the 16-bit slot space.
    #[error("method frame exceeds the addressable slot range")]
    FrameTooLarge,

    /// Operand types disagree where one type is required.
    #[error("mismatched operand types {expected} and {found}")]
    TypeMismatch {
        /// The type fixed by an earlier operand.
        expected: TypeTag,
        /// The disagreeing operand's type.
        found: TypeTag,
    },
    /// Operation undefined for the operand type.
    #[error("operation is not applicable to type {0}")]
    InapplicableType(TypeTag),
    /// `RET` operand disagreeing with the declared return type.
    #[error("returned {found} but the procedure declares {expected}")]
    ReturnTypeMismatch {
        /// Declared return type.
        expected: TypeTag,
        /// Operand type.
        found: TypeTag,
    },
    /// Cast between identical types.
    #[error("cast between identical types {0}")]
    IdentityCast(TypeTag),

    /// Literal that does not parse as the expected type.
    #[error("'{literal}' could not be parsed as {wanted}")]
    UnparseableLiteral {
        /// Offending token.
        literal: String,
        /// What it was parsed as.
        wanted: &'static str,
    },
    /// Literal outside the signed window of its immediate field.
    #[error("'{literal}' does not fit in a signed {bits}-bit immediate")]
    ImmediateOverflow {
        /// Offending token.
        literal: String,
        /// Field width.
        bits: u32,
    },
    /// Character literal with bad quoting, length, or escape.
    #[error("invalid character literal {0}")]
    BadCharLiteral(String),
    /// Branch farther than a 16-bit displacement reaches.
    #[error("branch to '{0}' is out of displacement range")]
    BranchOutOfRange(String),

    /// Name that no pool entry answers to at link time.
    #[error("unresolved {kind} '{name}'")]
    Unresolved {
        /// "class", "method", "static field" or "instance field".
        kind: &'static str,
        /// The dotted name as written.
        name: String,
    },
}

/// A diagnostic: kind, anchor, and the procedure it surfaced in, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Where in the source.
    pub pos: SourcePos,
    /// Enclosing procedure, when the error surfaced inside one.
    pub method: Option<String>,
}

impl CompileError {
    /// Anchor `kind` at `pos`.
    pub fn new(kind: ErrorKind, pos: SourcePos) -> Self {
        Self {
            kind,
            pos,
            method: None,
        }
    }

    /// Attach the enclosing procedure name.
    pub fn in_method(mut self, name: &str) -> Self {
        self.method = Some(name.to_owned());
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{}: in {}: {}", self.pos, method, self.kind),
            None => write!(f, "{}: {}", self.pos, self.kind),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Failures of the output mapping; the only non-recoverable errors.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Could not create the output file or its directories.
    #[error("failed to create '{path}': {source}")]
    Create {
        /// Output path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },
    /// Could not size or map the output file.
    #[error("failed to map '{path}': {source}")]
    Map {
        /// Output path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },
    /// Could not flush the mapping back to disk.
    #[error("failed to flush '{path}': {source}")]
    Flush {
        /// Output path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },
}
