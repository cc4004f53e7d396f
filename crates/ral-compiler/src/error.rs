use rhizome_ral_types::TypeError;
use thiserror::Error;

use crate::diagnostic::SrcPos;

/// Errors raised while resolving or compiling RAL.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("expected {expected} values, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("expected a single value, got {0}")]
    NotSingle(usize),

    #[error("slot {index} out of range for a slice of length {len}")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("invalid slice [{base}; {len}] of a slice of length {total}")]
    InvalidSlice {
        base: usize,
        len: usize,
        total: usize,
    },

    #[error("cannot read from {0}")]
    NotReadable(String),

    #[error("cannot write to {0}")]
    NotWritable(String),

    #[error("no store instruction for `{input}` of type {ty}")]
    UnknownMajor { ty: String, input: String },

    #[error("byte strings cannot be stored in variables")]
    ByteStringStore,

    #[error("major type mismatch in comparison ({left} vs {right})")]
    MajorMismatch { left: String, right: String },

    #[error("out of VA slots (limit {0})")]
    OutOfSlots(u8),

    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    #[error("no field `{field}` on {ty}")]
    UnknownField { ty: String, field: String },

    #[error("no macro named `{0}`")]
    UnknownMacro(String),

    #[error("macro `{name}` has no {arity}-argument variant")]
    UnknownMacroArity { name: String, arity: usize },

    #[error("macro `{name}` already has a {arity}-argument variant")]
    DuplicateMacro { name: String, arity: usize },

    #[error("macro expansion deeper than {0} levels")]
    MacroDepth(usize),

    #[error("no message `{name}` on {ty}")]
    UnknownMessage { ty: String, name: String },

    #[error("no script `{name}` on {ty}")]
    UnknownScript { ty: String, name: String },

    #[error("cannot break here")]
    CannotBreak,

    #[error("cannot continue here")]
    CannotContinue,

    #[error("division by zero in constant expression")]
    DivisionByZero,

    #[error("deferred expression #{0} used before it was bound")]
    UnboundDeferred(usize),

    #[error("VA handle #{0} used outside the scope that allocated it")]
    EscapedHandle(u32),

    #[error("{0}")]
    Invalid(String),

    #[error("{pos}: {source}")]
    At {
        pos: SrcPos,
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attaches a source position unless an inner statement already did.
    pub fn at(self, pos: &SrcPos) -> Self {
        match self {
            CompileError::At { .. } => self,
            other => CompileError::At {
                pos: pos.clone(),
                source: Box::new(other),
            },
        }
    }

    pub fn position(&self) -> Option<&SrcPos> {
        match self {
            CompileError::At { pos, .. } => Some(pos),
            _ => None,
        }
    }

    /// The error without its position wrapper.
    pub fn cause(&self) -> &CompileError {
        match self {
            CompileError::At { source, .. } => source.cause(),
            other => other,
        }
    }
}
