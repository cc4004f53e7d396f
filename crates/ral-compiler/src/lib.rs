//! RAL compiler backend.
//!
//! Takes the unresolved tree of a RAL unit (see [`ast`] and [`unit`]),
//! type-checks it against a [`rhizome_ral_types::TypeSystem`] and emits CAOS.
//!
//! Resolution and code generation are separate passes. [`Stmt::resolve`]
//! binds names and builds expression [`slice`]s; [`Resolved::compile`]
//! allocates VA registers and writes text through a [`CompileContext`].

pub mod alloc;
pub mod ast;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod macros;
pub mod resolve;
pub mod scope;
pub mod slice;
pub mod stmt;
pub mod unit;
pub mod world;
pub mod writer;

pub use alloc::{LinearAllocator, VA_SLOTS, VaAllocator};
pub use ast::{EnumKind, ExprUR, InlinePart, MessageRef, Stmt, StmtKind, TypeRef};
pub use config::{CompilerConfig, ConfigError};
pub use context::{BreakTarget, CompileContext, Fork, LabelAllocator, VaHandle, va_name};
pub use diagnostic::{Diagnostic, Severity, SrcPos};
pub use error::CompileError;
pub use macros::{Macro, MacroParam, MacroRegistry};
pub use scope::{ScopeContext, ScriptContext};
pub use slice::{Expr, Perm, SliceImpl};
pub use stmt::{Resolved, ResolvedKind};
pub use unit::{CompileOutput, Declaration, EventScript, MacroDef, MacroParamDef, ScriptRef, Unit};
pub use world::{MAX_MACRO_DEPTH, Resolver, World};
pub use writer::CodeWriter;
