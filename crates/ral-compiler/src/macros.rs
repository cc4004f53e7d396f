//! Macro definitions and hygienic expansion.
//!
//! A macro body is resolved once per call, in a fresh root scope that only
//! sees the script built-ins and the parameters. Parameters are bound to a
//! placeholder whose code is filled in after the call-site arguments have
//! been wired up:
//!
//! - value parameters are copied into fresh variables before the body runs,
//!   exactly once and left to right;
//! - inline parameters pass the argument through, so its code runs wherever
//!   the body refers to it.

use std::collections::{BTreeMap, HashMap};

use rhizome_ral_types::TypeId;
use tracing::trace;

use crate::ast::ExprUR;
use crate::context::{CompileContext, Fork};
use crate::diagnostic::SrcPos;
use crate::error::CompileError;
use crate::scope::{ScopeContext, ScriptContext};
use crate::slice::{DeferredSlice, Expr, Perm, SliceImpl, VarCacher};
use crate::world::Resolver;

#[derive(Debug, Clone, PartialEq)]
pub struct MacroParam {
    pub name: String,
    pub ty: TypeId,
    /// `None` for a value parameter.
    pub inline: Option<Perm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<MacroParam>,
    pub body: ExprUR,
    pub pos: SrcPos,
}

/// Macros by name, then by number of arguments.
#[derive(Debug, Default)]
pub struct MacroRegistry {
    sets: HashMap<String, BTreeMap<usize, Macro>>,
}

impl MacroRegistry {
    pub fn declare(&mut self, mac: Macro) -> Result<(), CompileError> {
        let arity = mac.params.len();
        let set = self.sets.entry(mac.name.clone()).or_default();
        if set.contains_key(&arity) {
            return Err(CompileError::DuplicateMacro {
                name: mac.name,
                arity,
            });
        }
        trace!(name = %mac.name, arity, "declared macro");
        set.insert(arity, mac);
        Ok(())
    }

    pub fn lookup(&self, name: &str, arity: usize) -> Result<&Macro, CompileError> {
        let set = self
            .sets
            .get(name)
            .ok_or_else(|| CompileError::UnknownMacro(name.to_string()))?;
        set.get(&arity)
            .ok_or_else(|| CompileError::UnknownMacroArity {
                name: name.to_string(),
                arity,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }
}

impl Macro {
    /// Expands a call with already-resolved arguments.
    pub fn expand(
        &self,
        args: Expr,
        script: ScriptContext,
        rv: &mut Resolver<'_>,
    ) -> Result<Expr, CompileError> {
        if args.len() != self.params.len() {
            return Err(CompileError::Arity {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        for (i, param) in self.params.iter().enumerate() {
            if param.inline.is_none_or(Perm::read) {
                rv.types.assert_implicit_cast(args.read_type(i)?, param.ty)?;
            }
            if param.inline.is_some_and(Perm::write) {
                rv.types.assert_implicit_cast(param.ty, args.write_type(i)?)?;
            }
        }

        let id = rv.deferred.reserve();
        let placeholder = Expr::leaf(DeferredSlice::new(
            id,
            self.params.iter().map(|p| p.ty).collect(),
            self.params
                .iter()
                .map(|p| p.inline.unwrap_or(Perm::RW))
                .collect(),
        ));
        let mut scope = ScopeContext::root(rv.types, script);
        for (i, param) in self.params.iter().enumerate() {
            scope.bind(param.name.clone(), placeholder.slice(i, 1)?);
        }
        let body = rv.nested(|rv| self.body.resolve(&scope, rv))?;

        let cacher = VarCacher::new(
            &args,
            |i| self.params[i].inline.is_none(),
            |i| self.params[i].name.clone(),
            || rv.fresh_handle(),
        )?;
        rv.deferred.bind(id, cacher.output().clone());
        trace!(name = %self.name, arity = self.params.len(), "expanded macro");

        if cacher.is_passthrough() {
            return Ok(body);
        }
        Ok(Expr::leaf(MacroCall {
            name: self.name.clone(),
            cacher,
            body,
        }))
    }
}

/// A macro call whose value arguments are copied before the body runs.
#[derive(Debug)]
struct MacroCall {
    name: String,
    cacher: VarCacher,
    body: Expr,
}

impl SliceImpl for MacroCall {
    fn len(&self) -> usize {
        self.body.len()
    }

    fn read_type(&self, index: usize) -> Option<TypeId> {
        self.body.read_type(index).ok()
    }

    fn write_type(&self, index: usize) -> Option<TypeId> {
        self.body.write_type(index).ok()
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        trace!(name = %self.name, "compiling macro call");
        ctx.fork(Fork::Unbreakable, |cc| {
            self.cacher.write_cache_code(cc)?;
            self.body.read_compile(out, cc)
        })
    }

    fn write_compile(
        &self,
        index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        ctx.fork(Fork::Unbreakable, |cc| {
            self.cacher.write_cache_code(cc)?;
            self.body.write_compile(index, input, exact, cc)
        })
    }
}
