//! Lexical scopes used during resolution.

use std::collections::HashMap;

use rhizome_ral_types::{TypeId, TypeSystem};

use crate::slice::{Discard, Expr, FixedVar};

/// Types of the implicit variables of one script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptContext {
    pub ownr: TypeId,
    pub from: TypeId,
    pub p1: TypeId,
    pub p2: TypeId,
}

impl ScriptContext {
    pub fn new(types: &TypeSystem, ownr: TypeId) -> Self {
        Self {
            ownr,
            from: types.agent_nullable(),
            p1: types.any(),
            p2: types.any(),
        }
    }
}

/// Name bindings of one lexical scope, chained to its parent.
///
/// Lookups search innermost first. A child is created by borrowing its
/// parent, so bindings made in it disappear when it goes out of scope.
#[derive(Debug)]
pub struct ScopeContext<'p> {
    parent: Option<&'p ScopeContext<'p>>,
    script: ScriptContext,
    bindings: HashMap<String, Expr>,
    breakable: bool,
}

impl<'p> ScopeContext<'p> {
    /// The outermost scope of a script (or of a macro body), holding the
    /// built-in variables. `break` is not allowed here.
    pub fn root(types: &TypeSystem, script: ScriptContext) -> Self {
        let agent = types.agent_nullable();
        let any = types.any();
        let mut bindings = HashMap::new();
        let builtins = [
            ("ownr", Expr::leaf(FixedVar::ownr(script.ownr))),
            ("from", Expr::leaf(FixedVar::new("from", script.from, false))),
            ("_it_", Expr::leaf(FixedVar::new("_it_", agent, false))),
            ("_p1_", Expr::leaf(FixedVar::new("_p1_", script.p1, false))),
            ("_p2_", Expr::leaf(FixedVar::new("_p2_", script.p2, false))),
            ("null", Expr::leaf(FixedVar::new("null", types.null(), false))),
            ("targ", Expr::leaf(FixedVar::targ(agent))),
            ("_", Expr::leaf(Discard::new(1, any))),
        ];
        for (name, expr) in builtins {
            bindings.insert(name.to_string(), expr);
        }
        Self {
            parent: None,
            script,
            bindings,
            breakable: false,
        }
    }

    /// A nested scope that inherits whether `break` is allowed.
    pub fn child(&self) -> ScopeContext<'_> {
        ScopeContext {
            parent: Some(self),
            script: self.script,
            bindings: HashMap::new(),
            breakable: self.breakable,
        }
    }

    /// A nested scope in which `break` targets the enclosing loop.
    pub fn loop_child(&self) -> ScopeContext<'_> {
        ScopeContext {
            breakable: true,
            ..self.child()
        }
    }

    pub fn script(&self) -> ScriptContext {
        self.script
    }

    pub fn breakable(&self) -> bool {
        self.breakable
    }

    pub fn bind(&mut self, name: impl Into<String>, expr: Expr) {
        self.bindings.insert(name.into(), expr);
    }

    pub fn lookup(&self, name: &str) -> Option<Expr> {
        match self.bindings.get(name) {
            Some(expr) => Some(expr.clone()),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name) || self.parent.is_some_and(|p| p.is_bound(name))
    }
}
