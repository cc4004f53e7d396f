//! Statement resolution and code generation.
//!
//! [`Stmt::resolve`] type-checks a statement against its scope and binds
//! any names it declares; the resulting [`Resolved`] tree is compiled into
//! CAOS by [`Resolved::compile`]. Errors carry the position of the innermost
//! statement that raised them.

use rhizome_ral_types::{ConstValue, Constant, TypeId, TypeSystem};
use tracing::trace;

use crate::ast::{EnumKind, ExprUR, MessageRef, Stmt, StmtKind};
use crate::context::{BreakTarget, CompileContext, Fork, VaHandle, va_name};
use crate::diagnostic::SrcPos;
use crate::error::CompileError;
use crate::resolve::{lookup_message, resolve_parts};
use crate::scope::ScopeContext;
use crate::slice::{
    ChainOp, Condition, ConstSlice, Discard, Expr, FixedVar, ResolvedPart, SliceImpl, VaVar,
    render_parts,
};
use crate::world::Resolver;

/// A local declared by `let`.
#[derive(Debug, Clone)]
pub struct LetVar {
    pub name: String,
    pub handle: VaHandle,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub pos: SrcPos,
    pub kind: ResolvedKind,
}

#[derive(Debug, Clone)]
pub enum ResolvedKind {
    /// A compile-time `if` whose branch was dropped.
    Nop,
    Block {
        body: Vec<Resolved>,
        scoped: bool,
    },
    Let {
        vars: Vec<LetVar>,
        targets: Expr,
        init: Option<Expr>,
    },
    Assign {
        targets: Expr,
        source: Expr,
    },
    ModAssign {
        op: ChainOp,
        target: Expr,
        source: Expr,
        /// Types of the target before the update, of the source, and of the
        /// updated value.
        types: [TypeId; 3],
    },
    Alias {
        name: String,
        target: Expr,
    },
    If {
        cond: Condition,
        then: Box<Resolved>,
        otherwise: Option<Box<Resolved>>,
    },
    Loop(Box<Resolved>),
    Break,
    Continue,
    Enum {
        starter: Vec<ResolvedPart>,
        body: Box<Resolved>,
    },
    Inline(Vec<ResolvedPart>),
}

fn check_assignable(
    rv: &Resolver<'_>,
    source: &Expr,
    targets: &Expr,
) -> Result<(), CompileError> {
    if source.len() != targets.len() {
        return Err(CompileError::Arity {
            expected: targets.len(),
            got: source.len(),
        });
    }
    for i in 0..source.len() {
        rv.types
            .assert_implicit_cast(source.read_type(i)?, targets.write_type(i)?)?;
    }
    Ok(())
}

fn int_const(types: &TypeSystem, value: i32) -> Expr {
    ConstSlice::expr(Constant::new(ConstValue::Int(value), types.integer()))
}

/// The number a send or call refers to, as an integer expression.
fn message_number(
    message: &MessageRef,
    receiver: TypeId,
    script: bool,
    scope: &ScopeContext<'_>,
    rv: &mut Resolver<'_>,
) -> Result<Expr, CompileError> {
    match message {
        MessageRef::Name(name) => {
            let id = lookup_message(rv.types, receiver, name, script)?;
            Ok(int_const(rv.types, i32::from(id)))
        }
        MessageRef::Id(expr) => {
            let id = expr.resolve(scope, rv)?;
            rv.types
                .assert_implicit_cast(id.single_read_type()?, rv.types.integer())?;
            Ok(id)
        }
    }
}

/// The two parameters of a send or call, padded with zeroes.
fn message_params(
    params: &[ExprUR],
    scope: &ScopeContext<'_>,
    rv: &mut Resolver<'_>,
) -> Result<Expr, CompileError> {
    let params = params
        .iter()
        .map(|p| p.resolve(scope, rv))
        .collect::<Result<Vec<_>, _>>()?;
    let params = Expr::group(params);
    if params.len() > 2 {
        return Err(CompileError::Arity {
            expected: 2,
            got: params.len(),
        });
    }
    let zeroes = (params.len()..2).map(|_| int_const(rv.types, 0));
    Ok(Expr::group(std::iter::once(params).chain(zeroes)))
}

impl Stmt {
    pub fn resolve(
        &self,
        scope: &mut ScopeContext<'_>,
        rv: &mut Resolver<'_>,
    ) -> Result<Resolved, CompileError> {
        let kind = self.resolve_kind(scope, rv).map_err(|e| {
            if self.pos.is_known() {
                e.at(&self.pos)
            } else {
                e
            }
        })?;
        Ok(Resolved {
            pos: self.pos.clone(),
            kind,
        })
    }

    fn resolve_kind(
        &self,
        scope: &mut ScopeContext<'_>,
        rv: &mut Resolver<'_>,
    ) -> Result<ResolvedKind, CompileError> {
        match &self.kind {
            StmtKind::Block { body, scoped } => {
                let body = if *scoped {
                    let mut inner = scope.child();
                    resolve_all(body, &mut inner, rv)?
                } else {
                    resolve_all(body, scope, rv)?
                };
                Ok(ResolvedKind::Block {
                    body,
                    scoped: *scoped,
                })
            }
            StmtKind::Let { names, types, init } => {
                let init = init.as_ref().map(|e| e.resolve(scope, rv)).transpose()?;
                if let Some(init) = &init {
                    if init.len() != names.len() {
                        return Err(CompileError::Arity {
                            expected: names.len(),
                            got: init.len(),
                        });
                    }
                }
                let mut vars = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    let declared = match types.get(i).and_then(Option::as_ref) {
                        Some(t) => Some(t.resolve(rv.types)?),
                        None => None,
                    };
                    let ty = match (declared, &init) {
                        (Some(ty), Some(init)) => {
                            rv.types.assert_implicit_cast(init.read_type(i)?, ty)?;
                            ty
                        }
                        (Some(ty), None) => ty,
                        (None, Some(init)) => init.read_type(i)?,
                        (None, None) => {
                            return Err(CompileError::Invalid(format!(
                                "variable {name} has neither a type nor an initializer"
                            )));
                        }
                    };
                    vars.push(LetVar {
                        name: name.clone(),
                        handle: rv.fresh_handle(),
                        ty,
                    });
                }
                let targets = Expr::group(
                    vars.iter()
                        .map(|v| Expr::leaf(VaVar::new(v.handle, v.ty, true))),
                );
                for (i, var) in vars.iter().enumerate() {
                    scope.bind(var.name.clone(), targets.slice(i, 1)?);
                }
                Ok(ResolvedKind::Let {
                    vars,
                    targets,
                    init,
                })
            }
            StmtKind::Assign { targets, source } => {
                let source = source.resolve(scope, rv)?;
                let targets = match targets {
                    Some(t) => t.resolve(scope, rv)?,
                    None => Expr::leaf(Discard::new(source.len(), rv.types.any())),
                };
                check_assignable(rv, &source, &targets)?;
                Ok(ResolvedKind::Assign { targets, source })
            }
            StmtKind::ModAssign { op, target, source } => {
                let target = target.resolve(scope, rv)?;
                let source = source.resolve(scope, rv)?;
                let before = target.single_read_type()?;
                let slot = target.write_type(0)?;
                let rt = source.single_read_type()?;
                let after = op.step_type(rv.types, before, rt)?;
                rv.types.assert_implicit_cast(after, slot)?;
                Ok(ResolvedKind::ModAssign {
                    op: *op,
                    target,
                    source,
                    types: [before, rt, after],
                })
            }
            StmtKind::Alias { name, target } => {
                let target = target.resolve(scope, rv)?;
                scope.bind(name.clone(), target.clone());
                Ok(ResolvedKind::Alias {
                    name: name.clone(),
                    target,
                })
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let sub = scope.child();
                let cond = cond.resolve_condition(&sub, rv)?;
                if let Some(taken) = cond.constant() {
                    trace!(taken, "constant if");
                    let branch = if taken { Some(then) } else { otherwise.as_ref() };
                    return match branch {
                        Some(branch) => {
                            let mut inner = sub.child();
                            Ok(branch.resolve(&mut inner, rv)?.kind)
                        }
                        None => Ok(ResolvedKind::Nop),
                    };
                }
                let then = {
                    let mut inner = sub.child();
                    then.resolve(&mut inner, rv)?
                };
                let otherwise = match otherwise {
                    Some(branch) => {
                        let mut inner = sub.child();
                        Some(Box::new(branch.resolve(&mut inner, rv)?))
                    }
                    None => None,
                };
                Ok(ResolvedKind::If {
                    cond,
                    then: Box::new(then),
                    otherwise,
                })
            }
            StmtKind::Loop { body } => {
                let mut inner = scope.loop_child();
                Ok(ResolvedKind::Loop(Box::new(body.resolve(&mut inner, rv)?)))
            }
            StmtKind::Break => {
                if !scope.breakable() {
                    return Err(CompileError::CannotBreak);
                }
                Ok(ResolvedKind::Break)
            }
            StmtKind::Continue => {
                if !scope.breakable() {
                    return Err(CompileError::CannotContinue);
                }
                Ok(ResolvedKind::Continue)
            }
            StmtKind::Enum {
                kind,
                agent,
                params,
                body,
            } => {
                let agent = agent.resolve(rv.types)?;
                let mut inner = scope.loop_child();
                let params = params
                    .iter()
                    .map(|p| p.resolve(&inner, rv))
                    .collect::<Result<Vec<_>, _>>()?;
                let params = Expr::group(params);
                let starter = enum_starter(*kind, agent, params, rv)?;
                inner.bind("targ", Expr::leaf(FixedVar::targ(agent)));
                let body = body.resolve(&mut inner, rv)?;
                drop(inner);
                scope.bind("targ", Expr::leaf(FixedVar::targ(rv.types.agent_nullable())));
                Ok(ResolvedKind::Enum {
                    starter,
                    body: Box::new(body),
                })
            }
            StmtKind::Inline { parts } => Ok(ResolvedKind::Inline(resolve_parts(parts, scope, rv)?)),
            StmtKind::Send {
                agent,
                message,
                params,
                after,
            } => {
                let agent = agent.resolve(scope, rv)?;
                let receiver = agent.single_read_type()?;
                rv.types.assert_implicit_cast(receiver, rv.types.agent())?;
                let id = message_number(message, receiver, false, scope, rv)?;
                if params.is_empty() && after.is_none() {
                    return Ok(ResolvedKind::Inline(vec![
                        ResolvedPart::Text("mesg writ ".to_string()),
                        ResolvedPart::Expr(Expr::group([agent, id])),
                    ]));
                }
                let params = message_params(params, scope, rv)?;
                let delay = match after {
                    Some(after) => {
                        let delay = after.resolve(scope, rv)?;
                        rv.types
                            .assert_implicit_cast(delay.single_read_type()?, rv.types.integer())?;
                        delay
                    }
                    None => int_const(rv.types, 0),
                };
                Ok(ResolvedKind::Inline(vec![
                    ResolvedPart::Text("mesg wrt+ ".to_string()),
                    ResolvedPart::Expr(Expr::group([agent, id, params, delay])),
                ]))
            }
            StmtKind::Call { script, params } => {
                let ownr = scope.script().ownr;
                let id = message_number(script, ownr, true, scope, rv)?;
                let params = message_params(params, scope, rv)?;
                Ok(ResolvedKind::Inline(vec![
                    ResolvedPart::Text("call ".to_string()),
                    ResolvedPart::Expr(Expr::group([id, params])),
                ]))
            }
        }
    }
}

fn resolve_all(
    body: &[Stmt],
    scope: &mut ScopeContext<'_>,
    rv: &mut Resolver<'_>,
) -> Result<Vec<Resolved>, CompileError> {
    body.iter().map(|s| s.resolve(scope, rv)).collect()
}

/// The line that opens an enumeration, such as `enum 2 15 0`.
fn enum_starter(
    kind: EnumKind,
    agent: TypeId,
    params: Expr,
    rv: &Resolver<'_>,
) -> Result<Vec<ResolvedPart>, CompileError> {
    let types = &*rv.types;
    types.assert_implicit_cast(agent, types.agent())?;
    let head = format!("{} ", kind.caos());
    match (kind, params.len()) {
        (EnumKind::Econ, 1) => {
            types.assert_implicit_cast(params.read_type(0)?, types.agent())?;
            Ok(vec![ResolvedPart::Text(head), ResolvedPart::Expr(params)])
        }
        (EnumKind::Econ, n) => Err(CompileError::Arity {
            expected: 1,
            got: n,
        }),
        (_, 0) => {
            let classifier = types.classifier_of(agent).ok_or_else(|| {
                CompileError::Invalid(format!(
                    "cannot {} over {}: it is not a classifier type",
                    kind.caos(),
                    types.name(agent)
                ))
            })?;
            Ok(vec![ResolvedPart::Text(format!("{head}{}", classifier.to_caos()))])
        }
        (_, 3) => {
            for i in 0..3 {
                types.assert_implicit_cast(params.read_type(i)?, types.integer())?;
            }
            Ok(vec![ResolvedPart::Text(head), ResolvedPart::Expr(params)])
        }
        (_, n) => Err(CompileError::Arity {
            expected: 3,
            got: n,
        }),
    }
}

impl Resolved {
    pub fn compile(&self, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if ctx.config.source_comments && self.pos.is_known() {
            ctx.writer.queue_comment(format!("@ {}", self.pos));
        }
        self.compile_kind(ctx).map_err(|e| {
            if self.pos.is_known() {
                e.at(&self.pos)
            } else {
                e
            }
        })
    }

    fn compile_kind(&self, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        match &self.kind {
            ResolvedKind::Nop => Ok(()),
            ResolvedKind::Block { body, scoped } => {
                if *scoped {
                    ctx.scoped(|cc| compile_all(body, cc))
                } else {
                    compile_all(body, ctx)
                }
            }
            ResolvedKind::Let {
                vars,
                targets,
                init,
            } => {
                // The locals outlive this statement: they belong to the
                // enclosing block.
                for var in vars {
                    let slot = ctx.bind_va(var.handle)?;
                    if ctx.config.var_comments {
                        let comment =
                            format!("{}: {} {}", va_name(slot), ctx.types.name(var.ty), var.name);
                        ctx.writer.write_comment(comment);
                    }
                }
                match init {
                    Some(init) => ctx.scoped(|cc| init.read_compile(targets, cc)),
                    None => Ok(()),
                }
            }
            ResolvedKind::Assign { targets, source } => {
                ctx.scoped(|cc| source.read_compile(targets, cc))
            }
            ResolvedKind::ModAssign {
                op,
                target,
                source,
                types: [before, rt, after],
            } => ctx.scoped(|cc| {
                // Targets without a writable inline form are updated in a
                // copy and stored back.
                let (code, copied) = match target.inline_code(0, true, cc)? {
                    Some(code) => (code, false),
                    None => {
                        let tmp = cc.temp(*before)?;
                        target.read_compile(&tmp, cc)?;
                        (inline_name(&tmp, cc)?, true)
                    }
                };
                let r = match source.inline_code(0, false, cc)? {
                    Some(r) => r,
                    None => {
                        let tmp = cc.temp(*rt)?;
                        source.read_compile(&tmp, cc)?;
                        inline_name(&tmp, cc)?
                    }
                };
                for line in op.instructions(cc.types, *before, *rt, &code, &r) {
                    cc.writer.write_line(line);
                }
                if copied {
                    target.write_compile(0, &code, *after, cc)?;
                }
                Ok(())
            }),
            ResolvedKind::Alias { name, target } => {
                if ctx.config.var_comments {
                    let comment = match target.inline_all(ctx)? {
                        Some(codes) => format!("{}: alias {name}", codes.join(" ")),
                        None => format!("alias {name}"),
                    };
                    ctx.writer.write_comment(comment);
                }
                Ok(())
            }
            ResolvedKind::If {
                cond,
                then,
                otherwise,
            } => ctx.scoped(|cc| {
                let test = cond.compile(cc, false)?;
                cc.writer.write_code(0, format!("doif {test}"), 1);
                cc.scoped(|bc| then.compile(bc))?;
                if let Some(otherwise) = otherwise {
                    cc.writer.write_code(-1, "else", 1);
                    cc.scoped(|bc| otherwise.compile(bc))?;
                }
                cc.writer.write_code(-1, "endi", 0);
                Ok(())
            }),
            ResolvedKind::Loop(body) => {
                let top = ctx.next_label();
                let end = ctx.next_label();
                ctx.writer.write_code(0, format!("goto {top}"), 0);
                ctx.writer.write_code(0, format!("subr {top}"), 1);
                let target = BreakTarget {
                    label: end.clone(),
                    flag: None,
                    continue_label: top.clone(),
                };
                ctx.fork(Fork::Breakable(target), |cc| body.compile(cc))?;
                ctx.writer.write_code(-1, format!("goto {top}"), 0);
                ctx.writer.write_code(0, format!("subr {end}"), 0);
                Ok(())
            }
            ResolvedKind::Break => {
                let target = ctx.break_target().cloned().ok_or(CompileError::CannotBreak)?;
                if let Some(flag) = &target.flag {
                    ctx.writer.write_code(0, format!("setv {flag} 1"), 0);
                }
                ctx.writer.write_code(0, format!("goto {}", target.label), 0);
                Ok(())
            }
            ResolvedKind::Continue => {
                let target = ctx
                    .break_target()
                    .ok_or(CompileError::CannotContinue)?;
                let line = format!("goto {}", target.continue_label);
                ctx.writer.write_code(0, line, 0);
                Ok(())
            }
            ResolvedKind::Enum { starter, body } => ctx.scoped(|cc| {
                let end = cc.next_label();
                let handle = cc.fresh_handle();
                let flag = va_name(cc.bind_va(handle)?);
                if cc.config.var_comments {
                    cc.writer.write_comment(format!("{flag}: integer break flag"));
                }
                cc.writer.write_code(0, format!("setv {flag} 0"), 0);
                let starter = render_parts(starter, cc)?;
                cc.writer.write_code(0, starter, 1);
                cc.writer.write_code(0, format!("doif {flag} eq 0"), 1);
                // `subr end` sits just before `next`, so jumping there
                // without raising the flag moves on to the next agent.
                let target = BreakTarget {
                    label: end.clone(),
                    flag: Some(flag.clone()),
                    continue_label: end.clone(),
                };
                cc.fork(Fork::Breakable(target), |bc| body.compile(bc))?;
                cc.writer.write_code(-1, "endi", 0);
                cc.writer.write_code(0, format!("goto {end}"), 0);
                cc.writer.write_code(0, format!("subr {end}"), 0);
                cc.writer.write_code(-1, "next", 0);
                Ok(())
            }),
            ResolvedKind::Inline(parts) => ctx.scoped(|cc| {
                let text = render_parts(parts, cc)?;
                cc.writer.write_code(0, text, 0);
                Ok(())
            }),
        }
    }
}

fn compile_all(body: &[Resolved], ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
    body.iter().try_for_each(|s| s.compile(ctx))
}

fn inline_name(var: &Expr, ctx: &CompileContext<'_>) -> Result<String, CompileError> {
    var.inline_code(0, false, ctx)?
        .ok_or_else(|| CompileError::NotReadable(format!("{var:?}")))
}

/// Statements run for their effects before a result is read.
#[derive(Debug)]
pub struct StmtExpr {
    body: Vec<Resolved>,
    result: Expr,
}

impl StmtExpr {
    pub fn new(body: Vec<Resolved>, result: Expr) -> Self {
        Self { body, result }
    }
}

impl SliceImpl for StmtExpr {
    fn len(&self) -> usize {
        self.result.len()
    }

    fn read_type(&self, index: usize) -> Option<TypeId> {
        self.result.read_type(index).ok()
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        ctx.scoped(|cc| {
            compile_all(&self.body, cc)?;
            self.result.read_compile(out, cc)
        })
    }
}
