//! Resolution of unresolved expressions into slices.

use rhizome_ral_types::{ConstValue, Constant, TypeId, TypeSystem};

use crate::ast::{ExprUR, InlinePart, TypeRef};
use crate::error::CompileError;
use crate::scope::ScopeContext;
use crate::slice::{
    CastSlice, ChainSlice, CompareOp, CondSlice, Condition, ConstSlice, Expr, FieldSlice,
    InlineExpr, InstanceofSlice, ResolvedPart,
};
use crate::stmt::StmtExpr;
use crate::world::Resolver;

impl TypeRef {
    pub fn resolve(&self, types: &mut TypeSystem) -> Result<TypeId, CompileError> {
        Ok(match self {
            TypeRef::Named(name) => types.by_name(name)?,
            TypeRef::Classifier(c) => types.by_classifier(*c),
            TypeRef::Nullable(inner) => {
                let inner = inner.resolve(types)?;
                types.by_nullable(inner)
            }
            TypeRef::Union(members) => {
                let members = members
                    .iter()
                    .map(|m| m.resolve(types))
                    .collect::<Result<Vec<_>, _>>()?;
                types.by_union(members)
            }
        })
    }
}

fn literal(types: &TypeSystem, value: ConstValue) -> Constant {
    let ty = match &value {
        ConstValue::Int(_) => types.integer(),
        ConstValue::Float(_) => types.float(),
        ConstValue::Str(_) => types.string(),
        ConstValue::Bytes(_) => types.bytes(),
    };
    Constant::new(value, ty)
}

/// Number of the message (or script) `name` on `ty`.
pub(crate) fn lookup_message(
    types: &TypeSystem,
    ty: TypeId,
    name: &str,
    script: bool,
) -> Result<u16, CompileError> {
    let found = if script {
        types.lookup_script_id(ty, name)
    } else {
        types.lookup_message_id(ty, name)
    };
    found.ok_or_else(|| {
        let (ty, name) = (types.name(ty), name.to_string());
        if script {
            CompileError::UnknownScript { ty, name }
        } else {
            CompileError::UnknownMessage { ty, name }
        }
    })
}

impl ExprUR {
    /// The compile-time value of this expression, if it has one.
    ///
    /// Identifiers only count as constants when no variable of that name is
    /// in scope.
    pub fn resolve_const(
        &self,
        scope: &ScopeContext<'_>,
        rv: &mut Resolver<'_>,
    ) -> Result<Option<Constant>, CompileError> {
        let types = &*rv.types;
        Ok(match self {
            ExprUR::Int(v) => Some(literal(types, ConstValue::Int(*v))),
            ExprUR::Float(v) => Some(literal(types, ConstValue::Float(*v))),
            ExprUR::Str(v) => Some(literal(types, ConstValue::Str(v.clone()))),
            ExprUR::Bytes(v) => Some(literal(types, ConstValue::Bytes(v.clone()))),
            ExprUR::Id(name) if !scope.is_bound(name) => types.lookup_const(name).cloned(),
            ExprUR::Group(items) if items.len() == 1 => items[0].resolve_const(scope, rv)?,
            ExprUR::MessageId { ty, name, script } => {
                let ty = ty.resolve(rv.types)?;
                let id = lookup_message(rv.types, ty, name, *script)?;
                Some(literal(rv.types, ConstValue::Int(i32::from(id))))
            }
            ExprUR::Chain { op, operands } => {
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    match operand.resolve_const(scope, rv)? {
                        Some(c) => values.push(c.value),
                        None => return Ok(None),
                    }
                }
                let mut values = values.into_iter();
                let Some(mut acc) = values.next() else {
                    return Ok(None);
                };
                for value in values {
                    match op.fold(&acc, &value)? {
                        Some(folded) => acc = folded,
                        None => return Ok(None),
                    }
                }
                Some(literal(rv.types, acc))
            }
            _ => None,
        })
    }

    pub fn resolve(
        &self,
        scope: &ScopeContext<'_>,
        rv: &mut Resolver<'_>,
    ) -> Result<Expr, CompileError> {
        if let Some(constant) = self.resolve_const(scope, rv)? {
            return Ok(ConstSlice::expr(constant));
        }
        match self {
            ExprUR::Int(_)
            | ExprUR::Float(_)
            | ExprUR::Str(_)
            | ExprUR::Bytes(_)
            | ExprUR::MessageId { .. } => {
                Err(CompileError::Invalid("literal did not fold".to_string()))
            }
            ExprUR::Id(name) => scope
                .lookup(name)
                .ok_or_else(|| CompileError::UnknownIdentifier(name.clone())),
            ExprUR::Group(items) => {
                let parts = items
                    .iter()
                    .map(|item| item.resolve(scope, rv))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::group(parts))
            }
            ExprUR::Chain { op, operands } => {
                let operands = operands
                    .iter()
                    .map(|o| o.resolve(scope, rv))
                    .collect::<Result<Vec<_>, _>>()?;
                if operands.len() == 1 {
                    return Ok(operands.into_iter().next().unwrap_or_default());
                }
                Ok(Expr::leaf(ChainSlice::new(rv.types, *op, operands)?))
            }
            ExprUR::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|a| a.resolve(scope, rv))
                    .collect::<Result<Vec<_>, _>>()?;
                let args = Expr::group(args);
                let macros = rv.macros;
                let mac = macros.lookup(name, args.len())?;
                mac.expand(args, scope.script(), rv)
            }
            ExprUR::Field { base, field } => {
                let base = base.resolve(scope, rv)?;
                let ty = base.single_read_type()?;
                rv.types.assert_implicit_cast(ty, rv.types.agent_nullable())?;
                let found = rv.types.lookup_field(ty, field).cloned().ok_or_else(|| {
                    CompileError::UnknownField {
                        ty: rv.types.name(ty),
                        field: field.clone(),
                    }
                })?;
                Ok(Expr::leaf(FieldSlice::new(base, found)))
            }
            ExprUR::Cast { base, ty } => {
                let base = base.resolve(scope, rv)?;
                let ty = ty.resolve(rv.types)?;
                Ok(Expr::leaf(CastSlice::new(base, ty)?))
            }
            ExprUR::Denull(base) => {
                let base = base.resolve(scope, rv)?;
                let ty = base.single_read_type()?;
                let ty = rv.types.by_non_nullable(ty)?;
                Ok(Expr::leaf(CastSlice::new(base, ty)?))
            }
            ExprUR::Compare { .. } | ExprUR::Logic { .. } | ExprUR::Not(_) => {
                let cond = self.resolve_condition(scope, rv)?;
                Ok(Expr::leaf(CondSlice::new(cond, rv.types.boolean())))
            }
            ExprUR::Inline { parts, ty } => {
                let parts = resolve_parts(parts, scope, rv)?;
                let ty = ty.resolve(rv.types)?;
                Ok(Expr::leaf(InlineExpr::new(parts, ty)))
            }
            ExprUR::Instanceof { base, class } => {
                let base = base.resolve(scope, rv)?;
                let types = &*rv.types;
                let ty = base.single_read_type()?;
                types.assert_implicit_cast(ty, types.agent_nullable())?;
                let nullable = types.can_implicitly_cast(types.null(), ty);
                let boolean = types.boolean();
                if class.family != 0 {
                    return Ok(Expr::leaf(InstanceofSlice::new(base, *class, nullable, boolean)));
                }
                // Every agent matches 0 0 0; only null does not.
                if !nullable {
                    return Ok(ConstSlice::expr(Constant::new(ConstValue::Int(1), boolean)));
                }
                let null = scope
                    .lookup("null")
                    .ok_or_else(|| CompileError::UnknownIdentifier("null".to_string()))?;
                let cond = Condition::compare(types, CompareOp::Ne, base, null)?;
                Ok(Expr::leaf(CondSlice::new(cond, boolean)))
            }
            ExprUR::Seq { body, result } => {
                let mut inner = scope.child();
                let body = body
                    .iter()
                    .map(|s| s.resolve(&mut inner, rv))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = result.resolve(&inner, rv)?;
                Ok(Expr::leaf(StmtExpr::new(body, result)))
            }
        }
    }

    /// Resolves this expression as the test of an `if`.
    pub fn resolve_condition(
        &self,
        scope: &ScopeContext<'_>,
        rv: &mut Resolver<'_>,
    ) -> Result<Condition, CompileError> {
        match self {
            ExprUR::Compare { op, left, right } => {
                if let (Some(l), Some(r)) =
                    (left.resolve_const(scope, rv)?, right.resolve_const(scope, rv)?)
                {
                    if let Some(b) = op.eval(&l.value, &r.value) {
                        return Ok(Condition::Const(b));
                    }
                }
                let left = left.resolve(scope, rv)?;
                let right = right.resolve(scope, rv)?;
                Condition::compare(rv.types, *op, left, right)
            }
            ExprUR::Logic { op, left, right } => {
                let left = left.resolve_condition(scope, rv)?;
                let right = right.resolve_condition(scope, rv)?;
                Ok(Condition::logic(*op, left, right))
            }
            ExprUR::Not(inner) => Ok(Condition::negate(inner.resolve_condition(scope, rv)?)),
            other => {
                if let Some(c) = other.resolve_const(scope, rv)? {
                    if let Some(v) = c.value.as_f32() {
                        return Ok(Condition::Const(v != 0.0));
                    }
                }
                let value = other.resolve(scope, rv)?;
                Condition::truthy(rv.types, value)
            }
        }
    }
}

pub(crate) fn resolve_parts(
    parts: &[InlinePart],
    scope: &ScopeContext<'_>,
    rv: &mut Resolver<'_>,
) -> Result<Vec<ResolvedPart>, CompileError> {
    parts
        .iter()
        .map(|part| {
            Ok(match part {
                InlinePart::Text(t) => ResolvedPart::Text(t.clone()),
                InlinePart::Expr(e) => ResolvedPart::Expr(e.resolve(scope, rv)?),
            })
        })
        .collect()
}
