use rhizome_ral_types::{ConstValue, Constant, Major, TypeId, TypeSystem};
use serde::{Deserialize, Serialize};

use super::{ConstSlice, Expr, SliceImpl};
use crate::context::CompileContext;
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn caos(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Gt => "gt",
            CompareOp::Le => "le",
            CompareOp::Ge => "ge",
        }
    }

    pub fn invert(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Ge => CompareOp::Lt,
        }
    }

    /// Evaluates the comparison on two constants, when that is meaningful.
    pub fn eval(self, a: &ConstValue, b: &ConstValue) -> Option<bool> {
        use std::cmp::Ordering;
        let ordering = match (a, b) {
            (ConstValue::Int(l), ConstValue::Int(r)) => l.cmp(r),
            (ConstValue::Str(l), ConstValue::Str(r)) => {
                return match self {
                    CompareOp::Eq => Some(l == r),
                    CompareOp::Ne => Some(l != r),
                    _ => None,
                };
            }
            _ => a.as_f32()?.partial_cmp(&b.as_f32()?)?,
        };
        Some(match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn caos(self) -> &'static str {
        match self {
            LogicOp::And => "and",
            LogicOp::Or => "or",
        }
    }

    pub fn invert(self) -> Self {
        match self {
            LogicOp::And => LogicOp::Or,
            LogicOp::Or => LogicOp::And,
        }
    }
}

/// A boolean test rendered as the argument of `doif`.
#[derive(Debug, Clone)]
pub enum Condition {
    Const(bool),
    Compare {
        op: CompareOp,
        left: Expr,
        right: Expr,
    },
    Logic {
        op: LogicOp,
        left: Box<Condition>,
        right: Box<Condition>,
    },
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(
        types: &TypeSystem,
        op: CompareOp,
        left: Expr,
        right: Expr,
    ) -> Result<Self, CompileError> {
        let lt = left.single_read_type()?;
        let rt = right.single_read_type()?;
        let (lm, rm) = (types.major(lt), types.major(rt));
        if lm != Major::Unknown && rm != Major::Unknown && lm != rm {
            return Err(CompileError::MajorMismatch {
                left: types.name(lt),
                right: types.name(rt),
            });
        }
        Ok(Condition::Compare { op, left, right })
    }

    /// Coerces a numeric value to `value ne 0`.
    pub fn truthy(types: &TypeSystem, value: Expr) -> Result<Self, CompileError> {
        let ty = value.single_read_type()?;
        types.assert_implicit_cast(ty, types.number())?;
        let zero = ConstSlice::expr(Constant::new(ConstValue::Int(0), types.integer()));
        Ok(Condition::Compare {
            op: CompareOp::Ne,
            left: value,
            right: zero,
        })
    }

    pub fn logic(op: LogicOp, left: Condition, right: Condition) -> Self {
        match (left.constant(), right.constant()) {
            (Some(l), Some(r)) => Condition::Const(match op {
                LogicOp::And => l && r,
                LogicOp::Or => l || r,
            }),
            _ => Condition::Logic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    pub fn negate(inner: Condition) -> Self {
        match inner {
            Condition::Const(b) => Condition::Const(!b),
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }

    pub fn constant(&self) -> Option<bool> {
        match self {
            Condition::Const(b) => Some(*b),
            _ => None,
        }
    }

    /// Emits any code needed to evaluate the operands and returns the text
    /// of the test. With `invert` the returned test is the negation.
    pub fn compile(
        &self,
        ctx: &mut CompileContext<'_>,
        invert: bool,
    ) -> Result<String, CompileError> {
        match self {
            Condition::Const(b) => Ok(if *b != invert { "1 eq 1" } else { "1 eq 0" }.to_string()),
            Condition::Compare { op, left, right } => {
                let op = if invert { op.invert() } else { *op };
                let l = operand(left, ctx)?;
                let r = operand(right, ctx)?;
                Ok(format!("{l} {} {r}", op.caos()))
            }
            Condition::Not(inner) => inner.compile(ctx, !invert),
            Condition::Logic { op, left, right } => {
                let op = if invert { op.invert() } else { *op };
                let l = left.clause(op, ctx, invert)?;
                let r = right.clause(op, ctx, invert)?;
                Ok(format!("{l} {} {r}", op.caos()))
            }
        }
    }

    /// Writes `1` or `0` into `out` depending on the condition.
    pub fn write_value(
        &self,
        out: &Expr,
        ctx: &mut CompileContext<'_>,
        invert: bool,
    ) -> Result<(), CompileError> {
        let boolean = ctx.types.boolean();
        if let Some(b) = self.constant() {
            let value = if b != invert { "1" } else { "0" };
            return out.write_compile(0, value, boolean, ctx);
        }
        ctx.scoped(|cc| {
            let test = self.compile(cc, invert)?;
            cc.writer.write_code(0, format!("doif {test}"), 1);
            out.write_compile(0, "1", boolean, cc)?;
            cc.writer.write_code(-1, "else", 1);
            out.write_compile(0, "0", boolean, cc)?;
            cc.writer.write_code(-1, "endi", 0);
            Ok(())
        })
    }

    fn effective_logic(&self, invert: bool) -> Option<LogicOp> {
        match self {
            Condition::Logic { op, .. } => Some(if invert { op.invert() } else { *op }),
            Condition::Not(inner) => inner.effective_logic(!invert),
            _ => None,
        }
    }

    /// A sub-test of a logical chain. CAOS has no grouping, so a nested
    /// chain of the other operator is evaluated into a temporary first.
    fn clause(
        &self,
        parent: LogicOp,
        ctx: &mut CompileContext<'_>,
        invert: bool,
    ) -> Result<String, CompileError> {
        match self.effective_logic(invert) {
            Some(op) if op != parent => {
                let tmp = ctx.temp(ctx.types.boolean())?;
                self.write_value(&tmp, ctx, invert)?;
                let name = tmp
                    .inline_code(0, false, ctx)?
                    .ok_or_else(|| CompileError::NotReadable(format!("{tmp:?}")))?;
                Ok(format!("{name} eq 1"))
            }
            _ => self.compile(ctx, invert),
        }
    }
}

fn operand(expr: &Expr, ctx: &mut CompileContext<'_>) -> Result<String, CompileError> {
    if let Some(code) = expr.inline_code(0, false, ctx)? {
        return Ok(code);
    }
    let tmp = ctx.temp(expr.single_read_type()?)?;
    expr.read_compile(&tmp, ctx)?;
    tmp.inline_code(0, false, ctx)?
        .ok_or_else(|| CompileError::NotReadable(format!("{tmp:?}")))
}

/// A condition used as a value.
#[derive(Debug, Clone)]
pub struct CondSlice {
    cond: Condition,
    ty: TypeId,
}

impl CondSlice {
    pub fn new(cond: Condition, ty: TypeId) -> Self {
        Self { cond, ty }
    }

    pub fn condition(&self) -> &Condition {
        &self.cond
    }
}

impl SliceImpl for CondSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        self.cond.write_value(out, ctx, false)
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        _ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        Ok(match (write, self.cond.constant()) {
            (false, Some(b)) => Some(if b { "1" } else { "0" }.to_string()),
            _ => None,
        })
    }
}
