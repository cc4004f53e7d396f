use rhizome_ral_types::{ConstValue, TypeId, TypeSystem};
use serde::{Deserialize, Serialize};

use super::{Expr, SliceImpl, SpecialInline};
use crate::context::CompileContext;
use crate::error::CompileError;

/// Left-associative binary operators applied across a chain of operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Bitwise or.
    Or,
    /// Bitwise and.
    And,
}

impl ChainOp {
    fn numeric_instruction(self) -> &'static str {
        match self {
            ChainOp::Add => "addv",
            ChainOp::Sub => "subv",
            ChainOp::Mul => "mulv",
            ChainOp::Div => "divv",
            ChainOp::Or => "orrv",
            ChainOp::And => "andv",
        }
    }

    /// Type of `lt op rt`.
    pub fn step_type(
        self,
        types: &TypeSystem,
        lt: TypeId,
        rt: TypeId,
    ) -> Result<TypeId, CompileError> {
        let cast = |from: TypeId, to: TypeId| types.assert_implicit_cast(from, to);
        match self {
            ChainOp::Add => {
                let l_str = types.can_implicitly_cast(lt, types.string());
                let r_str = types.can_implicitly_cast(rt, types.string());
                if !l_str {
                    cast(lt, types.number())?;
                }
                if !r_str {
                    cast(rt, types.number())?;
                }
                if l_str || r_str {
                    Ok(types.string())
                } else {
                    Ok(number_type(types, lt, rt))
                }
            }
            ChainOp::Sub | ChainOp::Mul | ChainOp::Div => {
                cast(lt, types.number())?;
                cast(rt, types.number())?;
                Ok(number_type(types, lt, rt))
            }
            ChainOp::Or | ChainOp::And => {
                cast(lt, types.integer())?;
                cast(rt, types.integer())?;
                Ok(types.integer())
            }
        }
    }

    /// Folds two constants. `None` means the pair does not fold and is left
    /// for type checking to reject or for codegen to emit.
    pub fn fold(
        self,
        a: &ConstValue,
        b: &ConstValue,
    ) -> Result<Option<ConstValue>, CompileError> {
        use ConstValue::{Float, Int, Str};
        Ok(match (self, a, b) {
            (ChainOp::Add, Str(l), r @ (Int(_) | Float(_) | Str(_))) => {
                Some(Str(format!("{l}{}", r.to_plain_string())))
            }
            (ChainOp::Add, l @ (Int(_) | Float(_)), Str(r)) => {
                Some(Str(format!("{}{r}", l.to_plain_string())))
            }
            (_, Int(l), Int(r)) => match self {
                ChainOp::Add => Some(Int(l.wrapping_add(*r))),
                ChainOp::Sub => Some(Int(l.wrapping_sub(*r))),
                ChainOp::Mul => Some(Int(l.wrapping_mul(*r))),
                ChainOp::Div if *r == 0 => return Err(CompileError::DivisionByZero),
                ChainOp::Div => Some(Int(l.wrapping_div(*r))),
                ChainOp::Or => Some(Int(l | r)),
                ChainOp::And => Some(Int(l & r)),
            },
            (ChainOp::Or | ChainOp::And, _, _) => None,
            (_, l, r) => match (l.as_f32(), r.as_f32()) {
                (Some(l), Some(r)) => match self {
                    ChainOp::Add => Some(Float(l + r)),
                    ChainOp::Sub => Some(Float(l - r)),
                    ChainOp::Mul => Some(Float(l * r)),
                    ChainOp::Div if r == 0.0 => return Err(CompileError::DivisionByZero),
                    ChainOp::Div => Some(Float(l / r)),
                    ChainOp::Or | ChainOp::And => None,
                },
                _ => None,
            },
        })
    }

    /// Lines applying `target op r`, where `target` currently holds a value
    /// of type `lt`.
    pub(crate) fn instructions(
        self,
        types: &TypeSystem,
        lt: TypeId,
        rt: TypeId,
        target: &str,
        r: &str,
    ) -> Vec<String> {
        if self != ChainOp::Add {
            return vec![format!("{} {target} {r}", self.numeric_instruction())];
        }
        let l_str = types.can_implicitly_cast(lt, types.string());
        let r_str = types.can_implicitly_cast(rt, types.string());
        match (l_str, r_str) {
            (false, false) => vec![format!("addv {target} {r}")],
            (false, true) => vec![
                format!("sets {target} vtos {target}"),
                format!("adds {target} {r}"),
            ],
            (true, false) => vec![format!("adds {target} vtos {r}")],
            (true, true) => vec![format!("adds {target} {r}")],
        }
    }
}

/// `integer` if both sides are integers, `float` if either is a float,
/// otherwise the generic `number`.
pub(crate) fn number_type(types: &TypeSystem, lt: TypeId, rt: TypeId) -> TypeId {
    let integer = types.integer();
    let float = types.float();
    if types.can_implicitly_cast(lt, integer) && types.can_implicitly_cast(rt, integer) {
        integer
    } else if types.can_implicitly_cast(lt, float) || types.can_implicitly_cast(rt, float) {
        float
    } else {
        types.number()
    }
}

/// An operator chain that did not fold at resolve time.
#[derive(Debug, Clone)]
pub struct ChainSlice {
    op: ChainOp,
    operands: Vec<Expr>,
    /// `steps[i]` is the type after applying operand `i + 1`.
    steps: Vec<TypeId>,
    first: TypeId,
}

impl ChainSlice {
    /// Type-checks a chain of single-slot operands.
    pub fn new(
        types: &TypeSystem,
        op: ChainOp,
        operands: Vec<Expr>,
    ) -> Result<Self, CompileError> {
        let Some((first, rest)) = operands.split_first() else {
            return Err(CompileError::Invalid("empty operator chain".to_string()));
        };
        let first = first.single_read_type()?;
        let mut lt = first;
        let mut steps = Vec::with_capacity(rest.len());
        for operand in rest {
            lt = op.step_type(types, lt, operand.single_read_type()?)?;
            steps.push(lt);
        }
        Ok(Self {
            op,
            operands,
            steps,
            first,
        })
    }

    pub fn result_type(&self) -> TypeId {
        self.steps.last().copied().unwrap_or(self.first)
    }

    /// Whether `target` can be computed in place without clobbering a later
    /// operand.
    fn can_target(&self, target: &str, ctx: &CompileContext<'_>) -> Result<bool, CompileError> {
        for operand in &self.operands[1..] {
            match operand.inline_code(0, false, ctx)? {
                Some(code) if !code.contains(target) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn compute_into(
        &self,
        out: &Expr,
        target: &str,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        let first = self.operands[0].inline_code(0, false, ctx)?;
        if first.as_deref() != Some(target) {
            self.operands[0].read_compile(out, ctx)?;
        }
        let mut lt = self.first;
        let mut scratch: Option<Expr> = None;
        for (operand, step) in self.operands[1..].iter().zip(&self.steps) {
            let rt = operand.single_read_type()?;
            let r = match operand.inline_code(0, false, ctx)? {
                Some(code) => code,
                None => {
                    let tmp = match &scratch {
                        Some(tmp) => tmp.clone(),
                        None => {
                            let tmp = ctx.temp(ctx.types.any())?;
                            scratch = Some(tmp.clone());
                            tmp
                        }
                    };
                    operand.read_compile(&tmp, ctx)?;
                    tmp.inline_code(0, false, ctx)?
                        .ok_or_else(|| CompileError::NotReadable(format!("{tmp:?}")))?
                }
            };
            for line in self.op.instructions(ctx.types, lt, rt, target, &r) {
                ctx.writer.write_line(line);
            }
            lt = *step;
        }
        Ok(())
    }
}

impl SliceImpl for ChainSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.result_type())
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if out.special_inline(0, ctx) == SpecialInline::Va {
            if let Some(target) = out.inline_code(0, true, ctx)? {
                if self.can_target(&target, ctx)? {
                    return ctx.scoped(|cc| self.compute_into(out, &target, cc));
                }
            }
        }
        ctx.scoped(|cc| {
            let tmp = cc.temp(self.result_type())?;
            let target = tmp
                .inline_code(0, true, cc)?
                .ok_or_else(|| CompileError::NotWritable(format!("{tmp:?}")))?;
            self.compute_into(&tmp, &target, cc)?;
            tmp.read_compile(out, cc)
        })
    }
}
