use rhizome_ral_types::{Classifier, Field, TypeId};

use super::{Expr, FixedVar, SliceImpl, SpecialInline, store};
use crate::context::CompileContext;
use crate::error::CompileError;

/// A per-agent variable reached through an agent expression.
///
/// Through `ownr` the field is `mvNN`. Any other base is reached as `ovNN`:
/// a `targ` base directly, anything else by pointing `targ` at it for the
/// duration of the access, with the previous `targ` saved and restored.
///
/// Only `mvNN` is ever handed out as inline read text, since the reader may
/// re-point `targ` before using it.
#[derive(Debug, Clone)]
pub struct FieldSlice {
    base: Expr,
    field: Field,
}

impl FieldSlice {
    pub fn new(base: Expr, field: Field) -> Self {
        Self { base, field }
    }

    fn read_direct(&self, ctx: &CompileContext<'_>) -> Option<String> {
        match self.base.special_inline(0, ctx) {
            SpecialInline::Ownr => Some(format!("mv{:02}", self.field.slot)),
            _ => None,
        }
    }

    fn write_direct(&self, ctx: &CompileContext<'_>) -> Option<String> {
        match self.base.special_inline(0, ctx) {
            SpecialInline::Ownr => Some(format!("mv{:02}", self.field.slot)),
            SpecialInline::Targ => Some(self.through_targ()),
            _ => None,
        }
    }

    fn through_targ(&self) -> String {
        format!("ov{:02}", self.field.slot)
    }

    fn with_targ(
        &self,
        ctx: &mut CompileContext<'_>,
        f: impl FnOnce(&mut CompileContext<'_>) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        with_targ(&self.base, ctx, f)
    }
}

/// Points `targ` at `agent`, runs `f`, then restores `targ`.
fn with_targ(
    agent: &Expr,
    ctx: &mut CompileContext<'_>,
    f: impl FnOnce(&mut CompileContext<'_>) -> Result<(), CompileError>,
) -> Result<(), CompileError> {
    ctx.scoped(|cc| {
        let ty = cc.types.agent_nullable();
        let saved = cc.temp(ty)?;
        let saved_name = saved
            .inline_code(0, false, cc)?
            .ok_or_else(|| CompileError::NotReadable(format!("{saved:?}")))?;
        cc.writer.write_line(format!("seta {saved_name} targ"));
        let targ = Expr::leaf(FixedVar::targ(ty));
        agent.read_compile(&targ, cc)?;
        f(cc)?;
        cc.writer.write_line(format!("seta targ {saved_name}"));
        Ok(())
    })
}

impl SliceImpl for FieldSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.field.ty)
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.field.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if let Some(code) = self.read_direct(ctx) {
            return out.write_compile(0, &code, self.field.ty, ctx);
        }
        ctx.scoped(|cc| {
            let value = cc.temp(self.field.ty)?;
            let var = self.through_targ();
            if self.base.special_inline(0, cc) == SpecialInline::Targ {
                value.write_compile(0, &var, self.field.ty, cc)?;
            } else {
                self.with_targ(cc, |inner| value.write_compile(0, &var, self.field.ty, inner))?;
            }
            value.read_compile(out, cc)
        })
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        if let Some(code) = self.write_direct(ctx) {
            let line = store(ctx.types, exact, &code, input)?;
            ctx.writer.write_line(line);
            return Ok(());
        }
        let var = self.through_targ();
        ctx.scoped(|cc| {
            // The input is evaluated after targ moves, so anything that might
            // depend on targ is copied out first.
            let input = if independent_of_targ(input) {
                input.to_string()
            } else {
                let staged = cc.temp(exact)?;
                staged.write_compile(0, input, exact, cc)?;
                staged
                    .inline_code(0, false, cc)?
                    .ok_or_else(|| CompileError::NotReadable(format!("{staged:?}")))?
            };
            self.with_targ(cc, |inner| {
                let line = store(inner.types, exact, &var, &input)?;
                inner.writer.write_line(line);
                Ok(())
            })
        })
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        Ok(if write {
            self.write_direct(ctx)
        } else {
            self.read_direct(ctx)
        })
    }
}

/// Literals, VA and `mv` variables and the fixed script variables other
/// than `targ` read the same wherever `targ` points.
fn independent_of_targ(code: &str) -> bool {
    let numbered = |prefix: &str| {
        code.strip_prefix(prefix)
            .is_some_and(|n| n.len() == 2 && n.bytes().all(|b| b.is_ascii_digit()))
    };
    numbered("va")
        || numbered("mv")
        || matches!(code, "ownr" | "from" | "null" | "_it_" | "_p1_" | "_p2_")
        || code.parse::<f32>().is_ok()
        || (code.len() >= 2 && code.starts_with('"') && code.ends_with('"'))
        || (code.starts_with('[') && code.ends_with(']'))
}

/// `agent instanceof F G S` for a classifier with a non-zero family.
///
/// The test runs against `targ`, so any other agent is pointed at first. A
/// nullable agent is checked for null before its classifier is read.
#[derive(Debug, Clone)]
pub struct InstanceofSlice {
    base: Expr,
    class: Classifier,
    nullable: bool,
    ty: TypeId,
}

impl InstanceofSlice {
    pub fn new(base: Expr, class: Classifier, nullable: bool, ty: TypeId) -> Self {
        Self {
            base,
            class,
            nullable,
            ty,
        }
    }

    fn test(&self) -> String {
        let Classifier {
            family,
            genus,
            species,
        } = self.class;
        if genus == 0 {
            format!("fmly eq {family}")
        } else if species == 0 {
            format!("fmly eq {family} and gnus eq {genus}")
        } else {
            format!("fmly eq {family} and gnus eq {genus} and spcs eq {species}")
        }
    }

    fn check(&self, result: &str, ctx: &mut CompileContext<'_>) {
        if self.nullable {
            ctx.writer.write_code(0, "doif targ ne null", 1);
        }
        ctx.writer.write_code(0, format!("doif {}", self.test()), 1);
        ctx.writer.write_code(0, format!("setv {result} 1"), 0);
        ctx.writer.write_code(-1, "endi", 0);
        if self.nullable {
            ctx.writer.write_code(-1, "endi", 0);
        }
    }
}

impl SliceImpl for InstanceofSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        ctx.scoped(|cc| {
            let result = cc.temp(self.ty)?;
            let name = result
                .inline_code(0, false, cc)?
                .ok_or_else(|| CompileError::NotReadable(format!("{result:?}")))?;
            cc.writer.write_line(format!("setv {name} 0"));
            if self.base.special_inline(0, cc) == SpecialInline::Targ {
                self.check(&name, cc);
            } else {
                with_targ(&self.base, cc, |inner| {
                    self.check(&name, inner);
                    Ok(())
                })?;
            }
            result.read_compile(out, cc)
        })
    }
}

/// An explicit cast: same code, different type.
#[derive(Debug, Clone)]
pub struct CastSlice {
    base: Expr,
    ty: TypeId,
}

impl CastSlice {
    pub fn new(base: Expr, ty: TypeId) -> Result<Self, CompileError> {
        if base.len() != 1 {
            return Err(CompileError::NotSingle(base.len()));
        }
        Ok(Self { base, ty })
    }
}

impl SliceImpl for CastSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        self.base.read_type(0).ok().map(|_| self.ty)
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        self.base.write_type(0).ok().map(|_| self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        let retyped = Expr::leaf(Retype::new(out.clone(), self.ty));
        self.base.read_compile(&retyped, ctx)
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        self.base.write_compile(0, input, exact, ctx)
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        self.base.inline_code(0, write, ctx)
    }

    fn special_inline(&self, _index: usize, ctx: &CompileContext<'_>) -> SpecialInline {
        self.base.special_inline(0, ctx)
    }
}

/// Write-side view of a single slot that stores with a fixed type, so the
/// store instruction follows the cast rather than the value.
#[derive(Debug, Clone)]
pub struct Retype {
    target: Expr,
    ty: TypeId,
}

impl Retype {
    pub fn new(target: Expr, ty: TypeId) -> Self {
        Self { target, ty }
    }
}

impl SliceImpl for Retype {
    fn len(&self) -> usize {
        1
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        self.target.write_type(0).ok()
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        _exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        self.target.write_compile(0, input, self.ty, ctx)
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        self.target.inline_code(0, write, ctx)
    }

    fn special_inline(&self, _index: usize, ctx: &CompileContext<'_>) -> SpecialInline {
        self.target.special_inline(0, ctx)
    }
}
