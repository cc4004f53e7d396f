use rhizome_ral_types::TypeId;

use super::{Expr, SliceImpl, VarCacher};
use crate::context::CompileContext;
use crate::error::CompileError;

/// A piece of raw CAOS text or an embedded expression.
#[derive(Debug, Clone)]
pub enum ResolvedPart {
    Text(String),
    Expr(Expr),
}

/// Renders the parts without emitting code, if every embedded slot has an
/// inline form.
pub fn try_inline_parts(
    parts: &[ResolvedPart],
    ctx: &CompileContext<'_>,
) -> Result<Option<String>, CompileError> {
    let mut text = String::new();
    for part in parts {
        match part {
            ResolvedPart::Text(t) => text.push_str(t),
            ResolvedPart::Expr(e) => match e.inline_all(ctx)? {
                Some(codes) => text.push_str(&codes.join(" ")),
                None => return Ok(None),
            },
        }
    }
    Ok(Some(text))
}

/// Renders the parts, first copying every slot that has no inline form into
/// a temporary. Copies are made left to right in the current scope.
pub fn render_parts(
    parts: &[ResolvedPart],
    ctx: &mut CompileContext<'_>,
) -> Result<String, CompileError> {
    let mut text = String::new();
    for part in parts {
        match part {
            ResolvedPart::Text(t) => text.push_str(t),
            ResolvedPart::Expr(e) => {
                let mut needs_copy = Vec::with_capacity(e.len());
                for i in 0..e.len() {
                    needs_copy.push(e.inline_code(i, false, ctx)?.is_none());
                }
                let cacher = VarCacher::new(
                    e,
                    |i| needs_copy[i],
                    |i| format!("inline #{i}"),
                    || ctx.fresh_handle(),
                )?;
                cacher.write_cache_code(ctx)?;
                let codes = cacher.output().inline_all(ctx)?.ok_or_else(|| {
                    CompileError::NotReadable(format!("{:?}", cacher.output()))
                })?;
                text.push_str(&codes.join(" "));
            }
        }
    }
    Ok(text)
}

/// Raw CAOS expression text of a declared type.
#[derive(Debug, Clone)]
pub struct InlineExpr {
    parts: Vec<ResolvedPart>,
    ty: TypeId,
}

impl InlineExpr {
    pub fn new(parts: Vec<ResolvedPart>, ty: TypeId) -> Self {
        Self { parts, ty }
    }
}

impl SliceImpl for InlineExpr {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        ctx.scoped(|cc| {
            let text = render_parts(&self.parts, cc)?;
            out.write_compile(0, &text, self.ty, cc)
        })
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        if write {
            return Ok(None);
        }
        try_inline_parts(&self.parts, ctx)
    }
}
