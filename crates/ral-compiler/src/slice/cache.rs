use rhizome_ral_types::TypeId;

use super::{Expr, VaVar};
use crate::context::{CompileContext, VaHandle, va_name};
use crate::error::CompileError;

#[derive(Debug, Clone)]
struct CacheCopy {
    source: Expr,
    vars: Vec<(VaHandle, TypeId, String)>,
    target: Expr,
}

/// Copies selected slots of an expression into fresh variables.
///
/// Contiguous runs of cached slots are copied together, in order, by
/// [`write_cache_code`](VarCacher::write_cache_code). The remaining slots
/// pass through untouched and are evaluated wherever [`output`] is used.
///
/// [`output`]: VarCacher::output
#[derive(Debug, Clone)]
pub struct VarCacher {
    copies: Vec<CacheCopy>,
    output: Expr,
}

impl VarCacher {
    pub fn new(
        input: &Expr,
        mut cache: impl FnMut(usize) -> bool,
        label: impl Fn(usize) -> String,
        mut mint: impl FnMut() -> VaHandle,
    ) -> Result<Self, CompileError> {
        let mut copies = Vec::new();
        let mut pieces = Vec::new();
        let mut i = 0;
        while i < input.len() {
            let cached = cache(i);
            let start = i;
            while i < input.len() && cache(i) == cached {
                i += 1;
            }
            let run = input.slice(start, i - start)?;
            if !cached {
                pieces.push(run);
                continue;
            }
            let mut vars = Vec::with_capacity(i - start);
            let mut targets = Vec::with_capacity(i - start);
            for slot in start..i {
                let ty = input.read_type(slot)?;
                let handle = mint();
                vars.push((handle, ty, label(slot)));
                targets.push(Expr::leaf(VaVar::new(handle, ty, true)));
            }
            let target = Expr::group(targets);
            pieces.push(target.clone());
            copies.push(CacheCopy {
                source: run,
                vars,
                target,
            });
        }
        Ok(Self {
            copies,
            output: Expr::group(pieces),
        })
    }

    /// The input with cached slots replaced by their copies.
    pub fn output(&self) -> &Expr {
        &self.output
    }

    pub fn is_passthrough(&self) -> bool {
        self.copies.is_empty()
    }

    /// Allocates the copies in the current scope and evaluates the cached
    /// slots into them.
    pub fn write_cache_code(&self, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        for copy in &self.copies {
            for (handle, ty, label) in &copy.vars {
                let slot = ctx.bind_va(*handle)?;
                if ctx.config.var_comments {
                    let comment = format!("{}: {} {label}", va_name(slot), ctx.types.name(*ty));
                    ctx.writer.write_comment(comment);
                }
            }
            copy.source.read_compile(&copy.target, ctx)?;
        }
        Ok(())
    }
}
