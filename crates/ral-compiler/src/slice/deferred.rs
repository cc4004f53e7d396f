use rhizome_ral_types::TypeId;

use super::{Expr, Perm, SliceImpl, SpecialInline};
use crate::context::CompileContext;
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredId(usize);

/// Side table of expressions that are referenced before they exist.
///
/// Ids are reserved during resolution and bound once the backing expression
/// has been built; everything is bound before codegen starts.
#[derive(Debug, Default)]
pub struct DeferredTable {
    slots: Vec<Option<Expr>>,
}

impl DeferredTable {
    pub fn reserve(&mut self) -> DeferredId {
        self.slots.push(None);
        DeferredId(self.slots.len() - 1)
    }

    pub fn bind(&mut self, id: DeferredId, expr: Expr) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = Some(expr);
        }
    }

    pub fn get(&self, id: DeferredId) -> Result<&Expr, CompileError> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(CompileError::UnboundDeferred(id.0))
    }

    pub fn unbound(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }
}

/// Placeholder with known slot types whose code comes from the
/// [`DeferredTable`].
#[derive(Debug, Clone)]
pub struct DeferredSlice {
    id: DeferredId,
    types: Vec<TypeId>,
    perms: Vec<Perm>,
}

impl DeferredSlice {
    pub fn new(id: DeferredId, types: Vec<TypeId>, perms: Vec<Perm>) -> Self {
        Self { id, types, perms }
    }
}

impl SliceImpl for DeferredSlice {
    fn len(&self) -> usize {
        self.types.len()
    }

    fn read_type(&self, index: usize) -> Option<TypeId> {
        self.perms[index].read().then(|| self.types[index])
    }

    fn write_type(&self, index: usize) -> Option<TypeId> {
        self.perms[index].write().then(|| self.types[index])
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        ctx.deferred(self.id)?.read_compile(out, ctx)
    }

    fn write_compile(
        &self,
        index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        if !self.perms[index].write() {
            return Err(CompileError::NotWritable(format!("{self:?}")));
        }
        ctx.deferred(self.id)?.write_compile(index, input, exact, ctx)
    }

    fn inline_code(
        &self,
        index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        let allowed = if write {
            self.perms[index].write()
        } else {
            self.perms[index].read()
        };
        if !allowed {
            return Ok(None);
        }
        ctx.deferred(self.id)?.inline_code(index, write, ctx)
    }

    fn special_inline(&self, index: usize, ctx: &CompileContext<'_>) -> SpecialInline {
        match ctx.deferred(self.id) {
            Ok(real) => real.special_inline(index, ctx),
            Err(_) => SpecialInline::None,
        }
    }

    fn underlying(&self, ctx: &CompileContext<'_>) -> Result<Option<Expr>, CompileError> {
        ctx.deferred(self.id).map(|e| Some(e.clone()))
    }
}
