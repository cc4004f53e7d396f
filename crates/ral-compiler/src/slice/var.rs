use rhizome_ral_types::TypeId;

use super::{Expr, SliceImpl, SpecialInline, store};
use crate::context::{CompileContext, VaHandle, va_name};
use crate::error::CompileError;

/// A local variable living in a VA slot.
#[derive(Debug, Clone)]
pub struct VaVar {
    handle: VaHandle,
    ty: TypeId,
    writable: bool,
}

impl VaVar {
    pub fn new(handle: VaHandle, ty: TypeId, writable: bool) -> Self {
        Self {
            handle,
            ty,
            writable,
        }
    }

    pub fn handle(&self) -> VaHandle {
        self.handle
    }

    fn code(&self, ctx: &CompileContext<'_>) -> Result<String, CompileError> {
        ctx.slot_of(self.handle)
            .map(va_name)
            .ok_or(CompileError::EscapedHandle(self.handle.0))
    }
}

impl SliceImpl for VaVar {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        self.writable.then_some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        let code = self.code(ctx)?;
        if out.special_inline(0, ctx) == SpecialInline::Discard {
            return Ok(());
        }
        out.write_compile(0, &code, self.ty, ctx)
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        let line = store(ctx.types, exact, &self.code(ctx)?, input)?;
        ctx.writer.write_line(line);
        Ok(())
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        if write && !self.writable {
            return Ok(None);
        }
        self.code(ctx).map(Some)
    }

    fn special_inline(&self, _index: usize, _ctx: &CompileContext<'_>) -> SpecialInline {
        SpecialInline::Va
    }
}

/// A variable with a fixed CAOS name (`ownr`, `targ`, `_p1_` and friends).
#[derive(Debug, Clone)]
pub struct FixedVar {
    code: String,
    ty: TypeId,
    writable: bool,
    special: SpecialInline,
}

impl FixedVar {
    pub fn new(code: impl Into<String>, ty: TypeId, writable: bool) -> Self {
        Self {
            code: code.into(),
            ty,
            writable,
            special: SpecialInline::None,
        }
    }

    pub fn with_special(mut self, special: SpecialInline) -> Self {
        self.special = special;
        self
    }

    pub fn ownr(ty: TypeId) -> Self {
        Self::new("ownr", ty, false).with_special(SpecialInline::Ownr)
    }

    pub fn targ(ty: TypeId) -> Self {
        Self::new("targ", ty, true).with_special(SpecialInline::Targ)
    }
}

impl SliceImpl for FixedVar {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.ty)
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        self.writable.then_some(self.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if out.special_inline(0, ctx) == SpecialInline::Discard {
            return Ok(());
        }
        out.write_compile(0, &self.code, self.ty, ctx)
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        if !self.writable {
            return Err(CompileError::NotWritable(self.code.clone()));
        }
        let line = store(ctx.types, exact, &self.code, input)?;
        ctx.writer.write_line(line);
        Ok(())
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        _ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        Ok((!write || self.writable).then(|| self.code.clone()))
    }

    fn special_inline(&self, _index: usize, _ctx: &CompileContext<'_>) -> SpecialInline {
        self.special
    }
}

/// Write-only sink. Values written here are evaluated into a scratch slot
/// and dropped.
#[derive(Debug, Clone)]
pub struct Discard {
    len: usize,
    any: TypeId,
}

impl Discard {
    pub fn new(len: usize, any: TypeId) -> Self {
        Self { len, any }
    }
}

impl SliceImpl for Discard {
    fn len(&self) -> usize {
        self.len
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.any)
    }

    fn write_compile(
        &self,
        _index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        let scratch = ctx.temp(exact)?;
        scratch.write_compile(0, input, exact, ctx)
    }

    fn special_inline(&self, _index: usize, _ctx: &CompileContext<'_>) -> SpecialInline {
        SpecialInline::Discard
    }
}
