use rhizome_ral_types::{Constant, TypeId};

use super::{Expr, SliceImpl, SpecialInline};
use crate::context::CompileContext;
use crate::error::CompileError;

#[derive(Debug, Clone)]
pub struct ConstSlice {
    constant: Constant,
}

impl ConstSlice {
    pub fn new(constant: Constant) -> Self {
        Self { constant }
    }

    pub fn expr(constant: Constant) -> Expr {
        Expr::leaf(Self::new(constant))
    }

    pub fn constant(&self) -> &Constant {
        &self.constant
    }
}

impl SliceImpl for ConstSlice {
    fn len(&self) -> usize {
        1
    }

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        Some(self.constant.ty)
    }

    fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if out.special_inline(0, ctx) == SpecialInline::Discard {
            return Ok(());
        }
        out.write_compile(0, &self.constant.to_caos(), self.constant.ty, ctx)
    }

    fn inline_code(
        &self,
        _index: usize,
        write: bool,
        _ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        Ok((!write).then(|| self.constant.to_caos()))
    }
}
