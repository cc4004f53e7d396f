//! State shared by resolution and codegen of one unit.

use rhizome_ral_types::TypeSystem;

use crate::config::CompilerConfig;
use crate::context::{CompileContext, LabelAllocator, VaHandle};
use crate::error::CompileError;
use crate::macros::MacroRegistry;
use crate::slice::DeferredTable;

/// Nesting limit for macro expansion.
pub const MAX_MACRO_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct World {
    pub types: TypeSystem,
    pub macros: MacroRegistry,
    deferred: DeferredTable,
    next_handle: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows the world for resolution.
    pub fn resolver(&mut self) -> Resolver<'_> {
        Resolver {
            types: &mut self.types,
            macros: &self.macros,
            deferred: &mut self.deferred,
            next_handle: &mut self.next_handle,
            depth: 0,
        }
    }

    pub fn deferred(&self) -> &DeferredTable {
        &self.deferred
    }

    /// A root compile context for one script. Call only after every script
    /// of the unit has been resolved.
    pub fn compile_context<'a>(
        &'a self,
        config: &'a CompilerConfig,
        labels: &'a LabelAllocator,
    ) -> CompileContext<'a> {
        CompileContext::new(&self.types, &self.deferred, config, labels, self.next_handle)
    }
}

/// Mutable view of a [`World`] used while resolving.
pub struct Resolver<'w> {
    pub types: &'w mut TypeSystem,
    pub macros: &'w MacroRegistry,
    pub deferred: &'w mut DeferredTable,
    next_handle: &'w mut u32,
    depth: usize,
}

impl Resolver<'_> {
    pub fn fresh_handle(&mut self) -> VaHandle {
        let handle = VaHandle(*self.next_handle);
        *self.next_handle += 1;
        handle
    }

    /// Runs `f` one macro level deeper.
    pub(crate) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth >= MAX_MACRO_DEPTH {
            return Err(CompileError::MacroDepth(MAX_MACRO_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
