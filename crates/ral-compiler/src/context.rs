//! Compile-time state threaded through code generation.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

use rhizome_ral_types::{TypeId, TypeSystem};
use tracing::trace;

use crate::alloc::VaAllocator;
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::slice::{DeferredId, DeferredTable, Expr, VaVar};
use crate::writer::CodeWriter;

/// Identity of a VA variable. Handles are minted during resolution (and for
/// temporaries during codegen); the concrete slot is bound at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaHandle(pub(crate) u32);

impl fmt::Display for VaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Renders a slot id as a CAOS variable name.
pub fn va_name(slot: u8) -> String {
    format!("va{slot:02}")
}

/// Where `break` jumps to, and the flag it raises first, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakTarget {
    pub label: String,
    pub flag: Option<String>,
    /// Where `continue` jumps to.
    pub continue_label: String,
}

/// Monotonic label source shared by every script of a unit.
#[derive(Debug)]
pub struct LabelAllocator {
    prefix: String,
    next: Cell<u32>,
}

impl LabelAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: Cell::new(0),
        }
    }

    pub fn next_label(&self) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        let label = format!("{}{n}", self.prefix);
        trace!(%label, "allocated label");
        label
    }
}

/// How a forked context relates to its parent.
#[derive(Debug, Clone)]
pub enum Fork {
    /// Own allocation scope; break target inherited.
    Owned,
    /// Allocations and bindings belong to the nearest owning ancestor.
    Shared,
    /// Own allocation scope with a new break target.
    Breakable(BreakTarget),
    /// Own allocation scope in which `break` and `continue` are not allowed.
    Unbreakable,
}

#[derive(Debug)]
struct Frame {
    owns_alloc: bool,
    shadowed: Vec<(VaHandle, Option<u8>)>,
    saved_break: Option<Option<BreakTarget>>,
}

impl Frame {
    fn new(owns_alloc: bool, saved_break: Option<Option<BreakTarget>>) -> Self {
        Self {
            owns_alloc,
            shadowed: Vec::new(),
            saved_break,
        }
    }
}

pub struct CompileContext<'a> {
    pub types: &'a TypeSystem,
    pub config: &'a CompilerConfig,
    pub writer: CodeWriter,
    deferred: &'a DeferredTable,
    labels: &'a LabelAllocator,
    alloc: VaAllocator,
    frames: Vec<Frame>,
    slots: HashMap<VaHandle, u8>,
    break_target: Option<BreakTarget>,
    next_handle: u32,
}

impl<'a> CompileContext<'a> {
    /// Creates the root context of one script. `first_handle` must be past
    /// every handle minted during resolution.
    pub fn new(
        types: &'a TypeSystem,
        deferred: &'a DeferredTable,
        config: &'a CompilerConfig,
        labels: &'a LabelAllocator,
        first_handle: u32,
    ) -> Self {
        Self {
            types,
            config,
            writer: CodeWriter::new(),
            deferred,
            labels,
            alloc: VaAllocator::new(),
            frames: vec![Frame::new(true, None)],
            slots: HashMap::new(),
            break_target: None,
            next_handle: first_handle,
        }
    }

    /// Runs `f` in a child context. The child's bindings, allocations and
    /// break target are undone when `f` returns, whether or not it failed.
    pub fn fork<T>(
        &mut self,
        fork: Fork,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.push_frame(fork);
        let result = f(self);
        self.pop_frame();
        result
    }

    pub fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.fork(Fork::Owned, f)
    }

    pub fn shared<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.fork(Fork::Shared, f)
    }

    pub fn break_target(&self) -> Option<&BreakTarget> {
        self.break_target.as_ref()
    }

    pub fn next_label(&self) -> String {
        self.labels.next_label()
    }

    pub fn deferred(&self, id: DeferredId) -> Result<&'a Expr, CompileError> {
        self.deferred.get(id)
    }

    pub fn fresh_handle(&mut self) -> VaHandle {
        let handle = VaHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Allocates a slot for `handle` in the current scope.
    pub fn bind_va(&mut self, handle: VaHandle) -> Result<u8, CompileError> {
        let slot = self.alloc.allocate()?;
        let previous = self.slots.insert(handle, slot);
        if let Some(owner) = self.frames.iter_mut().rev().find(|f| f.owns_alloc) {
            owner.shadowed.push((handle, previous));
        }
        trace!(%handle, slot, "bound VA");
        Ok(slot)
    }

    pub fn slot_of(&self, handle: VaHandle) -> Option<u8> {
        self.slots.get(&handle).copied()
    }

    /// A fresh writable variable of type `ty`, live until the current scope
    /// closes.
    pub fn temp(&mut self, ty: TypeId) -> Result<Expr, CompileError> {
        let handle = self.fresh_handle();
        self.bind_va(handle)?;
        Ok(Expr::leaf(VaVar::new(handle, ty, true)))
    }

    pub fn live_va_count(&self) -> usize {
        self.alloc.live_count()
    }

    pub fn finish(self) -> String {
        self.writer.into_string()
    }

    fn push_frame(&mut self, fork: Fork) {
        let (owns_alloc, saved_break) = match fork {
            Fork::Owned => (true, None),
            Fork::Shared => (false, None),
            Fork::Breakable(target) => (true, Some(self.break_target.replace(target))),
            Fork::Unbreakable => (true, Some(self.break_target.take())),
        };
        if owns_alloc {
            self.alloc.open_scope();
        }
        self.frames.push(Frame::new(owns_alloc, saved_break));
    }

    fn pop_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for (handle, previous) in frame.shadowed.into_iter().rev() {
            match previous {
                Some(slot) => {
                    self.slots.insert(handle, slot);
                }
                None => {
                    self.slots.remove(&handle);
                }
            }
        }
        if frame.owns_alloc {
            self.alloc.close_scope();
        }
        if let Some(saved) = frame.saved_break {
            self.break_target = saved;
        }
    }
}
