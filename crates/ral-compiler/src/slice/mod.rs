//! Expression slices.
//!
//! Every resolved expression is a fixed-length sequence of slots. Each slot
//! may be readable, writable or both, and carries a type per direction.
//! Slices concatenate and sub-slice freely; per-slot operations are routed to
//! the leaf that owns the slot.

mod access;
mod cache;
mod chain;
mod cond;
mod constant;
mod deferred;
mod inline;
mod var;

use std::fmt;
use std::rc::Rc;

use rhizome_ral_types::{Major, TypeId, TypeSystem};
use serde::{Deserialize, Serialize};

use crate::context::CompileContext;
use crate::error::CompileError;

pub use access::{CastSlice, FieldSlice, InstanceofSlice, Retype};
pub use cache::VarCacher;
pub use chain::{ChainOp, ChainSlice};
pub use cond::{CompareOp, CondSlice, Condition, LogicOp};
pub use constant::ConstSlice;
pub use deferred::{DeferredId, DeferredSlice, DeferredTable};
pub use inline::{InlineExpr, ResolvedPart, render_parts, try_inline_parts};
pub use var::{Discard, FixedVar, VaVar};

/// Access permitted on a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perm {
    R,
    W,
    RW,
}

impl Perm {
    pub fn read(self) -> bool {
        matches!(self, Perm::R | Perm::RW)
    }

    pub fn write(self) -> bool {
        matches!(self, Perm::W | Perm::RW)
    }
}

/// Slots that code generation treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialInline {
    None,
    Ownr,
    Targ,
    Va,
    Discard,
}

/// One concrete expression kind.
///
/// Only [`len`](SliceImpl::len) is required; a leaf that cannot be read or
/// written keeps the default implementations, which report that.
pub trait SliceImpl: fmt::Debug {
    fn len(&self) -> usize;

    fn read_type(&self, _index: usize) -> Option<TypeId> {
        None
    }

    fn write_type(&self, _index: usize) -> Option<TypeId> {
        None
    }

    /// Evaluates every slot and writes the results into `out`, which has the
    /// same length.
    fn read_compile(&self, _out: &Expr, _ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        Err(CompileError::NotReadable(format!("{self:?}")))
    }

    /// Stores the already-rendered `input` into slot `index`. `exact` is the
    /// type of `input` and picks the store instruction.
    fn write_compile(
        &self,
        _index: usize,
        _input: &str,
        _exact: TypeId,
        _ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        Err(CompileError::NotWritable(format!("{self:?}")))
    }

    /// CAOS text that reads (or, with `write`, names as a target) the slot
    /// without emitting any code.
    fn inline_code(
        &self,
        _index: usize,
        _write: bool,
        _ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        Ok(None)
    }

    fn special_inline(&self, _index: usize, _ctx: &CompileContext<'_>) -> SpecialInline {
        SpecialInline::None
    }

    /// The expression this leaf stands for at compile time, if it is only a
    /// placeholder.
    fn underlying(&self, _ctx: &CompileContext<'_>) -> Result<Option<Expr>, CompileError> {
        Ok(None)
    }
}

#[derive(Debug)]
struct Concat {
    left: Expr,
    right: Expr,
    len: usize,
}

#[derive(Debug)]
struct SubSlice {
    source: Rc<dyn SliceImpl>,
    base: usize,
    len: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Leaf(Rc<dyn SliceImpl>),
    /// Right-deep: `left` is never itself a concatenation.
    Concat(Rc<Concat>),
    Sub(Rc<SubSlice>),
}

/// A resolved expression: a cheap, clonable handle to a slice.
#[derive(Debug, Clone)]
pub struct Expr(Node);

impl Default for Expr {
    fn default() -> Self {
        Self::empty()
    }
}

impl Expr {
    pub fn empty() -> Self {
        Expr(Node::Empty)
    }

    /// Wraps a leaf. Zero-length leaves are kept, since reading them may
    /// still emit code.
    pub fn leaf(slice: impl SliceImpl + 'static) -> Self {
        Expr(Node::Leaf(Rc::new(slice)))
    }

    pub fn len(&self) -> usize {
        match &self.0 {
            Node::Empty => 0,
            Node::Leaf(leaf) => leaf.len(),
            Node::Concat(c) => c.len,
            Node::Sub(s) => s.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates two slices, merging adjacent views of the same source.
    pub fn concat(a: Expr, b: Expr) -> Expr {
        if matches!(a.0, Node::Empty) {
            return b;
        }
        if matches!(b.0, Node::Empty) {
            return a;
        }
        if let Some(merged) = Self::try_merge(&a, &b) {
            return merged;
        }
        if let Node::Concat(bc) = &b.0 {
            if let Some(merged) = Self::try_merge(&a, &bc.left) {
                return Self::concat(merged, bc.right.clone());
            }
        }
        if let Node::Concat(ac) = &a.0 {
            return Self::concat(ac.left.clone(), Self::concat(ac.right.clone(), b));
        }
        let len = a.len() + b.len();
        Expr(Node::Concat(Rc::new(Concat {
            left: a,
            right: b,
            len,
        })))
    }

    /// Concatenates any number of slices in order.
    pub fn group(parts: impl IntoIterator<Item = Expr>) -> Expr {
        let parts: Vec<Expr> = parts.into_iter().collect();
        parts
            .into_iter()
            .rev()
            .fold(Expr::empty(), |acc, part| Expr::concat(part, acc))
    }

    pub fn slice(&self, base: usize, len: usize) -> Result<Expr, CompileError> {
        let total = self.len();
        if base + len > total {
            return Err(CompileError::InvalidSlice { base, len, total });
        }
        if len == total {
            return Ok(self.clone());
        }
        if len == 0 {
            return Ok(Expr::empty());
        }
        match &self.0 {
            Node::Empty => Ok(Expr::empty()),
            Node::Leaf(leaf) => Ok(Self::view(leaf.clone(), base, len)),
            Node::Sub(sub) => Ok(Self::view(sub.source.clone(), sub.base + base, len)),
            Node::Concat(c) => {
                let left_len = c.left.len();
                if base + len <= left_len {
                    c.left.slice(base, len)
                } else if base >= left_len {
                    c.right.slice(base - left_len, len)
                } else {
                    let head = c.left.slice(base, left_len - base)?;
                    let tail = c.right.slice(0, len - (left_len - base))?;
                    Ok(Self::concat(head, tail))
                }
            }
        }
    }

    /// Splits a slice into its single slots.
    pub fn slots(&self) -> Result<Vec<Expr>, CompileError> {
        (0..self.len()).map(|i| self.slice(i, 1)).collect()
    }

    fn view(source: Rc<dyn SliceImpl>, base: usize, len: usize) -> Expr {
        if base == 0 && len == source.len() {
            Expr(Node::Leaf(source))
        } else {
            Expr(Node::Sub(Rc::new(SubSlice { source, base, len })))
        }
    }

    fn try_merge(a: &Expr, b: &Expr) -> Option<Expr> {
        match (&a.0, &b.0) {
            (Node::Sub(x), Node::Sub(y))
                if Rc::ptr_eq(&x.source, &y.source) && x.base + x.len == y.base =>
            {
                Some(Self::view(x.source.clone(), x.base, x.len + y.len))
            }
            _ => None,
        }
    }

    /// The leaf owning slot `index` and the slot's index within it.
    fn locate(&self, index: usize) -> Result<(&dyn SliceImpl, usize), CompileError> {
        let out_of_range = || CompileError::SlotOutOfRange {
            index,
            len: self.len(),
        };
        match &self.0 {
            Node::Empty => Err(out_of_range()),
            Node::Leaf(leaf) if index < leaf.len() => Ok((&**leaf, index)),
            Node::Sub(sub) if index < sub.len => Ok((&*sub.source, sub.base + index)),
            Node::Concat(c) => {
                let left_len = c.left.len();
                if index < left_len {
                    c.left.locate(index)
                } else if index < c.len {
                    c.right.locate(index - left_len)
                } else {
                    Err(out_of_range())
                }
            }
            _ => Err(out_of_range()),
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    pub fn read_type(&self, index: usize) -> Result<TypeId, CompileError> {
        let (leaf, i) = self.locate(index)?;
        leaf.read_type(i)
            .ok_or_else(|| CompileError::NotReadable(format!("{leaf:?}")))
    }

    pub fn write_type(&self, index: usize) -> Result<TypeId, CompileError> {
        let (leaf, i) = self.locate(index)?;
        leaf.write_type(i)
            .ok_or_else(|| CompileError::NotWritable(format!("{leaf:?}")))
    }

    pub fn read_types(&self) -> Result<Vec<TypeId>, CompileError> {
        (0..self.len()).map(|i| self.read_type(i)).collect()
    }

    pub fn perm(&self, index: usize) -> Result<Option<Perm>, CompileError> {
        let (leaf, i) = self.locate(index)?;
        Ok(match (leaf.read_type(i).is_some(), leaf.write_type(i).is_some()) {
            (true, true) => Some(Perm::RW),
            (true, false) => Some(Perm::R),
            (false, true) => Some(Perm::W),
            (false, false) => None,
        })
    }

    /// Read type of a single-slot expression.
    pub fn single_read_type(&self) -> Result<TypeId, CompileError> {
        if self.len() != 1 {
            return Err(CompileError::NotSingle(self.len()));
        }
        self.read_type(0)
    }

    // ========================================================================
    // Codegen
    // ========================================================================

    pub fn read_compile(&self, out: &Expr, ctx: &mut CompileContext<'_>) -> Result<(), CompileError> {
        if out.len() != self.len() {
            return Err(CompileError::Arity {
                expected: out.len(),
                got: self.len(),
            });
        }
        match &self.0 {
            Node::Empty => Ok(()),
            Node::Leaf(leaf) => leaf.read_compile(out, ctx),
            Node::Concat(c) => {
                let split = c.left.len();
                c.left.read_compile(&out.slice(0, split)?, ctx)?;
                c.right.read_compile(&out.slice(split, c.len - split)?, ctx)
            }
            Node::Sub(sub) => {
                if let Some(real) = sub.source.underlying(ctx)? {
                    return real.slice(sub.base, sub.len)?.read_compile(out, ctx);
                }
                // Evaluate the whole source, keeping only the viewed slots.
                let any = ctx.types.any();
                let before = sub.base;
                let after = sub.source.len() - sub.base - sub.len;
                let discard = |n: usize| {
                    if n == 0 {
                        Expr::empty()
                    } else {
                        Expr::leaf(Discard::new(n, any))
                    }
                };
                let padded = Expr::group([discard(before), out.clone(), discard(after)]);
                sub.source.read_compile(&padded, ctx)
            }
        }
    }

    pub fn write_compile(
        &self,
        index: usize,
        input: &str,
        exact: TypeId,
        ctx: &mut CompileContext<'_>,
    ) -> Result<(), CompileError> {
        let (leaf, i) = self.locate(index)?;
        leaf.write_compile(i, input, exact, ctx)
    }

    pub fn inline_code(
        &self,
        index: usize,
        write: bool,
        ctx: &CompileContext<'_>,
    ) -> Result<Option<String>, CompileError> {
        let (leaf, i) = self.locate(index)?;
        leaf.inline_code(i, write, ctx)
    }

    pub fn special_inline(&self, index: usize, ctx: &CompileContext<'_>) -> SpecialInline {
        match self.locate(index) {
            Ok((leaf, i)) => leaf.special_inline(i, ctx),
            Err(_) => SpecialInline::None,
        }
    }

    /// Inline text of every slot, or `None` if any slot has none.
    pub fn inline_all(&self, ctx: &CompileContext<'_>) -> Result<Option<Vec<String>>, CompileError> {
        let mut codes = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            match self.inline_code(i, false, ctx)? {
                Some(code) => codes.push(code),
                None => return Ok(None),
            }
        }
        Ok(Some(codes))
    }
}

/// The store instruction for a value of type `exact`.
pub fn store(
    types: &TypeSystem,
    exact: TypeId,
    target: &str,
    input: &str,
) -> Result<String, CompileError> {
    let op = match types.major(exact) {
        Major::Agent => "seta",
        Major::String => "sets",
        Major::Value => "setv",
        Major::ByteString => return Err(CompileError::ByteStringStore),
        Major::Unknown => {
            return Err(CompileError::UnknownMajor {
                ty: types.name(exact),
                input: input.to_string(),
            });
        }
    };
    Ok(format!("{op} {target} {input}"))
}

#[cfg(test)]
mod tests;
