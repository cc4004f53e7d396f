//! VA slot allocation.
//!
//! A script has 100 variable slots (`va00`..`va99`). The root scope claims
//! all of them up front from the [`LinearAllocator`]; nested scopes borrow
//! slots from their parent and hand every borrowed slot back when closed.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::error::CompileError;

/// Number of VA slots available to a script.
pub const VA_SLOTS: u8 = 100;

/// Hands out slot ids in increasing order up to [`VA_SLOTS`].
#[derive(Debug, Clone, Default)]
pub struct LinearAllocator {
    next: u8,
}

impl LinearAllocator {
    pub fn allocate(&mut self) -> Result<u8, CompileError> {
        if self.next >= VA_SLOTS {
            return Err(CompileError::OutOfSlots(VA_SLOTS));
        }
        let id = self.next;
        self.next += 1;
        Ok(id)
    }

    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

#[derive(Debug, Clone, Default)]
struct ScopeFrame {
    free: VecDeque<u8>,
    /// Every id this scope took from its parent.
    all: Vec<u8>,
}

/// Stack of allocation scopes over a [`LinearAllocator`].
#[derive(Debug, Clone)]
pub struct VaAllocator {
    linear: LinearAllocator,
    scopes: Vec<ScopeFrame>,
}

impl Default for VaAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl VaAllocator {
    pub fn new() -> Self {
        let mut linear = LinearAllocator::default();
        let mut root = ScopeFrame::default();
        while let Ok(id) = linear.allocate() {
            root.free.push_back(id);
            root.all.push(id);
        }
        Self {
            linear,
            scopes: vec![root],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Takes a free slot, borrowing it through every enclosing scope that
    /// has none to spare.
    pub fn allocate(&mut self) -> Result<u8, CompileError> {
        let Some(level) = self.scopes.iter().rposition(|s| !s.free.is_empty()) else {
            let id = self.linear.allocate()?;
            self.claim_through(0, id);
            trace!(slot = id, "allocated VA from linear pool");
            return Ok(id);
        };
        let Some(id) = self.scopes[level].free.pop_front() else {
            return Err(CompileError::OutOfSlots(VA_SLOTS));
        };
        self.claim_through(level + 1, id);
        trace!(slot = id, depth = self.scopes.len(), "allocated VA");
        Ok(id)
    }

    /// Returns a slot to the innermost scope that claimed it.
    ///
    /// Releasing an id that is already free is not rejected; it is reported
    /// and the id may then be handed out twice.
    pub fn release(&mut self, id: u8) {
        let level = self
            .scopes
            .iter()
            .rposition(|s| s.all.contains(&id))
            .unwrap_or(self.scopes.len().saturating_sub(1));
        let Some(owner) = self.scopes.get_mut(level) else {
            return;
        };
        if owner.free.contains(&id) {
            warn!(slot = id, "VA released twice");
        }
        owner.free.push_back(id);
        trace!(slot = id, level, "released VA");
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(ScopeFrame::default());
    }

    /// Closes the innermost scope, returning everything it borrowed to its
    /// parent. The root scope is never closed.
    pub fn close_scope(&mut self) {
        if self.scopes.len() <= 1 {
            warn!("attempted to close the root VA scope");
            return;
        }
        if let Some(frame) = self.scopes.pop() {
            trace!(returned = frame.all.len(), "closed VA scope");
            if let Some(parent) = self.scopes.last_mut() {
                parent.free.extend(frame.all);
            }
        }
    }

    /// Number of slots currently handed out.
    pub fn live_count(&self) -> usize {
        let free: usize = self.scopes.iter().map(|s| s.free.len()).sum();
        self.linear.allocated().saturating_sub(free)
    }

    fn claim_through(&mut self, from_level: usize, id: u8) {
        for scope in &mut self.scopes[from_level..] {
            scope.all.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_limit() {
        let mut linear = LinearAllocator::default();
        for expected in 0..VA_SLOTS {
            assert_eq!(linear.allocate().unwrap(), expected);
        }
        assert_eq!(linear.allocate(), Err(CompileError::OutOfSlots(100)));
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let mut alloc = VaAllocator::new();
        for _ in 0..100 {
            alloc.allocate().unwrap();
        }
        assert_eq!(alloc.live_count(), 100);
        assert!(matches!(alloc.allocate(), Err(CompileError::OutOfSlots(_))));
    }

    #[test]
    fn test_scope_close_returns_everything() {
        let mut alloc = VaAllocator::new();
        let outer = alloc.allocate().unwrap();
        alloc.open_scope();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        assert_ne!(a, outer);
        assert_ne!(a, b);
        alloc.release(a);
        alloc.open_scope();
        let c = alloc.allocate().unwrap();
        assert_eq!(c, a);
        assert_eq!(alloc.live_count(), 3);
        alloc.close_scope();
        alloc.close_scope();
        assert_eq!(alloc.live_count(), 1);
        assert_eq!(alloc.depth(), 1);
    }

    #[test]
    fn test_release_returns_to_owning_scope() {
        let mut alloc = VaAllocator::new();
        let outer = alloc.allocate().unwrap();
        alloc.open_scope();
        alloc.allocate().unwrap();
        alloc.release(outer);
        assert_eq!(alloc.live_count(), 1);
        alloc.close_scope();
        assert_eq!(alloc.live_count(), 0);
        for _ in 0..100 {
            alloc.allocate().unwrap();
        }
        assert!(alloc.allocate().is_err());
    }

    #[test]
    fn test_nested_scopes_conserve_slots() {
        let mut alloc = VaAllocator::new();
        for depth in 1..=10 {
            alloc.open_scope();
            for _ in 0..depth {
                alloc.allocate().unwrap();
            }
        }
        assert_eq!(alloc.live_count(), 55);
        for _ in 0..10 {
            alloc.close_scope();
        }
        assert_eq!(alloc.live_count(), 0);
        // Every slot is usable again.
        for _ in 0..100 {
            alloc.allocate().unwrap();
        }
    }

    #[test]
    fn test_root_close_is_ignored() {
        let mut alloc = VaAllocator::new();
        alloc.close_scope();
        assert_eq!(alloc.depth(), 1);
        assert_eq!(alloc.allocate().unwrap(), 0);
    }
}
