//! The tail: the bottom-up chain of write-latched pages a structural
//! remove/invoke holds while finishing a merge or inner-key replace (spec
//! section 4.5 phases 2-3; section 9, "Cyclic references and weak
//! links").
//!
//! Modeled as an arena-allocated scratch vector of frames rather than a
//! linked structure -- no heap cycles are needed, and releasing the tail
//! bottom-up is just draining the vector from the front.

use crate::mem::OwnedWriteGuard;
use crate::page::PageId;

/// A tail frame's role relative to the page the operation is actually
/// acting on at that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The page directly on the operation's descent path at this level.
    Exact,
    /// The left sibling of the `Exact` page at this level, locked first
    /// to respect left-to-right locking order (spec section 5, rule 1).
    Back,
    /// The right sibling of the `Exact` page at this level, locked when
    /// `Exact` has no back sibling and might need to merge rightward.
    Forward,
}

/// One write-latched page held as part of a tail, and where it sits in
/// the tree. The guard is owned (spec section 9: modeled as an
/// arena-allocated scratch vector, not a linked structure with lifetimes
/// tied to a single call frame) so a tail can be assembled across
/// several descent steps and still be released as a unit.
pub struct TailFrame {
    pub page_id: PageId,
    pub level: i32,
    pub kind: FrameKind,
    pub guard: OwnedWriteGuard,
}

/// The full bottom-up chain for one structural change, in acquisition
/// order (leaf first). Finishing the operation walks this front-to-back
/// (bottom-up); releasing it does too, which is also left-to-right at
/// each level because frames were pushed in that order.
#[derive(Default)]
pub struct Tail {
    frames: Vec<TailFrame>,
}

impl Tail {
    pub fn new() -> Self {
        Tail { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: TailFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[TailFrame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [TailFrame] {
        &mut self.frames
    }

    /// All frames at `level` whose kind matches, in acquisition order.
    pub fn at_level(&self, level: i32) -> impl Iterator<Item = &TailFrame> {
        self.frames.iter().filter(move |f| f.level == level)
    }

    pub fn exact_at(&self, level: i32) -> Option<&TailFrame> {
        self.frames.iter().find(|f| f.level == level && f.kind == FrameKind::Exact)
    }

    pub fn exact_at_mut(&mut self, level: i32) -> Option<&mut TailFrame> {
        self.frames.iter_mut().find(|f| f.level == level && f.kind == FrameKind::Exact)
    }

    pub fn find_page(&self, page_id: PageId) -> Option<&TailFrame> {
        self.frames.iter().find(|f| f.page_id == page_id)
    }

    pub fn find_page_mut(&mut self, page_id: PageId) -> Option<&mut TailFrame> {
        self.frames.iter_mut().find(|f| f.page_id == page_id)
    }

    pub fn max_level(&self) -> i32 {
        self.frames.iter().map(|f| f.level).max().unwrap_or(-1)
    }

    /// Releases every frame bottom-up (i.e. in the order they were
    /// pushed), draining the tail.
    pub fn release_all(mut self, mem: &dyn crate::mem::PageMemory, wal_policy: &dyn crate::wal::WalPolicy) {
        for frame in self.frames.drain(..) {
            let page_id = frame.guard.page_id();
            let handle = frame.guard.handle().clone();
            frame.guard.unlatch(wal_policy);
            let _ = page_id;
            mem.release(handle);
        }
    }
}
