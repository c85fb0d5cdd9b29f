//! The reuse list interface and the operation-local reuse bag (spec
//! section 3 "Lifecycle", section 5 "Shared resource policy").

use crate::page::PageId;

/// External collaborator accepting recycled page identifiers. Allocation
/// prefers pages handed back here over fresh pages from the page memory
/// manager. Out of scope for this crate (spec section 1); consumed only.
pub trait ReuseList: Send + Sync {
    /// Hands back a batch of page ids that are now free.
    fn push_batch(&self, pages: &[PageId]);

    /// Takes one page id back for reuse, if any are available.
    fn pop(&self) -> Option<PageId>;
}

/// A `ReuseList` that never recycles anything, for tests/embedders with
/// no reuse pool configured -- every allocation falls through to the page
/// memory manager.
pub struct NoReuse;

impl ReuseList for NoReuse {
    fn push_batch(&self, _pages: &[PageId]) {}
    fn pop(&self) -> Option<PageId> {
        None
    }
}

/// Operation-local list of page ids freed during a single structural
/// change (split is append-only and never frees; merge, range-remove and
/// destroy all accumulate here). Flushed to the shared `ReuseList` once
/// the operation holding it completes -- never sooner, since a page
/// freed mid-operation might still be referenced by a tail frame the
/// operation hasn't released yet.
#[derive(Debug, Default)]
pub struct ReuseBag {
    pages: Vec<PageId>,
}

impl ReuseBag {
    pub fn new() -> Self {
        ReuseBag { pages: Vec::new() }
    }

    pub fn push(&mut self, page_id: PageId) {
        self.pages.push(page_id);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    /// Hands every accumulated page id to `list` and clears the bag.
    pub fn flush(&mut self, list: &dyn ReuseList) {
        if !self.pages.is_empty() {
            list.push_batch(&self.pages);
            self.pages.clear();
        }
    }

    /// Drains and flushes only if the bag has grown past `batch` entries;
    /// used by `destroy`'s every-128-pages drain (spec section 4.8).
    pub fn drain_if_full(&mut self, list: &dyn ReuseList, batch: usize) {
        if self.pages.len() >= batch {
            self.flush(list);
        }
    }
}
