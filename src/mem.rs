//! The paged memory contract the core consumes (spec section 4.1). Out of
//! scope for this crate's logic -- allocation, pinning and latching of the
//! real storage engine live one layer up -- but the core needs *something*
//! to latch against in its own tests, so this module also ships a minimal
//! in-memory reference implementation (`MemPageMemory`), the way the
//! teacher's tests run against `BufferPool` rather than a real disk file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{TreeError, TreeResult};
use crate::page::{empty_page_buf, PageId};
use crate::wal::WalPolicy;

/// A single page's storage: its bytes, and an epoch bumped every time
/// `recycle` changes the page's identity. A handle acquired before a
/// recycle observes a stale epoch and must restart (spec section 4.1:
/// "Return value 0 from a latch means the page was concurrently
/// recycled").
struct PageSlot {
    epoch: AtomicU64,
    buf: RwLock<Vec<u8>>,
}

/// A pinned reference to a page, obtained from `PageMemory::acquire` and
/// paired with a later `release`. Latching is done directly on the
/// handle so callers don't thread lifetimes through the `PageMemory`
/// trait object itself.
#[derive(Clone)]
pub struct PageHandle {
    page_id: PageId,
    epoch_at_acquire: u64,
    slot: Arc<PageSlot>,
}

impl PageHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    fn is_stale(&self) -> bool {
        self.slot.epoch.load(AtomicOrdering::Acquire) != self.epoch_at_acquire
    }

    /// `read_latch` / `None` on the stale-epoch sentinel (spec section
    /// 4.1's "addr | 0").
    pub fn read_latch(&self) -> Option<RwLockReadGuard<'_, Vec<u8>>> {
        if self.is_stale() {
            return None;
        }
        Some(self.slot.buf.read().expect("page lock poisoned"))
    }

    pub fn read_unlatch(&self, guard: RwLockReadGuard<'_, Vec<u8>>) {
        drop(guard);
    }

    pub fn write_latch(&self) -> Option<RwLockWriteGuard<'_, Vec<u8>>> {
        if self.is_stale() {
            return None;
        }
        Some(self.slot.buf.write().expect("page lock poisoned"))
    }

    /// Releases a write latch. `wal_policy` mirrors spec section 4.1's
    /// `write_unlatch(walPolicy)` -- callers have already logged any
    /// delta the mutation produced; this hook is where an embedder with
    /// dirty-page tracking would mark the page dirty for its checkpoint
    /// policy.
    pub fn write_unlatch(&self, guard: RwLockWriteGuard<'_, Vec<u8>>, wal_policy: &dyn WalPolicy) {
        let _ = wal_policy.needs_wal_delta(self.page_id);
        drop(guard);
    }

    /// Owned variant of [`Self::write_latch`]: bundles a cloned handle
    /// with its guard so a tail (spec section 9, "Cyclic references and
    /// weak links") can hold several pages' write latches past the
    /// scope that acquired them, without a self-referential struct.
    pub fn write_latch_owned(&self) -> Option<OwnedWriteGuard> {
        if self.is_stale() {
            return None;
        }
        let guard = self.slot.buf.write().expect("page lock poisoned");
        // SAFETY: `guard` borrows `self.slot.buf`. `self.slot` is an
        // `Arc<PageSlot>`; `OwnedWriteGuard` below clones that `Arc` and
        // keeps it alive for at least as long as the guard, and the
        // `RwLock` lives at a fixed heap address owned by the `Arc`'s
        // allocation, so extending the borrow to `'static` here is sound
        // as long as the guard is dropped before (or with) the clone.
        let guard: RwLockWriteGuard<'static, Vec<u8>> = unsafe { std::mem::transmute(guard) };
        Some(OwnedWriteGuard { handle: self.clone(), guard: Some(guard) })
    }

    pub fn read_latch_owned(&self) -> Option<OwnedReadGuard> {
        if self.is_stale() {
            return None;
        }
        let guard = self.slot.buf.read().expect("page lock poisoned");
        // SAFETY: see `write_latch_owned`.
        let guard: RwLockReadGuard<'static, Vec<u8>> = unsafe { std::mem::transmute(guard) };
        Some(OwnedReadGuard { handle: self.clone(), guard: Some(guard) })
    }
}

/// A write latch paired with the handle that keeps its backing page
/// alive, so it can be stored in a `Vec` (e.g. [`crate::tail::Tail`])
/// instead of living on one call frame's stack.
pub struct OwnedWriteGuard {
    handle: PageHandle,
    guard: Option<RwLockWriteGuard<'static, Vec<u8>>>,
}

impl OwnedWriteGuard {
    pub fn handle(&self) -> &PageHandle {
        &self.handle
    }

    pub fn page_id(&self) -> PageId {
        self.handle.page_id
    }

    pub fn addr(&self) -> &[u8] {
        self.guard.as_ref().expect("guard already released")
    }

    pub fn addr_mut(&mut self) -> &mut [u8] {
        self.guard.as_mut().expect("guard already released")
    }

    /// Releases the write latch, running `wal_policy`'s hook first (spec
    /// section 4.1's `write_unlatch(walPolicy)`).
    pub fn unlatch(mut self, wal_policy: &dyn WalPolicy) {
        let _ = wal_policy.needs_wal_delta(self.handle.page_id);
        self.guard.take();
    }
}

impl Drop for OwnedWriteGuard {
    fn drop(&mut self) {
        // Guard must be dropped (unlocking the RwLock) strictly before
        // `handle`'s `Arc<PageSlot>` clone is dropped; field order in
        // this struct already guarantees that.
        self.guard.take();
    }
}

pub struct OwnedReadGuard {
    handle: PageHandle,
    guard: Option<RwLockReadGuard<'static, Vec<u8>>>,
}

impl OwnedReadGuard {
    pub fn handle(&self) -> &PageHandle {
        &self.handle
    }

    pub fn page_id(&self) -> PageId {
        self.handle.page_id
    }

    pub fn addr(&self) -> &[u8] {
        self.guard.as_ref().expect("guard already released")
    }

    pub fn unlatch(mut self) {
        self.guard.take();
    }
}

impl Drop for OwnedReadGuard {
    fn drop(&mut self) {
        self.guard.take();
    }
}

/// Paged memory manager interface: allocation, pin/unpin and latching.
/// Out of scope for this crate (spec section 1); consumed only.
pub trait PageMemory: Send + Sync {
    fn page_size(&self) -> usize;

    fn allocate_page(&self) -> TreeResult<PageId>;

    /// Pins `page_id`, returning a handle that must be paired with
    /// `release`.
    fn acquire(&self, page_id: PageId) -> TreeResult<PageHandle>;

    fn release(&self, handle: PageHandle);

    /// Changes `page_id`'s identity (bumping its epoch) so handles
    /// acquired before this call observe a stale latch and restart.
    /// Returns the (possibly renamed) recycled page id.
    fn recycle(
        &self,
        page_id: PageId,
        handle: PageHandle,
        wal_policy: &dyn WalPolicy,
    ) -> TreeResult<PageId>;
}

/// Minimal reference `PageMemory`: a sharded map of page id to
/// `Arc<RwLock<Vec<u8>>>`-backed slots, modeled on the teacher's
/// `PageCache`/`BufferPool` get-or-insert-then-latch pattern but backed
/// by plain memory instead of a disk file, since the real paged memory
/// manager is out of scope here (spec section 1) and the crate's own
/// tests need something to latch against.
pub struct MemPageMemory {
    page_size: usize,
    next_id: AtomicU64,
    slots: RwLock<HashMap<PageId, Arc<PageSlot>>>,
    stopping: std::sync::atomic::AtomicBool,
}

impl MemPageMemory {
    pub fn new(page_size: usize) -> Arc<Self> {
        Arc::new(MemPageMemory {
            page_size,
            next_id: AtomicU64::new(1),
            slots: RwLock::new(HashMap::new()),
            stopping: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn shutdown(&self) {
        self.stopping.store(true, AtomicOrdering::Release);
    }
}

impl PageMemory for MemPageMemory {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate_page(&self) -> TreeResult<PageId> {
        if self.stopping.load(AtomicOrdering::Acquire) {
            return Err(TreeError::NodeStopping);
        }
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let slot = Arc::new(PageSlot {
            epoch: AtomicU64::new(0),
            buf: RwLock::new(empty_page_buf(self.page_size)),
        });
        self.slots.write().expect("slots lock poisoned").insert(id, slot);
        Ok(id)
    }

    fn acquire(&self, page_id: PageId) -> TreeResult<PageHandle> {
        let slots = self.slots.read().expect("slots lock poisoned");
        let slot = slots
            .get(&page_id)
            .cloned()
            .ok_or_else(|| TreeError::corrupted(format!("acquire of unknown page {page_id}"), [page_id]))?;
        let epoch_at_acquire = slot.epoch.load(AtomicOrdering::Acquire);
        Ok(PageHandle { page_id, epoch_at_acquire, slot })
    }

    fn release(&self, _handle: PageHandle) {
        // Reference memory never evicts; a real buffer pool would unpin
        // here and make the frame evictable again.
    }

    fn recycle(
        &self,
        page_id: PageId,
        handle: PageHandle,
        _wal_policy: &dyn WalPolicy,
    ) -> TreeResult<PageId> {
        debug_assert_eq!(handle.page_id, page_id);
        handle.slot.epoch.fetch_add(1, AtomicOrdering::AcqRel);
        {
            let mut buf = handle.slot.buf.write().expect("page lock poisoned");
            buf.iter_mut().for_each(|b| *b = 0);
        }
        // Mint a fresh id for the (zeroed) slot and retire `page_id` from
        // the map entirely, so a *fresh* `acquire(page_id)` made after this
        // call -- not just a handle already held across it -- fails too
        // (spec section 4.1: recycle "changes identity so stale references
        // are detected"). The epoch bump above only protects handles
        // acquired before this call; removing the old mapping is what
        // protects ones acquired after it.
        let new_id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let mut slots = self.slots.write().expect("slots lock poisoned");
        slots.remove(&page_id);
        slots.insert(new_id, handle.slot.clone());
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::AlwaysLog;

    #[test]
    fn acquire_then_recycle_invalidates_stale_handle() {
        let mem = MemPageMemory::new(128);
        let page_id = mem.allocate_page().unwrap();
        let stale = mem.acquire(page_id).unwrap();
        let fresh = mem.acquire(page_id).unwrap();

        mem.recycle(page_id, fresh, &AlwaysLog).unwrap();

        assert!(stale.read_latch().is_none());
    }

    #[test]
    fn recycle_retires_the_old_id_so_fresh_acquires_fail() {
        let mem = MemPageMemory::new(128);
        let page_id = mem.allocate_page().unwrap();
        let handle = mem.acquire(page_id).unwrap();

        let recycled_id = mem.recycle(page_id, handle, &AlwaysLog).unwrap();

        assert_ne!(recycled_id, page_id);
        assert!(mem.acquire(page_id).is_err());
        assert!(mem.acquire(recycled_id).is_ok());
    }

    #[test]
    fn write_latch_round_trips_bytes() {
        let mem = MemPageMemory::new(64);
        let page_id = mem.allocate_page().unwrap();
        let handle = mem.acquire(page_id).unwrap();
        {
            let mut g = handle.write_latch().unwrap();
            g[0] = 42;
            handle.write_unlatch(g, &AlwaysLog);
        }
        assert_eq!(handle.read_latch().unwrap()[0], 42);
    }
}
