//! Shared plumbing for the tree's operations: the bounded retry loop
//! (spec section 4.3/4.9's closed `{GO_DOWN, GO_DOWN_X, FOUND, NOT_FOUND,
//! RETRY, RETRY_ROOT}` result set), and page pin/latch/decode helpers
//! shared by search, insert, remove, invoke and cursor.
//!
//! This implementation collapses `RETRY` and `RETRY_ROOT` to the same
//! observable behavior -- restart the whole operation attempt from the
//! meta page -- rather than threading a resume point back into the
//! middle of a partially completed descent. See `DESIGN.md` for why that
//! simplification preserves every invariant in spec section 3/8.

pub mod cursor;
pub mod insert;
pub mod invoke;
pub mod remove;
pub mod search;

use std::sync::Arc;

use crate::error::{TreeError, TreeResult};
use crate::interrupt;
use crate::io::{NodeIo, SearchHit};
use crate::mem::{OwnedReadGuard, OwnedWriteGuard, PageHandle, PageMemory};
use crate::page::{PageHeader, PageId, PageKind, NO_PAGE};
use crate::tail::{FrameKind, TailFrame};
use crate::tree::Tree;

/// What one retry-loop attempt produced.
pub enum Loop<T> {
    Done(T),
    Retry,
}

/// Runs `attempt` up to `tree.config().lock_retries` times, stopping
/// early on the process interrupt flag or the tree's destroyed flag
/// (spec section 5 "Cancellation"; section 7 "Interrupted"/"Destroyed").
/// Exhausting the budget notifies the failure processor and surfaces
/// `LockRetryExhausted` (spec section 7's policy paragraph).
pub(crate) fn run_with_retries<T>(
    tree: &Tree,
    group: &str,
    mut attempt: impl FnMut() -> TreeResult<Loop<T>>,
) -> TreeResult<T> {
    let mut tries: u32 = 0;
    let backoff = crossbeam::utils::Backoff::new();
    loop {
        if interrupt::is_set() {
            return Err(TreeError::Interrupted);
        }
        if tree.is_destroyed() {
            return Err(TreeError::Destroyed);
        }
        match attempt()? {
            Loop::Done(v) => return Ok(v),
            Loop::Retry => {
                tries += 1;
                tree.stats().on_retry();
                if tries >= tree.config().lock_retries {
                    tree.notify_failure(group, "lock retry budget exhausted", &[]);
                    return Err(TreeError::LockRetryExhausted {
                        group: group.to_string(),
                        retries: tries,
                    });
                }
                if backoff.is_completed() {
                    std::thread::yield_now();
                } else {
                    backoff.snooze();
                }
            }
        }
    }
}

/// A read-latched, IO-decoded page.
pub(crate) struct ReadPin {
    pub guard: OwnedReadGuard,
    pub io: Arc<dyn NodeIo>,
}

impl ReadPin {
    pub fn addr(&self) -> &[u8] {
        self.guard.addr()
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn release(self, mem: &dyn PageMemory) {
        let handle = self.guard.handle().clone();
        self.guard.unlatch();
        mem.release(handle);
    }
}

/// A write-latched, IO-decoded page.
pub(crate) struct WritePin {
    pub guard: OwnedWriteGuard,
    pub io: Arc<dyn NodeIo>,
}

impl WritePin {
    pub fn addr(&self) -> &[u8] {
        self.guard.addr()
    }

    pub fn addr_mut(&mut self) -> &mut [u8] {
        self.guard.addr_mut()
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn release(self, tree: &Tree) {
        let handle = self.guard.handle().clone();
        self.guard.unlatch(tree.wal_policy());
        tree.mem().release(handle);
    }

    pub fn into_tail_frame(self, level: i32, kind: FrameKind) -> TailFrame {
        TailFrame { page_id: self.guard.page_id(), level, kind, guard: self.guard }
    }
}

/// Decodes the `NodeIo` matching a page's on-page header (spec section
/// 4.2), reporting corruption for an unrecognized version or a meta-kind
/// header reached where a leaf/inner page was expected.
pub(crate) fn node_io_for(tree: &Tree, addr: &[u8]) -> TreeResult<Arc<dyn NodeIo>> {
    let header = PageHeader::decode(addr);
    if header.kind == PageKind::Meta {
        return Err(TreeError::corrupted(
            "expected a leaf/inner page, found a meta page",
            [header.page_id],
        ));
    }
    tree.io_registry().get(header.kind, header.version).ok_or_else(|| {
        TreeError::corrupted(
            format!("no NodeIo registered for kind={:?} version={}", header.kind, header.version),
            [header.page_id],
        )
    })
}

/// Acquires `page_id`, treating "no such page" the same as a stale
/// latch (`Ok(None)`) rather than a hard error. `acquire` can fail this
/// way for a page id read out of a forward/child pointer written before
/// some other thread's `recycle` retired that id (spec section 4.1:
/// recycle "changes identity"); the caller chasing that pointer is
/// always in a retry loop that already knows how to handle a stale
/// pointer, so this is the same self-healing path a stale epoch takes,
/// not a new failure mode.
fn acquire_or_stale(tree: &Tree, page_id: PageId) -> TreeResult<Option<PageHandle>> {
    match tree.mem().acquire(page_id) {
        Ok(handle) => Ok(Some(handle)),
        Err(_) => Ok(None),
    }
}

pub(crate) fn read_pin(tree: &Tree, page_id: PageId) -> TreeResult<Option<ReadPin>> {
    let handle = match acquire_or_stale(tree, page_id)? {
        Some(h) => h,
        None => return Ok(None),
    };
    match handle.read_latch_owned() {
        Some(guard) => {
            let io = node_io_for(tree, guard.addr())?;
            Ok(Some(ReadPin { guard, io }))
        }
        None => {
            tree.mem().release(handle);
            Ok(None)
        }
    }
}

pub(crate) fn write_pin(tree: &Tree, page_id: PageId) -> TreeResult<Option<WritePin>> {
    let handle = match acquire_or_stale(tree, page_id)? {
        Some(h) => h,
        None => return Ok(None),
    };
    match handle.write_latch_owned() {
        Some(guard) => {
            let io = node_io_for(tree, guard.addr())?;
            Ok(Some(WritePin { guard, io }))
        }
        None => {
            tree.mem().release(handle);
            Ok(None)
        }
    }
}

/// The child pointer at landing index `idx` (`0..=count`) of an inner
/// page.
pub(crate) fn child_at(io: &dyn NodeIo, addr: &[u8], idx: i32, count: u16) -> PageId {
    if count == 0 {
        io.left(addr, 0)
    } else if idx < count as i32 {
        io.left(addr, idx)
    } else {
        io.right(addr, count as i32 - 1)
    }
}

/// Resolves a `SearchHit` to the landing index used to pick a child or an
/// insertion point (spec section 4.3 step 5).
pub(crate) fn landing_index(hit: SearchHit) -> i32 {
    hit.insertion_point()
}

/// The expected forward pointer of the child reached at landing index
/// `idx`, used to verify the triangle invariant on the next descent step
/// (spec section 4.3 step 6's "neighbor ask"). `Ok(None)` means the
/// neighbor page was concurrently recycled; the caller should restart.
pub(crate) fn expected_child_forward(
    tree: &Tree,
    io: &dyn NodeIo,
    addr: &[u8],
    idx: i32,
    count: u16,
) -> TreeResult<Option<PageId>> {
    if idx < count as i32 {
        return Ok(Some(io.right(addr, idx)));
    }
    let own_forward = io.forward(addr);
    if own_forward == NO_PAGE {
        return Ok(Some(NO_PAGE));
    }
    match read_pin(tree, own_forward)? {
        Some(pin) => {
            let fwd_count = pin.io.count(pin.addr());
            let first_child = child_at(pin.io.as_ref(), pin.addr(), 0, fwd_count);
            pin.release(tree.mem());
            Ok(Some(first_child))
        }
        None => Ok(None),
    }
}

/// Snapshot of the meta page taken at the start of a retry-loop attempt
/// (spec section 4.3: "the operation captures `(root_id, root_level,
/// global_remove_counter)`").
#[derive(Debug, Clone, Copy)]
pub struct RootCapture {
    pub root_id: PageId,
    pub root_level: i32,
    pub removal_counter: u64,
}

pub(crate) fn capture_root(tree: &Tree) -> TreeResult<RootCapture> {
    let meta = tree.read_meta()?;
    let root_level = meta.root_level();
    let root_id = meta
        .first_page_id(root_level)
        .ok_or_else(|| TreeError::corrupted("meta page missing root level entry", [tree.meta_page_id()]))?;
    Ok(RootCapture { root_id, root_level, removal_counter: tree.global_removal_counter() })
}
