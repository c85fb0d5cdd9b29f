//! The tree's external interface (spec section 6) and its lifecycle:
//! construction, the meta page, destroy/reuse (spec section 3, section
//! 4.8).
//!
//! `Tree` owns its meta page and holds everything the operations in
//! [`crate::ops`] need to latch, decode and mutate pages: the paged
//! memory contract, the IO registry, the key comparator and the
//! (optional) write-ahead log / reuse list / failure processor / stats
//! collaborators. Per spec section 3 ("Ownership"), the WAL and reuse
//! list are held weakly -- the tree does not keep them alive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::failure::{FailureContext, FailureProcessor, LogOnlyFailureProcessor};
use crate::io::{IoRegistry, KeyComparator};
use crate::mem::PageMemory;
use crate::ops;
use crate::ops::cursor::Cursor;
use crate::ops::invoke::InvokeAction;
use crate::page::meta::MetaPage;
use crate::page::{InnerIo, LeafIo, PageId, PageKind, NO_PAGE};
use crate::reuse::{NoReuse, ReuseBag, ReuseList};
use crate::stats::{IoStats, NullStats};
use crate::wal::{AlwaysLog, NullWal, WalPolicy, WriteAheadLog};

pub type Key = Vec<u8>;
pub type Row = Vec<u8>;

/// Allocates a page id, preferring one handed back through `reuse_list`
/// over a fresh one from the page memory manager (spec section 3,
/// "Lifecycle": "a page is allocated from the reuse list if available,
/// otherwise from the page memory manager"). Free function rather than a
/// `Tree` method because tree construction needs it before a `Tree`
/// exists to allocate its first leaf and meta page.
fn allocate_page_from(mem: &dyn PageMemory, reuse_list: &Weak<dyn ReuseList>) -> TreeResult<PageId> {
    if let Some(list) = reuse_list.upgrade() {
        if let Some(id) = list.pop() {
            return Ok(id);
        }
    }
    mem.allocate_page()
}

/// How many pages `Tree::destroy` recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagesRecycled(pub u64);

/// The concurrent, persistent B+Tree described by spec sections 1-9.
/// Generic only over nothing further than what's stored in its fields --
/// keys and rows are opaque `Vec<u8>` payloads (spec section 3, "Item");
/// ordering comes from the `KeyComparator` supplied at construction.
pub struct Tree {
    pub(crate) name: String,
    pub(crate) mem: Arc<dyn PageMemory>,
    pub(crate) comparator: Arc<dyn KeyComparator>,
    pub(crate) io_registry: IoRegistry,
    pub(crate) leaf_io: Arc<LeafIo>,
    pub(crate) inner_io: Arc<InnerIo>,
    pub(crate) wal: Weak<dyn WriteAheadLog>,
    pub(crate) wal_policy: Arc<dyn WalPolicy>,
    pub(crate) reuse_list: Weak<dyn ReuseList>,
    pub(crate) stats: Arc<dyn IoStats>,
    pub(crate) failure: Arc<dyn FailureProcessor>,
    pub(crate) config: TreeConfig,
    pub(crate) meta_page_id: PageId,
    pub(crate) global_removal_counter: AtomicU64,
    pub(crate) destroyed: AtomicBool,
    pub(crate) sequential_write: AtomicBool,
    group_seq: AtomicU64,
    /// Guards structural meta-page mutations (`AddRoot`/`CutRoot`); the
    /// meta page itself is latched through `mem` like any other page,
    /// this just keeps two threads from racing on the read-modify-write
    /// of its decoded form.
    meta_lock: RwLock<()>,
}

impl Tree {
    /// Creates a brand new tree: one empty leaf as the initial root, and
    /// an initialized meta page (spec section 3, "Lifecycle").
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        name: impl Into<String>,
        mem: Arc<dyn PageMemory>,
        comparator: Arc<dyn KeyComparator>,
        key_size: usize,
        value_size: usize,
        config: TreeConfig,
    ) -> TreeResult<Self> {
        Self::create_with_collaborators(
            name,
            mem,
            comparator,
            key_size,
            value_size,
            config,
            Weak::<NullWal>::new() as Weak<dyn WriteAheadLog>,
            Weak::<NoReuse>::new() as Weak<dyn ReuseList>,
            Arc::new(NullStats),
            Arc::new(LogOnlyFailureProcessor),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_with_collaborators(
        name: impl Into<String>,
        mem: Arc<dyn PageMemory>,
        comparator: Arc<dyn KeyComparator>,
        key_size: usize,
        value_size: usize,
        config: TreeConfig,
        wal: Weak<dyn WriteAheadLog>,
        reuse_list: Weak<dyn ReuseList>,
        stats: Arc<dyn IoStats>,
        failure: Arc<dyn FailureProcessor>,
    ) -> TreeResult<Self> {
        let page_size = mem.page_size();
        let leaf_io = LeafIo::new(key_size, value_size);
        let inline_value_size = if config.can_get_row_from_inner { value_size } else { 0 };
        let inner_io = InnerIo::new(key_size, inline_value_size, page_size);

        let mut io_registry = IoRegistry::new();
        io_registry.register(leaf_io.clone());
        io_registry.register(inner_io.clone());

        let first_leaf = allocate_page_from(mem.as_ref(), &reuse_list)?;
        {
            let handle = mem.acquire(first_leaf)?;
            let mut guard = handle.write_latch().expect("freshly allocated page cannot be stale");
            leaf_io.init(&mut guard, first_leaf);
            handle.write_unlatch(guard, &AlwaysLog);
            mem.release(handle);
        }

        let meta_page_id = allocate_page_from(mem.as_ref(), &reuse_list)?;
        let meta = MetaPage::new_empty(first_leaf, config.inline_size, config.page_flag);
        {
            let handle = mem.acquire(meta_page_id)?;
            let mut guard = handle.write_latch().expect("freshly allocated page cannot be stale");
            let encoded = meta.encode(page_size);
            guard[..encoded.len()].copy_from_slice(&encoded);
            handle.write_unlatch(guard, &AlwaysLog);
            mem.release(handle);
        }

        let name = name.into();
        log::info!("tree '{name}' created: meta_page={meta_page_id} root_leaf={first_leaf}");

        Ok(Tree {
            name,
            mem,
            comparator,
            io_registry,
            leaf_io,
            inner_io,
            wal,
            wal_policy: Arc::new(AlwaysLog),
            reuse_list,
            stats,
            failure,
            config,
            meta_page_id,
            global_removal_counter: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
            sequential_write: AtomicBool::new(false),
            group_seq: AtomicU64::new(1),
            meta_lock: RwLock::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn mem(&self) -> &dyn PageMemory {
        self.mem.as_ref()
    }

    pub(crate) fn mem_arc(&self) -> Arc<dyn PageMemory> {
        self.mem.clone()
    }

    /// Allocates a page id for a new page, preferring the reuse list over
    /// the page memory manager (spec section 3, "Lifecycle"). Every
    /// structural operation that needs a fresh page -- split's forward
    /// page, a new root -- goes through this instead of calling
    /// `mem().allocate_page()` directly.
    pub(crate) fn allocate_page(&self) -> TreeResult<PageId> {
        allocate_page_from(self.mem.as_ref(), &self.reuse_list)
    }

    pub(crate) fn comparator(&self) -> &dyn KeyComparator {
        self.comparator.as_ref()
    }

    pub(crate) fn io_registry(&self) -> &IoRegistry {
        &self.io_registry
    }

    pub(crate) fn leaf_io(&self) -> &Arc<LeafIo> {
        &self.leaf_io
    }

    pub(crate) fn inner_io(&self) -> &Arc<InnerIo> {
        &self.inner_io
    }

    pub(crate) fn wal_policy(&self) -> &dyn WalPolicy {
        self.wal_policy.as_ref()
    }

    pub(crate) fn stats(&self) -> &dyn IoStats {
        self.stats.as_ref()
    }

    pub(crate) fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub(crate) fn meta_page_id(&self) -> PageId {
        self.meta_page_id
    }

    pub(crate) fn next_group_id(&self) -> u64 {
        self.group_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn global_removal_counter(&self) -> u64 {
        self.global_removal_counter.load(Ordering::Acquire)
    }

    pub(crate) fn bump_global_removal_counter(&self) -> u64 {
        self.global_removal_counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn sequential_write_enabled(&self) -> bool {
        self.sequential_write.load(Ordering::Relaxed)
    }

    pub fn enable_sequential_write_mode(&self) {
        self.sequential_write.store(true, Ordering::Relaxed);
        log::info!("tree '{}': sequential write mode enabled", self.name);
    }

    pub(crate) fn log_delta(&self, record: crate::wal::DeltaRecord) -> TreeResult<()> {
        if let Some(wal) = self.wal.upgrade() {
            wal.log(record)
        } else {
            Ok(())
        }
    }

    pub(crate) fn flush_reuse_bag(&self, bag: &mut ReuseBag) {
        if bag.is_empty() {
            return;
        }
        if let Some(list) = self.reuse_list.upgrade() {
            bag.flush(list.as_ref());
        } else {
            // No reuse list configured; pages stay allocated but
            // unreachable. A real embedder always configures one in
            // production (spec section 1); tests that don't care about
            // recycling use `NoReuse`-equivalent behavior here.
        }
    }

    pub(crate) fn notify_failure(&self, group: &str, detail: &str, pages: &[PageId]) {
        self.failure.on_failure(FailureContext {
            group: group.to_string(),
            tree_name: self.name.clone(),
            meta_page_id: self.meta_page_id,
            retries_configured: self.config.lock_retries,
            detail: detail.to_string(),
            implicated_pages: pages.to_vec(),
        });
    }

    pub(crate) fn read_meta(&self) -> TreeResult<MetaPage> {
        let handle = self.mem.acquire(self.meta_page_id)?;
        let addr = handle
            .read_latch()
            .ok_or_else(|| TreeError::corrupted("meta page latch returned stale", [self.meta_page_id]))?;
        let meta = MetaPage::decode(&addr);
        handle.read_unlatch(addr);
        self.mem.release(handle);
        if meta.destroyed {
            return Err(TreeError::Destroyed);
        }
        Ok(meta)
    }

    /// Runs `mutate` under the meta page's write latch and persists the
    /// result, logging `delta` first (spec section 4.8: "`AddRoot`,
    /// `CutRoot`, and `InitRoot`... each logged under the meta page write
    /// latch").
    pub(crate) fn mutate_meta(
        &self,
        mutate: impl FnOnce(&mut MetaPage),
        delta: crate::wal::Delta,
    ) -> TreeResult<()> {
        let _guard = self.meta_lock.write().expect("meta lock poisoned");
        let handle = self.mem.acquire(self.meta_page_id)?;
        let mut addr = handle
            .write_latch()
            .ok_or_else(|| TreeError::corrupted("meta page latch returned stale", [self.meta_page_id]))?;
        let mut meta = MetaPage::decode(&addr);
        if meta.destroyed {
            handle.write_unlatch(addr, self.wal_policy.as_ref());
            self.mem.release(handle);
            return Err(TreeError::Destroyed);
        }
        mutate(&mut meta);
        let encoded = meta.encode(addr.len());
        addr[..encoded.len()].copy_from_slice(&encoded);
        handle.write_unlatch(addr, self.wal_policy.as_ref());
        self.mem.release(handle);

        self.log_delta(crate::wal::DeltaRecord {
            group_id: self.next_group_id(),
            page_id: self.meta_page_id,
            delta,
        })
    }

    // ---- External interface (spec section 6) ----

    pub fn root_level(&self) -> TreeResult<i32> {
        Ok(self.read_meta()?.root_level())
    }

    pub fn is_empty(&self) -> TreeResult<bool> {
        let meta = self.read_meta()?;
        if meta.root_level() != 0 {
            return Ok(false);
        }
        let root_id = meta.first_page_id(0).unwrap_or(NO_PAGE);
        let handle = self.mem.acquire(root_id)?;
        let addr = handle
            .read_latch()
            .ok_or_else(|| TreeError::corrupted("root leaf latch returned stale", [root_id]))?;
        let count = self.leaf_io.count(&addr);
        handle.read_unlatch(addr);
        self.mem.release(handle);
        Ok(count == 0)
    }

    pub fn find_one(&self, key: &[u8]) -> TreeResult<Option<Row>> {
        ops::search::find_one(self, key)
    }

    pub fn find_first(&self) -> TreeResult<Option<Row>> {
        ops::search::find_edge(self, true)
    }

    pub fn find_last(&self) -> TreeResult<Option<Row>> {
        ops::search::find_edge(self, false)
    }

    /// `find_one` restricted to keys where `filter` returns true; applied
    /// after the tree lookup, so it does not change which leaf is
    /// visited (spec section 6's `filter` parameter is a post-hoc
    /// predicate, not an index condition).
    pub fn find_one_filtered(&self, key: &[u8], filter: impl Fn(&Row) -> bool) -> TreeResult<Option<Row>> {
        Ok(self.find_one(key)?.filter(|r| filter(r)))
    }

    pub fn find(
        &self,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        low_incl: bool,
        up_incl: bool,
    ) -> TreeResult<Cursor> {
        ops::cursor::open(self, lower, upper, low_incl, up_incl)
    }

    /// Inserts a new row at `key` (spec section 4.4). Rejects an existing
    /// key with `TreeError::DuplicateKey` rather than replacing it -- use
    /// `invoke` with `InvokeAction::Put` for upsert semantics. The
    /// `Option<Row>` return is always `None` on success; it exists to
    /// match spec section 6's `put(row) -> Option<Row>` signature, but
    /// the reject-on-duplicate contract means a successful `put` never
    /// displaces a prior row to report.
    pub fn put(&self, key: &[u8], row: &[u8]) -> TreeResult<Option<Row>> {
        ops::insert::put(self, key, row)
    }

    /// Convenience matching spec section 6's `put_x`: inserts and reports
    /// whether the key was already present. A `DuplicateKey` from the
    /// underlying reject-on-duplicate `put` is exactly that answer, so it
    /// is translated to `Ok(true)` here instead of propagated.
    pub fn put_x(&self, key: &[u8], row: &[u8]) -> TreeResult<bool> {
        match ops::insert::put(self, key, row) {
            Ok(_) => Ok(false),
            Err(TreeError::DuplicateKey) => Ok(true),
            Err(e) => Err(e),
        }
    }

    pub fn remove(&self, key: &[u8]) -> TreeResult<Option<Row>> {
        ops::remove::remove(self, key)
    }

    pub fn remove_x(&self, key: &[u8]) -> TreeResult<bool> {
        Ok(ops::remove::remove(self, key)?.is_some())
    }

    pub fn remove_range(&self, lower: &[u8], upper: &[u8], limit: Option<u64>) -> TreeResult<Vec<Key>> {
        ops::remove::remove_range(self, lower, upper, limit)
    }

    pub fn invoke(
        &self,
        key: &[u8],
        closure: impl FnMut(Option<&Row>) -> InvokeAction,
    ) -> TreeResult<()> {
        ops::invoke::invoke(self, key, closure)
    }

    pub fn size(&self) -> TreeResult<u64> {
        let mut count = 0u64;
        let mut cursor = self.find(None, None, true, true)?;
        while cursor.next(self)?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Single-actor traversal that recycles every page reachable from the
    /// meta page, then flips the destroyed flag (spec section 3
    /// "Lifecycle"; section 4.8). Concurrent operations observing the
    /// flag abort with `Destroyed`. Not safe to call concurrently with
    /// itself; `force` skips the "already destroyed" early return for
    /// idempotent cleanup paths.
    pub fn destroy(&self, force: bool) -> TreeResult<PagesRecycled> {
        if self.is_destroyed() && !force {
            return Err(TreeError::Destroyed);
        }

        let meta = self.read_meta_allow_destroyed()?;
        let mut bag = ReuseBag::new();
        let mut recycled = 0u64;
        let mut visited_at_level: Vec<PageId> = Vec::new();

        for level in (0..=meta.root_level()).rev() {
            let mut page_id = meta.first_page_id(level).unwrap_or(NO_PAGE);
            let mut pages_at_level = Vec::new();
            while page_id != NO_PAGE {
                pages_at_level.push(page_id);
                let handle = self.mem.acquire(page_id)?;
                let addr = handle
                    .read_latch()
                    .ok_or_else(|| TreeError::corrupted("destroy: stale latch mid-walk", [page_id]))?;
                let fwd = if level == 0 { self.leaf_io.forward(&addr) } else { self.inner_io.forward(&addr) };
                handle.read_unlatch(addr);
                self.mem.release(handle);
                page_id = fwd;
            }
            visited_at_level.extend(pages_at_level);
        }

        for page_id in visited_at_level {
            let handle = self.mem.acquire(page_id)?;
            let recycled_id = self.mem.recycle(page_id, handle, self.wal_policy.as_ref())?;
            bag.push(recycled_id);
            recycled += 1;
            if let Some(every) = self.config.destroy_yield_every {
                if recycled % every as u64 == 0 {
                    std::thread::yield_now();
                }
            }
            if bag.len() >= self.config.reuse_drain_batch {
                self.flush_reuse_bag(&mut bag);
            }
        }
        self.flush_reuse_bag(&mut bag);

        self.mutate_meta(|m| m.destroyed = true, crate::wal::Delta::MetaCutRoot)?;
        self.destroyed.store(true, Ordering::Release);
        log::info!("tree '{}' destroyed: {recycled} pages recycled", self.name);
        Ok(PagesRecycled(recycled))
    }

    fn read_meta_allow_destroyed(&self) -> TreeResult<MetaPage> {
        let handle = self.mem.acquire(self.meta_page_id)?;
        let addr = handle
            .read_latch()
            .ok_or_else(|| TreeError::corrupted("meta page latch returned stale", [self.meta_page_id]))?;
        let meta = MetaPage::decode(&addr);
        handle.read_unlatch(addr);
        self.mem.release(handle);
        Ok(meta)
    }

    pub(crate) fn key_size(&self) -> usize {
        self.leaf_io.key_size
    }

    pub(crate) fn page_size(&self) -> usize {
        self.mem.page_size()
    }

    pub(crate) fn kind_for_level(&self, level: i32) -> PageKind {
        if level == 0 {
            PageKind::Leaf
        } else {
            PageKind::Inner
        }
    }

    pub(crate) fn io_for_level(&self, level: i32) -> Arc<dyn crate::io::NodeIo> {
        if level == 0 {
            self.leaf_io.clone()
        } else {
            self.inner_io.clone()
        }
    }
}
