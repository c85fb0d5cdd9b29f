//! The I/O statistics holder (spec section 1, "external collaborators").
//! Out of scope for this crate's logic; the core just pokes counters
//! through this trait so an embedder's stats dashboard stays accurate.

/// Counters the core increments as it does page IO. An embedder plugs in
/// whatever aggregation/export story it already has (the teacher has
/// none; the pack's `reedbase`/`wrongodb` examples wire similar counters
/// into a metrics registry at this same seam).
pub trait IoStats: Send + Sync {
    fn on_page_read(&self) {}
    fn on_page_write(&self) {}
    fn on_page_alloc(&self) {}
    fn on_page_recycle(&self) {}
    fn on_split(&self) {}
    fn on_merge(&self) {}
    fn on_retry(&self) {}
}

/// An `IoStats` that drops every event, for embedders with no stats
/// collector configured.
pub struct NullStats;

impl IoStats for NullStats {}
