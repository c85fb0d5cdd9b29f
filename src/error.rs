//! Error taxonomy surfaced across the crate's public API.
//!
//! Transient control-flow signals (`Retry`, `RetryRoot`, and the rest of
//! the descent state machine) are *not* part of this enum -- they never
//! cross an operation boundary. See [`crate::ops::Loop`] and
//! [`crate::ops::search::descend_apply`].

use std::fmt;

use crate::page::PageId;

/// Errors that can be observed by a caller of the tree's external interface.
#[derive(thiserror::Error, Debug)]
pub enum TreeError {
    /// `put` was called with a key that already exists in the tree.
    #[error("duplicate key")]
    DuplicateKey,

    /// The bounded retry budget for a single operation was exhausted.
    /// The tree is suspected corrupted; the failure processor has already
    /// been notified by the time this is returned.
    #[error("lock retry budget exhausted after {retries} attempts in {group}")]
    LockRetryExhausted { group: String, retries: u32 },

    /// A runtime invariant check failed. Carries the page ids implicated
    /// so the embedder's failure processor can act on them.
    #[error("corrupted data structure: {detail} (pages: {pages:?})")]
    CorruptedDataStructure { detail: String, pages: Vec<PageId> },

    /// The tree's `destroy` flag was observed between steps of an
    /// in-flight operation.
    #[error("tree has been destroyed")]
    Destroyed,

    /// The process-wide interrupt flag was observed between retries.
    #[error("operation interrupted")]
    Interrupted,

    /// The underlying page memory manager refused allocation because it
    /// is shutting down.
    #[error("page memory is stopping")]
    NodeStopping,

    /// The underlying page memory manager is out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Propagated from a write-ahead log flush.
    #[error("io error: {0}")]
    Io(String),
}

impl TreeError {
    pub fn corrupted(detail: impl Into<String>, pages: impl IntoIterator<Item = PageId>) -> Self {
        TreeError::CorruptedDataStructure {
            detail: detail.into(),
            pages: pages.into_iter().collect(),
        }
    }
}

/// Result alias used throughout the public API.
pub type TreeResult<T> = Result<T, TreeError>;

/// Outcome of looking up a page through the latch-coupling contract:
/// a latch read returning the sentinel "0 address" from spec section 4.1
/// means the page was concurrently recycled and the caller must restart
/// its current retry iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recycled;

impl fmt::Display for Recycled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page was concurrently recycled")
    }
}
