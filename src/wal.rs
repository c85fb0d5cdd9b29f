//! Delta records and the write-ahead log interface the core logs through.
//!
//! The log itself (append, flush, checkpoint, replay) is out of scope for
//! this crate (spec section 1); `WriteAheadLog` is the thin contract the
//! core consumes, mirroring the teacher's `LogManager`/`log_aries` split
//! between "what gets logged" and "how the log is durable".

use crate::page::PageId;

/// Monotonic identifier grouping every delta logged by a single external
/// operation, so a replay tool can find "everything `put(row)` touched".
pub type GroupId = u64;

/// A small physical-logical log entry: a single mutation to a single
/// page, sufficient to replay on a prior image of that page (spec
/// section 6, "Delta records").
#[derive(Debug, Clone)]
pub enum Delta {
    Insert {
        idx: i32,
        key_bytes: Vec<u8>,
        right_child: PageId,
    },
    Replace {
        idx: i32,
        key_bytes: Vec<u8>,
    },
    Remove {
        idx: i32,
        count: u16,
    },
    SplitExistingPage {
        mid: u16,
        forward_id: PageId,
    },
    FixCount {
        count: u16,
    },
    FixLeftmostChild {
        child_id: PageId,
    },
    FixRemoveId {
        removal_counter: u64,
    },
    NewRootInit {
        root_id: PageId,
        left_child: PageId,
        key_bytes: Vec<u8>,
        right_child: PageId,
    },
    MetaAddRoot {
        root_id: PageId,
    },
    MetaCutRoot,
    MetaInitRoot {
        root_id: PageId,
        inline_size: u16,
    },
}

/// A delta record tagged with the group and page it belongs to, ready to
/// hand to the log.
#[derive(Debug, Clone)]
pub struct DeltaRecord {
    pub group_id: GroupId,
    pub page_id: PageId,
    pub delta: Delta,
}

/// Policy hook deciding whether a given write needs a durability record
/// at all (e.g. pages created and destroyed within the same checkpoint
/// window might not).
pub trait WalPolicy: Send + Sync {
    fn needs_wal_delta(&self, page_id: PageId) -> bool;
}

/// Always logs every mutation. The conservative default; embedders with a
/// smarter policy (e.g. steal/no-force bookkeeping) supply their own.
pub struct AlwaysLog;

impl WalPolicy for AlwaysLog {
    fn needs_wal_delta(&self, _page_id: PageId) -> bool {
        true
    }
}

/// The write-ahead log the core appends to. The log is append-only and
/// the engine never reads it back; replay is an offline concern of the
/// embedder.
pub trait WriteAheadLog: Send + Sync {
    fn log(&self, record: DeltaRecord) -> crate::error::TreeResult<()>;
}

/// A `WriteAheadLog` that discards everything, for tests that only care
/// about tree-level behavior.
pub struct NullWal;

impl WriteAheadLog for NullWal {
    fn log(&self, _record: DeltaRecord) -> crate::error::TreeResult<()> {
        Ok(())
    }
}
