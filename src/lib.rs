//! `crabtree` — a concurrent, persistent B+Tree index engine over a
//! fixed-size paged memory substrate.
//!
//! The tree itself is the whole of this crate: page layout and delta
//! records (`page`, `wal`), the lock-coupling search/insert/remove/invoke
//! algorithms (`ops`), the meta page and destroy/reuse lifecycle
//! (`tree`, `reuse`), and the external API (`tree::Tree`). The paged
//! memory manager, the write-ahead log, the reuse list and the failure
//! processor are consumed as traits (`mem::PageMemory`, `wal::WriteAheadLog`,
//! `reuse::ReuseList`, `failure::FailureProcessor`) — their real
//! implementations live one layer up in the storage engine this crate is
//! extracted from.

pub mod config;
pub mod error;
pub mod failure;
pub mod interrupt;
pub mod io;
pub mod logging;
pub mod mem;
pub mod ops;
pub mod page;
pub mod reuse;
pub mod stats;
pub mod tail;
pub mod tree;
pub mod validate;
pub mod wal;

pub use config::TreeConfig;
pub use error::{TreeError, TreeResult};
pub use io::KeyComparator;
pub use page::PageId;
pub use tree::Tree;
