//! The failure processor interface (spec section 1, "external
//! collaborators"; section 7, policy on `LockRetryExhausted` /
//! `CorruptedDataStructure`).

use crate::page::PageId;

/// Context handed to the failure processor when the engine detects
/// corruption or exhausts its retry budget. Carries enough to let the
/// embedder decide whether to quarantine a tree, page an operator, or
/// just count a metric.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub group: String,
    pub tree_name: String,
    pub meta_page_id: PageId,
    pub retries_configured: u32,
    pub detail: String,
    pub implicated_pages: Vec<PageId>,
}

/// External collaborator notified on detected corruption or lock-retry
/// exhaustion. Out of scope for this crate; consumed only.
pub trait FailureProcessor: Send + Sync {
    fn on_failure(&self, ctx: FailureContext);
}

/// A `FailureProcessor` that only logs at `error!`, for tests and
/// embedders with no dedicated failure pipeline.
pub struct LogOnlyFailureProcessor;

impl FailureProcessor for LogOnlyFailureProcessor {
    fn on_failure(&self, ctx: FailureContext) {
        log::error!(
            "tree failure group={} tree={} meta_page={} retries={} detail={} pages={:?}",
            ctx.group,
            ctx.tree_name,
            ctx.meta_page_id,
            ctx.retries_configured,
            ctx.detail,
            ctx.implicated_pages
        );
    }
}
