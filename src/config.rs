//! Tree construction options (spec section 6, "Configuration options").

/// Options recognized at tree construction. Built with plain field
/// assignment in the teacher's style (`ConcurrentStatus::new()`,
/// `PageCache::new()`) rather than a builder-derive crate -- the option
/// set is small and every field has a documented default.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Per-operation bounded retry budget before `LockRetryExhausted` is
    /// raised. Default 1000.
    pub lock_retries: u32,

    /// Biases leaf/inner splits toward keeping more of the page in the
    /// back (original) page, favoring strictly ascending insert
    /// workloads. Default false.
    pub sequential_write_opts_enabled: bool,

    /// Hint stored verbatim in the meta page; not interpreted by the
    /// core.
    pub inline_size: u16,

    /// Default flag word stamped into newly allocated pages.
    pub page_flag: u16,

    /// Whether the configured IO can reconstruct a full row from an
    /// inner-node item alone, without descending to the leaf. Derived
    /// from the IO descriptor registered for the tree, not user-set, but
    /// surfaced here since callers inspect it to decide whether
    /// `find_first`/`find_last` need a leaf visit.
    pub can_get_row_from_inner: bool,

    /// Fraction of `max_count` below which a leaf is a regular-merge
    /// candidate. Per spec section 9 this is wired in but pinned at 0.0
    /// in the corpus this was distilled from, which collapses
    /// regular-merge into "merge iff empty". We preserve that observable
    /// behavior; a non-zero value enables the (otherwise dormant)
    /// random early-merge path in `ops::remove`.
    pub min_fill: f32,

    /// See `min_fill`. Also defaults to 0.0.
    pub max_fill: f32,

    /// How long (in page-visits) `Tree::destroy` holds its write-latch
    /// chain before releasing and reacquiring cooperatively, letting
    /// checkpoints make progress. `None` means "never release" -- the
    /// spec explicitly says not to guess a preempting default; embedders
    /// with checkpointing must opt in.
    pub destroy_yield_every: Option<u32>,

    /// Number of recycled page ids accumulated before a reuse bag is
    /// drained to the reuse list mid-operation (destroy drains every 128
    /// pages per spec section 4.8).
    pub reuse_drain_batch: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            lock_retries: 1000,
            sequential_write_opts_enabled: false,
            inline_size: 0,
            page_flag: 0,
            can_get_row_from_inner: false,
            min_fill: 0.0,
            max_fill: 0.0,
            destroy_yield_every: None,
            reuse_drain_batch: 128,
        }
    }
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_retries(mut self, retries: u32) -> Self {
        self.lock_retries = retries;
        self
    }

    pub fn with_sequential_write_opts(mut self, enabled: bool) -> Self {
        self.sequential_write_opts_enabled = enabled;
        self
    }

    pub fn with_inline_size(mut self, inline_size: u16) -> Self {
        self.inline_size = inline_size;
        self
    }
}
