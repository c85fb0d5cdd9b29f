//! The single process-wide cancellation flag (spec section 5,
//! "Cancellation"; section 9, "Global mutable state").
//!
//! Polled between retry-loop iterations only -- never inside a single
//! structural change, since aborting mid-split/merge would leave the
//! tree's invariants violated.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn set() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn clear() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

pub fn is_set() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
