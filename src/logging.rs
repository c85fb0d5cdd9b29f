//! Logging bootstrap for binaries and tests.
//!
//! Library code never calls [`init`] itself -- it only calls through the
//! `log` facade. Embedders wire up their own subscriber; test harnesses in
//! this crate call [`init`] once behind a [`std::sync::Once`], mirroring the
//! teacher's `init_log()` / `Builder::from_default_env()` pattern.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize a default `env_logger` subscriber. Safe to call multiple
/// times -- only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        env_logger::Builder::from_default_env()
            .format_timestamp_millis()
            .format_module_path(true)
            .try_init()
            .ok();
    });
}
