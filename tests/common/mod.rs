//! Common test utilities for identity translation integration tests.
//!
//! - `builders` - fluent builders for profile documents and inputs
//! - `fixtures` - ready-made profile documents
//! - `spy` - a recording action and a recording reconciler

pub mod builders;
pub mod fixtures;
pub mod spy;

pub use builders::{ProfileBuilder, local_input, remote_input};
pub use spy::{RecordingReconciler, SpyLog, spy_registry};

/// Install `env_logger` once; set `RUST_LOG=debug` to see rule decisions.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
