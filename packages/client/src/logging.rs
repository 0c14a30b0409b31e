//! Tracing setup for binaries embedding the client.

use tracing_subscriber::{fmt, EnvFilter};

/// Default directive when neither `filter` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Install a `fmt` subscriber filtered by `filter`, falling back to
/// `RUST_LOG`, then [`DEFAULT_FILTER`].
///
/// Returns `false` if a global subscriber was already installed; calling
/// this more than once is harmless.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    fmt().with_env_filter(filter).try_init().is_ok()
}
