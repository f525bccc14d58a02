//! Logging setup for the `hexcarto` binary.
//!
//! Output goes to stderr so that stdout stays free for data. The filter defaults
//! to `info` and is overridable through `RUST_LOG`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `verbose` raises the default level to `debug`; an explicit `RUST_LOG` still wins.
/// Calling this more than once is harmless: later calls leave the first subscriber in place.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
