//! Logging setup
//!
//! Installs a `tracing-subscriber` registry with an env filter and a fmt
//! layer. `RUST_LOG` overrides the default directives.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directives
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "debug,layer_compiler=trace"
    } else {
        "info"
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed, which makes the
/// call safe to repeat from tests.
pub fn init_logging(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
