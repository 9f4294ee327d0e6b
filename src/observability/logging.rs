//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to the crate default level
//!
//! # Design Decisions
//! - Events go to stderr; stdout carries rendered configuration only
//! - `--verbose` lowers the default level to debug

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "nginx_config_builder=info";
const VERBOSE_FILTER: &str = "nginx_config_builder=debug";

/// Filter used when `RUST_LOG` is unset or invalid.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Install the global subscriber.
///
/// Calling it twice is harmless; the second subscriber is dropped.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose).into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "nginx_config_builder=info");
        assert_eq!(default_filter(true), "nginx_config_builder=debug");
    }

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
    }
}
