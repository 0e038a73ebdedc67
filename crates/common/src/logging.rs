//! Logging utilities for pingwatch components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the env filter, letting RUST_LOG override the configured level.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with an explicit default level, optionally as JSON.
pub fn init_with_level(default_level: &str, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter(default_level));

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
