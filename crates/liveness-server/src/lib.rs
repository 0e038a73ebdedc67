//! Pingwatch liveness server
//!
//! Wraps the `liveness` core in a small HTTP API: upload a roster, start and
//! stop probing, poll status, edit addresses and export a report.
//!
//! # Components
//!
//! - **Config**: YAML configuration with validated defaults
//! - **Roster/Export**: CSV or spreadsheet in, CSV out
//! - **ApiServer**: axum router over the shared scheduler and store
//! - **LivenessServer**: wires everything together and handles shutdown

pub mod config;
pub mod export;
pub mod http_server;
pub mod roster;
pub mod server;
pub mod telemetry;
pub mod types;

pub use config::{Config, ConfigError};
pub use http_server::{ApiError, ApiServer, AppState, router};
pub use roster::RosterFormat;
pub use server::{LivenessServer, build_prober};
pub use telemetry::{TelemetryGuard, init_telemetry, setup_tracing};
pub use types::{ProbeKind, ServerConfig};
