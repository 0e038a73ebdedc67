//! Server configuration and HTTP payload types.

use crate::roster::RosterFormat;
use liveness::{AddressClass, ServerStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which prober the scheduler uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// One echo request through the system `ping`
    #[default]
    Icmp,
    /// TCP connect
    Tcp,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API listen address
    pub listen_addr: String,

    /// Tick interval used by autostart and by `POST /start` without a body
    pub interval_seconds: u64,

    /// Start probing as soon as the process is up
    pub autostart: bool,

    /// Concurrent primary probes per batch
    pub batch_size: usize,

    /// Minimum spacing between successful management probes
    pub management_interval: Duration,

    pub probe_kind: ProbeKind,

    /// Per-probe timeout
    pub probe_timeout: Duration,

    /// Port used by the TCP prober when an address carries none
    pub tcp_port: u16,

    /// Executable used by the ICMP prober
    pub ping_command: String,

    /// Name prefixes that make a server eligible for probing
    pub eligible_prefixes: Vec<String>,

    /// Roster CSV loaded at startup
    pub roster_path: Option<PathBuf>,

    /// Whether roster CSVs start with a header row
    pub roster_has_headers: bool,

    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            interval_seconds: liveness::scheduler::DEFAULT_INTERVAL_SECONDS,
            autostart: false,
            batch_size: liveness::scheduler::DEFAULT_BATCH_SIZE,
            management_interval: liveness::scheduler::DEFAULT_MANAGEMENT_INTERVAL,
            probe_kind: ProbeKind::Icmp,
            probe_timeout: Duration::from_secs(1),
            tcp_port: 22,
            ping_command: "ping".to_string(),
            eligible_prefixes: liveness::eligibility::DEFAULT_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            roster_path: None,
            roster_has_headers: false,
            metrics_enabled: true,
        }
    }
}

/// `GET /status` body
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub interval_seconds: u64,
    pub servers: Vec<ServerStatus>,
}

/// `POST /start` body; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    pub interval_seconds: Option<u64>,
}

/// `POST /roster` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterQuery {
    pub headers: Option<bool>,
    /// Overrides the format implied by `Content-Type`
    pub format: Option<RosterFormat>,
}

/// `POST /roster` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    pub servers: usize,
}

/// `POST /address` body
#[derive(Debug, Clone, Deserialize)]
pub struct AddressEdit {
    pub index: usize,
    pub class: AddressClass,
    pub value: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
