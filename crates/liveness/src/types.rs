//! Roster, liveness and probe result types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// One row of the roster: a server and its two addresses.
///
/// Either address may be empty, in which case that address class is never
/// probed for this server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    pub primary_address: String,
    pub management_address: String,
}

impl ServerRecord {
    pub fn new(
        name: impl Into<String>,
        primary_address: impl Into<String>,
        management_address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_address: primary_address.into(),
            management_address: management_address.into(),
        }
    }

    /// Address for the given class.
    pub fn address(&self, class: AddressClass) -> &str {
        match class {
            AddressClass::Primary => &self.primary_address,
            AddressClass::Management => &self.management_address,
        }
    }

    pub(crate) fn set_address(&mut self, class: AddressClass, value: String) {
        match class {
            AddressClass::Primary => self.primary_address = value,
            AddressClass::Management => self.management_address = value,
        }
    }
}

/// Immutable ordered view of the roster at a point in time.
///
/// Position in the slice is the server index used everywhere else.
pub type RosterSnapshot = Arc<[ServerRecord]>;

/// Which of a server's two addresses a probe or edit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressClass {
    /// Main service address
    Primary,
    /// Out-of-band management address
    Management,
}

impl AddressClass {
    pub const ALL: [AddressClass; 2] = [AddressClass::Primary, AddressClass::Management];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressClass::Primary => "primary",
            AddressClass::Management => "management",
        }
    }
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state reachability of one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reachability::Unknown => "unknown",
            Reachability::Up => "up",
            Reachability::Down => "down",
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness of a single address class.
///
/// `last_success` is set iff `up` has transitioned to `Up` since the entry
/// was created or last cleared. A failed probe never clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressLiveness {
    pub up: Reachability,
    pub last_success: Option<SystemTime>,
}

impl AddressLiveness {
    pub(crate) fn record(&mut self, success: bool, now: SystemTime) {
        if success {
            self.up = Reachability::Up;
            self.last_success = Some(now);
        } else {
            self.up = Reachability::Down;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = AddressLiveness::default();
    }

    /// Time elapsed since the last success, measured against `now`.
    pub fn staleness(&self, now: SystemTime) -> Option<Duration> {
        self.last_success
            .map(|at| now.duration_since(at).unwrap_or_default())
    }
}

/// Liveness fields for one roster index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LivenessEntry {
    pub primary: AddressLiveness,
    pub management: AddressLiveness,
}

impl LivenessEntry {
    pub fn get(&self, class: AddressClass) -> &AddressLiveness {
        match class {
            AddressClass::Primary => &self.primary,
            AddressClass::Management => &self.management,
        }
    }

    pub(crate) fn get_mut(&mut self, class: AddressClass) -> &mut AddressLiveness {
        match class {
            AddressClass::Primary => &mut self.primary,
            AddressClass::Management => &mut self.management,
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == LivenessEntry::default()
    }
}

/// A roster row paired with its liveness, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub index: usize,
    pub name: String,
    pub primary_address: String,
    pub management_address: String,
    pub primary_up: Reachability,
    #[serde(serialize_with = "serialize_timestamp")]
    pub primary_last_success: Option<SystemTime>,
    pub primary_seconds_since: Option<u64>,
    pub management_up: Reachability,
    #[serde(serialize_with = "serialize_timestamp")]
    pub management_last_success: Option<SystemTime>,
    pub management_seconds_since: Option<u64>,
}

impl ServerStatus {
    pub fn new(index: usize, server: &ServerRecord, entry: &LivenessEntry, now: SystemTime) -> Self {
        Self {
            index,
            name: server.name.clone(),
            primary_address: server.primary_address.clone(),
            management_address: server.management_address.clone(),
            primary_up: entry.primary.up,
            primary_last_success: entry.primary.last_success,
            primary_seconds_since: entry.primary.staleness(now).map(|d| d.as_secs()),
            management_up: entry.management.up,
            management_last_success: entry.management.last_success,
            management_seconds_since: entry.management.staleness(now).map(|d| d.as_secs()),
        }
    }
}

/// RFC 3339 rendering shared by the status API and the export report.
pub fn format_timestamp(at: SystemTime) -> String {
    humantime::format_rfc3339_seconds(at).to_string()
}

fn serialize_timestamp<S>(value: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(at) => serializer.serialize_some(&format_timestamp(*at)),
        None => serializer.serialize_none(),
    }
}

/// Probe status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Target answered within the timeout
    Reachable,
    /// Target answered negatively or could not be reached
    Unreachable,
    /// No answer before the timeout
    Timeout,
    /// The probe itself could not be carried out
    Error,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Reachable => "reachable",
            ProbeStatus::Unreachable => "unreachable",
            ProbeStatus::Timeout => "timeout",
            ProbeStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Reachable => write!(f, "REACHABLE"),
            ProbeStatus::Unreachable => write!(f, "UNREACHABLE"),
            ProbeStatus::Timeout => write!(f, "TIMEOUT"),
            ProbeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one probe
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Status of the probe
    pub status: ProbeStatus,

    /// Duration of the probe
    pub duration: Duration,

    /// Optional error message
    pub message: Option<String>,
}

impl ProbeResult {
    pub fn reachable(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Reachable,
            duration,
            message: None,
        }
    }

    pub fn unreachable(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unreachable,
            duration,
            message: Some(message.into()),
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self {
            status: ProbeStatus::Timeout,
            duration,
            message: Some("Probe timed out".to_string()),
        }
    }

    pub fn error(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            duration,
            message: Some(message.into()),
        }
    }

    /// Boolean projection used by the store: every non-reachable outcome is a failure.
    pub fn is_up(&self) -> bool {
        self.status == ProbeStatus::Reachable
    }
}
