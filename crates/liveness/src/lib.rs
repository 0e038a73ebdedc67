//! Fleet liveness tracking.
//!
//! This crate keeps a roster of servers, each with a primary address and an
//! out-of-band management address, and periodically probes both to record
//! when each last answered.
//!
//! # Components
//!
//! - **Probers**: one bounded-timeout reachability check (ICMP via the system
//!   `ping`, or TCP connect)
//! - **Eligibility**: name-prefix policy deciding which servers are probed
//! - **LivenessStore**: roster plus per-server liveness, shared between the
//!   scheduler and readers
//! - **ProbeScheduler**: the start/stop-able loop fanning probes out in
//!   bounded batches, with a slower cadence for management addresses
//!
//! # Example
//!
//! ```no_run
//! use liveness::{IcmpProber, LivenessStore, ProbeScheduler, SchedulerSettings, ServerRecord};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(LivenessStore::new());
//! store
//!     .replace_roster(vec![ServerRecord::new("DP-web-01", "10.0.0.1", "10.0.1.1")])
//!     .await;
//!
//! let prober = Arc::new(IcmpProber::new(Duration::from_secs(1)));
//! let scheduler = ProbeScheduler::new(store.clone(), prober, SchedulerSettings::default(), None);
//! scheduler.start(5).await?;
//!
//! for row in store.status().await {
//!     println!("{} primary={} ({:?}s ago)", row.name, row.primary_up, row.primary_seconds_since);
//! }
//!
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod eligibility;
pub mod metrics;
pub mod probers;
pub mod scheduler;
pub mod store;
pub mod types;

pub use clock::Clock;
pub use eligibility::Eligibility;
pub use metrics::MetricsRegistry;
pub use probers::{IcmpProber, Prober, TcpProber};
pub use scheduler::{ProbeScheduler, SchedulerSettings};
pub use store::{LivenessStore, LivenessTable};
pub use types::{
    AddressClass, AddressLiveness, LivenessEntry, ProbeResult, ProbeStatus, Reachability,
    RosterSnapshot, ServerRecord, ServerStatus,
};
