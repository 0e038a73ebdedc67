//! Prometheus metrics for the probe scheduler.

use crate::types::{AddressClass, LivenessEntry, ProbeStatus, Reachability};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for per-class metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClassLabels {
    /// Address class (primary, management)
    pub class: String,
}

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Address class (primary, management)
    pub class: String,
    /// Result (reachable, unreachable, timeout, error)
    pub result: String,
}

/// Labels for state-based metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StateLabels {
    /// Address class (primary, management)
    pub class: String,
    /// State (up, down, unknown)
    pub state: String,
}

/// Metrics registry with all scheduler metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Probes performed
    probes_total: Family<ProbeLabels, Counter>,
    /// Probe latency
    probe_duration_seconds: Family<ClassLabels, Histogram>,
    /// Probe results dropped because the roster changed underneath them
    stale_results_total: Counter,
    /// Probe tasks that panicked or were cancelled
    probe_task_failures_total: Counter,

    /// Completed ticks
    ticks_total: Counter,
    /// Tick duration, probing only
    tick_duration_seconds: Histogram,
    /// Whether the scheduling loop is running
    scheduler_running: Gauge,

    /// Servers in the loaded roster
    servers: Gauge,
    /// Addresses by class and reachability
    addresses_by_state: Family<StateLabels, Gauge>,
    /// Roster replacements
    roster_replacements_total: Counter,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "liveness_probes",
            "Total probes performed",
            probes_total.clone(),
        );

        let probe_duration_seconds =
            Family::<ClassLabels, Histogram>::new_with_constructor(|| {
                // 1ms to ~8s
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "liveness_probe_duration_seconds",
            "Probe duration in seconds",
            probe_duration_seconds.clone(),
        );

        let stale_results_total = Counter::default();
        registry.register(
            "liveness_stale_results",
            "Probe results discarded after a roster change",
            stale_results_total.clone(),
        );

        let probe_task_failures_total = Counter::default();
        registry.register(
            "liveness_probe_task_failures",
            "Probe tasks that did not complete",
            probe_task_failures_total.clone(),
        );

        let ticks_total = Counter::default();
        registry.register(
            "liveness_ticks",
            "Completed scheduler ticks",
            ticks_total.clone(),
        );

        let tick_duration_seconds = Histogram::new(exponential_buckets(0.01, 2.0, 14));
        registry.register(
            "liveness_tick_duration_seconds",
            "Time spent probing per tick in seconds",
            tick_duration_seconds.clone(),
        );

        let scheduler_running = Gauge::default();
        registry.register(
            "liveness_scheduler_running",
            "Whether the probe scheduler is running (1) or stopped (0)",
            scheduler_running.clone(),
        );

        let servers = Gauge::default();
        registry.register(
            "liveness_servers",
            "Servers in the loaded roster",
            servers.clone(),
        );

        let addresses_by_state = Family::<StateLabels, Gauge>::default();
        registry.register(
            "liveness_addresses_by_state",
            "Addresses by class and reachability",
            addresses_by_state.clone(),
        );

        let roster_replacements_total = Counter::default();
        registry.register(
            "liveness_roster_replacements",
            "Roster uploads that replaced the monitored servers",
            roster_replacements_total.clone(),
        );

        Self {
            registry,
            probes_total,
            probe_duration_seconds,
            stale_results_total,
            probe_task_failures_total,
            ticks_total,
            tick_duration_seconds,
            scheduler_running,
            servers,
            addresses_by_state,
            roster_replacements_total,
        }
    }

    /// Record a probe result
    pub fn record_probe(&self, class: AddressClass, status: ProbeStatus, duration: Duration) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                class: class.to_string(),
                result: status.as_str().to_string(),
            })
            .inc();

        self.probe_duration_seconds
            .get_or_create(&ClassLabels {
                class: class.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_stale_result(&self) {
        self.stale_results_total.inc();
    }

    pub fn record_probe_task_failure(&self) {
        self.probe_task_failures_total.inc();
    }

    /// Record a completed tick
    pub fn record_tick(&self, duration: Duration) {
        self.ticks_total.inc();
        self.tick_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn set_scheduler_running(&self, running: bool) {
        self.scheduler_running.set(if running { 1 } else { 0 });
    }

    pub fn record_roster_replacement(&self, servers: usize) {
        self.roster_replacements_total.inc();
        self.servers.set(servers as i64);
    }

    /// Update roster size and per-state address counts from a snapshot
    pub fn update_liveness(&self, entries: &[LivenessEntry]) {
        self.servers.set(entries.len() as i64);

        for class in AddressClass::ALL {
            let mut up = 0;
            let mut down = 0;
            let mut unknown = 0;
            for entry in entries {
                match entry.get(class).up {
                    Reachability::Up => up += 1,
                    Reachability::Down => down += 1,
                    Reachability::Unknown => unknown += 1,
                }
            }

            for (state, count) in [
                (Reachability::Up, up),
                (Reachability::Down, down),
                (Reachability::Unknown, unknown),
            ] {
                self.addresses_by_state
                    .get_or_create(&StateLabels {
                        class: class.to_string(),
                        state: state.to_string(),
                    })
                    .set(count);
            }
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
