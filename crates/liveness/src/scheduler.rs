//! The probing loop.
//!
//! One loop task per process. Each tick snapshots the roster, probes every
//! eligible primary address in bounded concurrent batches, then walks the
//! management addresses serially on a slower cadence, and sleeps. Every
//! probe runs on its own task, so a panicking prober never takes the loop
//! down with it. Stop is
//! cooperative: it is observed after a batch completes and while sleeping,
//! never in the middle of a probe.

use crate::eligibility::Eligibility;
use crate::metrics::MetricsRegistry;
use crate::probers::Prober;
use crate::store::{LivenessStore, ProbeTarget, TickPlan};
use crate::types::{AddressClass, ProbeResult};
use common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of primary probes in flight at once.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default minimum spacing between successful management probes.
pub const DEFAULT_MANAGEMENT_INTERVAL: Duration = Duration::from_secs(60);

/// Default tick interval.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 5;

/// Tunables that stay fixed for the lifetime of a scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Upper bound on concurrent primary probes
    pub batch_size: usize,

    /// A management address is re-probed only once this much time has
    /// passed since its last success
    pub management_interval: Duration,

    /// Which servers may be probed
    pub eligibility: Eligibility,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            management_interval: DEFAULT_MANAGEMENT_INTERVAL,
            eligibility: Eligibility::default(),
        }
    }
}

/// Handle on a launched loop.
struct ActiveLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveLoop {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Everything the loop task owns.
struct LoopContext {
    store: Arc<LivenessStore>,
    prober: Arc<dyn Prober>,
    settings: SchedulerSettings,
    metrics: Option<Arc<MetricsRegistry>>,
    interval_rx: watch::Receiver<Duration>,
}

/// Periodic prober of the roster held in a [`LivenessStore`].
pub struct ProbeScheduler {
    store: Arc<LivenessStore>,
    prober: Arc<dyn Prober>,
    settings: SchedulerSettings,
    metrics: Option<Arc<MetricsRegistry>>,
    interval_tx: watch::Sender<Duration>,
    active: Mutex<Option<ActiveLoop>>,
}

impl ProbeScheduler {
    /// Create a new, stopped scheduler
    pub fn new(
        store: Arc<LivenessStore>,
        prober: Arc<dyn Prober>,
        settings: SchedulerSettings,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        let (interval_tx, _) =
            watch::channel(Duration::from_secs(DEFAULT_INTERVAL_SECONDS));
        let batch_size = settings.batch_size.max(1);

        Self {
            store,
            prober,
            settings: SchedulerSettings {
                batch_size,
                ..settings
            },
            metrics,
            interval_tx,
            active: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<LivenessStore> {
        &self.store
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Current tick interval in whole seconds
    pub fn interval_seconds(&self) -> u64 {
        self.interval_tx.borrow().as_secs()
    }

    /// Whether a loop is running and has not been asked to stop
    pub async fn is_running(&self) -> bool {
        self.active.lock().await.as_ref().is_some_and(ActiveLoop::is_live)
    }

    /// Start probing every `interval_seconds`.
    ///
    /// When a loop is already running only the interval changes; it applies
    /// from the next sleep. When a stopped loop is still finishing its batch,
    /// this waits for it to exit before launching the new one.
    pub async fn start(&self, interval_seconds: u64) -> Result<()> {
        let interval = validate_interval(interval_seconds)?;
        self.interval_tx.send_replace(interval);

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveLoop::is_live) {
            info!(interval_seconds, "Scheduler already running, interval updated");
            return Ok(());
        }

        if let Some(previous) = active.take() {
            previous.cancel.cancel();
            if let Err(e) = previous.handle.await {
                warn!(error = %e, "Previous scheduler loop ended abnormally");
            }
        }

        let cancel = CancellationToken::new();
        let context = LoopContext {
            store: self.store.clone(),
            prober: self.prober.clone(),
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
            interval_rx: self.interval_tx.subscribe(),
        };
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            context.run(loop_cancel).await;
        });

        if let Some(ref m) = self.metrics {
            m.set_scheduler_running(true);
        }
        info!(
            interval_seconds,
            prober = self.prober.name(),
            batch_size = self.settings.batch_size,
            "Scheduler started"
        );

        *active = Some(ActiveLoop { cancel, handle });
        Ok(())
    }

    /// Ask the loop to stop. Returns immediately; an in-flight batch finishes.
    pub async fn stop(&self) {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(running) if !running.cancel.is_cancelled() => {
                running.cancel.cancel();
                if let Some(ref m) = self.metrics {
                    m.set_scheduler_running(false);
                }
                info!("Scheduler stop requested");
            }
            _ => debug!("Scheduler already stopped"),
        }
    }

    /// Change the tick interval without stopping.
    pub fn reconfigure(&self, interval_seconds: u64) -> Result<()> {
        let interval = validate_interval(interval_seconds)?;
        self.interval_tx.send_replace(interval);
        info!(interval_seconds, "Scheduler interval changed");
        Ok(())
    }

    /// Stop and wait until the loop has exited.
    pub async fn shutdown(&self) {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
            if let Some(ref m) = self.metrics {
                m.set_scheduler_running(false);
            }
            if let Err(e) = previous.handle.await {
                warn!(error = %e, "Scheduler loop ended abnormally");
            }
            info!("Scheduler shut down");
        }
    }
}

fn validate_interval(interval_seconds: u64) -> Result<Duration> {
    if interval_seconds == 0 {
        return Err(Error::InvalidInterval(interval_seconds));
    }
    Ok(Duration::from_secs(interval_seconds))
}

/// Whether a management address should be probed this tick.
///
/// Gated on time since the last *success*: an address that keeps failing is
/// retried every tick.
fn management_due(last_success: Option<SystemTime>, now: SystemTime, gap: Duration) -> bool {
    match last_success {
        None => true,
        Some(at) => now.duration_since(at).unwrap_or_default() >= gap,
    }
}

impl LoopContext {
    async fn run(mut self, cancel: CancellationToken) {
        debug!("Scheduler loop started");

        while !cancel.is_cancelled() {
            let start = Instant::now();
            let completed = self.tick(&cancel).await;

            if let Some(ref m) = self.metrics {
                if completed {
                    m.record_tick(start.elapsed());
                }
                m.update_liveness(&self.store.snapshot().await);
            }

            if !completed {
                break;
            }

            let interval = *self.interval_rx.borrow_and_update();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        debug!("Scheduler loop exited");
    }

    /// Run one tick. Returns `false` if stop was observed part way through.
    async fn tick(&self, cancel: &CancellationToken) -> bool {
        let plan = self.store.plan().await;
        let eligibility = &self.settings.eligibility;

        let primary = plan.targets(AddressClass::Primary, |_, server| {
            eligibility.is_eligible(&server.name)
        });
        debug!(
            generation = plan.generation,
            servers = plan.roster.len(),
            targets = primary.len(),
            "Tick started"
        );

        for batch in primary.chunks(self.settings.batch_size) {
            self.probe_batch(batch).await;
            if cancel.is_cancelled() {
                debug!("Stop observed after primary batch");
                return false;
            }
        }

        for target in self.management_targets(&plan) {
            self.probe_one(target).await;
            if cancel.is_cancelled() {
                debug!("Stop observed after management probe");
                return false;
            }
        }

        true
    }

    fn management_targets(&self, plan: &TickPlan) -> Vec<ProbeTarget> {
        let now = self.store.clock().now();
        let gap = self.settings.management_interval;
        let eligibility = &self.settings.eligibility;

        plan.targets(AddressClass::Management, |index, server| {
            eligibility.is_eligible(&server.name)
                && management_due(
                    plan.management_last_success.get(index).copied().flatten(),
                    now,
                    gap,
                )
        })
    }

    /// Probe every target concurrently and wait for all of them.
    async fn probe_batch(&self, batch: &[ProbeTarget]) {
        let mut tasks = JoinSet::new();
        for target in batch {
            let prober = self.prober.clone();
            let target = target.clone();
            tasks.spawn(async move {
                let result = prober.check(&target.address).await;
                (target, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((target, result)) => self.apply(&target, &result).await,
                Err(e) => self.task_failed(e),
            }
        }
    }

    /// Probe a single target on its own task so a panic stays contained.
    async fn probe_one(&self, target: ProbeTarget) {
        let prober = self.prober.clone();
        let address = target.address.clone();
        let task = tokio::spawn(async move { prober.check(&address).await });

        match task.await {
            Ok(result) => self.apply(&target, &result).await,
            Err(e) => self.task_failed(e),
        }
    }

    fn task_failed(&self, error: JoinError) {
        warn!(error = %error, "Probe task failed");
        if let Some(ref m) = self.metrics {
            m.record_probe_task_failure();
        }
    }

    async fn apply(&self, target: &ProbeTarget, result: &ProbeResult) {
        if let Some(ref m) = self.metrics {
            m.record_probe(target.class, result.status, result.duration);
        }

        let success = result.is_up();
        if self.store.record_probe(target, success).await {
            debug!(
                index = target.index,
                class = %target.class,
                address = %target.address,
                status = %result.status,
                "Probe recorded"
            );
        } else if let Some(ref m) = self.metrics {
            m.record_stale_result();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_management_due() {
        let gap = Duration::from_secs(60);
        assert!(management_due(None, at(0), gap));
        assert!(!management_due(Some(at(100)), at(159), gap));
        assert!(management_due(Some(at(100)), at(160), gap));
        // a success stamped after `now` is treated as fresh
        assert!(!management_due(Some(at(200)), at(100), gap));
    }

    #[test]
    fn test_validate_interval() {
        assert!(matches!(validate_interval(0), Err(Error::InvalidInterval(0))));
        assert_eq!(validate_interval(3).unwrap(), Duration::from_secs(3));
    }
}
