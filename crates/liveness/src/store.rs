//! Shared liveness state.
//!
//! [`LivenessTable`] holds the per-index entries and the pure update rules.
//! [`LivenessStore`] pairs the table with the roster it describes behind a
//! single lock, so a reader always sees a roster and a table of the same
//! size and never observes a half-written entry.

use crate::clock::Clock;
use crate::types::{AddressClass, LivenessEntry, RosterSnapshot, ServerRecord, ServerStatus};
use common::{Error, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Per-index liveness entries.
#[derive(Debug, Clone, Default)]
pub struct LivenessTable {
    entries: Vec<LivenessEntry>,
}

impl LivenessTable {
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![LivenessEntry::default(); size],
        }
    }

    /// Replace the table with `size` unknown entries.
    pub fn reset(&mut self, size: usize) {
        self.entries.clear();
        self.entries.resize(size, LivenessEntry::default());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LivenessEntry> {
        self.entries.get(index)
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut LivenessEntry> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or_else(|| Error::invalid_index(index, len))
    }

    /// Record a probe outcome; a failure keeps the previous success time.
    pub fn record(
        &mut self,
        index: usize,
        class: AddressClass,
        success: bool,
        now: SystemTime,
    ) -> Result<()> {
        self.entry_mut(index)?.get_mut(class).record(success, now);
        Ok(())
    }

    pub fn record_primary(&mut self, index: usize, success: bool, now: SystemTime) -> Result<()> {
        self.record(index, AddressClass::Primary, success, now)
    }

    pub fn record_management(&mut self, index: usize, success: bool, now: SystemTime) -> Result<()> {
        self.record(index, AddressClass::Management, success, now)
    }

    /// Forget everything known about one address of one server.
    pub fn clear(&mut self, index: usize, class: AddressClass) -> Result<()> {
        self.entry_mut(index)?.get_mut(class).clear();
        Ok(())
    }

    pub fn clear_primary(&mut self, index: usize) -> Result<()> {
        self.clear(index, AddressClass::Primary)
    }

    pub fn clear_management(&mut self, index: usize) -> Result<()> {
        self.clear(index, AddressClass::Management)
    }

    pub fn snapshot(&self) -> Vec<LivenessEntry> {
        self.entries.clone()
    }
}

/// One probe the scheduler intends to write back.
///
/// The generation and address pin the result to the roster it was planned
/// against; if either has changed by the time the probe returns, the result
/// is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub generation: u64,
    pub index: usize,
    pub class: AddressClass,
    pub address: String,
}

/// Everything the scheduler needs to plan one tick.
#[derive(Debug, Clone)]
pub struct TickPlan {
    pub generation: u64,
    pub roster: RosterSnapshot,
    pub management_last_success: Vec<Option<SystemTime>>,
}

impl TickPlan {
    /// Targets for every server whose `class` address is set and passes `filter`.
    pub fn targets<F>(&self, class: AddressClass, mut filter: F) -> Vec<ProbeTarget>
    where
        F: FnMut(usize, &ServerRecord) -> bool,
    {
        self.roster
            .iter()
            .enumerate()
            .filter(|(_, server)| !server.address(class).trim().is_empty())
            .filter(|(index, server)| filter(*index, *server))
            .map(|(index, server)| ProbeTarget {
                generation: self.generation,
                index,
                class,
                address: server.address(class).trim().to_string(),
            })
            .collect()
    }
}

#[derive(Debug)]
struct Inner {
    generation: u64,
    roster: RosterSnapshot,
    table: LivenessTable,
}

/// Roster plus liveness table, shared between the scheduler and readers.
#[derive(Debug)]
pub struct LivenessStore {
    inner: RwLock<Inner>,
    clock: Clock,
}

impl LivenessStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            inner: RwLock::new(Inner {
                generation: 0,
                roster: Arc::from(Vec::new()),
                table: LivenessTable::default(),
            }),
            clock,
        }
    }

    /// Create a store already holding `servers`
    pub fn with_roster(servers: Vec<ServerRecord>) -> Self {
        let mut store = Self::new();
        let size = servers.len();
        let inner = store.inner.get_mut();
        inner.roster = Arc::from(servers);
        inner.table.reset(size);
        store
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current roster snapshot.
    pub async fn roster(&self) -> RosterSnapshot {
        self.inner.read().await.roster.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.roster.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Generation of the current roster; bumped by every replacement.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Swap in a new roster and reset every entry to unknown.
    pub async fn replace_roster(&self, servers: Vec<ServerRecord>) -> u64 {
        let size = servers.len();
        let mut inner = self.inner.write().await;
        inner.generation += 1;
        inner.roster = Arc::from(servers);
        inner.table.reset(size);
        info!(servers = size, generation = inner.generation, "Roster replaced");
        inner.generation
    }

    pub async fn record_primary(&self, index: usize, success: bool) -> Result<()> {
        self.record(index, AddressClass::Primary, success).await
    }

    pub async fn record_management(&self, index: usize, success: bool) -> Result<()> {
        self.record(index, AddressClass::Management, success).await
    }

    async fn record(&self, index: usize, class: AddressClass, success: bool) -> Result<()> {
        let now = self.clock.now();
        self.inner.write().await.table.record(index, class, success, now)
    }

    pub async fn clear_primary(&self, index: usize) -> Result<()> {
        self.inner.write().await.table.clear_primary(index)
    }

    pub async fn clear_management(&self, index: usize) -> Result<()> {
        self.inner.write().await.table.clear_management(index)
    }

    /// Change one address of one server.
    ///
    /// The address class is cleared back to unknown and the roster is
    /// replaced by a copy carrying the new value. Indices stay stable, so the
    /// generation is left alone; in-flight probes against the old address are
    /// rejected by the address check in [`LivenessStore::record_probe`].
    pub async fn edit_address(
        &self,
        index: usize,
        class: AddressClass,
        value: impl Into<String>,
    ) -> Result<()> {
        let value = value.into().trim().to_string();
        let mut inner = self.inner.write().await;
        let len = inner.roster.len();
        if index >= len {
            return Err(Error::invalid_index(index, len));
        }

        inner.table.clear(index, class)?;

        let mut servers = inner.roster.to_vec();
        servers[index].set_address(class, value);
        info!(
            index,
            class = %class,
            name = %servers[index].name,
            address = %servers[index].address(class),
            "Address edited"
        );
        inner.roster = Arc::from(servers);
        Ok(())
    }

    /// Write a scheduler probe result if its target is still current.
    ///
    /// Returns `false` when the result was discarded because the roster was
    /// replaced or the address edited while the probe was in flight.
    pub async fn record_probe(&self, target: &ProbeTarget, success: bool) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;

        let current = inner.generation == target.generation
            && inner
                .roster
                .get(target.index)
                .is_some_and(|server| server.address(target.class).trim() == target.address);
        if !current {
            debug!(
                index = target.index,
                class = %target.class,
                address = %target.address,
                "Discarding stale probe result"
            );
            return false;
        }

        inner
            .table
            .record(target.index, target.class, success, now)
            .is_ok()
    }

    /// Consistent copy of every entry, in roster order.
    pub async fn snapshot(&self) -> Vec<LivenessEntry> {
        self.inner.read().await.table.snapshot()
    }

    /// Roster rows paired with their liveness and staleness at read time.
    pub async fn status(&self) -> Vec<ServerStatus> {
        let inner = self.inner.read().await;
        let now = self.clock.now();
        inner
            .roster
            .iter()
            .enumerate()
            .filter_map(|(index, server)| {
                inner
                    .table
                    .get(index)
                    .map(|entry| ServerStatus::new(index, server, entry, now))
            })
            .collect()
    }

    pub(crate) async fn plan(&self) -> TickPlan {
        let inner = self.inner.read().await;
        TickPlan {
            generation: inner.generation,
            roster: inner.roster.clone(),
            management_last_success: (0..inner.table.len())
                .map(|index| {
                    inner
                        .table
                        .get(index)
                        .and_then(|entry| entry.management.last_success)
                })
                .collect(),
        }
    }
}

impl Default for LivenessStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reachability;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_reset_discards_previous_entries() {
        let mut table = LivenessTable::new(3);
        table.record_primary(0, true, at(10)).unwrap();
        table.record_management(2, false, at(10)).unwrap();

        table.reset(5);
        assert_eq!(table.len(), 5);
        assert!(table.snapshot().iter().all(LivenessEntry::is_unknown));

        table.reset(0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_failure_keeps_last_success() {
        let mut table = LivenessTable::new(1);
        table.record_primary(0, true, at(10)).unwrap();
        table.record_primary(0, true, at(20)).unwrap();

        let entry = table.get(0).unwrap();
        assert_eq!(entry.primary.up, Reachability::Up);
        assert_eq!(entry.primary.last_success, Some(at(20)));

        table.record_primary(0, false, at(30)).unwrap();
        let entry = table.get(0).unwrap();
        assert_eq!(entry.primary.up, Reachability::Down);
        assert_eq!(entry.primary.last_success, Some(at(20)));
        assert_eq!(entry.management, Default::default());
    }

    #[test]
    fn test_failure_before_any_success_has_no_timestamp() {
        let mut table = LivenessTable::new(1);
        table.record_management(0, false, at(5)).unwrap();

        let entry = table.get(0).unwrap();
        assert_eq!(entry.management.up, Reachability::Down);
        assert!(entry.management.last_success.is_none());
    }

    #[test]
    fn test_clear_resets_one_class() {
        let mut table = LivenessTable::new(1);
        table.record_primary(0, true, at(10)).unwrap();
        table.record_management(0, true, at(10)).unwrap();

        table.clear_primary(0).unwrap();
        let entry = table.get(0).unwrap();
        assert_eq!(entry.primary.up, Reachability::Unknown);
        assert!(entry.primary.last_success.is_none());
        assert_eq!(entry.management.up, Reachability::Up);

        table.clear_management(0).unwrap();
        assert!(table.get(0).unwrap().is_unknown());
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        let mut table = LivenessTable::new(2);
        assert!(matches!(
            table.record_primary(2, true, at(1)),
            Err(Error::InvalidIndex { index: 2, len: 2 })
        ));
        assert!(table.clear_management(9).is_err());
        assert!(table.snapshot().iter().all(LivenessEntry::is_unknown));
    }

    #[tokio::test]
    async fn test_replace_roster_resets_store() {
        let store = LivenessStore::with_roster(vec![
            ServerRecord::new("DP-1", "10.0.0.1", ""),
            ServerRecord::new("DP-2", "10.0.0.2", ""),
        ]);
        store.record_primary(1, true).await.unwrap();

        let generation = store.replace_roster(vec![ServerRecord::new("DP-9", "10.0.9.1", "")]).await;
        assert_eq!(generation, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot().await, vec![LivenessEntry::default()]);
        assert!(store.record_primary(1, true).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_address_clears_state() {
        let store = LivenessStore::with_roster(vec![ServerRecord::new(
            "A", "10.0.0.1", "10.0.0.2",
        )]);
        store.record_primary(0, true).await.unwrap();
        store.record_management(0, true).await.unwrap();

        store
            .edit_address(0, AddressClass::Primary, " 10.0.0.50 ")
            .await
            .unwrap();

        let entry = store.snapshot().await[0];
        assert_eq!(entry.primary.up, Reachability::Unknown);
        assert!(entry.primary.last_success.is_none());
        assert_eq!(entry.management.up, Reachability::Up);
        assert_eq!(store.roster().await[0].primary_address, "10.0.0.50");

        let err = store
            .edit_address(3, AddressClass::Management, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { index: 3, len: 1 }));
    }

    #[tokio::test]
    async fn test_stale_probe_results_are_discarded() {
        let store = LivenessStore::with_roster(vec![ServerRecord::new("A", "10.0.0.1", "")]);
        let target = ProbeTarget {
            generation: store.generation().await,
            index: 0,
            class: AddressClass::Primary,
            address: "10.0.0.1".to_string(),
        };

        store
            .edit_address(0, AddressClass::Primary, "10.0.0.7")
            .await
            .unwrap();
        assert!(!store.record_probe(&target, true).await);
        assert!(store.snapshot().await[0].is_unknown());

        let edited = ProbeTarget {
            address: "10.0.0.7".to_string(),
            ..target
        };
        store.replace_roster(vec![ServerRecord::new("A", "10.0.0.7", "")]).await;
        assert!(!store.record_probe(&edited, true).await);

        let current = ProbeTarget {
            generation: store.generation().await,
            ..edited
        };
        assert!(store.record_probe(&current, true).await);
        assert_eq!(store.snapshot().await[0].primary.up, Reachability::Up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_staleness() {
        let store = LivenessStore::with_roster(vec![ServerRecord::new("A", "10.0.0.1", "")]);
        store.record_primary(0, true).await.unwrap();

        tokio::time::sleep(Duration::from_secs(42)).await;
        store.record_primary(0, false).await.unwrap();

        let status = store.status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].primary_up, Reachability::Down);
        assert_eq!(status[0].primary_seconds_since, Some(42));
        assert_eq!(status[0].management_up, Reachability::Unknown);
        assert_eq!(status[0].management_seconds_since, None);
    }

    #[tokio::test]
    async fn test_plan_skips_empty_addresses() {
        let store = LivenessStore::with_roster(vec![
            ServerRecord::new("A", "10.0.0.1", ""),
            ServerRecord::new("B", "  ", "10.0.1.2"),
        ]);
        let plan = store.plan().await;
        let primary = plan.targets(AddressClass::Primary, |_, _| true);
        let management = plan.targets(AddressClass::Management, |_, _| true);

        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].index, 0);
        assert_eq!(management.len(), 1);
        assert_eq!(management[0].index, 1);
        assert_eq!(plan.management_last_success, vec![None, None]);
    }
}
