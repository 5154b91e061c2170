// src/pipeline/coordinator.rs

//! Periodic refresh sweep and timetable lookup.
//!
//! One background task wakes on a fixed interval and walks every group known
//! to the user directory, one at a time: load the stored snapshot, force a
//! fresh fetch, diff the two and report non-empty change sets. Request-driven
//! lookups share the same store and never wait on the sweep.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::models::{ChangeReport, SweepConfig, Timetable, TimetableDiff, TimetableKey};
use crate::pipeline::GroupDirectory;
use crate::pipeline::diff::calculate_diff;
use crate::storage::TimetableStore;

/// Capacity of the change report channel.
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// What happened to one group during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// No snapshot existed; the first fetch became the baseline
    Baseline,
    /// Refreshed and compared against the previous snapshot
    Refreshed {
        current: Arc<Timetable>,
        changes: TimetableDiff,
    },
}

/// Counters of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub groups: usize,
    pub refreshed: usize,
    pub baselined: usize,
    pub changed: usize,
    pub failed: usize,
}

/// Owns the timetable store and the background refresh schedule.
pub struct Coordinator {
    store: Arc<TimetableStore>,
    directory: Arc<dyn GroupDirectory>,
    config: SweepConfig,
    reports: broadcast::Sender<ChangeReport>,
    shutdown: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new(
        store: Arc<TimetableStore>,
        directory: Arc<dyn GroupDirectory>,
        config: SweepConfig,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            directory,
            config,
            reports,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<TimetableStore> {
        &self.store
    }

    /// Receive a [`ChangeReport`] for every non-empty diff found by a sweep.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeReport> {
        self.reports.subscribe()
    }

    /// Serve a timetable to a caller.
    ///
    /// An explicit key wins; otherwise the caller's profile group is served
    /// for the configured period.
    pub async fn lookup(
        &self,
        explicit: Option<TimetableKey>,
        profile_group: Option<u32>,
    ) -> Result<Arc<Timetable>> {
        let key = explicit
            .or_else(|| profile_group.map(|g| TimetableKey::new(g, self.config.period)))
            .ok_or(AppError::NoGroup)?;
        Ok(self.store.get(key, false).await?.timetable)
    }

    /// Refresh one timetable and compare it with the stored snapshot.
    pub async fn refresh(&self, key: TimetableKey) -> Result<GroupOutcome> {
        let previous = self.store.get(key, false).await?;
        if !previous.from_cache() {
            return Ok(GroupOutcome::Baseline);
        }

        let current = self.store.get(key, true).await?.timetable;
        let changes = calculate_diff(&previous.timetable, &current);
        Ok(GroupOutcome::Refreshed { current, changes })
    }

    /// Walk every known group once.
    ///
    /// Groups are processed sequentially with a pause in between. A failing
    /// group is logged and skipped. Stopping the coordinator ends the sweep
    /// before the next group.
    pub async fn sweep(&self) -> Result<SweepSummary> {
        let groups = self.directory.distinct_groups().await?;
        let mut summary = SweepSummary {
            groups: groups.len(),
            ..SweepSummary::default()
        };
        log::info!("Checking timetable updates for {} groups", groups.len());

        let mut shutdown = self.shutdown.subscribe();
        for (i, group) in groups.into_iter().enumerate() {
            if self.is_stopped() {
                log::info!("Sweep interrupted by shutdown");
                break;
            }
            if i > 0 && !self.config.group_delay().is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.group_delay()) => {}
                    _ = shutdown.wait_for(|stopped| *stopped) => {
                        log::info!("Sweep interrupted by shutdown");
                        break;
                    }
                }
            }

            let key = TimetableKey::new(group, self.config.period);
            log::debug!("Checking timetable updates for {}", key);
            match self.refresh(key).await {
                Ok(GroupOutcome::Baseline) => {
                    summary.baselined += 1;
                    log::info!("Timetable {} stored as baseline", key);
                }
                Ok(GroupOutcome::Refreshed { current, changes }) => {
                    summary.refreshed += 1;
                    if !changes.is_empty() {
                        summary.changed += 1;
                        self.report(key, &current.group_name, changes);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    log::warn!("Could not refresh timetable {}: {}", key, e);
                }
            }
        }

        log::info!(
            "Sweep finished: {} refreshed, {} changed, {} new, {} failed",
            summary.refreshed,
            summary.changed,
            summary.baselined,
            summary.failed
        );
        Ok(summary)
    }

    fn report(&self, key: TimetableKey, group_name: &str, changes: TimetableDiff) {
        let (added, modified, removed) = changes.counts();
        log::info!(
            "Timetable {}: {} added, {} changed, {} removed",
            key,
            added,
            modified,
            removed
        );
        log::debug!("Changes for {}:\n{}", key, changes);

        // No subscribers is fine; the report has been logged.
        let _ = self.reports.send(ChangeReport {
            key,
            group_name: group_name.to_string(),
            changes,
        });
    }

    /// Run sweeps on the configured interval until [`stop`](Self::stop).
    ///
    /// The first sweep starts immediately. Ticks missed while a sweep runs
    /// are skipped rather than queued.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        log::info!(
            "Starting update check routine every {}s",
            self.config.interval_secs
        );
        loop {
            if self.is_stopped() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait_for(|stopped| *stopped) => break,
            }
            if let Err(e) = self.sweep().await {
                log::error!("Sweep failed: {}", e);
            }
        }
        log::info!("Stopping timetable worker");
    }

    /// Spawn [`run`](Self::run) on the runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    /// Halt the schedule. In-flight group work finishes; no new sweep starts.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::StaticDirectory;
    use crate::services::fake::{FakeFetcher, page};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    const KEY: TimetableKey = TimetableKey {
        group: 1234,
        period: 3,
    };

    fn sweep_config() -> SweepConfig {
        SweepConfig {
            interval_secs: 3600,
            group_delay_ms: 0,
            period: 3,
            groups: Vec::new(),
            users_file: None,
        }
    }

    fn room_page(room: &str) -> String {
        page(
            "KrDZIs3011",
            &[
                ("2024-10-14", "08:00 - 09:30", "Algebra", room),
                ("2024-10-14", "09:45 - 11:15", "Logika", "102"),
            ],
        )
    }

    fn setup(tmp: &TempDir, groups: &[u32]) -> (Arc<FakeFetcher>, Arc<Coordinator>) {
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.set_page(KEY, room_page("101"));
        let storage = Arc::new(LocalStorage::new(tmp.path()));
        let store = Arc::new(TimetableStore::new(storage, fetcher.clone()).unwrap());
        let directory = Arc::new(StaticDirectory::new(groups.iter().copied()));
        let coordinator = Arc::new(Coordinator::new(store, directory, sweep_config()));
        (fetcher, coordinator)
    }

    #[tokio::test]
    async fn test_lookup_then_sweep_reports_room_change() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[1234]);
        let mut reports = coordinator.subscribe();

        let first = coordinator.lookup(Some(KEY), None).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        let second = coordinator.lookup(Some(KEY), None).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(first, second);

        fetcher.set_page(KEY, room_page("205"));
        let summary = coordinator.sweep().await.unwrap();
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.changed, 1);
        assert_eq!(fetcher.calls(), 2);

        let report = reports.try_recv().unwrap();
        assert_eq!(report.key, KEY);
        assert_eq!(report.group_name, "KrDZIs3011");
        assert_eq!(report.changes.len(), 1);
        let change = &report.changes.0[0];
        assert!(change.is_modification());
        assert_eq!(change.new.as_ref().unwrap().room, "205");
        assert_eq!(change.old.as_ref().unwrap().room, "101");

        let served = coordinator.lookup(Some(KEY), None).await.unwrap();
        assert_eq!(served.classes[0].room, "205");
    }

    #[tokio::test]
    async fn test_refresh_returns_fresh_timetable() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[1234]);
        let mut reports = coordinator.subscribe();
        coordinator.lookup(Some(KEY), None).await.unwrap();

        fetcher.set_page(
            KEY,
            page(
                "KrDZIs3012",
                &[("2024-10-14", "08:00 - 09:30", "Algebra", "205")],
            ),
        );
        let GroupOutcome::Refreshed { current, changes } = coordinator.refresh(KEY).await.unwrap()
        else {
            panic!("expected a refreshed outcome");
        };
        assert_eq!(current.group_name, "KrDZIs3012");
        assert_eq!(changes.counts(), (0, 1, 1));

        fetcher.set_page(KEY, room_page("101"));
        coordinator.sweep().await.unwrap();
        assert_eq!(reports.try_recv().unwrap().group_name, "KrDZIs3011");
    }

    #[tokio::test]
    async fn test_unchanged_group_sends_no_report() {
        let tmp = TempDir::new().unwrap();
        let (_, coordinator) = setup(&tmp, &[1234]);
        let mut reports = coordinator.subscribe();

        coordinator.lookup(Some(KEY), None).await.unwrap();
        let summary = coordinator.sweep().await.unwrap();
        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.changed, 0);
        assert!(reports.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_first_sweep_only_stores_baseline() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[1234]);

        let summary = coordinator.sweep().await.unwrap();
        assert_eq!(summary.baselined, 1);
        assert_eq!(summary.refreshed, 0);
        assert_eq!(fetcher.calls(), 1);
        assert!(tmp.path().join("timetables/1234-3.json").exists());
    }

    #[tokio::test]
    async fn test_failing_group_does_not_halt_sweep() {
        let tmp = TempDir::new().unwrap();
        // Group 1 has no upstream page and fails.
        let (_, coordinator) = setup(&tmp, &[1, 1234]);
        coordinator.lookup(Some(KEY), None).await.unwrap();

        let summary = coordinator.sweep().await.unwrap();
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.refreshed, 1);
    }

    #[tokio::test]
    async fn test_lookup_resolves_profile_group() {
        let tmp = TempDir::new().unwrap();
        let (_, coordinator) = setup(&tmp, &[]);

        let timetable = coordinator.lookup(None, Some(1234)).await.unwrap();
        assert_eq!(timetable.group_id, 1234);
    }

    #[tokio::test]
    async fn test_lookup_without_group_fails() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[]);

        let err = coordinator.lookup(None, None).await.unwrap_err();
        assert!(matches!(err, AppError::NoGroup));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stopped_coordinator_skips_groups() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[1234]);

        coordinator.stop();
        assert!(coordinator.is_stopped());
        let summary = coordinator.sweep().await.unwrap();
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.baselined + summary.refreshed + summary.failed, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_sweeps_immediately_and_stops() {
        let tmp = TempDir::new().unwrap();
        let (fetcher, coordinator) = setup(&tmp, &[1234]);

        let handle = coordinator.spawn();
        tokio::time::timeout(Duration::from_secs(5), async {
            while fetcher.calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        coordinator.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetcher.calls(), 1);
    }
}
