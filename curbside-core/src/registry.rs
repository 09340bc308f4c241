//! Process-wide registry of configured address instances and their timers.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::coordinator::ScheduleCoordinator;
use crate::flow::ConfigEntry;
use crate::model::{InstanceId, ValidatedAddress};
use crate::ports::{PollError, SchedulePoller};
use crate::scheduler::{RepeatingJob, ScheduledTask, Scheduler};

/// Default period between scheduled polls.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(thiserror::Error, Debug)]
/// Reasons an instance could not be set up.
pub enum SetupError {
    /// An instance with the same id is already running.
    #[error("Instance {0} is already set up")]
    AlreadySetUp(InstanceId),
    /// The forced first poll failed; the host may retry setup later.
    #[error("Instance not ready: {0}")]
    NotReady(#[from] PollError),
}

/// One running instance.
struct Instance {
    entry: ConfigEntry,
    coordinator: Arc<ScheduleCoordinator>,
    task: Box<dyn ScheduledTask>,
}

/// Registry that owns every running instance, keyed by [`InstanceId`].
pub struct InstanceRegistry {
    scheduler: Arc<dyn Scheduler>,
    update_interval: Duration,
    instances: RwLock<HashMap<InstanceId, Instance>>,
}

impl InstanceRegistry {
    /// Build an empty registry that schedules polls with `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, update_interval: Duration) -> Self {
        Self {
            scheduler,
            update_interval,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Period between scheduled polls.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Set up an instance: force the first poll, then start its timer.
    ///
    /// Nothing is registered when the first poll fails.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::AlreadySetUp`] for a duplicate id and
    /// [`SetupError::NotReady`] when the first poll fails.
    pub async fn setup(
        &self,
        entry: ConfigEntry,
        poller: Arc<dyn SchedulePoller>,
    ) -> Result<Arc<ScheduleCoordinator>, SetupError> {
        if self.contains(&entry.entry_id) {
            return Err(SetupError::AlreadySetUp(entry.entry_id));
        }

        let address = ValidatedAddress::from(entry.address.clone());
        let coordinator = Arc::new(ScheduleCoordinator::new(address, poller));
        coordinator.first_refresh().await?;

        let mut instances = self.write();
        let slot = match instances.entry(entry.entry_id.clone()) {
            Entry::Occupied(_) => return Err(SetupError::AlreadySetUp(entry.entry_id)),
            Entry::Vacant(slot) => slot,
        };

        let job: RepeatingJob = {
            let coordinator = Arc::clone(&coordinator);
            let entry_id = entry.entry_id.clone();
            Arc::new(move || {
                let coordinator = Arc::clone(&coordinator);
                let entry_id = entry_id.clone();
                Box::pin(async move {
                    if coordinator.refresh().await.is_err() {
                        tracing::debug!(instance = %entry_id, "Retrying at next interval");
                    }
                })
            })
        };
        let task = self.scheduler.schedule_repeating(self.update_interval, job);

        tracing::info!(
            instance = %entry.entry_id,
            title = %entry.title,
            interval = ?self.update_interval,
            "Instance set up"
        );
        slot.insert(Instance {
            entry,
            coordinator: Arc::clone(&coordinator),
            task,
        });
        Ok(coordinator)
    }

    /// Cancel the timer of an instance and forget it. Returns its entry if it existed.
    pub fn teardown(&self, entry_id: &InstanceId) -> Option<ConfigEntry> {
        let instance = self.write().remove(entry_id)?;
        instance.task.cancel();
        tracing::info!(instance = %entry_id, title = %instance.entry.title, "Instance unloaded");
        Some(instance.entry)
    }

    /// Tear down every instance.
    pub fn teardown_all(&self) {
        let drained = self.write().drain().collect::<Vec<_>>();
        for (entry_id, instance) in drained {
            instance.task.cancel();
            tracing::info!(instance = %entry_id, "Instance unloaded");
        }
    }

    /// Whether an instance with this id is running.
    #[must_use]
    pub fn contains(&self, entry_id: &InstanceId) -> bool {
        self.read().contains_key(entry_id)
    }

    /// Coordinator of a running instance.
    #[must_use]
    pub fn coordinator(&self, entry_id: &InstanceId) -> Option<Arc<ScheduleCoordinator>> {
        self.read()
            .get(entry_id)
            .map(|instance| Arc::clone(&instance.coordinator))
    }

    /// Entries and coordinators of all running instances, ordered by title.
    #[must_use]
    pub fn instances(&self) -> Vec<(ConfigEntry, Arc<ScheduleCoordinator>)> {
        let mut instances = self
            .read()
            .values()
            .map(|instance| (instance.entry.clone(), Arc::clone(&instance.coordinator)))
            .collect::<Vec<_>>();
        instances.sort_by(|(left, _), (right, _)| left.title.cmp(&right.title));
        instances
    }

    /// Number of running instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no instance is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<InstanceId, Instance>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<InstanceId, Instance>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// Dropped join handles detach their tasks, so timers are cancelled here.
impl Drop for InstanceRegistry {
    fn drop(&mut self) {
        let instances = self
            .instances
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (entry_id, instance) in instances.drain() {
            instance.task.cancel();
            tracing::debug!(instance = %entry_id, "Timer cancelled on registry drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::time;

    use super::*;
    use crate::model::{AddressQuery, ScheduleResult, StreetDirection, StreetSuffix};
    use crate::ports::TransportError;
    use crate::scheduler::TokioScheduler;

    struct CountingPoller {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingPoller {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(fail),
            })
        }
    }

    #[async_trait]
    impl SchedulePoller for CountingPoller {
        async fn poll(&self, _address: &ValidatedAddress) -> Result<ScheduleResult, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(PollError::Connection(TransportError::Timeout(
                    Duration::from_secs(15),
                )));
            }
            Ok(ScheduleResult {
                garbage_date: NaiveDate::from_ymd_opt(2025, 4, 9),
                recycling_date: NaiveDate::from_ymd_opt(2025, 4, 14),
            })
        }
    }

    fn entry() -> ConfigEntry {
        ConfigEntry::from(ValidatedAddress::from(AddressQuery::new(
            "2100",
            Some(StreetDirection::North),
            "MAIN",
            StreetSuffix::Street,
        )))
    }

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(Arc::new(TokioScheduler), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn setup_runs_first_refresh_and_schedules_polls() {
        let registry = registry();
        let poller = CountingPoller::new(false);

        let coordinator = registry
            .setup(entry(), Arc::clone(&poller) as _)
            .await
            .expect("setup");
        assert_eq!(poller.calls.load(Ordering::SeqCst), 1, "forced first refresh");
        assert!(coordinator.snapshot().last_update_success);

        time::sleep(Duration::from_secs(125)).await;
        assert_eq!(poller.calls.load(Ordering::SeqCst), 3, "two timer ticks");

        registry.teardown_all();
    }

    #[tokio::test]
    async fn failed_first_refresh_registers_nothing() {
        let registry = registry();
        let err = registry
            .setup(entry(), CountingPoller::new(true))
            .await
            .err()
            .expect("setup must fail");

        assert!(matches!(err, SetupError::NotReady(PollError::Connection(_))));
        assert!(registry.is_empty(), "nothing registered");
    }

    #[tokio::test]
    async fn duplicate_setup_is_rejected() {
        let registry = registry();
        registry
            .setup(entry(), CountingPoller::new(false))
            .await
            .expect("first setup");

        let err = registry
            .setup(entry(), CountingPoller::new(false))
            .await
            .err()
            .expect("duplicate must fail");
        assert!(matches!(err, SetupError::AlreadySetUp(_)));
        assert_eq!(registry.len(), 1);

        registry.teardown_all();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_the_timer() {
        let registry = registry();
        let poller = CountingPoller::new(false);
        let entry = entry();

        registry
            .setup(entry.clone(), Arc::clone(&poller) as _)
            .await
            .expect("setup");
        assert_eq!(registry.teardown(&entry.entry_id), Some(entry.clone()));
        assert!(registry.coordinator(&entry.entry_id).is_none());
        assert_eq!(registry.teardown(&entry.entry_id), None, "second teardown is a no-op");

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(poller.calls.load(Ordering::SeqCst), 1, "no polls after teardown");
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_registry_stops_its_timers() {
        let registry = registry();
        let poller = CountingPoller::new(false);
        registry
            .setup(entry(), Arc::clone(&poller) as _)
            .await
            .expect("setup");

        drop(registry);
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(poller.calls.load(Ordering::SeqCst), 1, "no polls after drop");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_marks_instance_unavailable() {
        let registry = registry();
        let poller = CountingPoller::new(false);
        let entry = entry();

        registry
            .setup(entry.clone(), Arc::clone(&poller) as _)
            .await
            .expect("setup");
        poller.fail.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_secs(65)).await;

        let snapshot = registry
            .coordinator(&entry.entry_id)
            .expect("registered")
            .snapshot();
        assert!(!snapshot.last_update_success, "unavailable after failed tick");
        assert!(snapshot.result.is_some(), "last good result retained");

        registry.teardown_all();
    }
}
