//! Polling coordinator that owns the latest schedule of one configured address.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::model::{ScheduleResult, ValidatedAddress};
use crate::ports::{PollError, SchedulePoller};

/// Whether a poll is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for the next tick.
    Idle,
    /// A request is in flight.
    Fetching,
}

/// What readers of a coordinator observe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Result of the last successful poll, kept across later failures.
    pub result: Option<ScheduleResult>,
    /// Whether the most recent poll succeeded.
    pub last_update_success: bool,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// When the last successful poll finished.
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Serializes polls for one address and publishes each result to readers.
pub struct ScheduleCoordinator {
    address: ValidatedAddress,
    poller: Arc<dyn SchedulePoller>,
    fetch_lock: Mutex<()>,
    snapshot: watch::Sender<Snapshot>,
}

impl ScheduleCoordinator {
    /// Create an idle coordinator with an empty snapshot.
    #[must_use]
    pub fn new(address: ValidatedAddress, poller: Arc<dyn SchedulePoller>) -> Self {
        let (snapshot, _receiver) = watch::channel(Snapshot::default());
        Self {
            address,
            poller,
            fetch_lock: Mutex::new(()),
            snapshot,
        }
    }

    /// Address this coordinator polls.
    #[must_use]
    pub fn address(&self) -> &ValidatedAddress {
        &self.address
    }

    /// Current poll state.
    #[must_use]
    pub fn state(&self) -> PollState {
        if self.fetch_lock.try_lock().is_ok() {
            PollState::Idle
        } else {
            PollState::Fetching
        }
    }

    /// Copy of the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified whenever the snapshot is replaced.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Poll once and publish the outcome.
    ///
    /// Calls are serialized; a second caller waits for the outstanding poll to finish.
    /// On failure the previous result stays readable but is marked stale.
    ///
    /// # Errors
    ///
    /// Returns the [`PollError`] of the poller.
    pub async fn refresh(&self) -> Result<ScheduleResult, PollError> {
        let _guard = self.fetch_lock.lock().await;
        let address = &self.address.formatted_address;
        tracing::debug!(%address, "Fetching collection schedule");

        match self.poller.poll(&self.address).await {
            Ok(result) => {
                tracing::debug!(
                    %address,
                    garbage = ?result.garbage_date,
                    recycling = ?result.recycling_date,
                    "Updated collection schedule"
                );
                self.snapshot.send_replace(Snapshot {
                    result: Some(result),
                    last_update_success: true,
                    last_error: None,
                    last_success_at: Some(Utc::now()),
                });
                Ok(result)
            }
            Err(err) => {
                tracing::error!(%address, error = %err, "Collection schedule update failed");
                let message = err.to_string();
                self.snapshot.send_modify(|snapshot| {
                    snapshot.last_update_success = false;
                    snapshot.last_error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Initial refresh run during setup; its failure aborts the setup.
    ///
    /// # Errors
    ///
    /// Returns the [`PollError`] of the first poll.
    pub async fn first_refresh(&self) -> Result<ScheduleResult, PollError> {
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::{task, time};

    use super::*;
    use crate::model::{AddressQuery, StreetDirection, StreetSuffix};
    use crate::ports::TransportError;

    /// Poller replaying a script of outcomes, one per call.
    struct ScriptedPoller {
        script: StdMutex<Vec<Result<ScheduleResult, PollError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedPoller {
        fn new(mut script: Vec<Result<ScheduleResult, PollError>>) -> Self {
            script.reverse();
            Self {
                script: StdMutex::new(script),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl SchedulePoller for ScriptedPoller {
        async fn poll(&self, address: &ValidatedAddress) -> Result<ScheduleResult, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.delay).await;
            self.script
                .lock()
                .expect("script lock")
                .pop()
                .unwrap_or_else(|| Err(PollError::AddressNotFound(address.formatted_address.clone())))
        }
    }

    fn address() -> ValidatedAddress {
        AddressQuery::new("2100", Some(StreetDirection::North), "MAIN", StreetSuffix::Street).into()
    }

    fn schedule(day: u32) -> ScheduleResult {
        ScheduleResult {
            garbage_date: NaiveDate::from_ymd_opt(2025, 4, day),
            recycling_date: None,
        }
    }

    #[tokio::test]
    async fn success_replaces_snapshot() {
        let poller = Arc::new(ScriptedPoller::new(vec![Ok(schedule(9)), Ok(schedule(16))]));
        let coordinator = ScheduleCoordinator::new(address(), poller);

        coordinator.first_refresh().await.expect("first refresh");
        assert_eq!(coordinator.snapshot().result, Some(schedule(9)));

        coordinator.refresh().await.expect("second refresh");
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.result, Some(schedule(16)), "new result supersedes the old one");
        assert!(snapshot.last_update_success, "success flag set");
        assert!(snapshot.last_success_at.is_some(), "success time recorded");
    }

    #[tokio::test]
    async fn failure_keeps_result_but_marks_unavailable() {
        let poller = Arc::new(ScriptedPoller::new(vec![
            Ok(schedule(9)),
            Err(PollError::Connection(TransportError::Status(503))),
        ]));
        let coordinator = ScheduleCoordinator::new(address(), poller);

        coordinator.refresh().await.expect("first refresh");
        let err = coordinator.refresh().await.expect_err("second refresh fails");
        assert!(matches!(err, PollError::Connection(TransportError::Status(503))));

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.result, Some(schedule(9)), "stale result kept");
        assert!(!snapshot.last_update_success, "marked unavailable");
        assert!(
            snapshot.last_error.as_deref().is_some_and(|msg| msg.contains("503")),
            "error recorded"
        );
    }

    #[tokio::test]
    async fn subscribers_see_each_new_snapshot() {
        let poller = Arc::new(ScriptedPoller::new(vec![Ok(schedule(9))]));
        let coordinator = ScheduleCoordinator::new(address(), poller);
        let mut receiver = coordinator.subscribe();

        coordinator.refresh().await.expect("refresh");
        assert!(receiver.has_changed().expect("sender alive"), "change notified");
        assert_eq!(receiver.borrow_and_update().result, Some(schedule(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_are_serialized() {
        let mut poller = ScriptedPoller::new(vec![Ok(schedule(9)), Ok(schedule(16))]);
        poller.delay = Duration::from_secs(5);
        let poller = Arc::new(poller);
        let coordinator = Arc::new(ScheduleCoordinator::new(address(), Arc::clone(&poller) as _));

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.refresh().await }
        });
        task::yield_now().await;
        assert_eq!(coordinator.state(), PollState::Fetching);

        let second = coordinator.refresh().await.expect("second refresh");
        let first = first.await.expect("join").expect("first refresh");

        assert_eq!(first, schedule(9));
        assert_eq!(second, schedule(16), "second call ran after the first finished");
        assert_eq!(poller.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.state(), PollState::Idle);
    }
}
