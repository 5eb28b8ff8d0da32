use crate::store::client::{RemoteStore, StoreClientError};
use crate::sync::state::{LightSnapshot, LightState};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Message shown to the user when a command could not be delivered.
pub const WRITE_FAILED_ALERT: &str = "Failed to send command to device.";

/// Callbacks fired by the controller when the visible state changes.
#[async_trait]
pub trait StatusUpdate {
    async fn status_update(&self, snapshot: &LightSnapshot);

    /// Called after a rejected write has been rolled back.
    async fn write_failed(&self, message: &str) {
        let _ = message;
    }
}

pub type SyncObserver = Arc<dyn StatusUpdate + Send + Sync>;

/// Result of an optimistic write.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The store accepted the write; `power` is the committed value.
    Confirmed { power: bool },
    /// The store rejected the write; `power` is the restored value.
    Reverted { power: bool, error: StoreClientError },
}

impl CommitOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, CommitOutcome::Confirmed { .. })
    }

    /// The power value left in place after the commit attempt.
    pub fn power(&self) -> bool {
        match self {
            CommitOutcome::Confirmed { power } => *power,
            CommitOutcome::Reverted { power, .. } => *power,
        }
    }
}

/// Apply `proposed` locally before the store has answered, then confirm or
/// roll back once `commit` resolves. The caller sees the new value for the
/// whole duration of the round trip.
pub async fn commit_optimistic(
    state: &LightState,
    proposed: bool,
    commit: BoxFuture<'_, Result<(), StoreClientError>>,
) -> CommitOutcome {
    let previous = state.power();
    state.set_power(proposed);
    match commit.await {
        Ok(()) => {
            state.record_write_success();
            CommitOutcome::Confirmed { power: proposed }
        }
        Err(error) => {
            state.set_power(previous);
            state.record_write_failure(&error);
            CommitOutcome::Reverted {
                power: previous,
                error,
            }
        }
    }
}

async fn run_poll_cycle(
    store: &dyn RemoteStore,
    state: &LightState,
    observer: Option<&SyncObserver>,
) {
    let before = state.snapshot();
    match store.read_power().await {
        Ok(value) => {
            state.apply_read(value);
            if !before.initial_load_complete {
                info!("Initial state loaded");
            } else if !before.connected {
                info!("Store reachable again");
            }
        }
        Err(error) => {
            state.apply_read_failure(&error);
            if before.connected || !before.initial_load_complete {
                warn!("Read failed: {}", error);
            } else {
                debug!("Still offline: {}", error);
            }
        }
    }
    if let Some(observer) = observer {
        let after = state.snapshot();
        if after.observable_changed(&before) {
            observer.status_update(&after).await;
        }
    }
}

struct PollHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Poller {
    store: Arc<dyn RemoteStore>,
    state: LightState,
    observer: Option<SyncObserver>,
}

impl Poller {
    // The stop signal is only checked between cycles, so an in-flight
    // read always runs to completion.
    async fn run(self, poll_interval: Duration, mut stopped: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                    continue;
                }
            }
            // A tick and the stop signal can become ready together; no new
            // cycle starts once stop is set.
            if *stopped.borrow() {
                break;
            }
            run_poll_cycle(self.store.as_ref(), &self.state, self.observer.as_ref()).await;
        }
        debug!("Poll task stopped");
    }
}

/// Keeps the local light state in step with the remote document.
///
/// Reads happen on a fixed cadence once [`start_polling`] is called;
/// writes go through [`toggle`], which applies the new value locally first
/// and rolls it back if the store rejects it.
///
/// [`start_polling`]: SyncController::start_polling
/// [`toggle`]: SyncController::toggle
#[derive(Clone)]
pub struct SyncController {
    store: Arc<dyn RemoteStore>,
    state: LightState,
    observer: Option<SyncObserver>,
    poller: Arc<Mutex<Option<PollHandle>>>,
}

impl SyncController {
    pub fn new(store: Arc<dyn RemoteStore>, observer: Option<SyncObserver>) -> Self {
        Self {
            store,
            state: LightState::new(),
            observer,
            poller: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> &LightState {
        &self.state
    }

    pub fn snapshot(&self) -> LightSnapshot {
        self.state.snapshot()
    }

    /// Run one read cycle immediately.
    pub async fn poll_once(&self) {
        run_poll_cycle(self.store.as_ref(), &self.state, self.observer.as_ref()).await;
    }

    /// Start the background poll task. The first read fires right away,
    /// later ones every `poll_interval`. A second call while the task is
    /// alive is a no-op.
    pub fn start_polling(&self, poll_interval: Duration) {
        // tokio's interval panics on a zero period.
        let poll_interval = if poll_interval.is_zero() {
            warn!("Zero poll interval requested, polling every 1ms instead");
            Duration::from_millis(1)
        } else {
            poll_interval
        };
        let mut slot = self.poller.lock();
        if let Some(handle) = slot.as_ref()
            && !handle.task.is_finished()
        {
            warn!("Polling is already running");
            return;
        }
        let (stop, stopped) = watch::channel(false);
        // The task must not hold the poller slot itself, otherwise the
        // stop sender would never drop when the controller goes away.
        let poller = Poller {
            store: Arc::clone(&self.store),
            state: self.state.clone(),
            observer: self.observer.clone(),
        };
        let task = tokio::spawn(poller.run(poll_interval, stopped));
        *slot = Some(PollHandle { stop, task });
        info!("Polling every {:?}", poll_interval);
    }

    /// Ask the poll task to shut down. Safe to call at any time.
    pub fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().take() {
            let _ = handle.stop.send(true);
            info!("Polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Flip the light, optimistically. On rejection the previous value is
    /// restored and the observer gets a [`write_failed`] callback instead
    /// of a status update.
    ///
    /// [`write_failed`]: StatusUpdate::write_failed
    pub async fn toggle(&self) -> CommitOutcome {
        let target = !self.state.power();
        info!("Turning light {}", if target { "on" } else { "off" });
        let outcome = commit_optimistic(&self.state, target, self.store.write_power(target)).await;
        match &outcome {
            CommitOutcome::Confirmed { .. } => {
                if let Some(observer) = &self.observer {
                    observer.status_update(&self.state.snapshot()).await;
                }
            }
            CommitOutcome::Reverted { error, .. } => {
                warn!("Write failed: {}", error);
                if let Some(observer) = &self.observer {
                    observer.write_failed(WRITE_FAILED_ALERT).await;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use tokio::time::sleep;

    #[derive(Default)]
    struct ScriptedStore {
        reads: Mutex<VecDeque<Result<Option<bool>, StoreClientError>>>,
        write_results: Mutex<VecDeque<Result<(), StoreClientError>>>,
        writes: Mutex<Vec<bool>>,
    }

    impl ScriptedStore {
        fn push_read(&self, result: Result<Option<bool>, StoreClientError>) {
            self.reads.lock().push_back(result);
        }

        fn push_write_result(&self, result: Result<(), StoreClientError>) {
            self.write_results.lock().push_back(result);
        }

        fn writes(&self) -> Vec<bool> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedStore {
        async fn read_power(&self) -> Result<Option<bool>, StoreClientError> {
            self.reads.lock().pop_front().unwrap_or(Ok(None))
        }

        async fn write_power(&self, value: bool) -> Result<(), StoreClientError> {
            self.writes.lock().push(value);
            self.write_results.lock().pop_front().unwrap_or(Ok(()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<LightSnapshot>>,
        alerts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusUpdate for Recorder {
        async fn status_update(&self, snapshot: &LightSnapshot) {
            self.updates.lock().push(snapshot.clone());
        }

        async fn write_failed(&self, message: &str) {
            self.alerts.lock().push(message.to_string());
        }
    }

    fn status_error() -> StoreClientError {
        StoreClientError::Status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[tokio::test]
    async fn test_toggle_applies_optimistically_and_confirms() {
        let store = Arc::new(ScriptedStore::default());
        let recorder = Arc::new(Recorder::default());
        let controller = SyncController::new(store.clone(), Some(recorder.clone() as SyncObserver));
        controller.state().apply_read(Some(false));

        let outcome = controller.toggle().await;
        assert!(outcome.is_confirmed());
        assert!(outcome.power());
        assert!(controller.snapshot().power);
        assert_eq!(store.writes(), vec![true]);
        assert_eq!(controller.snapshot().write_count, 1);
        assert_eq!(recorder.updates.lock().len(), 1);
        assert!(recorder.updates.lock()[0].power);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_and_alerts() {
        let store = Arc::new(ScriptedStore::default());
        store.push_write_result(Err(status_error()));
        let recorder = Arc::new(Recorder::default());
        let controller = SyncController::new(store.clone(), Some(recorder.clone() as SyncObserver));
        controller.state().apply_read(Some(false));

        let outcome = controller.toggle().await;
        assert!(!outcome.is_confirmed());
        assert!(!outcome.power());
        assert!(!controller.snapshot().power);
        assert!(controller.snapshot().connected);
        assert_eq!(controller.snapshot().write_failures, 1);
        assert_eq!(store.writes(), vec![true]);
        assert_eq!(
            recorder.alerts.lock().clone(),
            vec![WRITE_FAILED_ALERT.to_string()]
        );
        assert!(recorder.updates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_null_read_keeps_the_toggled_value() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store.clone(), None);
        controller.state().apply_read(Some(false));

        controller.toggle().await;
        // The write is not visible in the store yet, reads still say null.
        controller.poll_once().await;
        assert!(controller.snapshot().power);
        assert!(controller.snapshot().connected);
    }

    #[tokio::test]
    async fn test_stale_read_wins_when_it_completes_after_the_toggle() {
        let store = Arc::new(ScriptedStore::default());
        store.push_read(Ok(Some(false)));
        let controller = SyncController::new(store.clone(), None);
        controller.state().apply_read(Some(false));

        let outcome = controller.toggle().await;
        assert!(outcome.is_confirmed());
        // A read that left before the toggle still carries the old value.
        controller.poll_once().await;
        assert!(!controller.snapshot().power);
    }

    #[tokio::test]
    async fn test_toggle_wins_when_it_completes_after_the_stale_read() {
        let store = Arc::new(ScriptedStore::default());
        store.push_read(Ok(Some(false)));
        let controller = SyncController::new(store.clone(), None);
        controller.state().apply_read(Some(false));

        controller.poll_once().await;
        let outcome = controller.toggle().await;
        assert!(outcome.is_confirmed());
        assert!(controller.snapshot().power);
    }

    #[tokio::test]
    async fn test_observer_fires_only_on_visible_change() {
        let store = Arc::new(ScriptedStore::default());
        store.push_read(Err(status_error()));
        store.push_read(Ok(None));
        store.push_read(Err(status_error()));
        let recorder = Arc::new(Recorder::default());
        let controller = SyncController::new(store, Some(recorder.clone() as SyncObserver));

        // Failure before the first load keeps the visible state untouched.
        controller.poll_once().await;
        assert!(recorder.updates.lock().is_empty());
        // First successful read and the later drop both show.
        controller.poll_once().await;
        controller.poll_once().await;
        assert_eq!(recorder.updates.lock().len(), 2);
        assert!(recorder.updates.lock()[0].connected);
        assert!(!recorder.updates.lock()[1].connected);
    }

    #[tokio::test]
    async fn test_polling_advances_and_stops() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        controller.start_polling(Duration::from_millis(5));
        assert!(controller.is_polling());

        sleep(Duration::from_millis(50)).await;
        controller.stop_polling();
        assert!(!controller.is_polling());

        sleep(Duration::from_millis(20)).await;
        let frozen = controller.snapshot().poll_count;
        assert!(frozen > 0);
        sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.snapshot().poll_count, frozen);
    }

    #[tokio::test]
    async fn test_zero_interval_still_starts_the_poller() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        controller.start_polling(Duration::ZERO);

        sleep(Duration::from_millis(30)).await;
        assert!(controller.is_polling());
        assert!(controller.snapshot().poll_count > 0);
        controller.stop_polling();
    }

    #[tokio::test]
    async fn test_second_start_is_ignored_while_running() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        controller.start_polling(Duration::from_millis(5));
        controller.start_polling(Duration::from_millis(5));
        assert!(controller.is_polling());
        controller.stop_polling();
    }

    #[tokio::test]
    async fn test_stop_without_start_is_safe() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        controller.stop_polling();
        controller.stop_polling();
        assert!(!controller.is_polling());
    }

    #[tokio::test]
    async fn test_no_cycle_starts_after_stop() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        // The poll task has not run yet, so the stop request races the
        // immediate first tick.
        controller.start_polling(Duration::from_millis(1));
        controller.stop_polling();

        sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.snapshot().poll_count, 0);
        assert!(!controller.is_polling());
    }

    #[tokio::test]
    async fn test_dropping_the_controller_stops_the_poller() {
        let store = Arc::new(ScriptedStore::default());
        let controller = SyncController::new(store, None);
        let state = controller.state().clone();
        controller.start_polling(Duration::from_millis(5));
        sleep(Duration::from_millis(30)).await;

        drop(controller);
        sleep(Duration::from_millis(20)).await;
        let frozen = state.poll_count();
        sleep(Duration::from_millis(30)).await;
        assert_eq!(state.poll_count(), frozen);
    }

    #[tokio::test]
    async fn test_commit_optimistic_confirms_on_success() {
        let state = LightState::new();
        state.apply_read(Some(false));
        let outcome = commit_optimistic(&state, true, Box::pin(async { Ok(()) })).await;
        assert!(outcome.is_confirmed());
        assert!(state.power());
        assert_eq!(state.snapshot().write_count, 1);
    }

    #[tokio::test]
    async fn test_commit_optimistic_reverts_on_failure() {
        let state = LightState::new();
        state.apply_read(Some(false));
        let outcome =
            commit_optimistic(&state, true, Box::pin(async { Err(status_error()) })).await;
        assert!(!outcome.is_confirmed());
        assert!(!state.power());
        assert_eq!(state.snapshot().write_failures, 1);
    }
}
