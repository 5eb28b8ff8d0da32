//! Shared light state for the sync controller and its front ends.
//!
//! This module defines the state that is accessible from both the
//! polling task and whatever surface renders it (CLI, TUI).

use crate::store::client::StoreClientError;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Sync lifecycle phase, derived from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No read has completed yet.
    Loading,
    /// The latest read succeeded.
    Synced,
    /// The latest read failed after at least one success.
    Disconnected,
}

impl SyncPhase {
    /// Returns the phase as a string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Loading => "loading",
            SyncPhase::Synced => "synced",
            SyncPhase::Disconnected => "disconnected",
        }
    }
}

/// Internal mutable state.
#[derive(Debug)]
struct LightStateInner {
    /// Last known power value of the fixture.
    power: bool,
    /// Whether the latest read round trip succeeded.
    connected: bool,
    /// Whether any read has completed since startup.
    initial_load_complete: bool,
    /// Total read attempts.
    poll_count: u64,
    /// Failed read attempts.
    poll_failures: u64,
    /// Successful writes.
    write_count: u64,
    /// Failed writes.
    write_failures: u64,
    /// Last successful read time.
    last_poll: Option<Instant>,
    /// Error message if any.
    last_error: Option<String>,
}

/// Shared light state.
///
/// This is thread-safe and can be shared between the poll task and the UI.
#[derive(Debug, Clone)]
pub struct LightState {
    inner: Arc<RwLock<LightStateInner>>,
}

impl Default for LightState {
    fn default() -> Self {
        Self::new()
    }
}

impl LightState {
    /// Create a new light state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(LightStateInner {
                power: false,
                connected: false,
                initial_load_complete: false,
                poll_count: 0,
                poll_failures: 0,
                write_count: 0,
                write_failures: 0,
                last_poll: None,
                last_error: None,
            })),
        }
    }

    /// Get the last known power value.
    pub fn power(&self) -> bool {
        self.inner.read().power
    }

    /// Set the power value without touching connectivity.
    pub fn set_power(&self, value: bool) {
        self.inner.write().power = value;
    }

    /// Check whether the latest read succeeded.
    pub fn connected(&self) -> bool {
        self.inner.read().connected
    }

    /// Check whether any read has completed.
    pub fn initial_load_complete(&self) -> bool {
        self.inner.read().initial_load_complete
    }

    /// Record a successful read. `None` means the document held `null`
    /// and the power value is left as it was.
    pub fn apply_read(&self, value: Option<bool>) {
        let mut inner = self.inner.write();
        if let Some(power) = value {
            inner.power = power;
        }
        inner.connected = true;
        inner.initial_load_complete = true;
        inner.poll_count += 1;
        inner.last_poll = Some(Instant::now());
        inner.last_error = None;
    }

    /// Record a failed read. Power and the initial-load flag are kept.
    pub fn apply_read_failure(&self, error: &StoreClientError) {
        let mut inner = self.inner.write();
        inner.connected = false;
        inner.poll_count += 1;
        inner.poll_failures += 1;
        inner.last_error = Some(error.to_string());
    }

    /// Record a confirmed write.
    pub fn record_write_success(&self) {
        self.inner.write().write_count += 1;
    }

    /// Record a failed write. Connectivity only tracks reads.
    pub fn record_write_failure(&self, error: &StoreClientError) {
        let mut inner = self.inner.write();
        inner.write_failures += 1;
        inner.last_error = Some(error.to_string());
    }

    /// Get total read attempts.
    pub fn poll_count(&self) -> u64 {
        self.inner.read().poll_count
    }

    /// Get the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    /// Get a point-in-time copy of the state for rendering.
    pub fn snapshot(&self) -> LightSnapshot {
        let inner = self.inner.read();
        LightSnapshot {
            power: inner.power,
            connected: inner.connected,
            initial_load_complete: inner.initial_load_complete,
            poll_count: inner.poll_count,
            poll_failures: inner.poll_failures,
            write_count: inner.write_count,
            write_failures: inner.write_failures,
            last_poll_seconds_ago: inner.last_poll.map(|t| t.elapsed().as_secs()),
            last_error: inner.last_error.clone(),
        }
    }
}

/// Point-in-time copy of the light state for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct LightSnapshot {
    /// Last known power value.
    pub power: bool,
    /// Whether the latest read succeeded.
    pub connected: bool,
    /// Whether any read has completed.
    pub initial_load_complete: bool,
    /// Total read attempts.
    pub poll_count: u64,
    /// Failed read attempts.
    pub poll_failures: u64,
    /// Successful writes.
    pub write_count: u64,
    /// Failed writes.
    pub write_failures: u64,
    /// Seconds since the last successful read.
    pub last_poll_seconds_ago: Option<u64>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl LightSnapshot {
    /// Derive the sync phase from the snapshot.
    pub fn phase(&self) -> SyncPhase {
        if !self.initial_load_complete {
            SyncPhase::Loading
        } else if self.connected {
            SyncPhase::Synced
        } else {
            SyncPhase::Disconnected
        }
    }

    /// True when the observed triple (power, connectivity, initial load)
    /// differs between two snapshots. Counter churn alone is not a change.
    pub fn observable_changed(&self, other: &LightSnapshot) -> bool {
        self.power != other.power
            || self.connected != other.connected
            || self.initial_load_complete != other.initial_load_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn read_error() -> StoreClientError {
        StoreClientError::Status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[test]
    fn test_new_state_is_loading() {
        let state = LightState::new();
        assert!(!state.power());
        assert!(!state.connected());
        assert!(!state.initial_load_complete());
        assert_eq!(state.snapshot().phase(), SyncPhase::Loading);
    }

    #[test]
    fn test_null_read_never_changes_power() {
        let state = LightState::new();
        state.apply_read(Some(true));
        state.apply_read(None);
        assert!(state.power());
        state.set_power(false);
        state.apply_read(None);
        assert!(!state.power());
    }

    #[test]
    fn test_read_failure_leaves_power_untouched() {
        let state = LightState::new();
        state.apply_read(Some(true));
        state.apply_read_failure(&read_error());
        assert!(state.power());
        assert!(!state.connected());
    }

    #[test]
    fn test_initial_load_survives_later_failures() {
        let state = LightState::new();
        state.apply_read(Some(false));
        state.apply_read_failure(&read_error());
        state.apply_read_failure(&read_error());
        assert!(state.initial_load_complete());
        assert_eq!(state.snapshot().phase(), SyncPhase::Disconnected);
    }

    #[test]
    fn test_connected_tracks_only_the_latest_outcome() {
        let state = LightState::new();
        state.apply_read(Some(true));
        assert!(state.connected());
        state.apply_read_failure(&read_error());
        assert!(!state.connected());
        state.apply_read(None);
        assert!(state.connected());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_write_failure_does_not_flip_connected() {
        let state = LightState::new();
        state.apply_read(Some(true));
        state.record_write_failure(&read_error());
        assert!(state.connected());
        assert!(state.last_error().is_some());
        assert_eq!(state.snapshot().write_failures, 1);
    }

    #[test]
    fn test_counters_accumulate() {
        let state = LightState::new();
        state.apply_read(Some(true));
        state.apply_read_failure(&read_error());
        state.apply_read(None);
        state.record_write_success();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.poll_count, 3);
        assert_eq!(snapshot.poll_failures, 1);
        assert_eq!(snapshot.write_count, 1);
        assert_eq!(snapshot.last_poll_seconds_ago, Some(0));
    }

    #[test]
    fn test_observable_changed_ignores_counters() {
        let state = LightState::new();
        state.apply_read(Some(true));
        let before = state.snapshot();
        state.apply_read(Some(true));
        let after = state.snapshot();
        assert!(!after.observable_changed(&before));
        state.apply_read_failure(&read_error());
        assert!(state.snapshot().observable_changed(&after));
    }

    #[test]
    fn test_phase_display_strings() {
        assert_eq!(SyncPhase::Loading.as_str(), "loading");
        assert_eq!(SyncPhase::Synced.as_str(), "synced");
        assert_eq!(SyncPhase::Disconnected.as_str(), "disconnected");
    }
}
