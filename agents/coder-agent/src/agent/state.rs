//! Launcher State Management
//!
//! Tracks the launcher lifecycle: starting, serving, stopped. The
//! listener reports the current state and serving uptime through the
//! status endpoint.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle states of the launcher process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    /// Configuration captured, clients being constructed.
    Starting,
    /// Listener bound and accepting requests.
    Serving,
    /// Shut down; no further transitions.
    Stopped,
}

impl std::fmt::Display for LauncherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LauncherState::Starting => write!(f, "starting"),
            LauncherState::Serving => write!(f, "serving"),
            LauncherState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One recorded lifecycle transition.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: LauncherState,
    pub to: LauncherState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

struct StateInner {
    current: LauncherState,
    serving_since: Option<DateTime<Utc>>,
    transitions: Vec<StateTransition>,
}

/// Thread-safe launcher state manager.
#[derive(Clone)]
pub struct StateManager {
    inner: Arc<RwLock<StateInner>>,
}

impl StateManager {
    /// Create a manager in the `Starting` state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StateInner {
                current: LauncherState::Starting,
                serving_since: None,
                transitions: Vec::new(),
            })),
        }
    }

    pub fn current_state(&self) -> LauncherState {
        self.inner.read().current
    }

    /// When the listener started serving, if it has.
    pub fn serving_since(&self) -> Option<DateTime<Utc>> {
        self.inner.read().serving_since
    }

    /// Seconds spent serving so far.
    pub fn uptime_secs(&self) -> u64 {
        self.serving_since()
            .map(|since| (Utc::now() - since).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Transition to a new state; invalid transitions are rejected.
    pub fn transition_to(&self, new_state: LauncherState, reason: Option<String>) -> bool {
        let mut inner = self.inner.write();

        if !is_valid_transition(inner.current, new_state) {
            return false;
        }

        let old_state = inner.current;
        inner.current = new_state;

        if new_state == LauncherState::Serving {
            inner.serving_since = Some(Utc::now());
        }

        inner.transitions.push(StateTransition {
            from: old_state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });

        tracing::info!(from = %old_state, to = %new_state, "Launcher state transition");
        true
    }

    pub fn set_serving(&self) {
        self.transition_to(LauncherState::Serving, Some("Listener bound".to_string()));
    }

    pub fn set_stopped(&self, reason: Option<String>) {
        self.transition_to(LauncherState::Stopped, reason);
    }

    /// Recorded transitions, most recent first.
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        let inner = self.inner.read();
        inner.transitions.iter().rev().take(count).cloned().collect()
    }

    pub fn is_serving(&self) -> bool {
        self.current_state() == LauncherState::Serving
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_transition(from: LauncherState, to: LauncherState) -> bool {
    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (LauncherState::Starting, LauncherState::Serving)
            | (LauncherState::Starting, LauncherState::Stopped)
            | (LauncherState::Serving, LauncherState::Stopped)
    )
}
