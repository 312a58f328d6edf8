//! Observable sync progress

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::models::Flow;

/// Per-collection lifecycle within one flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    Unsynced,
    BulkCopying,
    LiveSyncing,
}

/// Overall bulk copy signal exposed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BulkCopyStatus {
    /// No session running
    Idle,
    InProgress,
    Complete,
    /// At least one collection could not be copied; retried on the next tick
    Failed(String),
}

impl BulkCopyStatus {
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Collection states for every flow of the running session
#[derive(Debug, Default)]
pub struct SyncProgress {
    states: Mutex<BTreeMap<(Flow, String), CollectionState>>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flow: Flow, collection: &str) -> CollectionState {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(&(flow, collection.to_string())).copied())
            .unwrap_or(CollectionState::Unsynced)
    }

    pub fn set(&self, flow: Flow, collection: &str, state: CollectionState) {
        if let Ok(mut states) = self.states.lock() {
            let previous = states.insert((flow, collection.to_string()), state);
            if previous != Some(state) {
                tracing::debug!("{} {}: {:?} -> {:?}", flow, collection, previous, state);
            }
        }
    }

    /// Whether live writes for this collection may move its checkpoint
    pub fn is_live(&self, flow: Flow, collection: &str) -> bool {
        self.get(flow, collection) == CollectionState::LiveSyncing
    }

    /// Snapshot of all tracked states
    pub fn snapshot(&self) -> Vec<(Flow, String, CollectionState)> {
        self.states
            .lock()
            .map(|states| {
                states
                    .iter()
                    .map(|((flow, collection), state)| (*flow, collection.clone(), *state))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Forget everything (session torn down)
    pub fn clear(&self) {
        if let Ok(mut states) = self.states.lock() {
            states.clear();
        }
    }
}
