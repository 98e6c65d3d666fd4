// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! In-memory history collaborator.
//!
//! Vec-backed stand-in for a platform location API, used by embedders
//! without one and by tests. Back/forward movement publishes a
//! [`LocationChange`] the embedder feeds (through the external URL parser)
//! into `Router::handle_location_change`.

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::domain::history::{HistoryApi, LocationChange};

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub url: String,
    pub title: Option<String>,
    pub state: Option<serde_json::Value>,
}

struct HistoryState {
    entries: Vec<HistoryEntry>,
    position: usize,
}

pub struct InMemoryHistory {
    state: Mutex<HistoryState>,
    changes: broadcast::Sender<LocationChange>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(HistoryState {
                entries: Vec::new(),
                position: 0,
            }),
            changes,
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Move back one entry, emitting a location change.
    pub fn back(&self) -> Option<LocationChange> {
        self.shift(-1)
    }

    /// Move forward one entry, emitting a location change.
    pub fn forward(&self) -> Option<LocationChange> {
        self.shift(1)
    }

    fn shift(&self, delta: isize) -> Option<LocationChange> {
        let change = {
            let mut state = self.state.lock();
            let target = state.position.checked_add_signed(delta)?;
            let entry = state.entries.get(target)?.clone();
            state.position = target;
            LocationChange {
                url: entry.url,
                state: entry.state,
                changed_at: Utc::now(),
            }
        };
        let _ = self.changes.send(change.clone());
        Some(change)
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryApi for InMemoryHistory {
    fn push_state(&self, state: Option<serde_json::Value>, title: Option<&str>, url: &str) {
        let mut guard = self.state.lock();
        let position = guard.position;
        if !guard.entries.is_empty() {
            guard.entries.truncate(position + 1);
        }
        guard.entries.push(HistoryEntry {
            url: url.to_string(),
            title: title.map(str::to_string),
            state,
        });
        guard.position = guard.entries.len() - 1;
    }

    fn replace_state(&self, state: Option<serde_json::Value>, title: Option<&str>, url: &str) {
        let mut guard = self.state.lock();
        let entry = HistoryEntry {
            url: url.to_string(),
            title: title.map(str::to_string),
            state,
        };
        let position = guard.position;
        match guard.entries.get_mut(position) {
            Some(slot) => *slot = entry,
            None => guard.entries.push(entry),
        }
    }

    fn get_path(&self) -> String {
        let state = self.state.lock();
        state
            .entries
            .get(state.position)
            .map(|entry| entry.url.clone())
            .unwrap_or_default()
    }

    fn changes(&self) -> broadcast::Receiver<LocationChange> {
        self.changes.subscribe()
    }
}
