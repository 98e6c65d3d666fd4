// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! History/location collaborator seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A location change reported by the history collaborator. The URL string is
/// handed to the external grammar parser by the embedder before it reaches
/// `Router::handle_location_change`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationChange {
    pub url: String,
    pub state: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

/// Browser-history-shaped collaborator.
pub trait HistoryApi: Send + Sync {
    fn push_state(&self, state: Option<serde_json::Value>, title: Option<&str>, url: &str);

    fn replace_state(&self, state: Option<serde_json::Value>, title: Option<&str>, url: &str);

    /// Current location path.
    fn get_path(&self) -> String;

    /// Subscribe to externally initiated location changes (back/forward).
    fn changes(&self) -> broadcast::Receiver<LocationChange>;
}
