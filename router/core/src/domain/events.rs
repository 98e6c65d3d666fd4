// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::instruction::{Trigger, ViewportInstructionTree};
use crate::domain::transition::TransitionId;

/// Why a navigation attempt did not commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// A guard refused the transition.
    Vetoed,
    /// A guard redirected; the redirected navigation follows under a new
    /// transition id.
    Redirected,
    /// A newer navigation enqueued at the start boundary won.
    Superseded,
}

/// Navigation lifecycle events published on the router's event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NavigationEvent {
    NavigationStart {
        transition_id: TransitionId,
        trigger: Trigger,
        instructions: ViewportInstructionTree,
        url: String,
        started_at: DateTime<Utc>,
    },
    NavigationEnd {
        transition_id: TransitionId,
        instructions: ViewportInstructionTree,
        url: String,
        finished_at: DateTime<Utc>,
    },
    NavigationCancel {
        transition_id: TransitionId,
        url: String,
        reason: CancelReason,
        cancelled_at: DateTime<Utc>,
    },
    NavigationError {
        transition_id: TransitionId,
        url: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    LocationChange {
        url: String,
        changed_at: DateTime<Utc>,
    },
}

impl NavigationEvent {
    pub fn transition_id(&self) -> Option<TransitionId> {
        match self {
            Self::NavigationStart { transition_id, .. }
            | Self::NavigationEnd { transition_id, .. }
            | Self::NavigationCancel { transition_id, .. }
            | Self::NavigationError { transition_id, .. } => Some(*transition_id),
            Self::LocationChange { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruction::ViewportInstruction;

    // ── NavigationEvent serialization ────────────────────────────────────────

    #[test]
    fn test_navigation_start_serialization() {
        let event = NavigationEvent::NavigationStart {
            transition_id: TransitionId(7),
            trigger: Trigger::Api,
            instructions: ViewportInstructionTree::new(vec![ViewportInstruction::new("home")]),
            url: "home".to_string(),
            started_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: NavigationEvent = serde_json::from_str(&json).unwrap();
        if let NavigationEvent::NavigationStart { transition_id, url, .. } = deserialized {
            assert_eq!(transition_id, TransitionId(7));
            assert_eq!(url, "home");
        } else {
            panic!("unexpected variant");
        }
    }

    #[test]
    fn test_navigation_cancel_serialization() {
        let event = NavigationEvent::NavigationCancel {
            transition_id: TransitionId(3),
            url: "foo".to_string(),
            reason: CancelReason::Vetoed,
            cancelled_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("NavigationCancel"));
        assert!(json.contains("vetoed"));
    }

    #[test]
    fn test_navigation_error_carries_transition_id() {
        let event = NavigationEvent::NavigationError {
            transition_id: TransitionId(9),
            url: "broken".to_string(),
            error: "no route matched 'broken'".to_string(),
            failed_at: Utc::now(),
        };
        assert_eq!(event.transition_id(), Some(TransitionId(9)));
    }

    #[test]
    fn test_location_change_has_no_transition_id() {
        let event = NavigationEvent::LocationChange {
            url: "back".to_string(),
            changed_at: Utc::now(),
        };
        assert_eq!(event.transition_id(), None);
    }
}
