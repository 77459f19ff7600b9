//! Persisted enforcement progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EnforcementAction;
use crate::store::Record;
use crate::util::iso8601;

/// Which enforcement actions have succeeded for an exceeded episode.
///
/// Created the first time a pass sees the limit exceeded and kept until a fresh
/// credential is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementProgress {
    #[serde(with = "iso8601")]
    pub episode_started_at: DateTime<Utc>,
    pub logged_out: bool,
    pub purged: bool,
    pub audited: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso8601::option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EnforcementProgress {
    pub const fn new(episode_started_at: DateTime<Utc>) -> Self {
        Self {
            episode_started_at,
            logged_out: false,
            purged: false,
            audited: false,
            completed_at: None,
        }
    }

    pub const fn is_done(&self, action: EnforcementAction) -> bool {
        match action {
            EnforcementAction::Logout => self.logged_out,
            EnforcementAction::Purge => self.purged,
            EnforcementAction::Audit => self.audited,
        }
    }

    pub fn mark_done(&mut self, action: EnforcementAction) {
        match action {
            EnforcementAction::Logout => self.logged_out = true,
            EnforcementAction::Purge => self.purged = true,
            EnforcementAction::Audit => self.audited = true,
        }
    }

    /// Actions that have not succeeded yet, in execution order.
    pub fn pending(&self) -> Vec<EnforcementAction> {
        EnforcementAction::ALL
            .into_iter()
            .filter(|action| !self.is_done(*action))
            .collect()
    }

    /// All three actions succeeded and the device is logged out.
    pub const fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

impl Record for EnforcementProgress {
    const KEY: &'static str = "enforcement_progress";
}
