//! Audit event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::iso8601;

/// Why the engine forced a logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The offline episode outlasted the offline limit
    OfflineLimitExceeded,
    /// The stored credential expired or predates the offline limit
    CredentialExpired,
}

impl LogoutReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::OfflineLimitExceeded => "offline_limit_exceeded",
            Self::CredentialExpired => "credential_expired",
        }
    }
}

/// Security-relevant event handed to the audit collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Logout and purge ran because the offline limit was exceeded
    #[serde(rename_all = "camelCase")]
    OfflineLimitEnforced {
        #[serde(with = "iso8601")]
        at: DateTime<Utc>,
        #[serde(with = "iso8601")]
        started_at: DateTime<Utc>,
        elapsed_seconds: i64,
    },
    /// The device clock reported a time before the session start
    #[serde(rename_all = "camelCase")]
    ClockAnomalyDetected {
        #[serde(with = "iso8601")]
        at: DateTime<Utc>,
        #[serde(with = "iso8601")]
        started_at: DateTime<Utc>,
    },
    /// A stored credential was discarded
    #[serde(rename_all = "camelCase")]
    CredentialRevoked {
        #[serde(with = "iso8601")]
        at: DateTime<Utc>,
        reason: LogoutReason,
    },
}

impl AuditEvent {
    /// When the audited action happened.
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::OfflineLimitEnforced { at, .. }
            | Self::ClockAnomalyDetected { at, .. }
            | Self::CredentialRevoked { at, .. } => *at,
        }
    }
}
