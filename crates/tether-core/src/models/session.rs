//! Offline session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;
use crate::util::iso8601;

/// Persisted marker of the current offline episode.
///
/// `started_at` is absent while the device is online.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OfflineSession {
    /// Instant connectivity was lost
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso8601::option"
    )]
    pub started_at: Option<DateTime<Utc>>,
}

impl OfflineSession {
    /// A session that started at `started_at`.
    pub const fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(started_at),
        }
    }

    /// The online (no session) value.
    pub const fn inactive() -> Self {
        Self { started_at: None }
    }

    /// Whether an offline episode is in progress.
    pub const fn is_active(&self) -> bool {
        self.started_at.is_some()
    }
}

impl Record for OfflineSession {
    const KEY: &'static str = "offline_session";
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn active_session_round_trips_exactly() {
        let started_at = Utc.timestamp_opt(1_767_225_600, 987_654_321).unwrap();
        let session = OfflineSession::started(started_at);

        let json = serde_json::to_string(&session).unwrap();
        assert_eq!(json, r#"{"startedAt":"2026-01-01T00:00:00.987654321Z"}"#);

        let parsed: OfflineSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }

    #[test]
    fn inactive_session_omits_started_at() {
        let json = serde_json::to_string(&OfflineSession::inactive()).unwrap();
        assert_eq!(json, "{}");

        let parsed: OfflineSession = serde_json::from_str("{}").unwrap();
        assert!(!parsed.is_active());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<OfflineSession>(r#"{"startAt":"2026-01-01T00:00:00Z"}"#);
        assert!(parsed.is_err());
    }
}
