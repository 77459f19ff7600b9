//! Credential model

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;
use crate::util::iso8601;

/// Tokens handed out by the authentication collaborator.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub refresh_token: String,
}

impl TokenGrant {
    pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenGrant")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// An issued credential with an absolute expiry.
///
/// `expires_at` is stamped once at issuance and never recomputed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(with = "iso8601")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub expires_at: DateTime<Utc>,
    pub token: String,
    pub refresh_token: String,
}

impl Credential {
    /// Stamp a grant issued at `issued_at` with a fixed lifetime.
    ///
    /// The expiry saturates at the latest representable instant.
    pub fn issue(issued_at: DateTime<Utc>, lifetime: Duration, grant: TokenGrant) -> Self {
        Self {
            issued_at,
            expires_at: issued_at
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            token: grant.token,
            refresh_token: grant.refresh_token,
        }
    }

    /// `now` is strictly past the stamped expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// The credential was issued before `now - max_offline_duration`.
    ///
    /// Holds independently of `expires_at`, so a credential with a bad stamp is
    /// still caught.
    pub fn is_older_than_offline_limit(
        &self,
        now: DateTime<Utc>,
        max_offline_duration: Duration,
    ) -> bool {
        now.checked_sub_signed(max_offline_duration)
            .is_some_and(|cutoff| self.issued_at < cutoff)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl Record for Credential {
    const KEY: &'static str = "credential";
}

/// Outcome of validating a credential against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Valid,
    Expired,
    TooOld,
}

impl CredentialStatus {
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::TooOld => "too_old",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap()
    }

    fn credential() -> Credential {
        Credential::issue(
            issued_at(),
            Duration::hours(168),
            TokenGrant::new("secret-access-token", "secret-refresh-token"),
        )
    }

    #[test]
    fn expiry_is_stamped_at_issuance() {
        let credential = credential();
        assert_eq!(credential.expires_at, issued_at() + Duration::hours(168));
        assert!(!credential.is_expired(credential.expires_at));
        assert!(credential.is_expired(credential.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn oversized_durations_saturate_instead_of_overflowing() {
        let credential = Credential::issue(
            issued_at(),
            Duration::MAX,
            TokenGrant::new("secret-access-token", "secret-refresh-token"),
        );
        assert_eq!(credential.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!credential.is_expired(issued_at() + Duration::days(365)));
        assert!(!credential.is_older_than_offline_limit(issued_at(), Duration::MAX));
    }

    #[test]
    fn offline_limit_age_check_ignores_expires_at() {
        let mut credential = credential();
        credential.expires_at = issued_at() + Duration::days(365);

        let now = issued_at() + Duration::hours(169);
        assert!(!credential.is_expired(now));
        assert!(credential.is_older_than_offline_limit(now, Duration::hours(168)));
        assert!(!credential.is_older_than_offline_limit(
            issued_at() + Duration::hours(168),
            Duration::hours(168)
        ));
    }

    #[test]
    fn credential_round_trips_exactly() {
        let mut credential = credential();
        credential.issued_at = Utc.timestamp_opt(1_770_000_000, 1).unwrap();

        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains(r#""issuedAt":"2026-02-02T02:40:00.000000001Z""#));
        assert!(json.contains(r#""refreshToken":"secret-refresh-token""#));

        let parsed: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, credential);
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", credential());
        assert!(!rendered.contains("secret-access-token"));
        assert!(!rendered.contains("secret-refresh-token"));
        assert!(rendered.contains("[REDACTED]"));

        let grant = format!("{:?}", TokenGrant::new("a-token", "r-token"));
        assert!(!grant.contains("a-token"));
    }
}
