//! Credential lifecycle guard.
//!
//! The guard stamps, validates and discards the locally stored credential. It
//! never talks to the network: fresh tokens come from the host's
//! [`AuthCollaborator`], and revocation is triggered by the enforcement
//! scheduler.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use crate::config::OfflinePolicy;
use crate::error::Result;
use crate::models::{Credential, CredentialStatus, LogoutReason, TokenGrant};
use crate::store::{clear_record, load_record, save_record, DurableStore};

/// Host authentication system.
pub trait AuthCollaborator: Send + Sync + 'static {
    /// End the user's session. Must be safe to call when already logged out.
    fn log_out(&self, reason: LogoutReason) -> impl Future<Output = Result<()>> + Send;

    /// Obtain fresh tokens, e.g. after an interactive sign-in.
    fn request_credential(&self) -> impl Future<Output = Result<TokenGrant>> + Send;
}

/// Issues and validates the persisted credential.
pub struct CredentialGuard<S> {
    store: S,
    credential_lifetime: Duration,
    max_offline_duration: Duration,
}

impl<S: DurableStore> CredentialGuard<S> {
    pub fn new(store: S, policy: &OfflinePolicy) -> Self {
        Self {
            store,
            credential_lifetime: policy.credential_lifetime,
            max_offline_duration: policy.max_offline_duration,
        }
    }

    /// Stamp `grant` as issued at `now` and persist it, replacing any previous
    /// credential.
    pub async fn issue(&self, now: DateTime<Utc>, grant: TokenGrant) -> Result<Credential> {
        let credential = Credential::issue(now, self.credential_lifetime, grant);
        save_record(&self.store, &credential).await?;
        tracing::info!(
            issued_at = %credential.issued_at,
            expires_at = %credential.expires_at,
            "Issued credential"
        );
        Ok(credential)
    }

    /// Classify `credential` at `now`. Expiry wins over age.
    pub fn validate(&self, credential: &Credential, now: DateTime<Utc>) -> CredentialStatus {
        if credential.is_expired(now) {
            CredentialStatus::Expired
        } else if credential.is_older_than_offline_limit(now, self.max_offline_duration) {
            CredentialStatus::TooOld
        } else {
            CredentialStatus::Valid
        }
    }

    /// The stored credential, if any.
    pub async fn current(&self) -> Result<Option<Credential>> {
        load_record(&self.store).await
    }

    /// Validate the stored credential; `None` when nothing is stored.
    pub async fn check_current(&self, now: DateTime<Utc>) -> Result<Option<CredentialStatus>> {
        Ok(self
            .current()
            .await?
            .map(|credential| self.validate(&credential, now)))
    }

    /// Discard the stored credential. Revoking twice is a no-op.
    pub async fn revoke(&self) -> Result<()> {
        clear_record::<Credential, _>(&self.store).await?;
        tracing::debug!("Discarded stored credential");
        Ok(())
    }
}
