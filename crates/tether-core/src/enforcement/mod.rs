//! Offline limit enforcement.
//!
//! The scheduler periodically asks the tracker whether the offline limit has
//! been exceeded and, if so, drives logout, cache purge and audit through host
//! collaborators. Each action is tracked on its own so a failed action is
//! retried without repeating the ones that already succeeded.

mod progress;
mod scheduler;

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthCollaborator;
use crate::config::OfflinePolicy;
use crate::error::Result;
use crate::models::{AuditEvent, LogoutReason, TokenGrant};
use crate::tracker::SessionSnapshot;

pub use progress::EnforcementProgress;
pub use scheduler::{EnforcementOutcome, EnforcementScheduler, PassReport};

/// One of the three actions taken when the offline limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    Logout,
    Purge,
    Audit,
}

impl EnforcementAction {
    pub const ALL: [Self; 3] = [Self::Logout, Self::Purge, Self::Audit];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::Purge => "purge",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for EnforcementAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// Host component that wipes locally cached sensitive data.
pub trait PurgeCollaborator: Send + Sync + 'static {
    /// Clear the cache. Must be safe to call on an already empty cache.
    fn clear_sensitive_cache(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Host audit trail.
pub trait AuditCollaborator: Send + Sync + 'static {
    fn record(&self, event: AuditEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Remaining offline time crossed a notification threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingNotice {
    pub started_at: DateTime<Utc>,
    pub remaining: Duration,
    /// The tightest threshold `remaining` is now below
    pub threshold: Duration,
}

/// Host surface for "N hours left offline" warnings.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify_remaining(&self, notice: RemainingNotice) -> impl Future<Output = Result<()>> + Send;
}

/// Notification sink that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    async fn notify_remaining(&self, _notice: RemainingNotice) -> Result<()> {
        Ok(())
    }
}

/// Everything the scheduler needs from its host.
pub trait EnforcementHost:
    AuthCollaborator + PurgeCollaborator + AuditCollaborator + NotificationSink
{
}

impl<T> EnforcementHost for T where
    T: AuthCollaborator + PurgeCollaborator + AuditCollaborator + NotificationSink
{
}

/// Bundles separately implemented collaborators into one [`EnforcementHost`].
#[derive(Debug, Clone)]
pub struct Collaborators<A, P, D, N = NoopNotifier> {
    pub auth: A,
    pub purge: P,
    pub audit: D,
    pub notifier: N,
}

impl<A, P, D> Collaborators<A, P, D> {
    pub const fn new(auth: A, purge: P, audit: D) -> Self {
        Self {
            auth,
            purge,
            audit,
            notifier: NoopNotifier,
        }
    }
}

impl<A, P, D, N> Collaborators<A, P, D, N> {
    pub fn with_notifier<M>(self, notifier: M) -> Collaborators<A, P, D, M> {
        Collaborators {
            auth: self.auth,
            purge: self.purge,
            audit: self.audit,
            notifier,
        }
    }
}

impl<A, P, D, N> AuthCollaborator for Collaborators<A, P, D, N>
where
    A: AuthCollaborator,
    P: Send + Sync + 'static,
    D: Send + Sync + 'static,
    N: Send + Sync + 'static,
{
    fn log_out(&self, reason: LogoutReason) -> impl Future<Output = Result<()>> + Send {
        self.auth.log_out(reason)
    }

    fn request_credential(&self) -> impl Future<Output = Result<TokenGrant>> + Send {
        self.auth.request_credential()
    }
}

impl<A, P, D, N> PurgeCollaborator for Collaborators<A, P, D, N>
where
    A: Send + Sync + 'static,
    P: PurgeCollaborator,
    D: Send + Sync + 'static,
    N: Send + Sync + 'static,
{
    fn clear_sensitive_cache(&self) -> impl Future<Output = Result<()>> + Send {
        self.purge.clear_sensitive_cache()
    }
}

impl<A, P, D, N> AuditCollaborator for Collaborators<A, P, D, N>
where
    A: Send + Sync + 'static,
    P: Send + Sync + 'static,
    D: AuditCollaborator,
    N: Send + Sync + 'static,
{
    fn record(&self, event: AuditEvent) -> impl Future<Output = Result<()>> + Send {
        self.audit.record(event)
    }
}

impl<A, P, D, N> NotificationSink for Collaborators<A, P, D, N>
where
    A: Send + Sync + 'static,
    P: Send + Sync + 'static,
    D: Send + Sync + 'static,
    N: NotificationSink,
{
    fn notify_remaining(&self, notice: RemainingNotice) -> impl Future<Output = Result<()>> + Send {
        self.notifier.notify_remaining(notice)
    }
}

/// Per-device enforcement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Online,
    OfflineActive,
    OfflineWarning,
    OfflineCritical,
    OfflineExpired,
    /// Terminal until a fresh credential is issued
    LoggedOut,
}

impl DeviceState {
    pub fn classify(
        snapshot: &SessionSnapshot,
        policy: &OfflinePolicy,
        progress: Option<&EnforcementProgress>,
    ) -> Self {
        if progress.is_some_and(EnforcementProgress::is_complete) {
            return Self::LoggedOut;
        }
        if !snapshot.is_offline() {
            return Self::Online;
        }
        if snapshot.exceeded {
            Self::OfflineExpired
        } else if snapshot.remaining < policy.escalation_window {
            Self::OfflineCritical
        } else if snapshot.remaining < policy.warning_window {
            Self::OfflineWarning
        } else {
            Self::OfflineActive
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::OfflineActive => "offline_active",
            Self::OfflineWarning => "offline_warning",
            Self::OfflineCritical => "offline_critical",
            Self::OfflineExpired => "offline_expired",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}
