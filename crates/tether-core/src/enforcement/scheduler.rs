//! Enforcement passes.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::{DeviceState, EnforcementAction, EnforcementHost, EnforcementProgress, RemainingNotice};
use crate::auth::CredentialGuard;
use crate::clock::Clock;
use crate::config::OfflinePolicy;
use crate::error::{Error, Result};
use crate::models::{AuditEvent, Credential, CredentialStatus, LogoutReason, OfflineSession};
use crate::store::{clear_record, load_record, save_record, DurableStore};
use crate::sync::SharedSyncQueue;
use crate::tracker::{OfflineSessionTracker, SessionSnapshot};

/// What a pass did about the offline limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// The limit is not exceeded.
    NotRequired,
    /// The remaining actions all succeeded during this pass.
    Completed,
    /// These actions failed and will be retried.
    Pending(Vec<EnforcementAction>),
    /// A previous pass already logged the device out.
    AlreadyLoggedOut,
    /// The session could not be read; nothing was enforced.
    Undetermined,
}

/// Result of one enforcement pass.
#[derive(Debug)]
pub struct PassReport {
    pub at: DateTime<Utc>,
    /// `None` when the session could not be read
    pub state: Option<DeviceState>,
    pub remaining: Option<Duration>,
    /// Number of sync operations whose priority was raised
    pub escalated: usize,
    pub enforcement: EnforcementOutcome,
    /// Status of the stored credential when it was checked
    pub credential: Option<CredentialStatus>,
    pub failures: Vec<Error>,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
struct NoticeState {
    episode: Option<DateTime<Utc>>,
    tightest: Option<Duration>,
}

/// Runs enforcement passes against the tracker, guard and sync queue it owns.
///
/// Passes are serialized; a connectivity change racing the periodic tick waits
/// for the running pass to finish.
pub struct EnforcementScheduler<S, H> {
    policy: OfflinePolicy,
    store: S,
    tracker: OfflineSessionTracker<S>,
    guard: CredentialGuard<S>,
    queue: SharedSyncQueue<S>,
    host: H,
    pass_lock: Mutex<()>,
    notices: Mutex<NoticeState>,
}

impl<S, H> EnforcementScheduler<S, H>
where
    S: DurableStore + Clone,
    H: EnforcementHost,
{
    pub fn new(store: S, policy: OfflinePolicy, host: H) -> Self {
        Self {
            tracker: OfflineSessionTracker::new(store.clone(), policy.max_offline_duration),
            guard: CredentialGuard::new(store.clone(), &policy),
            queue: SharedSyncQueue::new(store.clone(), policy.escalation_window),
            store,
            policy,
            host,
            pass_lock: Mutex::new(()),
            notices: Mutex::new(NoticeState::default()),
        }
    }

    pub const fn policy(&self) -> &OfflinePolicy {
        &self.policy
    }

    pub const fn tracker(&self) -> &OfflineSessionTracker<S> {
        &self.tracker
    }

    pub const fn guard(&self) -> &CredentialGuard<S> {
        &self.guard
    }

    pub const fn queue(&self) -> &SharedSyncQueue<S> {
        &self.queue
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    /// Persisted enforcement progress; an unreadable record counts as none.
    pub async fn progress(&self) -> Result<Option<EnforcementProgress>> {
        match load_record::<EnforcementProgress, _>(&self.store).await {
            Err(Error::Serialization(error)) => {
                tracing::warn!("Discarding unreadable enforcement progress: {}", error);
                Ok(None)
            }
            other => other,
        }
    }

    /// Obtain fresh tokens from the host and leave the logged-out state.
    ///
    /// A fresh credential starts a new online state: the current offline
    /// episode is closed before the credential is stored, so the next pass
    /// cannot enforce the old episode against it.
    pub async fn reissue_credential(&self, now: DateTime<Utc>) -> Result<Credential> {
        let _pass = self.pass_lock.lock().await;
        let grant = self.host.request_credential().await?;
        if self.tracker.record_offline_end().await? {
            tracing::info!("Closed offline episode for fresh credential");
        }
        let credential = self.guard.issue(now, grant).await?;
        clear_record::<EnforcementProgress, _>(&self.store).await?;
        Ok(credential)
    }

    /// Run one pass: flush, check the limit, enforce or escalate, then check
    /// the stored credential. Failures are collected, never propagated.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        self.pass(now, Vec::new()).await
    }

    /// Run one pass at the time `clock` reads once the pass lock is held.
    pub async fn run_pass_with<C: Clock>(&self, clock: &C) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        self.pass(clock.now(), Vec::new()).await
    }

    /// Record a connectivity change and run a pass, both under the pass lock.
    ///
    /// The session transition and the pass share one reading of `clock`, so a
    /// concurrent pass never observes a start later than its own `now`.
    pub async fn handle_connectivity<C: Clock>(&self, connected: bool, clock: &C) -> PassReport {
        let _pass = self.pass_lock.lock().await;
        let now = clock.now();
        let transition = if connected {
            self.tracker.record_offline_end().await
        } else {
            self.tracker.record_offline_start(now).await
        };

        let mut failures = Vec::new();
        if let Err(error) = transition {
            tracing::warn!(
                connected,
                "Connectivity change applied in memory only; store write pending: {}",
                error
            );
            failures.push(error);
        }
        self.pass(now, failures).await
    }

    async fn pass(&self, now: DateTime<Utc>, mut failures: Vec<Error>) -> PassReport {
        if let Err(error) = self.tracker.flush_pending().await {
            tracing::warn!("Pending offline session write still failing: {}", error);
            failures.push(error);
        }

        let snapshot = match self.tracker.snapshot(now).await {
            Ok(snapshot) => Some(self.handle_clock_anomaly(snapshot, &mut failures).await),
            Err(error) => {
                tracing::error!(
                    "Offline session unreadable; offline limit not enforced this cycle: {}",
                    error
                );
                failures.push(error);
                None
            }
        };

        let mut progress = match self.progress().await {
            Ok(progress) => progress,
            Err(error) => {
                tracing::warn!("Enforcement progress unreadable: {}", error);
                failures.push(error);
                None
            }
        };

        let mut escalated = 0;
        let enforcement = match progress.take() {
            Some(done) if done.is_complete() => {
                progress = Some(done);
                EnforcementOutcome::AlreadyLoggedOut
            }
            Some(mut started) => {
                let outcome = self.enforce(now, &mut started, &mut failures).await;
                progress = Some(started);
                outcome
            }
            None => match snapshot {
                Some(SessionSnapshot {
                    exceeded: true,
                    started_at: Some(started_at),
                    elapsed,
                    ..
                }) => {
                    tracing::info!(
                        started_at = %started_at,
                        elapsed_secs = elapsed.num_seconds(),
                        "Offline limit exceeded; enforcing"
                    );
                    let mut started = EnforcementProgress::new(started_at);
                    let outcome = self.enforce(now, &mut started, &mut failures).await;
                    progress = Some(started);
                    outcome
                }
                Some(snapshot) => {
                    escalated = self.apply_time_pressure(&snapshot, &mut failures).await;
                    EnforcementOutcome::NotRequired
                }
                None => EnforcementOutcome::Undetermined,
            },
        };

        let credential = if enforcement == EnforcementOutcome::NotRequired {
            self.check_credential(now, &mut failures).await
        } else {
            None
        };

        let state = match snapshot {
            Some(snapshot) => Some(DeviceState::classify(
                &snapshot,
                &self.policy,
                progress.as_ref(),
            )),
            None if progress.as_ref().is_some_and(EnforcementProgress::is_complete) => {
                Some(DeviceState::LoggedOut)
            }
            None => None,
        };

        let report = PassReport {
            at: now,
            state,
            remaining: snapshot.map(|snapshot| snapshot.remaining),
            escalated,
            enforcement,
            credential,
            failures,
        };
        tracing::debug!(
            state = ?report.state,
            remaining_secs = report.remaining.map(|remaining| remaining.num_seconds()),
            failures = report.failures.len(),
            "Enforcement pass finished"
        );
        report
    }

    async fn handle_clock_anomaly(
        &self,
        snapshot: SessionSnapshot,
        failures: &mut Vec<Error>,
    ) -> SessionSnapshot {
        let (true, Some(started_at)) = (snapshot.clock_anomaly, snapshot.started_at) else {
            return snapshot;
        };
        let now = snapshot.now;
        tracing::warn!(
            started_at = %started_at,
            now = %now,
            "Device clock is behind the offline session start"
        );

        if let Err(error) = self
            .host
            .record(AuditEvent::ClockAnomalyDetected { at: now, started_at })
            .await
        {
            tracing::warn!("Failed to audit clock anomaly: {}", error);
            failures.push(error);
        }
        // On a failed write the correction stays cached and is flushed next pass.
        if let Err(error) = self.tracker.correct_clock_skew(now).await {
            failures.push(error);
        }

        SessionSnapshot::compute(
            OfflineSession::started(now),
            now,
            self.policy.max_offline_duration,
        )
    }

    async fn enforce(
        &self,
        now: DateTime<Utc>,
        progress: &mut EnforcementProgress,
        failures: &mut Vec<Error>,
    ) -> EnforcementOutcome {
        for action in progress.pending() {
            let result = match action {
                EnforcementAction::Logout => {
                    self.force_logout(LogoutReason::OfflineLimitExceeded).await
                }
                EnforcementAction::Purge => self.host.clear_sensitive_cache().await,
                EnforcementAction::Audit => {
                    let started_at = progress.episode_started_at;
                    self.host
                        .record(AuditEvent::OfflineLimitEnforced {
                            at: now,
                            started_at,
                            elapsed_seconds: (now - started_at).num_seconds().max(0),
                        })
                        .await
                }
            };

            match result {
                Ok(()) => {
                    progress.mark_done(action);
                    tracing::info!(action = %action, "Enforcement action succeeded");
                    self.save_progress(progress, failures).await;
                }
                Err(error) => {
                    tracing::warn!(
                        action = %action,
                        "Enforcement action failed; retrying next pass: {}",
                        error
                    );
                    failures.push(error);
                }
            }
        }

        let pending = progress.pending();
        if pending.is_empty() {
            progress.completed_at = Some(now);
            tracing::info!(
                started_at = %progress.episode_started_at,
                "Offline limit enforced; device logged out"
            );
        }
        self.save_progress(progress, failures).await;

        if pending.is_empty() {
            EnforcementOutcome::Completed
        } else {
            EnforcementOutcome::Pending(pending)
        }
    }

    async fn force_logout(&self, reason: LogoutReason) -> Result<()> {
        self.host.log_out(reason).await?;
        self.guard.revoke().await
    }

    async fn save_progress(&self, progress: &EnforcementProgress, failures: &mut Vec<Error>) {
        if let Err(error) = save_record(&self.store, progress).await {
            tracing::warn!("Failed to persist enforcement progress: {}", error);
            failures.push(error);
        }
    }

    async fn apply_time_pressure(
        &self,
        snapshot: &SessionSnapshot,
        failures: &mut Vec<Error>,
    ) -> usize {
        let escalated = match self.queue.escalate(snapshot.remaining).await {
            Ok(escalated) => escalated,
            Err(error) => {
                failures.push(error);
                0
            }
        };

        if let Some(started_at) = snapshot.started_at {
            self.notify_threshold(started_at, snapshot.remaining, failures)
                .await;
        }
        escalated
    }

    /// Report the tightest threshold `remaining` is below, once per band and
    /// episode.
    async fn notify_threshold(
        &self,
        started_at: DateTime<Utc>,
        remaining: Duration,
        failures: &mut Vec<Error>,
    ) {
        let Some(threshold) = self
            .policy
            .notification_thresholds
            .iter()
            .copied()
            .filter(|threshold| remaining < *threshold)
            .min()
        else {
            return;
        };

        let mut notices = self.notices.lock().await;
        if notices.episode != Some(started_at) {
            *notices = NoticeState {
                episode: Some(started_at),
                tightest: None,
            };
        }
        if notices
            .tightest
            .is_some_and(|reported| reported <= threshold)
        {
            return;
        }

        let notice = RemainingNotice {
            started_at,
            remaining,
            threshold,
        };
        match self.host.notify_remaining(notice).await {
            Ok(()) => {
                tracing::info!(
                    remaining_secs = remaining.num_seconds(),
                    threshold_hours = threshold.num_hours(),
                    "Offline time running out"
                );
                notices.tightest = Some(threshold);
            }
            Err(error) => {
                tracing::warn!("Failed to deliver remaining-time notice: {}", error);
                failures.push(error);
            }
        }
    }

    async fn check_credential(
        &self,
        now: DateTime<Utc>,
        failures: &mut Vec<Error>,
    ) -> Option<CredentialStatus> {
        let status = match self.guard.check_current(now).await {
            Ok(status) => status?,
            Err(error) => {
                tracing::warn!("Stored credential unreadable: {}", error);
                failures.push(error);
                return None;
            }
        };
        if status.is_valid() {
            return Some(status);
        }

        tracing::warn!(status = %status, "Stored credential no longer valid; logging out");
        let revoked = async {
            self.host.log_out(LogoutReason::CredentialExpired).await?;
            self.host
                .record(AuditEvent::CredentialRevoked {
                    at: now,
                    reason: LogoutReason::CredentialExpired,
                })
                .await?;
            self.guard.revoke().await
        }
        .await;
        if let Err(error) = revoked {
            tracing::warn!("Credential revocation incomplete; retrying next pass: {}", error);
            failures.push(error);
        }
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SyncKind, SyncOperation, SyncPriority, TokenGrant};
    use crate::store::MemoryStore;
    use crate::test_support::RecordingHost;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    type TestScheduler = EnforcementScheduler<MemoryStore, RecordingHost>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn scheduler(store: &MemoryStore, host: &RecordingHost) -> TestScheduler {
        EnforcementScheduler::new(store.clone(), OfflinePolicy::default(), host.clone())
    }

    async fn offline_since(store: &MemoryStore, host: &RecordingHost, start: DateTime<Utc>) -> TestScheduler {
        let scheduler = scheduler(store, host);
        scheduler.tracker().record_offline_start(start).await.unwrap();
        scheduler
    }

    #[tokio::test]
    async fn exceeded_limit_logs_out_and_purges_exactly_once() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        scheduler
            .guard()
            .issue(t0(), TokenGrant::new("a", "r"))
            .await
            .unwrap();

        let now = t0() + Duration::days(8);
        let first = scheduler.run_pass(now).await;
        assert!(first.is_clean());
        assert_eq!(first.enforcement, EnforcementOutcome::Completed);
        assert_eq!(first.state, Some(DeviceState::LoggedOut));

        for hours in [0, 6, 12] {
            let later = scheduler.run_pass(now + Duration::hours(hours)).await;
            assert_eq!(later.enforcement, EnforcementOutcome::AlreadyLoggedOut);
            assert_eq!(later.state, Some(DeviceState::LoggedOut));
        }

        assert_eq!(host.logouts(), vec![LogoutReason::OfflineLimitExceeded]);
        assert_eq!(host.purges(), 1);
        assert_eq!(
            host.audits(),
            vec![AuditEvent::OfflineLimitEnforced {
                at: now,
                started_at: t0(),
                elapsed_seconds: Duration::days(8).num_seconds(),
            }]
        );
        assert_eq!(scheduler.guard().current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn exactly_at_limit_is_not_enforced() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;

        let report = scheduler.run_pass(t0() + Duration::hours(168)).await;
        assert_eq!(report.enforcement, EnforcementOutcome::NotRequired);
        assert_eq!(report.state, Some(DeviceState::OfflineCritical));
        assert_eq!(report.remaining, Some(Duration::zero()));
        assert!(host.logouts().is_empty());
    }

    #[tokio::test]
    async fn failed_action_is_retried_alone() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        host.fail(EnforcementAction::Purge);

        let now = t0() + Duration::days(8);
        let first = scheduler.run_pass(now).await;
        assert_eq!(
            first.enforcement,
            EnforcementOutcome::Pending(vec![EnforcementAction::Purge])
        );
        assert_eq!(first.failures.len(), 1);
        assert_eq!(first.state, Some(DeviceState::OfflineExpired));

        host.recover(EnforcementAction::Purge);
        let second = scheduler.run_pass(now + Duration::hours(6)).await;
        assert_eq!(second.enforcement, EnforcementOutcome::Completed);

        assert_eq!(
            host.attempts(),
            vec![
                EnforcementAction::Logout,
                EnforcementAction::Purge,
                EnforcementAction::Audit,
                EnforcementAction::Purge,
            ]
        );
        assert_eq!(host.logouts().len(), 1);
        assert_eq!(host.purges(), 1);
        assert_eq!(host.audits().len(), 1);
    }

    #[tokio::test]
    async fn progress_survives_restart() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let now = t0() + Duration::days(8);
        {
            let scheduler = offline_since(&store, &host, t0()).await;
            host.fail(EnforcementAction::Audit);
            scheduler.run_pass(now).await;
        }

        host.recover(EnforcementAction::Audit);
        let restarted = scheduler(&store, &host);
        let report = restarted.run_pass(now + Duration::hours(1)).await;
        assert_eq!(report.enforcement, EnforcementOutcome::Completed);
        assert_eq!(host.logouts().len(), 1);
        assert_eq!(host.purges(), 1);
        assert_eq!(host.audits().len(), 1);
    }

    #[tokio::test]
    async fn three_days_offline_leaves_four_days() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;

        let report = scheduler.run_pass(t0() + Duration::days(3)).await;
        assert_eq!(report.remaining, Some(Duration::hours(96)));
        assert_eq!(report.state, Some(DeviceState::OfflineActive));
        assert_eq!(report.escalated, 0);
        assert!(host.notices().is_empty());
    }

    #[tokio::test]
    async fn notices_fire_once_per_band() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;

        scheduler.run_pass(t0() + Duration::hours(97)).await;
        scheduler.run_pass(t0() + Duration::hours(103)).await;
        scheduler.run_pass(t0() + Duration::hours(145)).await;
        scheduler.run_pass(t0() + Duration::hours(150)).await;

        let thresholds: Vec<_> = host
            .notices()
            .iter()
            .map(|notice| notice.threshold.num_hours())
            .collect();
        assert_eq!(thresholds, vec![72, 24]);
    }

    #[tokio::test]
    async fn late_first_pass_reports_only_tightest_band() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;

        scheduler.run_pass(t0() + Duration::hours(160)).await;
        let notices = host.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].threshold, Duration::hours(24));
        assert_eq!(notices[0].remaining, Duration::hours(8));
    }

    #[tokio::test]
    async fn final_day_escalates_queue() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        let operation = SyncOperation::new(SyncKind::Update, "note-1", t0());
        scheduler.queue().enqueue(operation).await.unwrap();

        let report = scheduler.run_pass(t0() + Duration::hours(100)).await;
        assert_eq!(report.escalated, 0);

        let report = scheduler.run_pass(t0() + Duration::hours(150)).await;
        assert_eq!(report.escalated, 1);
        assert_eq!(report.state, Some(DeviceState::OfflineCritical));
        assert_eq!(
            scheduler.queue().peek_next().await.map(|op| op.priority),
            Some(SyncPriority::High)
        );
    }

    #[tokio::test]
    async fn clock_anomaly_is_audited_and_rearmed() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;

        let skewed = t0() - Duration::hours(2);
        let report = scheduler.run_pass(skewed).await;
        assert_eq!(report.enforcement, EnforcementOutcome::NotRequired);
        assert_eq!(report.remaining, Some(Duration::hours(168)));
        assert_eq!(
            host.audits(),
            vec![AuditEvent::ClockAnomalyDetected {
                at: skewed,
                started_at: t0(),
            }]
        );

        let snapshot = scheduler.tracker().snapshot(skewed).await.unwrap();
        assert_eq!(snapshot.started_at, Some(skewed));
    }

    #[tokio::test]
    async fn stale_credential_is_revoked_while_online() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = scheduler(&store, &host);
        scheduler
            .guard()
            .issue(t0(), TokenGrant::new("a", "r"))
            .await
            .unwrap();

        let now = t0() + Duration::hours(169);
        let report = scheduler.run_pass(now).await;
        assert_eq!(report.state, Some(DeviceState::Online));
        assert_eq!(report.credential, Some(CredentialStatus::Expired));
        assert_eq!(host.logouts(), vec![LogoutReason::CredentialExpired]);
        assert_eq!(
            host.audits(),
            vec![AuditEvent::CredentialRevoked {
                at: now,
                reason: LogoutReason::CredentialExpired,
            }]
        );
        assert_eq!(scheduler.guard().current().await.unwrap(), None);

        let again = scheduler.run_pass(now + Duration::hours(1)).await;
        assert_eq!(again.credential, None);
        assert_eq!(host.logouts().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_session_is_undetermined() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = scheduler(&store, &host);
        store.set_available(false);

        let report = scheduler.run_pass(t0()).await;
        assert_eq!(report.enforcement, EnforcementOutcome::Undetermined);
        assert_eq!(report.state, None);
        assert!(!report.is_clean());
        assert!(host.attempts().is_empty());
    }

    #[tokio::test]
    async fn reissued_credential_survives_the_next_pass() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        let now = t0() + Duration::days(8);
        let enforced = scheduler.run_pass(now).await;
        assert_eq!(enforced.state, Some(DeviceState::LoggedOut));

        let credential = scheduler.reissue_credential(now).await.unwrap();
        let snapshot = scheduler.tracker().snapshot(now).await.unwrap();
        assert_eq!(snapshot.started_at, None);

        let report = scheduler.run_pass(now + Duration::minutes(1)).await;
        assert_eq!(report.state, Some(DeviceState::Online));
        assert_eq!(report.enforcement, EnforcementOutcome::NotRequired);
        assert_eq!(report.credential, Some(CredentialStatus::Valid));
        assert_eq!(host.logouts(), vec![LogoutReason::OfflineLimitExceeded]);
        assert_eq!(host.purges(), 1);
        assert_eq!(scheduler.guard().current().await.unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn reissue_fails_without_touching_progress_when_session_unwritable() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        let now = t0() + Duration::days(8);
        scheduler.run_pass(now).await;

        store.set_available(false);
        assert!(scheduler.reissue_credential(now).await.is_err());
        store.set_available(true);

        assert!(scheduler.progress().await.unwrap().is_some());
        assert_eq!(scheduler.guard().current().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reissued_credential_leaves_logged_out_state() {
        let store = MemoryStore::new();
        let host = RecordingHost::new();
        let scheduler = offline_since(&store, &host, t0()).await;
        let now = t0() + Duration::days(8);
        scheduler.run_pass(now).await;

        scheduler.tracker().record_offline_end().await.unwrap();
        let credential = scheduler.reissue_credential(now).await.unwrap();
        assert_eq!(credential.token, "token-1");
        assert_eq!(scheduler.progress().await.unwrap(), None);

        let report = scheduler.run_pass(now + Duration::hours(1)).await;
        assert_eq!(report.state, Some(DeviceState::Online));
        assert_eq!(report.credential, Some(CredentialStatus::Valid));
    }
}
