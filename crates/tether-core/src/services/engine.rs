//! Engine facade used by hosts.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::runtime::{BackgroundTaskRunner, TaskHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::OfflinePolicy;
use crate::connectivity::ConnectivitySignal;
use crate::enforcement::{DeviceState, EnforcementHost, EnforcementScheduler, PassReport};
use crate::error::Result;
use crate::models::{Credential, CredentialStatus, SyncOperation, SyncOperationId, SyncPriority};
use crate::store::DurableStore;
use crate::tracker::RestoreOutcome;
use crate::util::iso8601;

const ENFORCEMENT_TASK: &str = "offline-enforcement";
const DEADLINE_TASK: &str = "offline-deadline";

/// Point-in-time view of the engine for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub state: DeviceState,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::option::serialize"
    )]
    pub offline_since: Option<DateTime<Utc>>,
    pub elapsed_seconds: i64,
    pub remaining_seconds: i64,
    pub exceeded: bool,
    pub credential: Option<CredentialStatus>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "iso8601::option::serialize"
    )]
    pub credential_expires_at: Option<DateTime<Utc>>,
    pub queued_operations: usize,
}

impl EngineStatus {
    pub fn remaining(&self) -> Duration {
        Duration::seconds(self.remaining_seconds)
    }
}

type DeadlineSlot = Arc<Mutex<Option<TaskHandle>>>;

struct EngineInner<S, H, C> {
    clock: C,
    scheduler: EnforcementScheduler<S, H>,
    deadline: DeadlineSlot,
}

/// Offline time-limit engine.
///
/// Cheap to clone; clones share the same tracker, queue and scheduler.
pub struct OfflineEngine<S, H, C = SystemClock> {
    inner: Arc<EngineInner<S, H, C>>,
}

impl<S, H, C> Clone for OfflineEngine<S, H, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, H> OfflineEngine<S, H, SystemClock>
where
    S: DurableStore + Clone,
    H: EnforcementHost,
{
    /// Engine driven by the system clock.
    pub fn with_system_clock(store: S, policy: OfflinePolicy, host: H) -> Self {
        Self::new(store, policy, host, SystemClock)
    }
}

impl<S, H, C> OfflineEngine<S, H, C>
where
    S: DurableStore + Clone,
    H: EnforcementHost,
    C: Clock,
{
    pub fn new(store: S, policy: OfflinePolicy, host: H, clock: C) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                clock,
                scheduler: EnforcementScheduler::new(store, policy, host),
                deadline: Arc::new(Mutex::new(None)),
            }),
        }
    }

    pub fn policy(&self) -> &OfflinePolicy {
        self.inner.scheduler.policy()
    }

    pub fn scheduler(&self) -> &EnforcementScheduler<S, H> {
        &self.inner.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Reload persisted state at startup.
    ///
    /// Both the session and the queue are restored even if one of them fails.
    pub async fn restore(&self, connected_now: bool) -> Result<RestoreOutcome> {
        let now = self.now();
        let outcome = self
            .scheduler()
            .tracker()
            .restore(now, connected_now)
            .await;
        let queued = self.scheduler().queue().restore().await;

        let outcome = outcome?;
        let queued = queued?;
        tracing::info!(?outcome, queued, "Restored offline engine state");
        Ok(outcome)
    }

    /// Reload only the persisted sync queue.
    ///
    /// For short-lived hosts whose connectivity is whatever the persisted
    /// session says; the session is read from the store on demand.
    pub async fn restore_queue(&self) -> Result<usize> {
        self.scheduler().queue().restore().await
    }

    /// Record a connectivity change and run a pass immediately.
    pub async fn handle_connectivity(&self, connected: bool) -> PassReport {
        self.scheduler()
            .handle_connectivity(connected, &self.inner.clock)
            .await
    }

    pub async fn run_pass(&self) -> PassReport {
        self.scheduler().run_pass_with(&self.inner.clock).await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let now = self.now();
        let snapshot = self.scheduler().tracker().snapshot(now).await?;
        let progress = self.scheduler().progress().await?;
        let credential = self.scheduler().guard().current().await?;
        let queued_operations = self.scheduler().queue().operations().await.len();

        Ok(EngineStatus {
            state: DeviceState::classify(&snapshot, self.policy(), progress.as_ref()),
            offline_since: snapshot.started_at,
            elapsed_seconds: snapshot.elapsed.num_seconds(),
            remaining_seconds: snapshot.remaining.num_seconds(),
            exceeded: snapshot.exceeded,
            credential: credential
                .as_ref()
                .map(|credential| self.scheduler().guard().validate(credential, now)),
            credential_expires_at: credential.map(|credential| credential.expires_at),
            queued_operations,
        })
    }

    /// Offline time left in the current episode.
    pub async fn remaining(&self) -> Result<Duration> {
        self.scheduler()
            .tracker()
            .remaining_offline_duration(self.now())
            .await
    }

    pub async fn enqueue(&self, operation: SyncOperation) -> Result<bool> {
        self.scheduler().queue().enqueue(operation).await
    }

    pub async fn confirm_delivered(&self, id: SyncOperationId) -> Result<Option<SyncOperation>> {
        self.scheduler().queue().confirm_delivered(id).await
    }

    pub async fn reset_priority(&self, id: SyncOperationId, priority: SyncPriority) -> Result<bool> {
        self.scheduler().queue().reset_priority(id, priority).await
    }

    /// Queued operations in delivery order.
    pub async fn pending_operations(&self) -> Vec<SyncOperation> {
        self.scheduler().queue().operations().await
    }

    /// Obtain fresh tokens from the host and store them as the new credential.
    ///
    /// Signing in closes the current offline episode, so its deadline check is
    /// dropped as well.
    pub async fn sign_in(&self) -> Result<Credential> {
        let credential = self.scheduler().reissue_credential(self.now()).await?;
        cancel_deadline(&self.inner.deadline);
        Ok(credential)
    }

    /// Start the periodic pass and the connectivity listener.
    ///
    /// Call [`OfflineEngine::restore`] first.
    pub fn spawn<R, K>(&self, runner: R, connectivity: &K) -> EngineHandle
    where
        R: BackgroundTaskRunner + Clone,
        K: ConnectivitySignal,
    {
        let engine = self.clone();
        let periodic = runner.register_periodic(
            ENFORCEMENT_TASK,
            self.policy().enforcement_interval,
            move || {
                let engine = engine.clone();
                async move {
                    engine.run_pass().await;
                }
            },
        );

        let listener = CancellationToken::new();
        let stopped = listener.clone();
        let engine = self.clone();
        let mut receiver = connectivity.subscribe();
        tokio::spawn(async move {
            // The signal may have moved since `restore`; transitions are idempotent.
            let connected = *receiver.borrow_and_update();
            engine.handle_connectivity(connected).await;
            engine.sync_deadline(&runner, connected).await;

            loop {
                tokio::select! {
                    biased;
                    () = stopped.cancelled() => break,
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            tracing::debug!("Connectivity signal closed");
                            break;
                        }
                        let connected = *receiver.borrow_and_update();
                        tracing::debug!(connected, "Connectivity changed");
                        engine.handle_connectivity(connected).await;
                        engine.sync_deadline(&runner, connected).await;
                    }
                }
            }
        });

        EngineHandle {
            periodic,
            listener,
            deadline: Arc::clone(&self.inner.deadline),
        }
    }

    /// Arm the one-shot deadline check for the current episode, or cancel it
    /// when back online.
    async fn sync_deadline<R: BackgroundTaskRunner>(&self, runner: &R, connected: bool) {
        if connected {
            cancel_deadline(&self.inner.deadline);
            return;
        }

        let remaining = match self.remaining().await {
            Ok(remaining) => remaining,
            Err(error) => {
                tracing::warn!("Cannot arm offline deadline: {}", error);
                return;
            }
        };
        // The limit is exceeded strictly after `remaining` runs out.
        let delay = remaining.to_std().unwrap_or_default() + StdDuration::from_secs(1);

        let engine = self.clone();
        let handle = runner.schedule_once(DEADLINE_TASK, delay, move || async move {
            engine.run_pass().await;
        });
        tracing::debug!(delay_secs = delay.as_secs(), "Armed offline deadline");

        if let Ok(mut slot) = self.inner.deadline.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.cancel();
            }
        }
    }
}

fn cancel_deadline(slot: &DeadlineSlot) {
    if let Ok(mut slot) = slot.lock() {
        if let Some(handle) = slot.take() {
            handle.cancel();
        }
    }
}

/// Running background work of an engine. Dropping it stops everything.
#[derive(Debug)]
pub struct EngineHandle {
    periodic: TaskHandle,
    listener: CancellationToken,
    deadline: DeadlineSlot,
}

impl EngineHandle {
    pub fn shutdown(&self) {
        self.periodic.cancel();
        self.listener.cancel();
        cancel_deadline(&self.deadline);
    }

    /// Whether a deadline check is currently armed.
    pub fn deadline_armed(&self) -> bool {
        self.deadline
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|handle| !handle.is_cancelled()))
            .unwrap_or(false)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
