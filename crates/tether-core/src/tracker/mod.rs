//! Offline session tracker.
//!
//! Owns the answer to "when did the current offline episode start" and derives
//! elapsed and remaining offline time from it. Every transition is written
//! through the durable store so a restarted process resumes the same episode.
//!
//! Writes are serialized by a single async mutex. The tracker also keeps the
//! last value it read or wrote: when the store is unreachable, reads fall back
//! to that value and failed writes stay pending until `flush_pending` succeeds.
//!
//! Startup rule: if the store holds no session while the device reports itself
//! offline, the episode starts *now*. An unknown history is never treated as an
//! already-expired session.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::OfflineSession;
use crate::store::{clear_record, load_record, save_record, DurableStore};

/// Elapsed/remaining offline time derived from one read of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub started_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub exceeded: bool,
    /// `now` is before `started_at`; elapsed was clamped to zero.
    pub clock_anomaly: bool,
}

impl SessionSnapshot {
    /// Derive offline durations for `session` at `now`.
    pub fn compute(
        session: OfflineSession,
        now: DateTime<Utc>,
        max_offline_duration: Duration,
    ) -> Self {
        let Some(started_at) = session.started_at else {
            return Self {
                started_at: None,
                now,
                elapsed: Duration::zero(),
                remaining: max_offline_duration,
                exceeded: false,
                clock_anomaly: false,
            };
        };

        let raw_elapsed = now - started_at;
        let clock_anomaly = raw_elapsed < Duration::zero();
        let elapsed = raw_elapsed.max(Duration::zero());
        let remaining = (max_offline_duration - elapsed).max(Duration::zero());

        Self {
            started_at: Some(started_at),
            now,
            elapsed,
            remaining,
            exceeded: elapsed > max_offline_duration,
            clock_anomaly,
        }
    }

    pub const fn is_offline(&self) -> bool {
        self.started_at.is_some()
    }
}

/// What `restore` found in the store at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Online with no persisted episode.
    Online,
    /// Offline and the persisted episode continues.
    Resumed { started_at: DateTime<Utc> },
    /// Offline with no persisted episode; one starts now.
    StartedNow { started_at: DateTime<Utc> },
    /// Online at startup; a persisted episode was closed.
    Cleared { started_at: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Last value read from or written to the store.
    cached: Option<OfflineSession>,
    /// `cached` differs from the store and must be written.
    pending_write: bool,
    /// `cached` was chosen without being able to read the store.
    unverified: bool,
}

/// Single-writer owner of the persisted offline session.
pub struct OfflineSessionTracker<S> {
    store: S,
    max_offline_duration: Duration,
    state: Mutex<TrackerState>,
}

impl<S: DurableStore> OfflineSessionTracker<S> {
    pub fn new(store: S, max_offline_duration: Duration) -> Self {
        Self {
            store,
            max_offline_duration,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub const fn max_offline_duration(&self) -> Duration {
        self.max_offline_duration
    }

    /// Reconcile the persisted session with the connectivity seen at startup.
    ///
    /// On a store failure the decision is still applied in memory (and left
    /// pending) before the error is returned.
    pub async fn restore(&self, now: DateTime<Utc>, connected_now: bool) -> Result<RestoreOutcome> {
        let mut state = self.state.lock().await;

        let persisted = match load_record::<OfflineSession, _>(&self.store).await {
            Ok(persisted) => persisted.unwrap_or_default(),
            Err(Error::Serialization(error)) => {
                tracing::warn!("Discarding unreadable offline session record: {}", error);
                OfflineSession::inactive()
            }
            Err(error) => {
                let session = if connected_now {
                    OfflineSession::inactive()
                } else {
                    OfflineSession::started(now)
                };
                tracing::warn!(
                    connected_now,
                    "Offline session store unreadable at startup; using {:?} until it recovers: {}",
                    session,
                    error
                );
                state.cached = Some(session);
                state.pending_write = true;
                state.unverified = true;
                return Err(error);
            }
        };

        let outcome = match (persisted.started_at, connected_now) {
            (Some(started_at), false) => {
                tracing::info!(started_at = %started_at, "Resuming persisted offline session");
                state.cached = Some(persisted);
                RestoreOutcome::Resumed { started_at }
            }
            (Some(started_at), true) => {
                tracing::info!(started_at = %started_at, "Online at startup; closing persisted offline session");
                self.write(&mut state, OfflineSession::inactive()).await?;
                RestoreOutcome::Cleared { started_at }
            }
            (None, false) => {
                tracing::info!(
                    started_at = %now,
                    "No persisted offline session while offline; starting the episode now"
                );
                self.write(&mut state, OfflineSession::started(now)).await?;
                RestoreOutcome::StartedNow { started_at: now }
            }
            (None, true) => {
                state.cached = Some(OfflineSession::inactive());
                RestoreOutcome::Online
            }
        };

        Ok(outcome)
    }

    /// Start an offline episode at `now` unless one is already active.
    ///
    /// Returns `true` when a new episode was started.
    pub async fn record_offline_start(&self, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().await;
        let current = self.current_for_write(&mut state).await;
        if current.is_active() {
            tracing::debug!("Offline session already active; keeping original start");
            return Ok(false);
        }

        tracing::info!(started_at = %now, "Offline session started");
        self.write(&mut state, OfflineSession::started(now)).await?;
        Ok(true)
    }

    /// Close the active offline episode, if any.
    ///
    /// Returns `true` when an episode was closed.
    pub async fn record_offline_end(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let current = self.current_for_write(&mut state).await;
        if !current.is_active() && !state.pending_write {
            return Ok(false);
        }

        if let Some(started_at) = current.started_at {
            tracing::info!(started_at = %started_at, "Offline session ended");
        }
        self.write(&mut state, OfflineSession::inactive()).await?;
        Ok(current.is_active())
    }

    /// Re-arm an active session from `now` after the clock moved backward.
    pub async fn correct_clock_skew(&self, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        let current = self.current_for_write(&mut state).await;
        let Some(started_at) = current.started_at else {
            return Ok(());
        };
        if now >= started_at {
            return Ok(());
        }

        tracing::warn!(
            started_at = %started_at,
            now = %now,
            "Clock moved behind offline session start; re-arming session from now"
        );
        self.write(&mut state, OfflineSession::started(now)).await
    }

    /// Retry a write that failed earlier. Returns `true` if something was written.
    pub async fn flush_pending(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.pending_write {
            return Ok(false);
        }
        let Some(mut session) = state.cached else {
            state.pending_write = false;
            return Ok(false);
        };

        if state.unverified {
            // The store may hold an older start we could not see at startup.
            let persisted = load_record::<OfflineSession, _>(&self.store).await?;
            if let Some(persisted) = persisted.filter(OfflineSession::is_active) {
                if session.is_active() {
                    tracing::info!(
                        started_at = ?persisted.started_at,
                        "Store recovered; adopting persisted offline session"
                    );
                    session = persisted;
                }
            }
        }

        persist(&self.store, session).await?;
        state.cached = Some(session);
        state.pending_write = false;
        state.unverified = false;
        tracing::debug!("Flushed pending offline session write");
        Ok(true)
    }

    /// Derive elapsed/remaining time from a single read of the session.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<SessionSnapshot> {
        let session = self.current_for_read().await?;
        Ok(SessionSnapshot::compute(
            session,
            now,
            self.max_offline_duration,
        ))
    }

    pub async fn elapsed_offline_duration(&self, now: DateTime<Utc>) -> Result<Duration> {
        Ok(self.snapshot(now).await?.elapsed)
    }

    pub async fn remaining_offline_duration(&self, now: DateTime<Utc>) -> Result<Duration> {
        Ok(self.snapshot(now).await?.remaining)
    }

    pub async fn has_exceeded_limit(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.snapshot(now).await?.exceeded)
    }

    async fn current_for_read(&self) -> Result<OfflineSession> {
        let mut state = self.state.lock().await;
        if state.pending_write {
            if let Some(session) = state.cached {
                return Ok(session);
            }
        }

        match load_record::<OfflineSession, _>(&self.store).await {
            Ok(persisted) => {
                let session = persisted.unwrap_or_default();
                state.cached = Some(session);
                Ok(session)
            }
            Err(error) => match state.cached {
                Some(session) => {
                    tracing::warn!("Offline session read failed; using last known value: {}", error);
                    Ok(session)
                }
                None => Err(error),
            },
        }
    }

    /// Current session for a write decision; an unreadable store with no
    /// cached value counts as "no session" so a new start is never assumed
    /// to be old.
    async fn current_for_write(&self, state: &mut TrackerState) -> OfflineSession {
        if state.pending_write {
            if let Some(session) = state.cached {
                return session;
            }
        }

        match load_record::<OfflineSession, _>(&self.store).await {
            Ok(persisted) => {
                let session = persisted.unwrap_or_default();
                state.cached = Some(session);
                session
            }
            Err(error) => {
                let session = state.cached.unwrap_or_default();
                tracing::warn!(
                    "Offline session read failed before write; assuming {:?}: {}",
                    session,
                    error
                );
                session
            }
        }
    }

    async fn write(&self, state: &mut TrackerState, session: OfflineSession) -> Result<()> {
        state.cached = Some(session);
        match persist(&self.store, session).await {
            Ok(()) => {
                state.pending_write = false;
                state.unverified = false;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    "Offline session write failed; keeping {:?} in memory until the next tick: {}",
                    session,
                    error
                );
                state.pending_write = true;
                Err(error)
            }
        }
    }
}

async fn persist<S: DurableStore>(store: &S, session: OfflineSession) -> Result<()> {
    if session.is_active() {
        save_record(store, &session).await
    } else {
        clear_record::<OfflineSession, _>(store).await
    }
}
