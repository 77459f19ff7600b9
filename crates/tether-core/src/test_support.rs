//! Recording collaborators for unit tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::auth::AuthCollaborator;
use crate::enforcement::{
    AuditCollaborator, EnforcementAction, NotificationSink, PurgeCollaborator, RemainingNotice,
};
use crate::error::{Error, Result};
use crate::models::{AuditEvent, LogoutReason, TokenGrant};

#[derive(Debug, Default)]
struct HostLog {
    logouts: Vec<LogoutReason>,
    purges: usize,
    audits: Vec<AuditEvent>,
    notices: Vec<RemainingNotice>,
    grants: usize,
    attempts: Vec<EnforcementAction>,
    failing: HashSet<EnforcementAction>,
}

/// Implements every host collaborator and records successful calls.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    log: Arc<Mutex<HostLog>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `action` fail until [`RecordingHost::recover`] is called.
    pub fn fail(&self, action: EnforcementAction) {
        self.log.lock().unwrap().failing.insert(action);
    }

    pub fn recover(&self, action: EnforcementAction) {
        self.log.lock().unwrap().failing.remove(&action);
    }

    pub fn logouts(&self) -> Vec<LogoutReason> {
        self.log.lock().unwrap().logouts.clone()
    }

    pub fn purges(&self) -> usize {
        self.log.lock().unwrap().purges
    }

    pub fn audits(&self) -> Vec<AuditEvent> {
        self.log.lock().unwrap().audits.clone()
    }

    pub fn notices(&self) -> Vec<RemainingNotice> {
        self.log.lock().unwrap().notices.clone()
    }

    /// Every attempted enforcement call, including failed ones.
    pub fn attempts(&self) -> Vec<EnforcementAction> {
        self.log.lock().unwrap().attempts.clone()
    }

    fn attempt(&self, action: EnforcementAction) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.attempts.push(action);
        if log.failing.contains(&action) {
            Err(Error::collaborator(action, "simulated failure"))
        } else {
            Ok(())
        }
    }
}

impl AuthCollaborator for RecordingHost {
    async fn log_out(&self, reason: LogoutReason) -> Result<()> {
        self.attempt(EnforcementAction::Logout)?;
        self.log.lock().unwrap().logouts.push(reason);
        Ok(())
    }

    async fn request_credential(&self) -> Result<TokenGrant> {
        let mut log = self.log.lock().unwrap();
        log.grants += 1;
        Ok(TokenGrant::new(
            format!("token-{}", log.grants),
            format!("refresh-{}", log.grants),
        ))
    }
}

impl PurgeCollaborator for RecordingHost {
    async fn clear_sensitive_cache(&self) -> Result<()> {
        self.attempt(EnforcementAction::Purge)?;
        self.log.lock().unwrap().purges += 1;
        Ok(())
    }
}

impl AuditCollaborator for RecordingHost {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.attempt(EnforcementAction::Audit)?;
        self.log.lock().unwrap().audits.push(event);
        Ok(())
    }
}

impl NotificationSink for RecordingHost {
    async fn notify_remaining(&self, notice: RemainingNotice) -> Result<()> {
        self.log.lock().unwrap().notices.push(notice);
        Ok(())
    }
}
