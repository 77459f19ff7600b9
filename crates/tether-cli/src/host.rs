//! Local stand-ins for the host collaborators the engine drives.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tether_core::auth::AuthCollaborator;
use tether_core::enforcement::{
    AuditCollaborator, EnforcementAction, NotificationSink, PurgeCollaborator, RemainingNotice,
};
use tether_core::models::{AuditEvent, LogoutReason, TokenGrant};
use tether_core::util::{format_duration, format_timestamp};
use tether_core::{Error, Result};
use uuid::Uuid;

/// Prints logouts; hands out the configured token or a generated one.
#[derive(Debug, Clone, Default)]
pub struct ConsoleAuth {
    token: Option<String>,
}

impl ConsoleAuth {
    pub const fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl AuthCollaborator for ConsoleAuth {
    async fn log_out(&self, reason: LogoutReason) -> Result<()> {
        println!("Logged out ({})", reason.label());
        Ok(())
    }

    async fn request_credential(&self) -> Result<TokenGrant> {
        let token = self
            .token
            .clone()
            .unwrap_or_else(|| format!("local-{}", Uuid::now_v7()));
        Ok(TokenGrant::new(token, format!("refresh-{}", Uuid::now_v7())))
    }
}

/// Empties the local cache directory.
#[derive(Debug, Clone)]
pub struct CacheDirPurge {
    cache_dir: PathBuf,
}

impl CacheDirPurge {
    pub const fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }
}

impl PurgeCollaborator for CacheDirPurge {
    async fn clear_sensitive_cache(&self) -> Result<()> {
        empty_dir(&self.cache_dir)
            .map_err(|error| Error::collaborator(EnforcementAction::Purge, error.to_string()))?;
        tracing::info!(cache_dir = %self.cache_dir.display(), "Cleared local cache");
        Ok(())
    }
}

fn empty_dir(dir: &Path) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Append-only JSONL audit trail, fsynced after every event.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, event: &AuditEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{json}")?;
        file.sync_all()
    }
}

impl AuditCollaborator for JsonlAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.append(&event)
            .map_err(|error| Error::collaborator(EnforcementAction::Audit, error.to_string()))
    }
}

/// Prints remaining-time warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    async fn notify_remaining(&self, notice: RemainingNotice) -> Result<()> {
        println!(
            "Warning: {} of offline time left (offline since {})",
            format_duration(notice.remaining),
            format_timestamp(notice.started_at)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn unique_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "tether-host-{label}-{}-{}",
            std::process::id(),
            Uuid::now_v7()
        ))
    }

    #[tokio::test]
    async fn purge_empties_cache_but_keeps_directory() {
        let cache_dir = unique_dir("cache");
        fs::create_dir_all(cache_dir.join("thumbnails")).unwrap();
        fs::write(cache_dir.join("note.txt"), "secret").unwrap();
        fs::write(cache_dir.join("thumbnails").join("a.png"), "png").unwrap();

        let purge = CacheDirPurge::new(cache_dir.clone());
        purge.clear_sensitive_cache().await.unwrap();
        purge.clear_sensitive_cache().await.unwrap();

        assert!(cache_dir.exists());
        assert_eq!(fs::read_dir(&cache_dir).unwrap().count(), 0);
        fs::remove_dir_all(&cache_dir).ok();
    }

    #[tokio::test]
    async fn purge_of_missing_cache_is_ok() {
        let purge = CacheDirPurge::new(unique_dir("missing"));
        assert!(purge.clear_sensitive_cache().await.is_ok());
    }

    #[tokio::test]
    async fn audit_log_appends_one_line_per_event() {
        let dir = unique_dir("audit");
        let log = JsonlAuditLog::new(dir.join("audit.jsonl"));
        let at = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();

        log.record(AuditEvent::CredentialRevoked {
            at,
            reason: LogoutReason::CredentialExpired,
        })
        .await
        .unwrap();
        log.record(AuditEvent::ClockAnomalyDetected { at, started_at: at })
            .await
            .unwrap();

        let contents = fs::read_to_string(dir.join("audit.jsonl")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""type":"credential_revoked""#));
        assert!(lines[1].contains(r#""type":"clock_anomaly_detected""#));
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn configured_token_is_used_for_sign_in() {
        let grant = ConsoleAuth::new(Some("abc".to_string()))
            .request_credential()
            .await
            .unwrap();
        assert_eq!(grant.token, "abc");

        let generated = ConsoleAuth::default().request_credential().await.unwrap();
        assert!(generated.token.starts_with("local-"));
    }
}
