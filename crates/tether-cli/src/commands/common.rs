use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tether_core::config::OfflinePolicy;
use tether_core::enforcement::{Collaborators, EnforcementOutcome, PassReport};
use tether_core::models::{SyncOperation, SyncOperationId};
use tether_core::store::LibSqlStore;
use tether_core::util::{format_duration, format_timestamp};
use tether_core::{EngineStatus, OfflineEngine};

use crate::error::CliError;
use crate::host::{CacheDirPurge, ConsoleAuth, ConsoleNotifier, JsonlAuditLog};

pub type LocalHost = Collaborators<ConsoleAuth, CacheDirPurge, JsonlAuditLog, ConsoleNotifier>;
pub type LocalEngine = OfflineEngine<Arc<LibSqlStore>, LocalHost>;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_db_path.map_or_else(default_db_path, Ok)
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))?;
    Ok(data_dir.join("tether").join("tether.db"))
}

/// Directory holding the cache and audit log next to the database.
pub fn data_dir_for(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

pub async fn open_engine(db_path: &Path, token: Option<String>) -> Result<LocalEngine, CliError> {
    let policy = OfflinePolicy::from_env()?;
    let store = Arc::new(LibSqlStore::open(db_path).await?);
    let data_dir = data_dir_for(db_path);
    let host = Collaborators::new(
        ConsoleAuth::new(token),
        CacheDirPurge::new(data_dir.join("cache")),
        JsonlAuditLog::new(data_dir.join("audit.jsonl")),
    )
    .with_notifier(ConsoleNotifier);

    let engine = OfflineEngine::with_system_clock(store, policy, host);
    engine.restore_queue().await?;
    Ok(engine)
}

pub fn format_status_lines(status: &EngineStatus) -> Vec<String> {
    let now = Utc::now();
    let offline_since = status.offline_since.map_or_else(
        || "-".to_string(),
        |started_at| {
            format!(
                "{} ({} ago)",
                format_timestamp(started_at),
                format_duration(now - started_at)
            )
        },
    );
    let credential = match (status.credential, status.credential_expires_at) {
        (Some(credential), Some(expires_at)) => {
            format!("{credential} (expires {})", format_timestamp(expires_at))
        }
        (Some(credential), None) => credential.to_string(),
        _ => "none".to_string(),
    };

    vec![
        format!("State: {}", status.state),
        format!("Offline since: {offline_since}"),
        format!("Remaining: {}", format_duration(status.remaining())),
        format!("Credential: {credential}"),
        format!("Queued operations: {}", status.queued_operations),
    ]
}

pub fn describe_enforcement(outcome: &EnforcementOutcome) -> String {
    match outcome {
        EnforcementOutcome::NotRequired => "not required".to_string(),
        EnforcementOutcome::Completed => "completed (logged out, cache purged, audited)".to_string(),
        EnforcementOutcome::Pending(actions) => {
            let actions = actions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("pending: {actions}")
        }
        EnforcementOutcome::AlreadyLoggedOut => "already logged out".to_string(),
        EnforcementOutcome::Undetermined => "undetermined (session unreadable)".to_string(),
    }
}

pub fn format_report_lines(report: &PassReport) -> Vec<String> {
    let mut lines = vec![format!(
        "State: {}",
        report
            .state
            .map_or_else(|| "unknown".to_string(), |state| state.to_string())
    )];
    if let Some(remaining) = report.remaining {
        lines.push(format!("Remaining: {}", format_duration(remaining)));
    }
    if report.escalated > 0 {
        lines.push(format!("Escalated: {} operation(s)", report.escalated));
    }
    lines.push(format!(
        "Enforcement: {}",
        describe_enforcement(&report.enforcement)
    ));
    if let Some(credential) = report.credential {
        lines.push(format!("Credential: {credential}"));
    }
    for failure in &report.failures {
        lines.push(format!("Warning: {failure}"));
    }
    lines
}

pub fn format_operation_lines(operations: &[SyncOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            format!(
                "{}  {:<8} {:<6} {}  {}",
                operation.id,
                operation.priority.label(),
                operation.kind.label(),
                operation.target_entity_id,
                format_timestamp(operation.created_at)
            )
        })
        .collect()
}

/// Resolve a full operation id or a unique prefix of a queued one.
pub fn resolve_operation_id(
    input: &str,
    operations: &[SyncOperation],
) -> Result<SyncOperationId, CliError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::EmptyOperationId);
    }
    if let Ok(id) = input.parse::<SyncOperationId>() {
        return Ok(id);
    }

    let needle = input.to_ascii_lowercase();
    let matches: Vec<_> = operations
        .iter()
        .filter(|operation| operation.id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::OperationNotFound(input.to_string())),
        [operation] => Ok(operation.id),
        _ => Err(CliError::AmbiguousOperationId(format!(
            "Operation id prefix {input:?} matches {} queued operations",
            matches.len()
        ))),
    }
}
