//! Data models for Tether

mod audit;
mod credential;
mod session;
mod sync_operation;

pub use audit::{AuditEvent, LogoutReason};
pub use credential::{Credential, CredentialStatus, TokenGrant};
pub use session::OfflineSession;
pub use sync_operation::{SyncKind, SyncOperation, SyncOperationId, SyncPriority};
