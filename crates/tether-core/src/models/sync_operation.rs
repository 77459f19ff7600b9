//! Pending synchronization operation model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::util::iso8601;

/// A unique identifier for a sync operation, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncOperationId(Uuid);

impl SyncOperationId {
    /// Create a new unique operation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SyncOperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncOperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncOperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Kind of local mutation that needs remote propagation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Create,
    Update,
    Delete,
    Upload,
}

impl SyncKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SyncKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "upload" => Ok(Self::Upload),
            other => Err(Error::InvalidInput(format!("unknown sync kind: {other}"))),
        }
    }
}

/// Urgency of a sync operation.
///
/// Variants are declared in ascending order, so the derived `Ord` is the
/// urgency order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl SyncPriority {
    /// One step more urgent, saturating at `Critical`.
    #[must_use]
    pub const fn escalated(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SyncPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SyncPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::InvalidInput(format!("unknown priority: {other}"))),
        }
    }
}

/// A local mutation waiting to be shipped to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique identifier
    pub id: SyncOperationId,
    /// Operation type
    pub kind: SyncKind,
    /// Entity the mutation applies to
    pub target_entity_id: String,
    /// When the mutation was recorded locally
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
    /// Current urgency
    pub priority: SyncPriority,
}

impl SyncOperation {
    /// Create an operation with the default (`Medium`) priority.
    pub fn new(kind: SyncKind, target_entity_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SyncOperationId::new(),
            kind,
            target_entity_id: target_entity_id.into(),
            created_at,
            priority: SyncPriority::default(),
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: SyncPriority) -> Self {
        self.priority = priority;
        self
    }
}
