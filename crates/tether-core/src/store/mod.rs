//! Durable state store layer for Tether
//!
//! The engine persists a handful of typed records (offline session,
//! credential, enforcement progress, sync queue) through the narrow
//! `DurableStore` key/value capability. Each record owns a fixed key and a
//! fixed JSON shape; callers never touch raw keys.

mod libsql_store;
mod memory;
mod migrations;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use libsql_store::LibSqlStore;
pub use memory::MemoryStore;

/// Key/value persistence that survives process restarts.
pub trait DurableStore: Send + Sync + 'static {
    /// Read the value stored under `key`.
    fn get_string(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set_string(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Delete `key`; deleting a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

impl<T: DurableStore> DurableStore for Arc<T> {
    fn get_string(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).get_string(key)
    }

    fn set_string(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).set_string(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        (**self).remove(key)
    }
}

/// A typed value persisted under a fixed key.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KEY: &'static str;
}

/// Load a record, returning `None` when nothing is stored.
pub async fn load_record<R: Record, S: DurableStore>(store: &S) -> Result<Option<R>> {
    match store.get_string(R::KEY).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and store a record.
pub async fn save_record<R: Record, S: DurableStore>(store: &S, record: &R) -> Result<()> {
    let raw = serde_json::to_string(record)?;
    store.set_string(R::KEY, &raw).await
}

/// Remove a record.
pub async fn clear_record<R: Record, S: DurableStore>(store: &S) -> Result<()> {
    store.remove(R::KEY).await
}
