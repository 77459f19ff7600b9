//! tether-core - offline session and sync time-limit engine
//!
//! Tracks how long a device has been offline, enforces a maximum offline
//! duration (logout, cache purge, audit), validates credential age and
//! escalates pending sync work as the deadline approaches.

pub mod auth;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod enforcement;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod util;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use services::{EngineHandle, EngineStatus, OfflineEngine};
