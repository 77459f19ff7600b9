//! Host-facing engine and its background runtime.

mod engine;
mod runtime;

pub use engine::{EngineHandle, EngineStatus, OfflineEngine};
pub use runtime::{BackgroundTaskRunner, TaskHandle, TokioTaskRunner};
