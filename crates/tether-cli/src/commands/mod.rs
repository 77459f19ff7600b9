pub mod common;
pub mod completions;
pub mod login;
pub mod queue;
pub mod session;
pub mod status;
