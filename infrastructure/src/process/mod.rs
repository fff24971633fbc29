//! Command execution backend on `tokio::process`.

mod backend;
mod liveness;

pub use backend::{DEFAULT_CAPTURE_LIMIT, ProcessBackend};
pub use liveness::PidLiveness;
