pub mod config;
pub mod directory;
pub mod errors;
pub mod identity;
pub mod lifecycle;
pub mod questions;
pub mod records;
pub mod store;
pub mod telemetry;

pub use errors::{ErrorKind, LifecycleError};
pub use identity::UserId;
pub use lifecycle::WorklogService;

#[cfg(test)]
mod test_support;
