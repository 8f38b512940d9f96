//! The ephemeral work-record lifecycle.
//!
//! A submission lands in the temporary tier ([`temp_store`]), a follow-up
//! dialogue ([`sessions`]) finishes it, and [`promotion`] moves it into the
//! permanent log. Anything left behind is removed by passive expiry in the
//! store or by the backup sweep in [`expiry`].

pub mod expiry;
pub mod promotion;
pub mod service;
pub mod sessions;
pub mod temp_store;

pub use expiry::{ExpiryCoordinator, ExpiryHandle, ExpiryStats, SweepReport};
pub use promotion::{PromotionEngine, PromotionExtras};
pub use service::{WorklogService, WorklogStats};
pub use sessions::SessionManager;
pub use temp_store::TempRecordStore;
