pub mod db;
pub mod ttl;

pub use db::{
    CascadeReport, CompletionWrite, PERMANENT_TABLE, PROMOTIONS_TABLE, PROMOTIONS_TTL_INDEX,
    SESSIONS_TABLE, StoreCounts, StoreHandle, TEMP_TABLE, TEMP_TTL_INDEX, TtlIndex, TtlSetup,
    WorkStore,
};
pub use ttl::{TtlMonitor, TtlMonitorHandle};
