//! Real-time sync of an operator's assigned shifts and shift statistics.

pub mod clock;
pub mod config;
pub mod core;
pub mod identity;
pub mod storage;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SyncConfig;
pub use identity::IdentityContext;
pub use storage::MemoryStore;
pub use sync::{OperatorShifts, OperatorStatsView, SyncHandle, SyncSnapshot, SyncStatus};
