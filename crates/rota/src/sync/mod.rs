//! Live views kept in step with the store.
//!
//! A [`SyncController`] drives one [`ViewSource`] for the current identity,
//! refreshing on change-feed signals and manual refetches. The facades in
//! [`views`] wire the two operator views to it.

pub mod controller;
pub mod source;
pub mod views;

pub use controller::{SyncController, SyncHandle, SyncSnapshot, SyncStatus};
pub use source::{ShiftsSource, StatsSource, ViewSource};
pub use views::{OperatorShifts, OperatorStatsView};
