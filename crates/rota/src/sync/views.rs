//! Consumer-facing views for the signed-in operator.

use std::sync::Arc;

use rota_api::{AssignedShift, ChangeFeed, OperatorStats};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::core::QueryExecutor;
use crate::identity::IdentityContext;
use crate::sync::controller::{SyncController, SyncHandle};
use crate::sync::source::{ShiftsSource, StatsSource};

/// Live list of the operator's assigned shifts.
///
/// `loading` is true while a fetch is in flight. `error` holds the message of
/// the most recent failed fetch and is cleared by the next success; the
/// previous list stays visible in the meantime.
#[derive(Debug)]
pub struct OperatorShifts {
    handle: SyncHandle<Vec<AssignedShift>>,
}

impl OperatorShifts {
    pub fn spawn(
        executor: QueryExecutor,
        feed: Arc<dyn ChangeFeed>,
        identity: &IdentityContext,
        config: Arc<SyncConfig>,
    ) -> Self {
        let handle = SyncController::spawn(
            ShiftsSource::new(executor),
            identity.subscribe(),
            feed,
            config,
        );
        Self { handle }
    }

    pub fn shifts(&self) -> Vec<AssignedShift> {
        self.handle.data()
    }

    pub fn loading(&self) -> bool {
        self.handle.loading()
    }

    pub fn error(&self) -> Option<String> {
        self.handle.error()
    }

    pub fn refetch(&self) {
        self.handle.refetch();
    }

    pub fn handle(&self) -> &SyncHandle<Vec<AssignedShift>> {
        &self.handle
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}

/// Live shift counts for the operator.
///
/// Fetch failures are logged only; the last good counts stay in place.
#[derive(Debug)]
pub struct OperatorStatsView {
    handle: SyncHandle<OperatorStats>,
}

impl OperatorStatsView {
    pub fn spawn(
        executor: QueryExecutor,
        feed: Arc<dyn ChangeFeed>,
        identity: &IdentityContext,
        clock: Arc<dyn Clock>,
        config: Arc<SyncConfig>,
    ) -> Self {
        let handle = SyncController::spawn(
            StatsSource::new(executor, clock),
            identity.subscribe(),
            feed,
            config,
        );
        Self { handle }
    }

    pub fn stats(&self) -> OperatorStats {
        self.handle.data()
    }

    pub fn loading(&self) -> bool {
        self.handle.loading()
    }

    pub fn handle(&self) -> &SyncHandle<OperatorStats> {
        &self.handle
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}
