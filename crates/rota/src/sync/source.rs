use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use rota_api::{ApiError, AssignedShift, ChannelSpec, FeedBinding, OperatorId, OperatorStats, Table};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::core::{QueryExecutor, compute_stats, queries, transform_assignments};

/// A view a [`SyncController`](super::SyncController) keeps live: how to
/// read it for one operator and which changes invalidate it.
#[async_trait]
pub trait ViewSource: Send + Sync + 'static {
    type View: Clone + Default + PartialEq + Debug + Send + Sync + 'static;

    /// Short name used in logs.
    fn name(&self) -> &str;

    fn channel(&self, operator: &OperatorId, config: &SyncConfig) -> ChannelSpec;

    async fn load(&self, operator: &OperatorId) -> Result<Self::View, ApiError>;
}

/// Assignment changes of `operator` plus any change to a shift.
///
/// Shift changes are unfiltered: the feed cannot tell which shifts belong to
/// the operator, so every shift change invalidates the view.
fn operator_bindings(name: &str, operator: &OperatorId) -> ChannelSpec {
    ChannelSpec::new(format!("{}:{}", name, operator))
        .on(FeedBinding::all(Table::ShiftAssignments).filtered(queries::operator_filter(operator)))
        .on(FeedBinding::all(Table::Shifts))
}

/// The operator's assigned shifts, denormalized and sorted.
#[derive(Clone)]
pub struct ShiftsSource {
    executor: QueryExecutor,
}

impl ShiftsSource {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ViewSource for ShiftsSource {
    type View = Vec<AssignedShift>;

    fn name(&self) -> &str {
        "shifts"
    }

    fn channel(&self, operator: &OperatorId, config: &SyncConfig) -> ChannelSpec {
        operator_bindings(&config.shifts_channel, operator)
    }

    async fn load(&self, operator: &OperatorId) -> Result<Self::View, ApiError> {
        let rows = self.executor.assigned_shifts(Some(operator)).await?;
        Ok(transform_assignments(rows))
    }
}

/// Today / upcoming / total counts over the operator's assignments.
#[derive(Clone)]
pub struct StatsSource {
    executor: QueryExecutor,
    clock: Arc<dyn Clock>,
}

impl StatsSource {
    pub fn new(executor: QueryExecutor, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }
}

#[async_trait]
impl ViewSource for StatsSource {
    type View = OperatorStats;

    fn name(&self) -> &str {
        "stats"
    }

    fn channel(&self, operator: &OperatorId, config: &SyncConfig) -> ChannelSpec {
        operator_bindings(&config.stats_channel, operator)
    }

    async fn load(&self, operator: &OperatorId) -> Result<Self::View, ApiError> {
        let rows = self.executor.shift_dates(Some(operator)).await?;
        Ok(compute_stats(rows, self.clock.today()))
    }
}
