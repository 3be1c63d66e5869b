//! Query executor: one resolving read per call, decoded into typed raw rows.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error};

use rota_api::{ApiError, AssignmentRow, OperatorId, ShiftDateAssignmentRow};

use crate::core::queries;
use crate::storage::backend::{Row, StorageBackend};
use crate::storage::query::SelectQuery;

#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn StorageBackend>,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// All assignments of `operator` with shift, event, client and brand resolved.
    ///
    /// An absent operator yields an empty result without touching the store.
    #[tracing::instrument(name = "executor.assigned_shifts", skip(self))]
    pub async fn assigned_shifts(
        &self,
        operator: Option<&OperatorId>,
    ) -> Result<Vec<AssignmentRow>, ApiError> {
        let Some(operator) = operator else {
            return Ok(Vec::new());
        };
        self.run(queries::assigned_shifts(operator)).await
    }

    /// Shift ids and dates of every assignment of `operator`.
    #[tracing::instrument(name = "executor.shift_dates", skip(self))]
    pub async fn shift_dates(
        &self,
        operator: Option<&OperatorId>,
    ) -> Result<Vec<ShiftDateAssignmentRow>, ApiError> {
        let Some(operator) = operator else {
            return Ok(Vec::new());
        };
        self.run(queries::shift_dates(operator)).await
    }

    async fn run<T: DeserializeOwned>(&self, query: SelectQuery) -> Result<Vec<T>, ApiError> {
        let rows = self.backend.select(&query).await.inspect_err(|e| {
            error!(
                "[QueryExecutor] {} failed: {} (cause: {})",
                query,
                e,
                e.cause().unwrap_or("unknown")
            );
        })?;
        debug!("[QueryExecutor] {} returned {} rows", query, rows.len());
        decode_rows(&query, rows)
    }
}

/// Decode every row or none: the first undecodable row fails the whole result.
fn decode_rows<T: DeserializeOwned>(query: &SelectQuery, rows: Vec<Row>) -> Result<Vec<T>, ApiError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(serde_json::Value::Object(row)).map_err(|e| ApiError::Decode {
                relation: query.table.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}
