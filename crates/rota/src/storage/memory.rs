//! In-memory backing store with a built-in change feed.
//!
//! Tables hold JSON rows keyed by `id`. Reads execute a [`SelectQuery`] with
//! many-to-one embeds; writes publish a [`ChangeSignal`] to every open channel
//! with a matching binding. Useful for:
//! - Unit and integration tests of the sync controllers
//! - Running the CLI against a fixture without a hosted backend
//! - Reference semantics for inner-join embeds and filtered channels

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use rota_api::{
    ApiError, ChangeFeed, ChangeKind, ChangeSignal, ChannelSpec, FeedSubscription, Table,
};

use super::backend::{Row, StorageBackend};
use super::query::{Projection, SelectQuery};

pub const DEFAULT_SIGNAL_BUFFER: usize = 64;

#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    signal_buffer: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Row>>,
    /// Open feed channels by id
    channels: BTreeMap<u64, Channel>,
    next_channel_id: u64,
    /// When set, every read fails with this error
    read_failure: Option<ApiError>,
    reads: u64,
}

#[derive(Debug)]
struct Channel {
    spec: ChannelSpec,
    signals: mpsc::Sender<ChangeSignal>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_signal_buffer(DEFAULT_SIGNAL_BUFFER)
    }

    /// Store whose channels queue at most `signal_buffer` undelivered signals.
    ///
    /// Signals beyond that are dropped; the subscriber already has a refresh pending.
    pub fn with_signal_buffer(signal_buffer: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            signal_buffer: signal_buffer.max(1),
        }
    }

    fn lock(state: &Mutex<MemoryState>) -> Result<MutexGuard<'_, MemoryState>, ApiError> {
        state
            .lock()
            .map_err(|_| ApiError::internal("memory store lock poisoned"))
    }

    /// Append a row. Fails if a row with the same `id` already exists.
    pub fn insert<T: Serialize>(&self, table: Table, record: &T) -> Result<(), ApiError> {
        let row = to_row(table, record)?;
        let mut state = Self::lock(&self.state)?;
        let rows = state.tables.entry(table).or_default();
        if let Some(id) = row.get("id").and_then(JsonValue::as_str)
            && rows.iter().any(|existing| has_id(existing, id))
        {
            return Err(ApiError::internal(format!(
                "{} row {} already exists",
                table, id
            )));
        }
        rows.push(row.clone());
        Self::notify(&mut state, table, ChangeKind::Insert, &row);
        Ok(())
    }

    /// Merge the fields of `patch` into the row with `id`.
    ///
    /// Returns `false` (and publishes nothing) if no such row exists.
    pub fn update(&self, table: Table, id: &str, patch: JsonValue) -> Result<bool, ApiError> {
        let JsonValue::Object(patch) = patch else {
            return Err(ApiError::internal(format!(
                "update of {} row {} needs an object patch",
                table, id
            )));
        };

        let mut state = Self::lock(&self.state)?;
        let Some(row) = state
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
        else {
            return Ok(false);
        };
        row.extend(patch);
        let row = row.clone();
        Self::notify(&mut state, table, ChangeKind::Update, &row);
        Ok(true)
    }

    /// Remove the row with `id`. Returns `false` if no such row exists.
    pub fn delete(&self, table: Table, id: &str) -> Result<bool, ApiError> {
        let mut state = Self::lock(&self.state)?;
        let Some(rows) = state.tables.get_mut(&table) else {
            return Ok(false);
        };
        let Some(position) = rows.iter().position(|row| has_id(row, id)) else {
            return Ok(false);
        };
        let removed = rows.remove(position);
        Self::notify(&mut state, table, ChangeKind::Delete, &removed);
        Ok(true)
    }

    pub fn rows(&self, table: Table) -> Result<Vec<Row>, ApiError> {
        let state = Self::lock(&self.state)?;
        Ok(state.tables.get(&table).cloned().unwrap_or_default())
    }

    /// Make every subsequent read fail with `error` until cleared.
    pub fn fail_reads_with(&self, error: ApiError) -> Result<(), ApiError> {
        Self::lock(&self.state)?.read_failure = Some(error);
        Ok(())
    }

    pub fn clear_read_failure(&self) -> Result<(), ApiError> {
        Self::lock(&self.state)?.read_failure = None;
        Ok(())
    }

    /// Number of reads served (or failed) so far.
    pub fn read_count(&self) -> u64 {
        Self::lock(&self.state).map(|state| state.reads).unwrap_or_default()
    }

    pub fn active_channels(&self) -> usize {
        Self::lock(&self.state)
            .map(|state| state.channels.len())
            .unwrap_or_default()
    }

    pub fn channel_names(&self) -> Vec<String> {
        Self::lock(&self.state)
            .map(|state| {
                state
                    .channels
                    .values()
                    .map(|channel| channel.spec.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Signal every channel with a binding matching this write.
    fn notify(state: &mut MemoryState, table: Table, kind: ChangeKind, row: &Row) {
        state.channels.retain(|id, channel| {
            let fired = channel
                .spec
                .bindings
                .iter()
                .filter(|binding| binding.matches(table, kind, row))
                .count();
            for _ in 0..fired {
                match channel.signals.try_send(ChangeSignal { table, kind }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(
                            "[MemoryStore] channel '{}' ({}) full, signal coalesced",
                            channel.spec.name, id
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!(
                            "[MemoryStore] channel '{}' ({}) dropped without release",
                            channel.spec.name, id
                        );
                        return false;
                    }
                }
            }
            true
        });
    }
}

fn has_id(row: &Row, id: &str) -> bool {
    row.get("id").and_then(JsonValue::as_str) == Some(id)
}

fn to_row<T: Serialize>(table: Table, record: &T) -> Result<Row, ApiError> {
    match serde_json::to_value(record) {
        Ok(JsonValue::Object(row)) => Ok(row),
        Ok(other) => Err(ApiError::internal(format!(
            "{} rows must be objects, got {}",
            table, other
        ))),
        Err(e) => Err(ApiError::internal(format!(
            "Failed to encode {} row: {}",
            table, e
        ))),
    }
}

/// Project `row` and resolve its embeds. `None` when an inner embed is unresolvable.
fn resolve(tables: &HashMap<Table, Vec<Row>>, row: &Row, projection: &Projection) -> Option<Row> {
    let mut out = Row::new();
    // Columns the stored row never had stay absent rather than becoming null.
    for column in &projection.columns {
        if let Some(value) = row.get(column) {
            out.insert(column.clone(), value.clone());
        }
    }

    for embed in &projection.embeds {
        let resolved = row
            .get(&embed.foreign_key)
            .and_then(|key| {
                tables
                    .get(&embed.table)?
                    .iter()
                    .find(|candidate| candidate.get("id") == Some(key))
            })
            .and_then(|target| resolve(tables, target, &embed.projection));

        match resolved {
            Some(child) => {
                out.insert(embed.table.as_str().to_string(), JsonValue::Object(child));
            }
            None if embed.inner => return None,
            None => {
                out.insert(embed.table.as_str().to_string(), JsonValue::Null);
            }
        }
    }

    Some(out)
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, ApiError> {
        // Reads are asynchronous for callers even though the data is local.
        tokio::task::yield_now().await;

        let mut state = Self::lock(&self.state)?;
        state.reads += 1;
        if let Some(error) = &state.read_failure {
            return Err(error.clone());
        }

        let roots = state
            .tables
            .get(&query.table)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let rows = roots
            .iter()
            .filter(|row| query.filter.as_ref().is_none_or(|filter| filter.matches(row)))
            .filter_map(|row| resolve(&state.tables, row, &query.projection))
            .collect();
        Ok(rows)
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<FeedSubscription, ApiError> {
        let (signals, receiver) = mpsc::channel(self.signal_buffer);
        let name = spec.name.clone();

        let id = {
            let mut state = Self::lock(&self.state)?;
            let id = state.next_channel_id;
            state.next_channel_id += 1;
            state.channels.insert(id, Channel { spec, signals });
            id
        };
        debug!("[MemoryStore] opened channel '{}' ({})", name, id);

        let state = Arc::downgrade(&self.state);
        Ok(FeedSubscription::new(name, receiver, move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            match state.lock() {
                Ok(mut state) => {
                    state.channels.remove(&id);
                }
                Err(_) => warn!("[MemoryStore] could not release channel {}: lock poisoned", id),
            }
        }))
    }
}
