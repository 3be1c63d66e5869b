#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use rota::storage::{Row, SelectQuery, StorageBackend};
use rota::{MemoryStore, SyncHandle, SyncSnapshot};
use rota_api::{
    ApiError, Brand, ChangeFeed, ChannelSpec, Client, Event, FeedSubscription, Shift,
    ShiftAssignment, Table,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub async fn within<F: Future>(future: F) -> Result<F::Output> {
    tokio::time::timeout(WAIT, future)
        .await
        .context("timed out waiting")
}

/// Wait for a snapshot matching `predicate`.
pub async fn wait_until<V: Clone>(
    handle: &SyncHandle<V>,
    predicate: impl FnMut(&SyncSnapshot<V>) -> bool,
) -> Result<SyncSnapshot<V>> {
    within(handle.wait_for(predicate))
        .await?
        .context("controller stopped")
}

/// Wait for the first settled snapshot published after `revision`.
pub async fn settled_after<V: Clone>(handle: &SyncHandle<V>, revision: u64) -> Result<SyncSnapshot<V>> {
    wait_until(handle, |snapshot| snapshot.settled_after(revision)).await
}

pub async fn poll_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}

/// Give spawned tasks a chance to react to something that should be ignored.
pub async fn quiesce() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn shift(id: &str, event_id: &str, date: &str, start_time: &str) -> Shift {
    Shift {
        id: id.to_string(),
        event_id: event_id.to_string(),
        date: date.to_string(),
        start_time: start_time.to_string(),
        end_time: "18:00".to_string(),
        activity_type: None,
        required_operators: 2,
    }
}

pub fn assignment(id: &str, operator: &str, shift_id: &str) -> ShiftAssignment {
    ShiftAssignment {
        id: id.to_string(),
        operator_id: operator.into(),
        shift_id: shift_id.to_string(),
    }
}

/// One event with client and brand, shifts s1..s4, and assignments:
/// op-1 on s2 and s1, op-2 on s3. s4 is unassigned.
pub fn seeded_store() -> Result<Arc<MemoryStore>> {
    let store = MemoryStore::new();
    store.insert(
        Table::Clients,
        &Client {
            id: "c1".to_string(),
            name: "Acme".to_string(),
        },
    )?;
    store.insert(
        Table::Brands,
        &Brand {
            id: "b1".to_string(),
            name: "Fizz".to_string(),
        },
    )?;
    store.insert(
        Table::Events,
        &Event {
            id: "e1".to_string(),
            title: "Store opening".to_string(),
            address: "Via Roma 1".to_string(),
            client_id: "c1".to_string(),
            brand_id: "b1".to_string(),
        },
    )?;
    store.insert(Table::Shifts, &shift("s1", "e1", "2025-01-10", "09:00"))?;
    store.insert(Table::Shifts, &shift("s2", "e1", "2025-02-01", "14:00"))?;
    store.insert(Table::Shifts, &shift("s3", "e1", "2025-01-12", "09:00"))?;
    store.insert(Table::Shifts, &shift("s4", "e1", "2025-03-01", "09:00"))?;
    store.insert(Table::ShiftAssignments, &assignment("a1", "op-1", "s2"))?;
    store.insert(Table::ShiftAssignments, &assignment("a2", "op-1", "s1"))?;
    store.insert(Table::ShiftAssignments, &assignment("a3", "op-2", "s3"))?;
    Ok(Arc::new(store))
}

/// Backend whose reads take their result from `inner` immediately but only
/// return once a permit is granted.
pub struct GatedBackend {
    inner: Arc<MemoryStore>,
    gate: Semaphore,
    started: AtomicUsize,
}

impl GatedBackend {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
        })
    }

    pub fn open(&self, reads: usize) {
        self.gate.add_permits(reads);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for GatedBackend {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, ApiError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let result = self.inner.select(query).await;
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        permit.forget();
        result
    }
}

/// Feed that refuses every subscription.
pub struct UnavailableFeed;

#[async_trait]
impl ChangeFeed for UnavailableFeed {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<FeedSubscription, ApiError> {
        Err(ApiError::ChannelUnavailable {
            channel: spec.name,
            message: "realtime disabled".to_string(),
        })
    }
}

/// Feed whose subscriptions for `stalled` never complete; others go to `inner`.
pub struct StalledFeed {
    inner: Arc<MemoryStore>,
    stalled: String,
    attempts: AtomicUsize,
}

impl StalledFeed {
    pub fn new(inner: Arc<MemoryStore>, stalled: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            stalled: stalled.to_string(),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for StalledFeed {
    async fn subscribe(&self, spec: ChannelSpec) -> Result<FeedSubscription, ApiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if spec.name.ends_with(&format!(":{}", self.stalled)) {
            std::future::pending::<()>().await;
        }
        self.inner.subscribe(spec).await
    }
}
