//! Change feed: bare "something relevant changed" signals.
//!
//! A feed subscription is opened under a named channel with one or more
//! bindings (table + optional equality filter + change kinds). Whenever a row
//! write matches a binding the subscriber receives a [`ChangeSignal`]. Signals
//! carry no row data; subscribers re-read current state instead.
//!
//! Delivery is at-least-once and may race the write it describes, so a signal
//! is only ever a reason to refetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Operators,
    Clients,
    Brands,
    Events,
    Shifts,
    ShiftAssignments,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Operators,
        Table::Clients,
        Table::Brands,
        Table::Events,
        Table::Shifts,
        Table::ShiftAssignments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Operators => "operators",
            Table::Clients => "clients",
            Table::Brands => "brands",
            Table::Events => "events",
            Table::Shifts => "shifts",
            Table::ShiftAssignments => "shift_assignments",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];
}

/// Equality filter on a single column, e.g. `operator_id=eq.op-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether `row` carries `value` in `column` as a string.
    pub fn matches(&self, row: &serde_json::Map<String, serde_json::Value>) -> bool {
        row.get(&self.column)
            .and_then(|value| value.as_str())
            .is_some_and(|value| value == self.value)
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedBinding {
    pub table: Table,
    pub filter: Option<RowFilter>,
    pub kinds: Vec<ChangeKind>,
}

impl FeedBinding {
    /// Every insert, update and delete on `table`.
    pub fn all(table: Table) -> Self {
        Self {
            table,
            filter: None,
            kinds: ChangeKind::ALL.to_vec(),
        }
    }

    pub fn filtered(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether a write of `kind` on `table` touching `row` should fire this binding.
    ///
    /// For deletes `row` is the removed row; otherwise it is the row as written.
    pub fn matches(
        &self,
        table: Table,
        kind: ChangeKind,
        row: &serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        self.table == table
            && self.kinds.contains(&kind)
            && self.filter.as_ref().is_none_or(|filter| filter.matches(row))
    }
}

/// Named channel with the bindings it listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub bindings: Vec<FeedBinding>,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    pub fn on(mut self, binding: FeedBinding) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// Trigger emitted for a matching write. `table` is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal {
    pub table: Table,
    pub kind: ChangeKind,
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Live subscription to a channel.
///
/// The underlying channel is released exactly once: either by [`release`] or,
/// failing that, when the subscription is dropped. After release no further
/// signals are delivered.
///
/// [`release`]: FeedSubscription::release
pub struct FeedSubscription {
    channel: String,
    signals: mpsc::Receiver<ChangeSignal>,
    release: Option<ReleaseFn>,
}

impl FeedSubscription {
    pub fn new(
        channel: impl Into<String>,
        signals: mpsc::Receiver<ChangeSignal>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            signals,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next trigger, or `None` once the feed side has gone away.
    ///
    /// Cancel safe.
    pub async fn next(&mut self) -> Option<ChangeSignal> {
        self.signals.recv().await
    }

    pub fn release(mut self) {
        self.release_channel();
    }

    fn release_channel(&mut self) {
        if let Some(release) = self.release.take() {
            self.signals.close();
            release();
            tracing::debug!("[FeedSubscription] released channel '{}'", self.channel);
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.release_channel();
    }
}

impl fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("channel", &self.channel)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Push channel for "rows changed" notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a channel listening on `spec.bindings`.
    async fn subscribe(&self, spec: ChannelSpec) -> Result<FeedSubscription, ApiError>;
}
