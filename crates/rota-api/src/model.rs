//! Stored records and the views derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity key of an operator, as handed over by the identity context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperatorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for OperatorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub address: String,
    pub client_id: String,
    pub brand_id: String,
}

/// A bounded work interval belonging to one event.
///
/// `date` is a calendar date in `YYYY-MM-DD` form; no time zone conversion is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub event_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub activity_type: Option<String>,
    pub required_operators: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub id: String,
    pub operator_id: OperatorId,
    pub shift_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// Event as embedded in an [`AssignedShift`].
///
/// Client and brand are absent only when the store returned an incomplete join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedEvent {
    pub id: String,
    pub title: String,
    pub address: String,
    pub client: Option<NamedRef>,
    pub brand: Option<NamedRef>,
}

/// Denormalized projection of one assignment, rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedShift {
    pub id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub activity_type: Option<String>,
    pub required_operators: u32,
    pub event: Option<AssignedEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStats {
    pub today_shifts: usize,
    pub upcoming_shifts: usize,
    pub total_shifts: usize,
}
