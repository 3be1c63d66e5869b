//! Raw joined rows as the store returns them.
//!
//! Embedded relations are named after the joined table (`shifts`, `events`,
//! `clients`, `brands`). Depending on the store, a many-to-one embed arrives as
//! a single object or as a one-element array, and an incomplete join arrives as
//! `null` or not at all. All of these decode; interpreting them is the
//! transformer's job.

use serde::{Deserialize, Deserializer, Serialize};

/// An embedded relation that may arrive as one object or as a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedded<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Embedded<T> {
    /// First record of the embed, if any.
    pub fn into_first(self) -> Option<T> {
        match self {
            Embedded::One(item) => Some(item),
            Embedded::Many(items) => items.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Embedded::One(item) => vec![item],
            Embedded::Many(items) => items,
        }
    }
}

/// Stores return `null` for unset columns; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRow {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    pub address: String,
    #[serde(default)]
    pub clients: Option<Embedded<NameRow>>,
    #[serde(default)]
    pub brands: Option<Embedded<NameRow>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRow {
    pub id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_operators: u32,
    #[serde(default)]
    pub events: Option<Embedded<EventRow>>,
}

/// One `shift_assignments` row with its shift, event, client and brand resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRow {
    pub shift_id: String,
    #[serde(default)]
    pub shifts: Option<Embedded<ShiftRow>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDateRow {
    pub id: String,
    pub date: String,
}

/// Narrow assignment row used for counting: only the shift id and date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDateAssignmentRow {
    pub shift_id: String,
    #[serde(default)]
    pub shifts: Option<Embedded<ShiftDateRow>>,
}
