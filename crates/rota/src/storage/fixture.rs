//! YAML fixtures for seeding a [`MemoryStore`] and replaying writes against it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use rota_api::{ApiError, Brand, Client, Event, Operator, Shift, ShiftAssignment, Table};

use super::memory::MemoryStore;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub operators: Vec<Operator>,
    pub clients: Vec<Client>,
    pub brands: Vec<Brand>,
    pub events: Vec<Event>,
    pub shifts: Vec<Shift>,
    pub assignments: Vec<ShiftAssignment>,
    /// Writes applied one by one after seeding
    pub script: Vec<ScriptStep>,
}

/// One scripted write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ScriptStep {
    Insert {
        table: Table,
        row: serde_json::Value,
    },
    Update {
        table: Table,
        id: String,
        set: serde_json::Value,
    },
    Delete {
        table: Table,
        id: String,
    },
}

impl Fixture {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse fixture YAML {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Insert every record into `store`, parents before children.
    pub fn seed(&self, store: &MemoryStore) -> Result<(), ApiError> {
        for operator in &self.operators {
            store.insert(Table::Operators, operator)?;
        }
        for client in &self.clients {
            store.insert(Table::Clients, client)?;
        }
        for brand in &self.brands {
            store.insert(Table::Brands, brand)?;
        }
        for event in &self.events {
            store.insert(Table::Events, event)?;
        }
        for shift in &self.shifts {
            store.insert(Table::Shifts, shift)?;
        }
        for assignment in &self.assignments {
            store.insert(Table::ShiftAssignments, assignment)?;
        }
        Ok(())
    }
}

impl ScriptStep {
    pub fn apply(&self, store: &MemoryStore) -> Result<(), ApiError> {
        match self {
            ScriptStep::Insert { table, row } => store.insert(*table, row),
            ScriptStep::Update { table, id, set } => {
                if !store.update(*table, id, set.clone())? {
                    tracing::warn!("[Fixture] update skipped, no {} row {}", table, id);
                }
                Ok(())
            }
            ScriptStep::Delete { table, id } => {
                if !store.delete(*table, id)? {
                    tracing::warn!("[Fixture] delete skipped, no {} row {}", table, id);
                }
                Ok(())
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ScriptStep::Insert { table, row } => {
                let id = row.get("id").and_then(|id| id.as_str()).unwrap_or("?");
                format!("insert {} {}", table, id)
            }
            ScriptStep::Update { table, id, .. } => format!("update {} {}", table, id),
            ScriptStep::Delete { table, id } => format!("delete {} {}", table, id),
        }
    }
}
