//! Declarative select queries with embedded joins.
//!
//! A `SelectQuery` names a root table, the columns to return, the related
//! tables to embed (following a foreign key on the parent row) and an optional
//! equality filter on the root. It renders to the PostgREST-style select
//! expression used by hosted backends:
//!
//! ```text
//! shift_id, shifts!inner(id, date)
//! ```

use rota_api::{RowFilter, Table};
use std::fmt;

/// Columns plus embedded relations of one table in a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            embeds: Vec::new(),
        }
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for column in &self.columns {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(column)?;
            first = false;
        }
        for embed in &self.embeds {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}", embed)?;
            first = false;
        }
        Ok(())
    }
}

/// Many-to-one embed: `parent.foreign_key` references `table.id`.
///
/// With `inner` set, a parent row whose reference cannot be resolved is
/// dropped from the result instead of carrying a `null` embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub table: Table,
    pub foreign_key: String,
    pub inner: bool,
    pub projection: Projection,
}

impl Embed {
    pub fn inner(table: Table, foreign_key: impl Into<String>, projection: Projection) -> Self {
        Self {
            table,
            foreign_key: foreign_key.into(),
            inner: true,
            projection,
        }
    }

    pub fn left(table: Table, foreign_key: impl Into<String>, projection: Projection) -> Self {
        Self {
            inner: false,
            ..Self::inner(table, foreign_key, projection)
        }
    }
}

impl fmt::Display for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = if self.inner { "!inner" } else { "" };
        write!(f, "{}{}({})", self.table, hint, self.projection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: Table,
    pub projection: Projection,
    pub filter: Option<RowFilter>,
}

impl SelectQuery {
    pub fn from(table: Table, projection: Projection) -> Self {
        Self {
            table,
            projection,
            filter: None,
        }
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} select {}", self.table, self.projection)?;
        if let Some(filter) = &self.filter {
            write!(f, " where {}", filter)?;
        }
        Ok(())
    }
}
