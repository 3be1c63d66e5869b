//! The two reads issued for an operator.
//!
//! Both start from `shift_assignments` filtered by `operator_id` and inner-join
//! through the foreign keys `shift_id` → `shifts`, `event_id` → `events`,
//! `client_id` → `clients`, `brand_id` → `brands`.

use rota_api::{OperatorId, RowFilter, Table};

use crate::storage::query::{Embed, Projection, SelectQuery};

pub const OPERATOR_COLUMN: &str = "operator_id";

/// Assignments with shift, event, client and brand resolved.
///
/// Renders as:
/// `shift_id, shifts!inner(id, date, start_time, end_time, activity_type,
/// required_operators, events!inner(id, title, address, clients!inner(name),
/// brands!inner(name)))`
pub fn assigned_shifts(operator: &OperatorId) -> SelectQuery {
    let events = Projection::columns(["id", "title", "address"])
        .embed(Embed::inner(
            Table::Clients,
            "client_id",
            Projection::columns(["name"]),
        ))
        .embed(Embed::inner(
            Table::Brands,
            "brand_id",
            Projection::columns(["name"]),
        ));

    let shifts = Projection::columns([
        "id",
        "date",
        "start_time",
        "end_time",
        "activity_type",
        "required_operators",
    ])
    .embed(Embed::inner(Table::Events, "event_id", events));

    SelectQuery::from(
        Table::ShiftAssignments,
        Projection::columns(["shift_id"]).embed(Embed::inner(Table::Shifts, "shift_id", shifts)),
    )
    .filter(operator_filter(operator))
}

/// Assignments with only the shift id and date, for counting.
pub fn shift_dates(operator: &OperatorId) -> SelectQuery {
    SelectQuery::from(
        Table::ShiftAssignments,
        Projection::columns(["shift_id"]).embed(Embed::inner(
            Table::Shifts,
            "shift_id",
            Projection::columns(["id", "date"]),
        )),
    )
    .filter(operator_filter(operator))
}

pub fn operator_filter(operator: &OperatorId) -> RowFilter {
    RowFilter::eq(OPERATOR_COLUMN, operator.as_str())
}
