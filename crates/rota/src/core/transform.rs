//! Raw joined rows → denormalized [`AssignedShift`] views.

use rota_api::{
    AssignedEvent, AssignedShift, AssignmentRow, Embedded, EventRow, NameRow, NamedRef, ShiftRow,
};
use tracing::warn;

/// Map assignment rows to views, sorted ascending by date.
///
/// Ties are broken by start time and then shift id so that the output does not
/// depend on the order the store returned rows in. Rows without a resolvable
/// shift are skipped.
pub fn transform_assignments(rows: Vec<AssignmentRow>) -> Vec<AssignedShift> {
    let mut shifts: Vec<AssignedShift> = rows.into_iter().filter_map(transform_row).collect();
    shifts.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });
    shifts
}

fn transform_row(row: AssignmentRow) -> Option<AssignedShift> {
    let Some(shift) = row.shifts.and_then(Embedded::into_first) else {
        warn!(
            "[transform] assignment for shift {} has no shift record, skipping",
            row.shift_id
        );
        return None;
    };
    Some(transform_shift(shift))
}

fn transform_shift(shift: ShiftRow) -> AssignedShift {
    let event = shift.events.and_then(Embedded::into_first).map(transform_event);
    if event.is_none() {
        warn!("[transform] shift {} has no event record", shift.id);
    }

    AssignedShift {
        id: shift.id,
        date: shift.date,
        start_time: shift.start_time,
        end_time: shift.end_time,
        activity_type: shift.activity_type,
        required_operators: shift.required_operators,
        event,
    }
}

fn transform_event(event: EventRow) -> AssignedEvent {
    AssignedEvent {
        id: event.id,
        title: event.title,
        address: event.address,
        client: named(event.clients),
        brand: named(event.brands),
    }
}

fn named(embed: Option<Embedded<NameRow>>) -> Option<NamedRef> {
    embed
        .and_then(Embedded::into_first)
        .map(|row| NamedRef { name: row.name })
}
