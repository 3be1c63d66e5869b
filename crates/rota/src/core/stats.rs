//! Today / upcoming / total counters over an operator's shift dates.
//!
//! Dates are compared as `YYYY-MM-DD` strings. That ordering matches calendar
//! order for well-formed ISO dates, which is assumed rather than checked.

use chrono::NaiveDate;

use rota_api::{Embedded, OperatorStats, ShiftDateAssignmentRow};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Count shifts on `today`, from tomorrow on, and in total.
pub fn aggregate<'a, I>(dates: I, today: NaiveDate) -> OperatorStats
where
    I: IntoIterator<Item = &'a str>,
{
    let today_str = today.format(DATE_FORMAT).to_string();
    let tomorrow_str = today
        .succ_opt()
        .map(|tomorrow| tomorrow.format(DATE_FORMAT).to_string());

    let mut stats = OperatorStats::default();
    for date in dates {
        stats.total_shifts += 1;
        if date == today_str {
            stats.today_shifts += 1;
        } else if tomorrow_str.as_deref().is_some_and(|tomorrow| date >= tomorrow) {
            stats.upcoming_shifts += 1;
        }
    }
    stats
}

/// Flatten the narrow assignment rows and count their shift dates.
pub fn compute_stats(rows: Vec<ShiftDateAssignmentRow>, today: NaiveDate) -> OperatorStats {
    let shifts: Vec<_> = rows
        .into_iter()
        .filter_map(|row| row.shifts)
        .flat_map(Embedded::into_vec)
        .collect();
    aggregate(shifts.iter().map(|shift| shift.date.as_str()), today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_today_and_upcoming_are_split() {
        let stats = aggregate(["2025-01-10", "2025-02-01"], day("2025-01-10"));
        assert_eq!(
            stats,
            OperatorStats {
                today_shifts: 1,
                upcoming_shifts: 1,
                total_shifts: 2,
            }
        );
    }

    #[test]
    fn test_past_shifts_only_count_towards_total() {
        let stats = aggregate(["2024-12-31", "2025-01-09"], day("2025-01-10"));
        assert_eq!(stats.today_shifts, 0);
        assert_eq!(stats.upcoming_shifts, 0);
        assert_eq!(stats.total_shifts, 2);
    }

    #[test]
    fn test_tomorrow_crosses_month_and_year() {
        let stats = aggregate(["2025-01-01", "2024-12-31"], day("2024-12-31"));
        assert_eq!(stats.today_shifts, 1);
        assert_eq!(stats.upcoming_shifts, 1);
    }

    #[test]
    fn test_empty_set_is_all_zero() {
        assert_eq!(
            aggregate(std::iter::empty(), day("2025-01-10")),
            OperatorStats::default()
        );
    }

    #[test]
    fn test_compute_stats_flattens_embeds() {
        let rows: Vec<ShiftDateAssignmentRow> = serde_json::from_value(json!([
            {"shift_id": "s1", "shifts": {"id": "s1", "date": "2025-01-10"}},
            {"shift_id": "s2", "shifts": [{"id": "s2", "date": "2025-02-01"}]},
            {"shift_id": "s3", "shifts": null}
        ]))
        .unwrap();

        let stats = compute_stats(rows, day("2025-01-10"));
        assert_eq!(stats.total_shifts, 2);
        assert_eq!(stats.today_shifts, 1);
        assert_eq!(stats.upcoming_shifts, 1);
    }

    fn offset_strategy() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(-400i64..400, 0..50)
    }

    proptest! {
        #[test]
        fn prop_today_plus_upcoming_bounded_by_total(offsets in offset_strategy()) {
            let today = day("2025-06-15");
            let dates: Vec<String> = offsets
                .iter()
                .map(|offset| (today + chrono::Duration::days(*offset)).format(DATE_FORMAT).to_string())
                .collect();

            let stats = aggregate(dates.iter().map(String::as_str), today);
            let any_past = offsets.iter().any(|offset| *offset < 0);

            prop_assert!(stats.today_shifts + stats.upcoming_shifts <= stats.total_shifts);
            prop_assert_eq!(
                stats.today_shifts + stats.upcoming_shifts == stats.total_shifts,
                !any_past
            );
        }
    }
}
