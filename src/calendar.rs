use chrono::{DateTime, LocalResult, Months, NaiveDate, NaiveTime, TimeZone};

use crate::event::StreamEvent;

/// The calendar reaches 12 months into the past and 1 month ahead.
pub const MONTHS_BACK: u32 = 12;
pub const MONTHS_AHEAD: u32 = 1;

/// Inclusive date range the calendar grid covers.
pub fn calendar_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_months(Months::new(MONTHS_BACK))
        .unwrap_or(today);
    let end = today
        .checked_add_months(Months::new(MONTHS_AHEAD))
        .unwrap_or(today);
    (start, end)
}

/// Events falling on `day` in the given timezone, sorted by start time
/// ascending. Insertion order of `events` is irrelevant here; time ordering is
/// applied only at render time, per day cell.
pub fn events_on_day<'a, Tz: TimeZone>(
    events: &'a [StreamEvent],
    day: NaiveDate,
    tz: &Tz,
) -> Vec<&'a StreamEvent> {
    let mut on_day: Vec<&StreamEvent> = events
        .iter()
        .filter(|event| {
            tz.timestamp_millis_opt(event.date)
                .single()
                .map(|dt| dt.date_naive() == day)
                .unwrap_or(false)
        })
        .collect();
    on_day.sort_by_key(|event| event.date);
    on_day
}

/// Start of the calendar day containing `now`, as epoch milliseconds.
/// Falls back to the earlier instant on DST-ambiguous midnights.
pub(crate) fn start_of_day_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
        LocalResult::None => now.timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::event::{EventStatus, Platform};

    fn event(id: &str, date: i64) -> StreamEvent {
        StreamEvent {
            id: id.to_string(),
            platform: Platform::Youtube,
            date,
            title: id.to_string(),
            status: EventStatus::Scheduled,
            facebook: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_spans_a_year_back_and_a_month_ahead() {
        let (start, end) = calendar_range(date(2024, 6, 15));
        assert_eq!(start, date(2023, 6, 15));
        assert_eq!(end, date(2024, 7, 15));
    }

    #[test]
    fn range_clamps_month_end_overflow() {
        let (start, end) = calendar_range(date(2024, 1, 31));
        assert_eq!(start, date(2023, 1, 31));
        // February has no 31st; chrono clamps to the last day.
        assert_eq!(end, date(2024, 2, 29));
    }

    #[test]
    fn day_cell_is_sorted_by_time_ascending() {
        let morning = Utc
            .with_ymd_and_hms(2024, 6, 15, 9, 0, 0)
            .unwrap()
            .timestamp_millis();
        let evening = Utc
            .with_ymd_and_hms(2024, 6, 15, 20, 0, 0)
            .unwrap()
            .timestamp_millis();
        let other_day = Utc
            .with_ymd_and_hms(2024, 6, 16, 9, 0, 0)
            .unwrap()
            .timestamp_millis();

        // Insertion order is evening first.
        let events = vec![event("b", evening), event("c", other_day), event("a", morning)];

        let cell = events_on_day(&events, date(2024, 6, 15), &Utc);
        let ids: Vec<&str> = cell.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn start_of_day_is_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 45, 12).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(start_of_day_ms(&now), midnight.timestamp_millis());
    }
}
