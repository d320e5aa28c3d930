//! Coverage calendars and pattern-cycle arithmetic.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};

use shared::time::date_range;

pub fn parse_day_name(name: &str) -> Option<Weekday> {
    match name.trim() {
        "Mon" | "Monday" => Some(Weekday::Mon),
        "Tue" | "Tuesday" => Some(Weekday::Tue),
        "Wed" | "Wednesday" => Some(Weekday::Wed),
        "Thu" | "Thursday" => Some(Weekday::Thu),
        "Fri" | "Friday" => Some(Weekday::Fri),
        "Sat" | "Saturday" => Some(Weekday::Sat),
        "Sun" | "Sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The subset of dates in `[start, end]` on which a requirement must be met:
/// weekday must be covered and public holidays are dropped unless included.
pub fn coverage_calendar(
    start: NaiveDate,
    end: NaiveDate,
    coverage_days: &[String],
    public_holidays: &HashSet<NaiveDate>,
    include_public_holidays: bool,
) -> Vec<NaiveDate> {
    let weekdays: HashSet<Weekday> = coverage_days
        .iter()
        .filter_map(|d| parse_day_name(d))
        .collect();

    date_range(start, end)
        .filter(|date| weekdays.contains(&date.weekday()))
        .filter(|date| include_public_holidays || !public_holidays.contains(date))
        .collect()
}

/// Which day of the pattern cycle a calendar date falls on:
/// `(daysFromAnchor + offset) mod L`. Dates before the anchor wrap around
/// the cycle rather than going negative.
pub fn pattern_day(date: NaiveDate, anchor: NaiveDate, offset: usize, cycle_length: usize) -> usize {
    debug_assert!(cycle_length > 0);
    let days_from_anchor = (date - anchor).num_days();
    (days_from_anchor + offset as i64).rem_euclid(cycle_length as i64) as usize
}

/// Monday of the ISO week containing `date`.
pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Pattern-derived week shape for a rotated pattern anchored at `anchor`:
/// how many work days the pattern schedules in `date`'s ISO week, and the
/// 1-based position of `date` among them. `None` when the pattern rests on
/// `date`.
pub fn pattern_week_shape(
    pattern: &[String],
    anchor: NaiveDate,
    date: NaiveDate,
) -> (usize, Option<usize>) {
    if pattern.is_empty() {
        return (0, None);
    }
    let monday = week_monday(date);
    let mut work_days_in_week = 0;
    let mut position = None;
    for day in date_range(monday, monday + chrono::Duration::days(6)) {
        let idx = pattern_day(day, anchor, 0, pattern.len());
        if pattern[idx] != "O" {
            work_days_in_week += 1;
            if day == date {
                position = Some(work_days_in_week);
            }
        }
    }
    (work_days_in_week, position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(s: &str) -> Vec<String> {
        s.split(',').map(|p| p.to_string()).collect()
    }

    #[test]
    fn coverage_calendar_filters_weekdays_and_holidays() {
        // Jan 2026: 1st is a Thursday
        let holidays = HashSet::from([date(2026, 1, 1)]);
        let weekdays = vec!["Mon".to_string(), "Thu".to_string()];

        let with_ph = coverage_calendar(date(2026, 1, 1), date(2026, 1, 11), &weekdays, &holidays, true);
        assert_eq!(
            with_ph,
            vec![date(2026, 1, 1), date(2026, 1, 5), date(2026, 1, 8)]
        );

        let without_ph =
            coverage_calendar(date(2026, 1, 1), date(2026, 1, 11), &weekdays, &holidays, false);
        assert_eq!(without_ph, vec![date(2026, 1, 5), date(2026, 1, 8)]);
    }

    #[test]
    fn pattern_day_wraps_and_handles_pre_anchor_dates() {
        let anchor = date(2026, 1, 5);
        assert_eq!(pattern_day(anchor, anchor, 0, 7), 0);
        assert_eq!(pattern_day(date(2026, 1, 12), anchor, 0, 7), 0);
        assert_eq!(pattern_day(date(2026, 1, 8), anchor, 2, 7), 5);
        // two days before the anchor with no offset lands on day 5 of 7
        assert_eq!(pattern_day(date(2026, 1, 3), anchor, 0, 7), 5);
    }

    #[test]
    fn week_shape_counts_pattern_work_days() {
        // 6-on-1-off anchored on a Monday
        let p = pattern("D,D,D,D,D,D,O");
        let anchor = date(2026, 1, 5);
        let (work_days, position) = pattern_week_shape(&p, anchor, date(2026, 1, 10));
        assert_eq!(work_days, 6);
        assert_eq!(position, Some(6));

        let (_, rest) = pattern_week_shape(&p, anchor, date(2026, 1, 11));
        assert_eq!(rest, None);
    }
}
