use chrono::{Datelike, Days, IsoWeek, NaiveDate, NaiveTime};

/// ISO week key `(isoYear, isoWeek)`.
///
/// Kept as a pair rather than a formatted string so week arithmetic around
/// year boundaries stays correct (the first days of January can belong to
/// the previous ISO year).
pub type WeekKey = (i32, u32);

/// Calendar month key `(year, month)`.
pub type MonthKey = (i32, u32);

pub fn week_key(date: NaiveDate) -> WeekKey {
    let iso: IsoWeek = date.iso_week();
    (iso.year(), iso.week())
}

pub fn month_key(date: NaiveDate) -> MonthKey {
    (date.year(), date.month())
}

/// Parses a wall-clock time in `HH:MM` or `HH:MM:SS` form.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Number of days in the given calendar month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 30,
    }
}

/// Inclusive iterator over the civil dates `start..=end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut current = Some(start);
    std::iter::from_fn(move || {
        let d = current?;
        if d > end {
            return None;
        }
        current = d.checked_add_days(Days::new(1));
        Some(d)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_key_crosses_year_boundary() {
        // 2027-01-01 is a Friday in ISO week 53 of 2026
        let d = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        assert_eq!(week_key(d), (2026, 53));
    }

    #[test]
    fn parse_clock_accepts_both_forms() {
        assert_eq!(parse_clock("08:30"), NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(parse_clock("23:59:59"), NaiveTime::from_hms_opt(23, 59, 59));
        assert!(parse_clock("25:00").is_none());
        assert!(parse_clock("nope").is_none());
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2026, 1), 31);
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 4), 30);
    }

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let days: Vec<_> = date_range(start, end).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], start);
        assert_eq!(days[3], end);
    }
}
