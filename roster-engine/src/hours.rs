//! The hour engine.
//!
//! A pure function from a shift span plus the employee's week context to the
//! canonical breakdown `{gross, lunch, normal, ot, restDayPay, paid}`. The
//! constraint layer, the output builder and the incremental bookkeeping all
//! consume this module; the regulatory correctness of the product reduces to
//! its correctness.

use chrono::NaiveDateTime;

use crate::domain::config::ConstraintConfig;
use crate::domain::HourBreakdown;
use crate::scheme::Scheme;

/// Lunch and pay parameters, read from `constraintList` when present.
#[derive(Debug, Clone, Copy)]
pub struct HourParams {
    /// Gross hours above which the full lunch break applies.
    pub full_lunch_above: f64,
    /// Gross hours above which the short lunch break applies.
    pub short_lunch_above: f64,
    pub full_lunch_hours: f64,
    pub short_lunch_hours: f64,
    /// When set, lunch is subtracted from `paid`. The default keeps lunch as
    /// paid time because downstream consumers treat it as an informational
    /// component of the shift.
    pub deduct_lunch_from_paid: bool,
}

impl Default for HourParams {
    fn default() -> Self {
        Self {
            full_lunch_above: 8.0,
            short_lunch_above: 6.0,
            full_lunch_hours: 1.0,
            short_lunch_hours: 0.75,
            deduct_lunch_from_paid: false,
        }
    }
}

impl HourParams {
    pub fn from_config(config: &ConstraintConfig) -> Self {
        let defaults = Self::default();
        Self {
            full_lunch_above: config.param(
                "momLunchBreak",
                "deductIfShiftAtLeastMinutes",
                defaults.full_lunch_above * 60.0,
            ) / 60.0,
            short_lunch_above: defaults.short_lunch_above,
            full_lunch_hours: config.value("momLunchBreak", None, defaults.full_lunch_hours * 60.0)
                / 60.0,
            short_lunch_hours: defaults.short_lunch_hours,
            deduct_lunch_from_paid: config.param_bool(
                "momLunchBreak",
                "deductLunchFromPaid",
                defaults.deduct_lunch_from_paid,
            ),
        }
    }
}

/// Week context for one shift: how many days the employee works in the ISO
/// week containing the shift, and the 1-based rank of this shift among them.
#[derive(Debug, Clone, Copy)]
pub struct WeekContext {
    pub work_days_in_week: usize,
    pub week_position: usize,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Integer tenths of an hour, the unit of all in-model arithmetic.
pub fn tenths(hours: f64) -> i64 {
    (hours * 10.0).round() as i64
}

/// Gross duration of a shift in hours, rounded to two decimals.
pub fn span_hours(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    round2((end - start).num_seconds() as f64 / 3600.0)
}

/// Lunch step function: none up to 6h, short up to 8h, full above.
pub fn lunch_hours(gross: f64, params: &HourParams) -> f64 {
    if gross > params.full_lunch_above {
        params.full_lunch_hours
    } else if gross > params.short_lunch_above {
        params.short_lunch_hours
    } else {
        0.0
    }
}

/// Hours of rest-day pay granted for a 6th+ work day in a calendar week.
pub const REST_DAY_PAY_HOURS: f64 = 8.0;

/// Per-shift normal-hour threshold by scheme and work days per week.
///
/// Full-time: 11.0h on patterns up to 4 work days, 8.8h otherwise. Part-time
/// thresholds step down with density so the weekly hour budget is honoured.
pub fn normal_threshold(scheme: Scheme, work_days: usize) -> f64 {
    match scheme {
        Scheme::A | Scheme::B => {
            if work_days <= 4 {
                11.0
            } else {
                8.8
            }
        }
        Scheme::P => match work_days {
            0..=4 => 8.745,
            5 => 5.996,
            6 => 4.996,
            _ => 4.283,
        },
    }
}

/// Weekly normal-hour cap by scheme and pattern work days.
pub fn weekly_normal_cap(scheme: Scheme, work_days: usize, config: &ConstraintConfig) -> f64 {
    match scheme {
        Scheme::A | Scheme::B => config.value("momWeeklyHoursCap44h", Some(scheme), 44.0),
        Scheme::P => {
            if work_days <= 4 {
                config.param("partTimerWeeklyHours", "maxHours4Days", 34.98)
            } else {
                config.param("partTimerWeeklyHours", "maxHoursMoreDays", 29.98)
            }
        }
    }
}

/// The canonical hour breakdown for one shift.
///
/// Full-time: net hours split at the pattern threshold, except that the 6th+
/// work day of the calendar week contributes no normal hours and earns
/// rest-day pay instead, the remainder being overtime. Part-time on a 5-day
/// pattern treats the 5th+ day of the week as pure overtime.
///
/// `paid` equals `gross` by default: lunch is a within-shift deduction for
/// cap accounting, not for pay.
pub fn shift_hours(
    start: NaiveDateTime,
    end: NaiveDateTime,
    scheme: Scheme,
    week: WeekContext,
    params: &HourParams,
) -> HourBreakdown {
    let gross = span_hours(start, end);
    let lunch = lunch_hours(gross, params);
    let net = (gross - lunch).max(0.0);

    let (normal, rest_day_pay) = match scheme {
        Scheme::A | Scheme::B => {
            if week.work_days_in_week >= 6 && week.week_position >= 6 {
                (0.0, REST_DAY_PAY_HOURS.min(net))
            } else {
                let threshold = normal_threshold(scheme, week.work_days_in_week);
                (net.min(threshold), 0.0)
            }
        }
        Scheme::P => {
            if week.work_days_in_week == 5 && week.week_position >= 5 {
                (0.0, 0.0)
            } else {
                let threshold = normal_threshold(scheme, week.work_days_in_week);
                (net.min(threshold), 0.0)
            }
        }
    };
    let ot = (net - normal - rest_day_pay).max(0.0);

    let paid = if params.deduct_lunch_from_paid {
        net
    } else {
        gross
    };

    HourBreakdown {
        gross: round2(gross),
        lunch: round2(lunch),
        normal: round2(normal),
        ot: round2(ot),
        rest_day_pay: round2(rest_day_pay),
        paid: round2(paid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn week(work_days: usize, position: usize) -> WeekContext {
        WeekContext {
            work_days_in_week: work_days,
            week_position: position,
        }
    }

    #[test]
    fn lunch_steps_at_six_and_eight_hours() {
        let p = HourParams::default();
        assert_eq!(lunch_hours(4.0, &p), 0.0);
        assert_eq!(lunch_hours(6.0, &p), 0.0);
        assert_eq!(lunch_hours(7.0, &p), 0.75);
        assert_eq!(lunch_hours(8.0, &p), 0.75);
        assert_eq!(lunch_hours(9.0, &p), 1.0);
        assert_eq!(lunch_hours(12.0, &p), 1.0);
    }

    #[test]
    fn four_day_pattern_twelve_hour_shift() {
        // Scenario A: scheme A, 4 work days, 08:00-20:00
        let hours = shift_hours(
            dt(2026, 1, 5, 8, 0),
            dt(2026, 1, 5, 20, 0),
            Scheme::A,
            week(4, 1),
            &HourParams::default(),
        );
        assert_eq!(
            hours,
            HourBreakdown {
                gross: 12.0,
                lunch: 1.0,
                normal: 11.0,
                ot: 0.0,
                rest_day_pay: 0.0,
                paid: 12.0
            }
        );
    }

    #[test]
    fn sixth_work_day_earns_rest_day_pay() {
        // Scenario B: 6th 12h shift of the calendar week
        let hours = shift_hours(
            dt(2026, 1, 10, 8, 0),
            dt(2026, 1, 10, 20, 0),
            Scheme::A,
            week(6, 6),
            &HourParams::default(),
        );
        assert_eq!(hours.gross, 12.0);
        assert_eq!(hours.lunch, 1.0);
        assert_eq!(hours.normal, 0.0);
        assert_eq!(hours.rest_day_pay, 8.0);
        assert_eq!(hours.ot, 3.0);
        assert_eq!(hours.paid, 12.0);
    }

    #[test]
    fn five_day_pattern_splits_at_8_8() {
        let hours = shift_hours(
            dt(2026, 1, 5, 8, 0),
            dt(2026, 1, 5, 20, 0),
            Scheme::A,
            week(5, 3),
            &HourParams::default(),
        );
        assert_eq!(hours.normal, 8.8);
        assert_eq!(hours.ot, 2.2);
        assert_eq!(hours.rest_day_pay, 0.0);
    }

    #[test]
    fn part_time_thresholds_step_down_with_density() {
        let p = HourParams::default();
        // 9h gross, 1h lunch, 8h net on a 4-day pattern: all under 8.745
        let four = shift_hours(
            dt(2026, 1, 5, 9, 0),
            dt(2026, 1, 5, 18, 0),
            Scheme::P,
            week(4, 2),
            &p,
        );
        assert_eq!(four.normal, 8.0);
        assert_eq!(four.ot, 0.0);

        // 6h gross on a 6-day pattern: no lunch, splits at 4.996
        let six = shift_hours(
            dt(2026, 1, 5, 9, 0),
            dt(2026, 1, 5, 15, 0),
            Scheme::P,
            week(6, 2),
            &p,
        );
        assert_eq!(six.normal, 5.0);
        assert_eq!(six.ot, 1.0);
    }

    #[test]
    fn part_time_fifth_day_of_five_day_week_is_pure_ot() {
        let hours = shift_hours(
            dt(2026, 1, 9, 9, 0),
            dt(2026, 1, 9, 15, 0),
            Scheme::P,
            week(5, 5),
            &HourParams::default(),
        );
        assert_eq!(hours.normal, 0.0);
        assert_eq!(hours.ot, 6.0);
        assert_eq!(hours.rest_day_pay, 0.0);
    }

    #[test]
    fn components_always_reconcile_to_gross() {
        // Property 7: normal + ot + lunch (+ restDayPay) == gross
        let params = HourParams::default();
        let cases = [
            (Scheme::A, 4, 1, 12),
            (Scheme::A, 5, 2, 12),
            (Scheme::A, 6, 6, 12),
            (Scheme::B, 5, 4, 13),
            (Scheme::P, 4, 3, 9),
            (Scheme::P, 5, 5, 6),
        ];
        for (scheme, work_days, position, duration) in cases {
            let start = dt(2026, 1, 5, 7, 0);
            let end = start + chrono::Duration::hours(duration);
            let h = shift_hours(start, end, scheme, week(work_days, position), &params);
            let total = h.normal + h.ot + h.lunch + h.rest_day_pay;
            assert!(
                (total - h.gross).abs() < 1e-9,
                "{scheme:?}/{work_days}d pos {position}: {h:?}"
            );
            assert_eq!(h.paid, h.gross);
        }
    }

    #[test]
    fn overnight_shift_spans_midnight() {
        let hours = shift_hours(
            dt(2026, 1, 5, 22, 0),
            dt(2026, 1, 6, 6, 0),
            Scheme::A,
            week(5, 1),
            &HourParams::default(),
        );
        assert_eq!(hours.gross, 8.0);
        assert_eq!(hours.lunch, 0.75);
        assert_eq!(hours.normal, 7.25);
        assert_eq!(hours.ot, 0.0);
    }

    #[test]
    fn tenths_rounds_half_up() {
        assert_eq!(tenths(8.8), 88);
        assert_eq!(tenths(34.98), 350);
        assert_eq!(tenths(29.98), 300);
        assert_eq!(tenths(8.745), 87);
    }
}
