//! Greedy day-by-day placement with U-slot injection.
//!
//! Given N employees on evenly distributed rotation offsets, simulate the
//! calendar: an employee whose pattern says "work" on a date either fills
//! one of the day's headcount positions or, when the day is already full,
//! absorbs a U-slot. A placement is feasible iff every in-scope date ends
//! with its counter exactly at headcount.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::pattern_day;

/// The rest symbol in a work pattern.
pub const REST: &str = "O";
/// Marker for a pattern work day absorbed as unfilled by the placement.
pub const UNFILLED: &str = "U";

#[derive(Debug, Clone)]
pub struct EmployeePlacement {
    pub rotation_offset: usize,
    /// One entry per calendar date: a shift code, `O`, or `U`.
    pub pattern: Vec<String>,
    pub work_days: usize,
    pub u_slots: usize,
}

#[derive(Debug, Clone)]
pub struct Placement {
    pub feasible: bool,
    pub employees: Vec<EmployeePlacement>,
    /// Offset to employee count.
    pub offset_distribution: BTreeMap<usize, usize>,
    /// Percentage of dates whose counter hit headcount exactly.
    pub coverage_rate: f64,
    pub total_work_days: usize,
    pub total_u_slots: usize,
}

/// Distributes N employees across rotation offsets as evenly as possible:
/// `0..N` when N fits in the cycle, otherwise the first `N mod L` offsets
/// carry one extra employee.
pub fn distribute_offsets_evenly(num_employees: usize, cycle_length: usize) -> Vec<usize> {
    if num_employees <= cycle_length {
        return (0..num_employees).collect();
    }
    let per_offset = num_employees / cycle_length;
    let extra = num_employees % cycle_length;
    let mut offsets = Vec::with_capacity(num_employees);
    for offset in 0..cycle_length {
        let count = per_offset + usize::from(offset < extra);
        offsets.extend(std::iter::repeat_n(offset, count));
    }
    offsets
}

/// Attempts to cover the whole calendar with exactly `num_employees`.
pub fn try_placement(
    num_employees: usize,
    pattern: &[String],
    headcount: u32,
    calendar: &[NaiveDate],
    anchor: NaiveDate,
) -> Placement {
    let cycle_length = pattern.len();
    let offsets = distribute_offsets_evenly(num_employees, cycle_length);

    let mut offset_distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for offset in &offsets {
        *offset_distribution.entry(*offset).or_default() += 1;
    }

    let mut daily_coverage: Vec<u32> = vec![0; calendar.len()];
    let mut employees = Vec::with_capacity(num_employees);

    for offset in offsets {
        let mut employee_pattern = Vec::with_capacity(calendar.len());
        let mut work_days = 0;
        let mut u_slots = 0;

        for (day_idx, date) in calendar.iter().enumerate() {
            let idx = pattern_day(*date, anchor, offset, cycle_length);
            let code = &pattern[idx];
            if code == REST {
                employee_pattern.push(REST.to_string());
            } else if daily_coverage[day_idx] >= headcount {
                employee_pattern.push(UNFILLED.to_string());
                u_slots += 1;
            } else {
                employee_pattern.push(code.clone());
                daily_coverage[day_idx] += 1;
                work_days += 1;
            }
        }

        employees.push(EmployeePlacement {
            rotation_offset: offset,
            pattern: employee_pattern,
            work_days,
            u_slots,
        });
    }

    let covered = daily_coverage.iter().filter(|c| **c == headcount).count();
    let feasible = covered == calendar.len();
    let coverage_rate = if calendar.is_empty() {
        100.0
    } else {
        covered as f64 / calendar.len() as f64 * 100.0
    };

    Placement {
        feasible,
        total_work_days: employees.iter().map(|e| e.work_days).sum(),
        total_u_slots: employees.iter().map(|e| e.u_slots).sum(),
        employees,
        offset_distribution,
        coverage_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn calendar(start: (i32, u32, u32), days: u64) -> Vec<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap();
        (0..days)
            .map(|i| first + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn offsets_distribute_evenly() {
        assert_eq!(distribute_offsets_evenly(5, 6), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            distribute_offsets_evenly(14, 5),
            vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4]
        );
        assert_eq!(distribute_offsets_evenly(6, 12), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn seven_employees_cover_ddddd_oo_at_headcount_five() {
        // Scenario D: every offset works 5 of 7 cycle days, so 7 employees
        // give exactly 5 on duty every day across a 31-day January.
        let p = pattern("DDDDDOO");
        let cal = calendar((2026, 1, 1), 31);
        let anchor = cal[0];

        let six = try_placement(6, &p, 5, &cal, anchor);
        assert!(!six.feasible);

        let seven = try_placement(7, &p, 5, &cal, anchor);
        assert!(seven.feasible);
        assert_eq!(seven.coverage_rate, 100.0);
        assert_eq!(seven.total_u_slots, 0);
        assert_eq!(seven.offset_distribution.len(), 7);
        assert!(seven.offset_distribution.values().all(|c| *c == 1));
    }

    #[test]
    fn surplus_employees_absorb_u_slots() {
        let p = pattern("DDDDDOO");
        let cal = calendar((2026, 1, 1), 14);
        let anchor = cal[0];

        let placement = try_placement(14, &p, 5, &cal, anchor);
        assert!(placement.feasible);
        assert!(placement.total_u_slots > 0);
        // every placed day either works, rests, or is a U-slot
        for emp in &placement.employees {
            assert_eq!(emp.pattern.len(), cal.len());
        }
    }
}
