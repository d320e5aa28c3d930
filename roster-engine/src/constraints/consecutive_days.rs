//! C3: consecutive working days cap.
//!
//! With one shift per employee per day guaranteed structurally, the number
//! of days worked in any rolling window of K+1 calendar days is the sum of
//! the employee's variables on those dates; that sum is capped at K
//! (12 standard, 8 for APGD-D10).
//!
//! In incremental mode a locked streak of `s` days immediately before the
//! solve window tightens the first window to `K - s`, forcing the first new
//! day off entirely when the streak has already hit the cap.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{Model, VarId};

use super::ConstraintContext;

const STANDARD_MAX: i64 = 12;
const APGD_MAX: i64 = 8;

pub fn apply(model: &mut Model, ctx: &ConstraintContext) {
    // emp -> date -> vars
    let mut by_emp_date: Vec<BTreeMap<NaiveDate, Vec<VarId>>> =
        vec![BTreeMap::new(); ctx.employees.len()];
    for (var, cand) in model.candidates.iter().enumerate() {
        by_emp_date[cand.emp]
            .entry(ctx.slots[cand.slot].date)
            .or_default()
            .push(var);
    }

    let horizon_days: Vec<NaiveDate> =
        shared::time::date_range(ctx.horizon.start_date, ctx.horizon.end_date).collect();

    let mut emitted = 0;
    for (emp, dates) in by_emp_date.iter().enumerate() {
        if dates.is_empty() {
            continue;
        }
        let max_consecutive = if ctx.views[emp].apgd_d10 {
            ctx.config
                .param("maxConsecutiveWorkingDays", "apgdMaxDays", APGD_MAX as f64)
                as i64
        } else {
            ctx.config
                .value("maxConsecutiveWorkingDays", None, STANDARD_MAX as f64) as i64
        };

        // carry-in from a locked streak right before the solve window
        if let Some(locked) = ctx.locked {
            let employee_id = &ctx.employees[emp].employee_id;
            let streak = locked
                .consecutive_before
                .get(employee_id)
                .copied()
                .unwrap_or(0) as i64;
            if streak > 0 {
                if let Some(solve_from) = locked.solve_from {
                    let remaining = (max_consecutive - streak).max(0);
                    let window_len = (max_consecutive - streak + 1).max(1) as usize;
                    let terms: Vec<(VarId, i64)> = horizon_days
                        .iter()
                        .filter(|d| **d >= solve_from)
                        .take(window_len)
                        .flat_map(|d| dates.get(d).into_iter().flatten().map(|v| (*v, 1)))
                        .collect();
                    if !terms.is_empty() {
                        model.add_linear("C3", terms, remaining);
                        emitted += 1;
                    }
                }
            }
        }

        // rolling windows of K+1 days across the horizon
        let window = max_consecutive as usize + 1;
        if horizon_days.len() < window {
            continue;
        }
        for start in 0..=horizon_days.len() - window {
            let terms: Vec<(VarId, i64)> = horizon_days[start..start + window]
                .iter()
                .flat_map(|d| dates.get(d).into_iter().flatten().map(|v| (*v, 1)))
                .collect();
            if terms.len() > max_consecutive as usize {
                model.add_linear("C3", terms, max_consecutive);
                emitted += 1;
            }
        }
    }
    tracing::debug!(constraints = emitted, "consecutive-day windows emitted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{TestFixture, twelve_hour_slot};

    fn daily_slots(from_day: u32, count: u32) -> Vec<crate::domain::Slot> {
        (0..count)
            .map(|i| twelve_hour_slot(2026, 1, from_day + i))
            .collect()
    }

    #[test]
    fn thirteen_day_window_caps_at_twelve() {
        let mut fixture = TestFixture::new(&["DDDDDDDDDDDDDD"], daily_slots(1, 14));
        fixture.horizon_days(2026, 1, 1, 2026, 1, 14);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);

        let c3: Vec<_> = model.linear.iter().filter(|c| c.kind == "C3").collect();
        assert!(!c3.is_empty());
        assert!(c3.iter().all(|c| c.upper == 12));
        assert!(c3.iter().all(|c| c.terms.len() == 13));
    }

    #[test]
    fn apgd_gets_the_tighter_eight_day_cap() {
        let mut fixture = TestFixture::new(&["DDDDDDDDDD"], daily_slots(1, 10));
        fixture.employees[0].product_type_id = Some("APO".into());
        fixture.horizon_days(2026, 1, 1, 2026, 1, 10);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);

        let c3: Vec<_> = model.linear.iter().filter(|c| c.kind == "C3").collect();
        assert!(!c3.is_empty());
        assert!(c3.iter().all(|c| c.upper == 8));
    }

    #[test]
    fn locked_streak_tightens_the_first_window() {
        let mut fixture = TestFixture::new(&["DDDDDDDDDDDDDD"], daily_slots(1, 5));
        fixture.horizon_days(2026, 1, 1, 2026, 1, 5);
        let mut fixture = fixture.with_locked_streak("E0", 12, 2026, 1, 1);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);

        // streak already at the cap: the first new day must be off
        let carry = model
            .linear
            .iter()
            .find(|c| c.kind == "C3" && c.upper == 0)
            .expect("carry-in constraint");
        assert_eq!(carry.terms.len(), 1);
    }
}
