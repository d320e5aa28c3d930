//! The constraint catalogue.
//!
//! Each hard constraint in the repository taxonomy (C1..C19) is emitted as
//! fixings, at-most-one groups or weighted linear sums over the decision
//! variables. Several members of the catalogue are enforced at variable
//! creation instead of as explicit rows:
//!
//! - C1 (daily cap), C7 (qualification validity), C8..C16 (product, rank,
//!   scheme, gender, whitelist/blacklist, requirement ownership) are
//!   compatibility filters in [`crate::model::is_compatible`]; an
//!   incompatible pair simply has no variable.
//! - headcount exact-fill reduces to the per-slot at-most-one group plus
//!   assignment maximisation, because slots are fanned out one per
//!   headcount position.
//!
//! `constraintList` drives enablement and parameters; an entry marked
//! `soft` moves to the penalty objective instead of the hard model.

pub mod consecutive_days;
pub mod monthly_hours;
pub mod off_days;
pub mod parttime_limits;
pub mod rest_period;
pub mod soft;
pub mod weekly_hours;

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::employee::Employee;
use crate::domain::{ConstraintConfig, MonthlyHourLimit, PlanningHorizon, Slot};
use crate::hours::{HourParams, WeekContext, shift_hours};
use crate::model::{EmployeeView, Model};
use shared::time::WeekKey;

/// Hour and streak totals already committed by locked assignments, fed in
/// by the incremental and empty-slots entry points.
#[derive(Debug, Default, Clone)]
pub struct LockedBookkeeping {
    /// `(employeeId, isoWeek)` to committed normal hours.
    pub weekly_normal_hours: HashMap<(String, WeekKey), f64>,
    /// Locked work-day streak ending immediately before the solve window.
    pub consecutive_before: HashMap<String, u32>,
    /// End of the last locked shift per employee.
    pub last_shift_end: HashMap<String, NaiveDateTime>,
    pub solve_from: Option<NaiveDate>,
}

pub struct ConstraintContext<'a> {
    pub slots: &'a [Slot],
    pub employees: &'a [Employee],
    pub views: &'a [EmployeeView],
    pub config: &'a ConstraintConfig,
    pub hour_params: HourParams,
    pub horizon: PlanningHorizon,
    pub monthly_limits: &'a [MonthlyHourLimit],
    pub locked: Option<&'a LockedBookkeeping>,
}

impl ConstraintContext<'_> {
    /// The employee's effective cyclic pattern: the rotated pattern stored
    /// by the preprocessor, or the standard 5-on-2-off week as fallback.
    pub fn pattern_of(&self, emp: usize) -> Vec<String> {
        let pattern = &self.employees[emp].work_pattern;
        if pattern.is_empty() {
            ["D", "D", "D", "D", "D", "O", "O"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            pattern.clone()
        }
    }

    /// Static week context for a variable, derived from the employee's
    /// rotated pattern: how many days the pattern works in the slot's ISO
    /// week and which of them the slot date is. Dates the pattern rests on
    /// count as position 1 work (the solver may still assign off-pattern).
    pub fn week_context(&self, slot: &Slot, emp: usize) -> WeekContext {
        let pattern = self.pattern_of(emp);
        let (work_days, position) =
            crate::calendar::pattern_week_shape(&pattern, slot.pattern_start_date, slot.date);
        WeekContext {
            work_days_in_week: work_days.max(1),
            week_position: position.unwrap_or(1),
        }
    }

    /// Hour breakdown a variable would contribute if assigned.
    pub fn var_hours(&self, slot: &Slot, emp: usize) -> crate::domain::HourBreakdown {
        shift_hours(
            slot.start,
            slot.end,
            self.views[emp].scheme,
            self.week_context(slot, emp),
            &self.hour_params,
        )
    }

    pub fn locked_weekly_hours(&self, employee_id: &str, week: WeekKey) -> f64 {
        self.locked
            .and_then(|l| {
                l.weekly_normal_hours
                    .get(&(employee_id.to_string(), week))
                    .copied()
            })
            .unwrap_or(0.0)
    }
}

/// Applies every enabled hard constraint to the model.
pub fn apply_all(model: &mut Model, ctx: &ConstraintContext) {
    if ctx.config.is_hard("momWeeklyHoursCap44h") {
        weekly_hours::apply(model, ctx);
    }
    if ctx.config.is_hard("maxConsecutiveWorkingDays") {
        consecutive_days::apply(model, ctx);
    }
    if ctx.config.is_hard("minRestBetweenShifts") {
        rest_period::apply(model, ctx);
    }
    if ctx.config.is_hard("minWeeklyOffDays") {
        off_days::apply(model, ctx);
    }
    if ctx.config.is_hard("partTimerWeeklyHours") {
        parttime_limits::apply(model, ctx);
    }
    if ctx.config.is_hard("momMonthlyOtCap") {
        monthly_hours::apply_ot_cap(model, ctx);
    }
    if ctx.config.is_hard("apgdMonthlyTotalHours") {
        monthly_hours::apply_apgd_total_cap(model, ctx);
    }

    tracing::info!(
        groups = model.groups.len(),
        linear = model.linear.len(),
        "hard constraints applied"
    );
}
