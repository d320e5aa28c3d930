//! C6: part-time weekly-hours safeguard.
//!
//! Redundant with the scheme-P branch of the weekly cap, kept as an
//! independent row so a misconfigured C2 cannot silently lift the
//! part-time budget. Uses the same pattern-aware normal-hour accounting.

use std::collections::BTreeMap;

use crate::hours::tenths;
use crate::model::{Model, VarId};
use crate::scheme::Scheme;
use shared::time::{WeekKey, week_key};

use super::ConstraintContext;

pub fn apply(model: &mut Model, ctx: &ConstraintContext) {
    let mut buckets: BTreeMap<(usize, WeekKey), Vec<(VarId, i64)>> = BTreeMap::new();

    for (var, cand) in model.candidates.iter().enumerate() {
        if ctx.views[cand.emp].scheme != Scheme::P {
            continue;
        }
        let slot = &ctx.slots[cand.slot];
        let normal = ctx.var_hours(slot, cand.emp).normal;
        if normal <= 0.0 {
            continue;
        }
        buckets
            .entry((cand.emp, week_key(slot.date)))
            .or_default()
            .push((var, tenths(normal)));
    }

    let mut emitted = 0;
    for ((emp, week), terms) in buckets {
        let work_days = ctx.views[emp].pattern_work_days;
        let cap = if work_days <= 4 {
            ctx.config.param("partTimerWeeklyHours", "maxHours4Days", 34.98)
        } else {
            ctx.config
                .param("partTimerWeeklyHours", "maxHoursMoreDays", 29.98)
        };
        let locked = ctx.locked_weekly_hours(&ctx.employees[emp].employee_id, week);
        model.add_linear("C6", terms, tenths((cap - locked).max(0.0)));
        emitted += 1;
    }
    tracing::debug!(constraints = emitted, "part-time weekly caps emitted");
}
