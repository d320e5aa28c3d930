//! C2: weekly normal-hours cap, pattern-aware.
//!
//! Every variable is weighted with the normal hours (in tenths) its shift
//! would contribute under the employee's pattern: 11.0h threshold on
//! patterns up to 4 work days, 8.8h on denser full-time patterns, zero on a
//! 6th+ week work day (rest-day pay), and the part-time threshold table for
//! Scheme P. The per-week sum is capped at 44h for full-timers and at the
//! pattern-dependent part-time budget.
//!
//! APGD-D10 employees are exempt: their weekly cap is replaced by the
//! monthly totals in the monthly-hours module.

use std::collections::BTreeMap;

use crate::hours::{tenths, weekly_normal_cap};
use crate::model::{Model, VarId};
use shared::time::{WeekKey, week_key};

use super::ConstraintContext;

pub fn apply(model: &mut Model, ctx: &ConstraintContext) {
    // (emp, week) -> weighted vars
    let mut buckets: BTreeMap<(usize, WeekKey), Vec<(VarId, i64)>> = BTreeMap::new();

    for (var, cand) in model.candidates.iter().enumerate() {
        if ctx.views[cand.emp].apgd_d10 {
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
        let view = &ctx.views[emp];
        let cap = weekly_normal_cap(view.scheme, view.pattern_work_days, ctx.config);
        let locked = ctx.locked_weekly_hours(&ctx.employees[emp].employee_id, week);
        let remaining = (cap - locked).max(0.0);
        model.add_linear("C2", terms, tenths(remaining));
        emitted += 1;
    }
    tracing::debug!(constraints = emitted, "weekly normal-hour caps emitted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{TestFixture, twelve_hour_slot};

    #[test]
    fn weekly_cap_limits_four_twelve_hour_shifts() {
        // four 12h day shifts in one ISO week on a 4-day pattern: each
        // contributes 11.0h normal, so the fourth breaks 44h
        let mut fixture = TestFixture::new(
            &["DDDDOOO"],
            vec![
                twelve_hour_slot(2026, 1, 5),
                twelve_hour_slot(2026, 1, 6),
                twelve_hour_slot(2026, 1, 7),
                twelve_hour_slot(2026, 1, 8),
                twelve_hour_slot(2026, 1, 9),
            ],
        );
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);

        let c2: Vec<_> = model.linear.iter().filter(|c| c.kind == "C2").collect();
        assert_eq!(c2.len(), 1);
        let constraint = c2[0];
        assert_eq!(constraint.upper, 440);
        // every slot weighs 11.0h = 110 tenths
        assert!(constraint.terms.iter().all(|(_, w)| *w == 110));
        assert_eq!(constraint.terms.len(), 5);
    }

    #[test]
    fn apgd_employees_are_exempt() {
        // Scenario C: scheme A + APO gets no weekly cap row
        let mut fixture = TestFixture::new(&["DDDDDDO"], vec![twelve_hour_slot(2026, 1, 5)]);
        fixture.employees[0].product_type_id = Some("APO".into());
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);
        assert!(model.linear.iter().all(|c| c.kind != "C2"));
    }

    #[test]
    fn locked_hours_shrink_the_cap() {
        let mut fixture = TestFixture::new(&["DDDDOOO"], vec![twelve_hour_slot(2026, 1, 5)])
            .with_locked_weekly_hours("E0", (2026, 2), 40.0);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);
        let c2 = model.linear.iter().find(|c| c.kind == "C2").unwrap();
        assert_eq!(c2.upper, 40); // 44.0 - 40.0 locked = 4.0h
    }
}
