//! C5: minimum one off-day per rolling 7-day window.
//!
//! Usually implied by the weekly hour cap and the consecutive-day cap, but
//! enforced independently so the template path cannot schedule a full
//! 7-day week. APGD-D10 employees may work up to 7 days per week and are
//! excluded.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{Model, VarId};

use super::ConstraintContext;

pub fn apply(model: &mut Model, ctx: &ConstraintContext) {
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
    if horizon_days.len() < 7 {
        return;
    }

    let mut emitted = 0;
    for (emp, dates) in by_emp_date.iter().enumerate() {
        if dates.is_empty() || ctx.views[emp].apgd_d10 {
            continue;
        }
        for start in 0..=horizon_days.len() - 7 {
            let terms: Vec<(VarId, i64)> = horizon_days[start..start + 7]
                .iter()
                .flat_map(|d| dates.get(d).into_iter().flatten().map(|v| (*v, 1)))
                .collect();
            if terms.len() > 6 {
                model.add_linear("C5", terms, 6);
                emitted += 1;
            }
        }
    }
    tracing::debug!(constraints = emitted, "weekly off-day windows emitted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{TestFixture, twelve_hour_slot};

    #[test]
    fn seven_straight_days_force_an_off_day() {
        let slots: Vec<_> = (1..=7).map(|d| twelve_hour_slot(2026, 1, d)).collect();
        let mut fixture = TestFixture::new(&["DDDDDDD"], slots);
        fixture.horizon_days(2026, 1, 1, 2026, 1, 7);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);

        let c5 = model.linear.iter().find(|c| c.kind == "C5").unwrap();
        assert_eq!(c5.terms.len(), 7);
        assert_eq!(c5.upper, 6);
    }

    #[test]
    fn apgd_employees_may_work_the_full_week() {
        let slots: Vec<_> = (1..=7).map(|d| twelve_hour_slot(2026, 1, d)).collect();
        let mut fixture = TestFixture::new(&["DDDDDDD"], slots);
        fixture.employees[0].product_type_id = Some("APO".into());
        fixture.horizon_days(2026, 1, 1, 2026, 1, 7);
        let (mut model, ctx) = fixture.model_and_ctx();
        apply(&mut model, &ctx);
        assert!(model.linear.iter().all(|c| c.kind != "C5"));
    }
}
