//! C17 and C19: monthly hour caps.
//!
//! C17 caps the pattern-aware overtime contributions per calendar month:
//! 72h for standard employees, month-length-dependent values from
//! `monthlyHourLimits` for APGD-D10 (112/116/120/124h for 28..31-day
//! months by default).
//!
//! C19 replaces the weekly 44h cap for APGD-D10 employees with a total
//! monthly net-hour cap (gross minus lunch): 224/231/238/246h standard,
//! 244/252/260/268h for foreign corporals and sergeants.

use std::collections::BTreeMap;

use crate::hours::{lunch_hours, tenths};
use crate::model::{Model, VarId};
use crate::scheme::{ApgdCategory, apgd_category};
use shared::time::{MonthKey, days_in_month, month_key};

use super::ConstraintContext;

const STANDARD_MONTHLY_OT_HOURS: f64 = 72.0;

fn apgd_default_ot_cap(month_length: u32) -> f64 {
    match month_length {
        28 => 112.0,
        29 => 116.0,
        30 => 120.0,
        _ => 124.0,
    }
}

fn apgd_default_total_cap(month_length: u32, category: ApgdCategory) -> f64 {
    match (category, month_length) {
        (ApgdCategory::Standard, 28) => 224.0,
        (ApgdCategory::Standard, 29) => 231.0,
        (ApgdCategory::Standard, 30) => 238.0,
        (ApgdCategory::Standard, _) => 246.0,
        (ApgdCategory::ForeignCplSgt, 28) => 244.0,
        (ApgdCategory::ForeignCplSgt, 29) => 252.0,
        (ApgdCategory::ForeignCplSgt, 30) => 260.0,
        (ApgdCategory::ForeignCplSgt, _) => 268.0,
    }
}

/// Configured OT cap for an employee, falling back to the regulatory
/// defaults when `monthlyHourLimits` carries no matching entry.
fn monthly_ot_cap(ctx: &ConstraintContext, emp: usize, month_length: u32) -> f64 {
    let view = &ctx.views[emp];
    if !view.apgd_d10 {
        return ctx
            .config
            .value("momMonthlyOtCap", Some(view.scheme), STANDARD_MONTHLY_OT_HOURS);
    }
    let product = ctx.employees[emp]
        .product_type_id
        .clone()
        .unwrap_or_default();
    ctx.monthly_limits
        .iter()
        .filter(|limit| limit.applies_to(view.scheme, &product))
        .find_map(|limit| limit.values_for(month_length).and_then(|v| v.max_overtime_hours))
        .unwrap_or_else(|| apgd_default_ot_cap(month_length))
}

fn monthly_total_cap(ctx: &ConstraintContext, emp: usize, month_length: u32) -> f64 {
    let employee = &ctx.employees[emp];
    let category = apgd_category(employee);
    let product = employee.product_type_id.clone().unwrap_or_default();
    let configured = ctx
        .monthly_limits
        .iter()
        .filter(|limit| limit.applies_to(ctx.views[emp].scheme, &product))
        .find_map(|limit| {
            limit.values_for(month_length).and_then(|v| match category {
                ApgdCategory::Standard => v.max_total_hours,
                ApgdCategory::ForeignCplSgt => v.max_total_hours_foreign_cpl_sgt,
            })
        });
    configured.unwrap_or_else(|| apgd_default_total_cap(month_length, category))
}

/// C17: per `(employee, month)` sum of OT tenths at most the cap.
pub fn apply_ot_cap(model: &mut Model, ctx: &ConstraintContext) {
    let mut buckets: BTreeMap<(usize, MonthKey), Vec<(VarId, i64)>> = BTreeMap::new();

    for (var, cand) in model.candidates.iter().enumerate() {
        let slot = &ctx.slots[cand.slot];
        let ot = ctx.var_hours(slot, cand.emp).ot;
        if ot <= 0.0 {
            continue;
        }
        buckets
            .entry((cand.emp, month_key(slot.date)))
            .or_default()
            .push((var, tenths(ot)));
    }

    let mut emitted = 0;
    for ((emp, (year, month)), terms) in buckets {
        let cap = monthly_ot_cap(ctx, emp, days_in_month(year, month));
        model.add_linear("C17", terms, tenths(cap));
        emitted += 1;
    }
    tracing::debug!(constraints = emitted, "monthly OT caps emitted");
}

/// C19: per `(APGD-D10 employee, month)` sum of net tenths at most the
/// total cap.
pub fn apply_apgd_total_cap(model: &mut Model, ctx: &ConstraintContext) {
    let mut buckets: BTreeMap<(usize, MonthKey), Vec<(VarId, i64)>> = BTreeMap::new();

    for (var, cand) in model.candidates.iter().enumerate() {
        if !ctx.views[cand.emp].apgd_d10 {
            continue;
        }
        let slot = &ctx.slots[cand.slot];
        let gross = crate::hours::span_hours(slot.start, slot.end);
        let net = (gross - lunch_hours(gross, &ctx.hour_params)).max(0.0);
        if net <= 0.0 {
            continue;
        }
        buckets
            .entry((cand.emp, month_key(slot.date)))
            .or_default()
            .push((var, tenths(net)));
    }

    let mut emitted = 0;
    for ((emp, (year, month)), terms) in buckets {
        let cap = monthly_total_cap(ctx, emp, days_in_month(year, month));
        model.add_linear("C19", terms, tenths(cap));
        emitted += 1;
    }
    tracing::debug!(constraints = emitted, "APGD monthly total caps emitted");
}
