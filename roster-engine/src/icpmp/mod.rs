//! ICPMP: incremental configuration pattern-matching preprocessor.
//!
//! For every requirement this derives the provably minimum employee count,
//! an offset distribution over the pattern cycle, per-employee rotated
//! patterns, and a concrete selection of real employees from the pool. The
//! first feasible placement found when counting up from the lower bound is
//! minimal by construction.

pub mod placement;
pub mod selection;

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::coverage_calendar;
use crate::domain::{DemandItem, Requirement, SolveRequest};
use crate::domain::employee::Employee;
use crate::scheme::{Scheme, SchemeFilter, requirement_schemes};
use placement::{Placement, try_placement};

const MAX_ATTEMPTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Optimality {
    ProvenMinimal,
    ForcedFullOffsetCoverage,
}

/// Per-requirement result recorded into the output metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpmpOutcome {
    pub requirement_id: String,
    pub demand_id: String,
    pub employees_required: usize,
    pub lower_bound: usize,
    pub attempts: usize,
    pub optimality: Optimality,
    pub offset_distribution: BTreeMap<usize, usize>,
    pub coverage_rate: f64,
    pub total_u_slots: usize,
    pub selected_count: usize,
    pub applied_buffer_percent: f64,
}

/// Result of preprocessing the whole request.
#[derive(Debug, Default)]
pub struct PreprocessResult {
    /// Selected employees with rotation offsets and rotated patterns applied.
    pub selected: Vec<Employee>,
    pub outcomes: Vec<IcpmpOutcome>,
    pub warnings: Vec<String>,
}

/// Effective work capacity in coverage days per cycle.
///
/// Full-time schemes deliver their pattern work days as-is. Scheme P is
/// hour-limited: under nominal 8h-net shifts the weekly normal budget caps
/// the deliverable days, and the monthly OT budget can be converted into
/// additional effective days when OT-aware sizing is on.
fn effective_work_capacity(
    pattern_work_days: usize,
    cycle_length: usize,
    scheme: Scheme,
    ot_aware: bool,
    monthly_ot_cap: f64,
) -> f64 {
    match scheme {
        Scheme::A | Scheme::B => pattern_work_days as f64,
        Scheme::P => {
            let mut days_per_week = if pattern_work_days <= 4 {
                34.98 / 8.0
            } else {
                29.98 / 8.0
            };
            if ot_aware {
                // monthly OT budget, spread over ~4.33 weeks, in 8h shifts
                days_per_week += (monthly_ot_cap / 4.33) / 8.0;
            }
            days_per_week * cycle_length as f64 / 7.0
        }
    }
}

/// Buffer on top of the raw minimum for tight patterns.
///
/// Dense patterns leave the downstream solver little slack, so the minimum
/// is nudged up: to the next multiple of the cycle when close, otherwise by
/// one or two heads.
fn buffered_minimum(pattern_based_minimum: usize, cycle_length: usize, work_ratio: f64) -> usize {
    if pattern_based_minimum % cycle_length == 0 {
        return pattern_based_minimum;
    }
    if work_ratio >= 0.85 {
        let next_multiple = pattern_based_minimum.div_ceil(cycle_length) * cycle_length;
        let gap = next_multiple - pattern_based_minimum;
        if gap as f64 <= cycle_length as f64 * 0.3 {
            next_multiple
        } else {
            pattern_based_minimum + 2
        }
    } else if work_ratio >= 0.75 {
        pattern_based_minimum + 1
    } else {
        pattern_based_minimum
    }
}

/// Minimum employees with full search metadata for one requirement.
pub fn optimize_requirement(
    requirement_id: &str,
    pattern: &[String],
    headcount: u32,
    calendar: &[NaiveDate],
    anchor: NaiveDate,
    scheme: Scheme,
    ot_aware: bool,
    monthly_ot_cap: f64,
) -> Result<(usize, usize, usize, Optimality, Placement), String> {
    let cycle_length = pattern.len();
    let work_days = pattern.iter().filter(|s| *s != placement::REST).count();
    if cycle_length == 0 || work_days == 0 {
        return Err(format!(
            "requirement {requirement_id}: pattern has no work days"
        ));
    }
    if calendar.is_empty() {
        return Err(format!(
            "requirement {requirement_id}: no coverage days in planning horizon"
        ));
    }

    let capacity = effective_work_capacity(work_days, cycle_length, scheme, ot_aware, monthly_ot_cap);
    let pattern_based_minimum =
        ((headcount as f64 * cycle_length as f64) / capacity).ceil() as usize;
    let work_ratio = capacity / cycle_length as f64;
    let buffered = buffered_minimum(pattern_based_minimum, cycle_length, work_ratio);
    let lower_bound = (headcount as usize).max(buffered);

    tracing::debug!(
        requirement_id,
        cycle_length,
        work_days,
        capacity,
        lower_bound,
        "starting minimal-count search"
    );

    for num_employees in lower_bound..=lower_bound + MAX_ATTEMPTS {
        let placement = try_placement(num_employees, pattern, headcount, calendar, anchor);
        if !placement.feasible {
            continue;
        }
        let attempts = num_employees - lower_bound + 1;

        // The greedy simulation can pass while leaving some rotation offset
        // unused, which the downstream solver cannot schedule around. Force
        // one employee per offset in that case.
        let missing_offset = (0..cycle_length).any(|o| !placement.offset_distribution.contains_key(&o));
        if missing_offset && num_employees < cycle_length {
            let forced = try_placement(cycle_length, pattern, headcount, calendar, anchor);
            if forced.feasible {
                tracing::debug!(
                    requirement_id,
                    forced_count = cycle_length,
                    "forcing full offset coverage"
                );
                return Ok((
                    cycle_length,
                    lower_bound,
                    attempts,
                    Optimality::ForcedFullOffsetCoverage,
                    forced,
                ));
            }
        }

        return Ok((
            num_employees,
            lower_bound,
            attempts,
            Optimality::ProvenMinimal,
            placement,
        ));
    }

    Err(format!(
        "requirement {requirement_id}: no feasible placement within {MAX_ATTEMPTS} attempts \
         above lower bound {lower_bound}"
    ))
}

/// Runs ICPMP for every requirement of every demand item.
///
/// Failures are collected as warnings; the pipeline continues and may still
/// produce a partial roster with unassigned slots.
pub fn preprocess(request: &SolveRequest) -> PreprocessResult {
    let mut result = PreprocessResult::default();
    let mut assigned: HashSet<String> = HashSet::new();
    let holidays: HashSet<NaiveDate> = request.public_holidays.iter().copied().collect();

    for demand in &request.demand_items {
        for requirement in &demand.requirements {
            match preprocess_requirement(request, demand, requirement, &holidays, &mut assigned) {
                Ok((mut selected, outcome)) => {
                    tracing::info!(
                        requirement_id = %requirement.requirement_id,
                        selected = selected.len(),
                        required = outcome.employees_required,
                        u_slots = outcome.total_u_slots,
                        "requirement preprocessed"
                    );
                    result.outcomes.push(outcome);
                    result.selected.append(&mut selected);
                }
                Err(message) => {
                    tracing::warn!(
                        requirement_id = %requirement.requirement_id,
                        error = %message,
                        "requirement preprocessing failed"
                    );
                    result.warnings.push(message);
                }
            }
        }
    }

    result
}

fn preprocess_requirement(
    request: &SolveRequest,
    demand: &DemandItem,
    requirement: &Requirement,
    holidays: &HashSet<NaiveDate>,
    assigned: &mut HashSet<String>,
) -> Result<(Vec<Employee>, IcpmpOutcome), String> {
    let pattern = &requirement.work_pattern;
    let shift_codes = requirement.pattern_shift_codes();
    let headcount = requirement
        .headcount
        .as_ref()
        .map(|h| h.total_per_day(&shift_codes))
        .unwrap_or(1);

    let first_shift = demand.shifts.first();
    let coverage_days = first_shift
        .map(|s| s.coverage_days.day_names())
        .unwrap_or_else(|| crate::domain::CoverageDays::default().day_names());
    let include_ph = first_shift.is_none_or(|s| s.include_public_holidays);
    let anchor = first_shift
        .and_then(|s| s.coverage_anchor)
        .or(demand.shift_start_date)
        .unwrap_or(request.planning_horizon.start_date);

    let calendar = coverage_calendar(
        request.planning_horizon.start_date,
        request.planning_horizon.end_date,
        &coverage_days,
        holidays,
        include_ph,
    );

    let scheme_filter = requirement_schemes(requirement);
    let sizing_scheme = match &scheme_filter {
        SchemeFilter::List(schemes) if schemes.len() == 1 => schemes[0],
        // mixed pools are sized conservatively as full-time
        _ => Scheme::A,
    };
    let monthly_ot_cap = monthly_ot_cap_for(request, requirement, sizing_scheme);

    let (required, lower_bound, attempts, optimality, placement) = optimize_requirement(
        &requirement.requirement_id,
        pattern,
        headcount,
        &calendar,
        anchor,
        sizing_scheme,
        requirement.enable_ot_aware_icpmp,
        monthly_ot_cap,
    )?;

    let (selected, applied_buffer) = selection::select_for_requirement(
        request,
        demand,
        requirement,
        &placement,
        required,
        assigned,
    )?;

    let outcome = IcpmpOutcome {
        requirement_id: requirement.requirement_id.clone(),
        demand_id: demand.demand_id.clone(),
        employees_required: required,
        lower_bound,
        attempts,
        optimality,
        offset_distribution: placement.offset_distribution.clone(),
        coverage_rate: placement.coverage_rate,
        total_u_slots: placement.total_u_slots,
        selected_count: selected.len(),
        applied_buffer_percent: applied_buffer,
    };

    Ok((selected, outcome))
}

/// Monthly OT cap for sizing: the configured scheme/product-specific limit
/// when one matches, else the standard 72h.
fn monthly_ot_cap_for(request: &SolveRequest, requirement: &Requirement, scheme: Scheme) -> f64 {
    let product = requirement
        .product_type_id
        .clone()
        .or_else(|| requirement.product_type_ids.first().cloned())
        .unwrap_or_default();
    let start = request.planning_horizon.start_date;
    let month_length = shared::time::days_in_month(start.year(), start.month());
    request
        .monthly_hour_limits
        .iter()
        .filter(|limit| limit.applies_to(scheme, &product))
        .find_map(|limit| limit.values_for(month_length).and_then(|v| v.max_overtime_hours))
        .unwrap_or(72.0)
}
