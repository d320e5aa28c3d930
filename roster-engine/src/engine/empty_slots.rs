//! Empty-slots solve: the caller hands over an explicit list of unfilled
//! slots plus the hour/streak bookkeeping of whatever is already locked,
//! and the regular model/solve path fills what it can.

use std::collections::HashMap;

use crate::constraints::LockedBookkeeping;
use crate::domain::demand::normalize_qualifications;
use crate::domain::{EmptySlotSpec, EmptySlotsRequest, Slot};
use crate::error::EngineError;
use crate::output::{EmptySlotsMetadata, SolveOutput};
use crate::scheme::SchemeFilter;
use shared::time::WeekKey;

use super::{SolveOptions, run_pipeline};

pub fn solve_empty_slots(request: &EmptySlotsRequest) -> Result<SolveOutput, EngineError> {
    solve_empty_slots_with_options(request, &SolveOptions::default())
}

pub fn solve_empty_slots_with_options(
    request: &EmptySlotsRequest,
    options: &SolveOptions,
) -> Result<SolveOutput, EngineError> {
    if request.empty_slots.is_empty() {
        return Err(EngineError::Input("emptySlots must not be empty".into()));
    }
    if request.base.employees.is_empty() {
        return Err(EngineError::Input("employees must not be empty".into()));
    }

    let slots = request
        .empty_slots
        .iter()
        .enumerate()
        .map(|(i, spec)| slot_from_spec(spec, i, request))
        .collect::<Result<Vec<_>, _>>()?;

    let bookkeeping = parse_locked_context(request);
    let warnings = vec![format!(
        "empty-slots mode: filling {} explicit slot(s)",
        slots.len()
    )];

    // reconstruct demand items when the caller sent bare slots, so the
    // echoed document stays self-consistent
    let mut base = request.base.clone();
    if base.demand_items.is_empty() {
        base.demand_items = demand_items_from_slots(&request.empty_slots);
    }

    let outcome = run_pipeline(&base, options, warnings, Some(slots), Some(&bookkeeping))?;
    let mut output = outcome.output;

    output.empty_slots_metadata = Some(EmptySlotsMetadata {
        requested_slots: outcome.slots.len(),
        filled_slots: output.assignments.len(),
        locked_employees: request.locked_context.employee_assignments.len(),
    });
    Ok(output)
}

fn slot_from_spec(
    spec: &EmptySlotSpec,
    index: usize,
    request: &EmptySlotsRequest,
) -> Result<Slot, EngineError> {
    let start_time = shared::time::parse_clock(&spec.start).ok_or_else(|| {
        EngineError::Input(format!(
            "emptySlots[{index}].start '{}' is not HH:MM or HH:MM:SS",
            spec.start
        ))
    })?;
    let end_time = shared::time::parse_clock(&spec.end).ok_or_else(|| {
        EngineError::Input(format!(
            "emptySlots[{index}].end '{}' is not HH:MM or HH:MM:SS",
            spec.end
        ))
    })?;
    let start = spec.date.and_time(start_time);
    let mut end = spec.date.and_time(end_time);
    if spec.next_day || end <= start {
        end += chrono::Duration::days(1);
    }

    let schemes = match &spec.schemes {
        None => SchemeFilter::Any,
        Some(raw) => {
            let mut list = Vec::new();
            for value in raw {
                let lowered = value.trim().to_ascii_lowercase();
                if lowered == "any" || lowered == "global" {
                    list.clear();
                    break;
                }
                if let Some(scheme) = crate::scheme::normalize_scheme_opt(value) {
                    if !list.contains(&scheme) {
                        list.push(scheme);
                    }
                }
            }
            if list.is_empty() {
                SchemeFilter::Any
            } else {
                SchemeFilter::List(list)
            }
        }
    };

    let anchor = request.base.planning_horizon.start_date;
    Ok(Slot {
        slot_id: spec
            .slot_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}-{}-E{index}", spec.demand_id, spec.shift_code, spec.date)),
        demand_id: spec.demand_id.clone(),
        requirement_id: spec
            .requirement_id
            .clone()
            .unwrap_or_else(|| format!("{}-R0", spec.demand_id)),
        date: spec.date,
        shift_code: spec.shift_code.clone(),
        start,
        end,
        location_id: None,
        ou_id: None,
        product_type_ids: spec.product_type_id.iter().cloned().collect(),
        rank_ids: spec.rank_ids.clone(),
        gender: spec
            .gender
            .clone()
            .filter(|g| !g.eq_ignore_ascii_case("any")),
        schemes,
        required_qualifications: normalize_qualifications(&spec.required_qualifications),
        work_pattern: spec.work_pattern.clone(),
        pattern_start_date: anchor,
        coverage_anchor: anchor,
        coverage_days: vec![],
        whitelist: Default::default(),
        blacklist: Default::default(),
        preferred_teams: vec![],
        day_type: Default::default(),
        has_time_override: false,
    })
}

/// Parses the caller-supplied locked context: `"YYYY-Www"` week keys into
/// week pairs, plus streaks and last shift ends.
fn parse_locked_context(request: &EmptySlotsRequest) -> LockedBookkeeping {
    let mut bookkeeping = LockedBookkeeping {
        solve_from: request.locked_context.cutoff_date,
        ..LockedBookkeeping::default()
    };
    for entry in &request.locked_context.employee_assignments {
        for (key, hours) in &entry.weekly_hours {
            if let Some(week) = parse_week_key(key) {
                bookkeeping
                    .weekly_normal_hours
                    .insert((entry.employee_id.clone(), week), *hours);
            } else {
                tracing::warn!(%key, "ignoring malformed ISO week key in lockedContext");
            }
        }
        if entry.consecutive_working_days > 0 {
            bookkeeping
                .consecutive_before
                .insert(entry.employee_id.clone(), entry.consecutive_working_days);
        }
        if let Some(end) = entry.last_shift_end {
            bookkeeping
                .last_shift_end
                .insert(entry.employee_id.clone(), end);
        }
    }
    bookkeeping
}

fn parse_week_key(key: &str) -> Option<WeekKey> {
    let (year, week) = key.split_once("-W")?;
    Some((year.parse().ok()?, week.parse().ok()?))
}

/// Synthesises demand items from explicit slots, used when the caller did
/// not provide any (keeps the echoed input self-consistent).
pub fn demand_items_from_slots(specs: &[EmptySlotSpec]) -> Vec<crate::domain::DemandItem> {
    let mut by_demand: HashMap<&str, Vec<&EmptySlotSpec>> = HashMap::new();
    for spec in specs {
        by_demand.entry(spec.demand_id.as_str()).or_default().push(spec);
    }

    let mut demands: Vec<_> = by_demand
        .into_iter()
        .map(|(demand_id, members)| {
            let mut details: Vec<crate::domain::ShiftDetail> = Vec::new();
            for spec in &members {
                if !details.iter().any(|d| d.shift_code == spec.shift_code) {
                    details.push(crate::domain::ShiftDetail {
                        shift_code: spec.shift_code.clone(),
                        start: spec.start.clone(),
                        end: spec.end.clone(),
                        next_day: spec.next_day,
                    });
                }
            }
            let first = members[0];
            crate::domain::DemandItem {
                demand_id: demand_id.to_string(),
                location_id: None,
                ou_id: None,
                rostering_basis: None,
                min_staff_threshold_percentage: None,
                shift_start_date: None,
                shifts: vec![crate::domain::ShiftGroup {
                    coverage_days: Default::default(),
                    coverage_anchor: None,
                    include_public_holidays: true,
                    include_eve_of_public_holidays: true,
                    whitelist: Default::default(),
                    blacklist: Default::default(),
                    preferred_teams: vec![],
                    shift_details: details,
                }],
                requirements: vec![crate::domain::Requirement {
                    requirement_id: first
                        .requirement_id
                        .clone()
                        .unwrap_or_else(|| format!("{demand_id}-R0")),
                    product_type_id: first.product_type_id.clone(),
                    product_type_ids: vec![],
                    rank_ids: first.rank_ids.clone(),
                    gender: first.gender.clone(),
                    schemes: first.schemes.clone(),
                    scheme: None,
                    headcount: None,
                    daily_headcount: vec![],
                    work_pattern: first.work_pattern.clone(),
                    required_qualifications: first.required_qualifications.clone(),
                    icpmp_buffer_percentage: None,
                    enable_ot_aware_icpmp: true,
                }],
            }
        })
        .collect();
    demands.sort_by(|a, b| a.demand_id.cmp(&b.demand_id));
    demands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> EmptySlotsRequest {
        serde_json::from_value(json).unwrap()
    }

    fn base_json() -> serde_json::Value {
        serde_json::json!({
            "planningHorizon": {"startDate": "2026-01-01", "endDate": "2026-01-31"},
            "solverRunTime": {"maxSeconds": 2},
            "employees": [
                {"employeeId": "E1", "scheme": "Scheme A",
                 "workPattern": ["D","D","D","D","D","O","O"]}
            ],
            "emptySlots": [
                {"demandId": "D1", "date": "2026-01-20", "shiftCode": "D",
                 "start": "08:00", "end": "20:00"}
            ],
            "lockedContext": {
                "cutoffDate": "2026-01-19",
                "employeeAssignments": [{
                    "employeeId": "E1",
                    "weeklyHours": {"2026-W04": 35.2},
                    "consecutiveWorkingDays": 3
                }]
            }
        })
    }

    #[test]
    fn week_keys_parse_into_pairs() {
        assert_eq!(parse_week_key("2026-W04"), Some((2026, 4)));
        assert_eq!(parse_week_key("2026-W52"), Some((2026, 52)));
        assert_eq!(parse_week_key("garbage"), None);
    }

    #[test]
    fn locked_context_feeds_bookkeeping() {
        let req = request(base_json());
        let bookkeeping = parse_locked_context(&req);
        assert_eq!(
            bookkeeping.weekly_normal_hours[&("E1".to_string(), (2026, 4))],
            35.2
        );
        assert_eq!(bookkeeping.consecutive_before["E1"], 3);
    }

    #[test]
    fn slots_are_built_from_specs() {
        let req = request(base_json());
        let slot = slot_from_spec(&req.empty_slots[0], 0, &req).unwrap();
        assert_eq!(slot.demand_id, "D1");
        assert_eq!(slot.gross_hours(), 12.0);
        assert!(slot.start < slot.end);
    }

    #[test]
    fn bad_times_are_input_errors() {
        let mut json = base_json();
        json["emptySlots"][0]["start"] = "25:99".into();
        let req = request(json);
        let err = solve_empty_slots(&req).unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }

    #[test]
    fn demand_items_synthesised_from_slots() {
        let req = request(base_json());
        let demands = demand_items_from_slots(&req.empty_slots);
        assert_eq!(demands.len(), 1);
        assert_eq!(demands[0].demand_id, "D1");
        assert_eq!(demands[0].shifts[0].shift_details.len(), 1);
    }

    #[test]
    fn end_to_end_fill_respects_locked_weekly_hours() {
        let req = request(base_json());
        let output = solve_empty_slots(&req).unwrap();
        let meta = output.empty_slots_metadata.unwrap();
        assert_eq!(meta.requested_slots, 1);
        // 35.2h locked in week 4 leaves 8.8h; the 12h shift contributes
        // 8.8h normal, which still fits exactly
        assert_eq!(meta.filled_slots, 1);
    }
}
