//! Selecting real employees for a requirement's offsets.
//!
//! Eligible pool members are ranked by accumulated working hours (fairness)
//! with the employee id as the deterministic tie-break. Requirements that
//! accept several schemes are filled proportionally to scheme availability.

use std::collections::{BTreeMap, HashSet};

use crate::domain::employee::Employee;
use crate::domain::{DemandItem, Requirement, SolveRequest};
use crate::scheme::{normalize_scheme, requirement_schemes};
use super::placement::Placement;

const DEFAULT_BUFFER_PERCENT: f64 = 20.0;
const FALLBACK_BUFFER_PERCENT: f64 = 20.0;

/// Filters the pool down to employees this requirement may use.
pub fn filter_eligible(
    request: &SolveRequest,
    demand: &DemandItem,
    requirement: &Requirement,
    assigned: &HashSet<String>,
) -> Vec<Employee> {
    let products = requirement.accepted_product_types();
    let scheme_filter = requirement_schemes(requirement);
    let qual_groups = requirement.qualification_groups();
    let gender = requirement
        .gender
        .as_deref()
        .filter(|g| !g.eq_ignore_ascii_case("any"));
    let max_shift_hours = demand.max_shift_hours();
    let config = crate::domain::ConstraintConfig::new(request.constraint_list.clone());

    let first_shift = demand.shifts.first();
    let whitelist = first_shift.map(|s| &s.whitelist);
    let blacklist = first_shift.map(|s| &s.blacklist);

    request
        .employees
        .iter()
        .filter(|emp| !assigned.contains(&emp.employee_id))
        .filter(|emp| {
            blacklist.is_none_or(|b| !b.employee_ids.contains(&emp.employee_id))
        })
        .filter(|emp| match whitelist {
            Some(list) if !list.is_empty() => {
                list.employee_ids.contains(&emp.employee_id)
                    || emp
                        .team_id
                        .as_ref()
                        .is_some_and(|team| list.team_ids.contains(team))
            }
            _ => true,
        })
        .filter(|emp| {
            products.is_empty()
                || emp
                    .product_type_id
                    .as_ref()
                    .is_some_and(|p| products.contains(p))
        })
        .filter(|emp| {
            requirement.rank_ids.is_empty()
                || emp
                    .rank_id
                    .as_ref()
                    .is_some_and(|r| requirement.rank_ids.contains(r))
        })
        .filter(|emp| {
            demand.ou_id.is_none()
                || emp.ou_id.is_none()
                || emp.ou_id == demand.ou_id
        })
        .filter(|emp| gender.is_none_or(|g| emp.gender.as_deref() == Some(g)))
        .filter(|emp| {
            let scheme = normalize_scheme(emp.scheme.as_deref());
            scheme_filter.accepts(scheme)
        })
        .filter(|emp| {
            // the longest demanded shift must fit the scheme's daily cap
            let scheme = normalize_scheme(emp.scheme.as_deref());
            let cap = config.value(
                "momDailyHoursCap",
                Some(scheme),
                scheme.default_daily_cap_hours(),
            );
            max_shift_hours <= cap
        })
        .filter(|emp| {
            // every qualification group must be satisfiable on day one;
            // per-date expiry is re-checked by the constraint layer
            crate::scheme::meets_qualification_groups(
                emp,
                &qual_groups,
                request.planning_horizon.start_date,
            )
        })
        .cloned()
        .collect()
}

/// Selects `required` employees (plus buffer) and assigns offsets + rotated
/// patterns. Returns the selection and the buffer percentage actually
/// applied.
pub fn select_for_requirement(
    request: &SolveRequest,
    demand: &DemandItem,
    requirement: &Requirement,
    placement: &Placement,
    required: usize,
    assigned: &mut HashSet<String>,
) -> Result<(Vec<Employee>, f64), String> {
    let eligible = filter_eligible(request, demand, requirement, assigned);
    let available = eligible.len();

    let requested_buffer = requirement
        .icpmp_buffer_percentage
        .unwrap_or(DEFAULT_BUFFER_PERCENT)
        .max(0.0);

    let buffered = |percent: f64| -> usize {
        (required as f64 * (1.0 + percent / 100.0)).floor() as usize
    };

    // Buffer fallback: a generous buffer is dropped to the default once
    // before the requirement is declared short of people.
    let mut target = buffered(requested_buffer);
    let mut applied_buffer = requested_buffer;
    if target > available && requested_buffer > FALLBACK_BUFFER_PERCENT {
        let fallback = buffered(FALLBACK_BUFFER_PERCENT);
        if fallback <= available {
            target = fallback;
            applied_buffer = FALLBACK_BUFFER_PERCENT;
            tracing::info!(
                requirement_id = %requirement.requirement_id,
                from = requested_buffer,
                to = FALLBACK_BUFFER_PERCENT,
                "buffer reduced to fit available pool"
            );
        }
    }

    if available < target {
        return Err(format!(
            "insufficient employees for requirement {}: need {target}, {available} available",
            requirement.requirement_id
        ));
    }

    let selected = select_balanced(eligible, target, requirement);

    // i-th selected employee takes the i-th offset; the offset list is
    // extended cyclically when the buffer added heads beyond the placement.
    let mut offset_list: Vec<usize> = Vec::with_capacity(target);
    for (offset, count) in &placement.offset_distribution {
        offset_list.extend(std::iter::repeat_n(*offset, *count));
    }
    let base_offsets: Vec<usize> = placement.offset_distribution.keys().copied().collect();
    let mut wheel = base_offsets.iter().cycle();
    while offset_list.len() < target {
        offset_list.push(*wheel.next().unwrap_or(&0));
    }

    let policy = request.fixed_rotation_offset.clone().unwrap_or_default();
    let cycle = requirement.work_pattern.len().max(1);

    // teamOffsets: each distinct team takes the next offset around the cycle
    let mut team_offsets: BTreeMap<String, usize> = BTreeMap::new();
    if policy.is_team_based() {
        let mut teams: Vec<String> = selected
            .iter()
            .filter_map(|emp| emp.team_id.clone())
            .collect();
        teams.sort();
        teams.dedup();
        for (i, team) in teams.into_iter().enumerate() {
            team_offsets.insert(team, i % cycle);
        }
    }

    let base_pattern = &requirement.work_pattern;
    let mut out = Vec::with_capacity(selected.len());
    for (i, mut emp) in selected.into_iter().enumerate() {
        let offset = if policy.is_ou_based() {
            request
                .ou_offsets
                .iter()
                .find(|o| Some(&o.ou_id) == emp.ou_id.as_ref())
                .map(|o| o.rotation_offset % cycle)
                .unwrap_or(0)
        } else if policy.is_team_based() {
            emp.team_id
                .as_ref()
                .and_then(|team| team_offsets.get(team).copied())
                .unwrap_or(0)
        } else if !policy.staggers() {
            // fixed: honour the offset the employee came in with
            emp.rotation_offset % cycle
        } else {
            offset_list.get(i).copied().unwrap_or(0)
        };
        emp.rotation_offset = offset;
        emp.work_pattern = rotate_pattern(base_pattern, offset);
        emp.icpmp_requirement_id = Some(requirement.requirement_id.clone());
        assigned.insert(emp.employee_id.clone());
        out.push(emp);
    }

    Ok((out, applied_buffer))
}

/// `pattern[offset..] ++ pattern[..offset]`.
pub fn rotate_pattern(pattern: &[String], offset: usize) -> Vec<String> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let offset = offset % pattern.len();
    let mut rotated = Vec::with_capacity(pattern.len());
    rotated.extend_from_slice(&pattern[offset..]);
    rotated.extend_from_slice(&pattern[..offset]);
    rotated
}

/// Fairness-first selection: fewest accumulated hours wins, employee id
/// breaks ties. Multi-scheme requirements split the picks proportionally to
/// scheme availability.
fn select_balanced(
    mut eligible: Vec<Employee>,
    target: usize,
    requirement: &Requirement,
) -> Vec<Employee> {
    eligible.sort_by(|a, b| {
        a.total_working_hours
            .total_cmp(&b.total_working_hours)
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });

    let scheme_filter = requirement_schemes(requirement);
    if !scheme_filter.is_multi() {
        eligible.truncate(target);
        return eligible;
    }

    // proportional allocation across the schemes actually present
    let mut groups: BTreeMap<&'static str, Vec<Employee>> = BTreeMap::new();
    for emp in eligible {
        let scheme = normalize_scheme(emp.scheme.as_deref());
        groups.entry(scheme.as_str()).or_default().push(emp);
    }

    let total_available: usize = groups.values().map(Vec::len).sum();
    if total_available == 0 {
        return Vec::new();
    }

    let mut allocation: BTreeMap<&'static str, usize> = BTreeMap::new();
    for (scheme, members) in &groups {
        let share = members.len() as f64 / total_available as f64;
        allocation.insert(scheme, ((share * target as f64).round() as usize).max(1));
    }

    // trim or grow so the allocation sums to the target exactly
    let mut allocated: usize = allocation.values().sum();
    while allocated > target {
        let largest = allocation
            .iter()
            .filter(|(_, count)| **count > 1)
            .max_by_key(|(_, count)| **count)
            .map(|(scheme, _)| *scheme);
        let Some(scheme) = largest else { break };
        if let Some(count) = allocation.get_mut(scheme) {
            *count -= 1;
            allocated -= 1;
        }
    }
    if allocated < target {
        let largest = groups
            .iter()
            .max_by_key(|(_, members)| members.len())
            .map(|(scheme, _)| *scheme);
        if let Some(scheme) = largest {
            *allocation.entry(scheme).or_default() += target - allocated;
        }
    }

    let mut selected: Vec<Employee> = Vec::with_capacity(target);
    for (scheme, count) in allocation {
        let members = groups.remove(scheme).unwrap_or_default();
        selected.extend(members.into_iter().take(count));
    }

    selected.sort_by(|a, b| {
        a.total_working_hours
            .total_cmp(&b.total_working_hours)
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
    selected.truncate(target);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Headcount;
    use crate::scheme::Scheme;
    use chrono::NaiveDate;

    fn pattern(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn employee(id: &str, scheme: &str, hours: f64) -> Employee {
        Employee {
            employee_id: id.into(),
            scheme: Some(scheme.into()),
            product_type_id: Some("APO".into()),
            rank_id: Some("CPL".into()),
            gender: Some("M".into()),
            local: 1,
            qualifications: vec![],
            work_pattern: vec![],
            rotation_offset: 0,
            total_working_hours: hours,
            team_id: None,
            ou_id: None,
            icpmp_requirement_id: None,
            not_available_from: None,
            leave_windows: vec![],
        }
    }

    fn requirement() -> Requirement {
        Requirement {
            requirement_id: "R1".into(),
            product_type_id: Some("APO".into()),
            product_type_ids: vec![],
            rank_ids: vec!["CPL".into()],
            gender: None,
            schemes: Some(vec!["Scheme A".into()]),
            scheme: None,
            headcount: Some(Headcount::PerShiftType(1)),
            daily_headcount: vec![],
            work_pattern: pattern("DDDDDOO"),
            required_qualifications: vec![],
            icpmp_buffer_percentage: Some(0.0),
            enable_ot_aware_icpmp: false,
        }
    }

    fn request(employees: Vec<Employee>) -> SolveRequest {
        serde_json::from_value(serde_json::json!({
            "planningHorizon": {"startDate": "2026-01-01", "endDate": "2026-01-31"}
        }))
        .map(|mut r: SolveRequest| {
            r.employees = employees;
            r
        })
        .unwrap()
    }

    #[test]
    fn rotation_is_a_left_shift() {
        assert_eq!(rotate_pattern(&pattern("DDDOO"), 0), pattern("DDDOO"));
        assert_eq!(rotate_pattern(&pattern("DDDOO"), 2), pattern("DOODD"));
        assert_eq!(rotate_pattern(&pattern("DDDOO"), 5), pattern("DDDOO"));
    }

    #[test]
    fn selection_prefers_fewest_hours_then_id() {
        let emps = vec![
            employee("E3", "Scheme A", 10.0),
            employee("E1", "Scheme A", 5.0),
            employee("E2", "Scheme A", 5.0),
        ];
        let selected = select_balanced(emps, 2, &requirement());
        let ids: Vec<_> = selected.iter().map(|e| e.employee_id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2"]);
    }

    #[test]
    fn multi_scheme_selection_is_proportional() {
        let mut req = requirement();
        req.schemes = Some(vec!["Any".into()]);
        let mut emps = Vec::new();
        for i in 0..8 {
            emps.push(employee(&format!("A{i}"), "Scheme A", i as f64));
        }
        for i in 0..4 {
            emps.push(employee(&format!("P{i}"), "Scheme P", i as f64));
        }
        let selected = select_balanced(emps, 6, &req);
        assert_eq!(selected.len(), 6);
        let schemes: Vec<_> = selected
            .iter()
            .map(|e| normalize_scheme(e.scheme.as_deref()))
            .collect();
        assert!(schemes.contains(&Scheme::A));
        assert!(schemes.contains(&Scheme::P));
    }

    #[test]
    fn select_for_requirement_marks_ownership_and_rotates() {
        let req = requirement();
        let demand = DemandItem {
            demand_id: "D1".into(),
            location_id: None,
            ou_id: None,
            rostering_basis: None,
            min_staff_threshold_percentage: None,
            shift_start_date: None,
            shifts: vec![],
            requirements: vec![req.clone()],
        };
        let employees: Vec<Employee> = (0..10)
            .map(|i| employee(&format!("E{i:02}"), "Scheme A", 0.0))
            .collect();
        let solve_request = request(employees);

        let cal: Vec<NaiveDate> = {
            let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            (0..31).map(|i| first + chrono::Duration::days(i)).collect()
        };
        let placement = super::super::placement::try_placement(7, &req.work_pattern, 5, &cal, cal[0]);
        assert!(placement.feasible);

        let mut assigned = HashSet::new();
        let (selected, buffer) = select_for_requirement(
            &solve_request,
            &demand,
            &req,
            &placement,
            7,
            &mut assigned,
        )
        .unwrap();

        assert_eq!(buffer, 0.0);
        assert_eq!(selected.len(), 7);
        assert_eq!(assigned.len(), 7);
        for (i, emp) in selected.iter().enumerate() {
            assert_eq!(emp.rotation_offset, i);
            assert_eq!(emp.icpmp_requirement_id.as_deref(), Some("R1"));
            assert_eq!(emp.work_pattern, rotate_pattern(&req.work_pattern, i));
        }
    }

    #[test]
    fn fixed_offset_policy_keeps_incoming_offsets() {
        let req = requirement();
        let demand = DemandItem {
            demand_id: "D1".into(),
            location_id: None,
            ou_id: None,
            rostering_basis: None,
            min_staff_threshold_percentage: None,
            shift_start_date: None,
            shifts: vec![],
            requirements: vec![req.clone()],
        };
        let mut employees: Vec<Employee> = (0..10)
            .map(|i| employee(&format!("E{i:02}"), "Scheme A", 0.0))
            .collect();
        for (i, emp) in employees.iter_mut().enumerate() {
            emp.rotation_offset = (i + 3) % 7;
        }
        let mut solve_request = request(employees);
        solve_request.fixed_rotation_offset = Some(crate::domain::OffsetPolicy::Fixed(true));

        let cal: Vec<NaiveDate> = {
            let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            (0..31).map(|i| first + chrono::Duration::days(i)).collect()
        };
        let placement =
            super::super::placement::try_placement(7, &req.work_pattern, 5, &cal, cal[0]);

        let mut assigned = HashSet::new();
        let (selected, _) =
            select_for_requirement(&solve_request, &demand, &req, &placement, 7, &mut assigned)
                .unwrap();
        for (i, emp) in selected.iter().enumerate() {
            assert_eq!(emp.rotation_offset, (i + 3) % 7);
        }
    }

    #[test]
    fn insufficient_pool_is_an_error() {
        let req = requirement();
        let demand = DemandItem {
            demand_id: "D1".into(),
            location_id: None,
            ou_id: None,
            rostering_basis: None,
            min_staff_threshold_percentage: None,
            shift_start_date: None,
            shifts: vec![],
            requirements: vec![req.clone()],
        };
        let solve_request = request(vec![employee("E1", "Scheme A", 0.0)]);
        let cal: Vec<NaiveDate> = {
            let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            (0..31).map(|i| first + chrono::Duration::days(i)).collect()
        };
        let placement = super::super::placement::try_placement(7, &req.work_pattern, 5, &cal, cal[0]);

        let mut assigned = HashSet::new();
        let err = select_for_requirement(
            &solve_request,
            &demand,
            &req,
            &placement,
            7,
            &mut assigned,
        )
        .unwrap_err();
        assert!(err.contains("insufficient employees"));
    }
}
