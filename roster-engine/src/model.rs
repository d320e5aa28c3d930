//! The 0/1 decision model.
//!
//! One boolean variable per compatible `(slot, employee)` pair; pairs that
//! fail any filter simply get no variable, which is the primary model-size
//! control. Constraints come in two shapes the search can check
//! incrementally:
//!
//! - at-most-one groups (slot occupancy, one-shift-per-day, rest pairs)
//! - weighted linear sums with an integer upper bound, in tenths of an hour
//!   (weekly normal caps, monthly OT, consecutive-day windows)
//!
//! Variables and slots are dereferenced by index throughout; the model
//! holds no references into the request.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::employee::Employee;
use crate::domain::Slot;
use crate::scheme::{is_apgd_d10, meets_qualification_groups, normalize_scheme};

pub type VarId = usize;

/// The `(slot, employee)` pair behind a decision variable.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub slot: usize,
    pub emp: usize,
}

/// A weighted linear constraint `sum(coeff_i * x_i) <= upper`.
#[derive(Debug, Clone)]
pub struct LinearConstraint {
    /// Constraint taxonomy id, e.g. `"C2"`; used for score breakdowns.
    pub kind: &'static str,
    pub terms: Vec<(VarId, i64)>,
    pub upper: i64,
}

/// A group of variables of which at most `cap` may be set.
#[derive(Debug, Clone)]
pub struct AtMostGroup {
    pub kind: &'static str,
    pub vars: Vec<VarId>,
    pub cap: u32,
}

#[derive(Debug, Default)]
pub struct Model {
    pub candidates: Vec<Candidate>,
    /// Slot index to its candidate variables.
    pub by_slot: Vec<Vec<VarId>>,
    /// Employee index to its candidate variables.
    pub by_emp: Vec<Vec<VarId>>,
    pub groups: Vec<AtMostGroup>,
    pub linear: Vec<LinearConstraint>,
    /// Per-variable soft penalty charged when the variable is set.
    pub var_penalty: Vec<i64>,
}

impl Model {
    pub fn var_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn add_group(&mut self, kind: &'static str, vars: Vec<VarId>, cap: u32) {
        if vars.len() > cap as usize {
            self.groups.push(AtMostGroup { kind, vars, cap });
        }
    }

    pub fn add_linear(&mut self, kind: &'static str, terms: Vec<(VarId, i64)>, upper: i64) {
        if !terms.is_empty() {
            self.linear.push(LinearConstraint { kind, terms, upper });
        }
    }
}

/// Everything the builder and constraint emitters need about an employee,
/// precomputed once.
#[derive(Debug, Clone)]
pub struct EmployeeView {
    pub scheme: crate::scheme::Scheme,
    pub apgd_d10: bool,
    pub pattern_work_days: usize,
}

pub fn employee_views(employees: &[Employee]) -> Vec<EmployeeView> {
    employees
        .iter()
        .map(|emp| EmployeeView {
            scheme: normalize_scheme(emp.scheme.as_deref()),
            apgd_d10: is_apgd_d10(emp),
            pattern_work_days: emp.pattern_work_days(),
        })
        .collect()
}

/// Compatibility filter applied before a variable is created.
///
/// Mirrors the slot's copied requirement filters: ownership, product, rank,
/// scheme, gender, whitelist/blacklist, qualification validity on the slot
/// date, and the scheme daily cap against the shift duration (C1).
pub fn is_compatible(
    slot: &Slot,
    employee: &Employee,
    view: &EmployeeView,
    daily_cap_hours: f64,
    enforce_ownership: bool,
) -> bool {
    if enforce_ownership {
        if let Some(owner) = &employee.icpmp_requirement_id {
            if *owner != slot.requirement_id {
                return false;
            }
        }
    }
    if slot.blacklist.employee_ids.contains(&employee.employee_id) {
        return false;
    }
    if !slot.whitelist.is_empty() {
        let listed = slot.whitelist.employee_ids.contains(&employee.employee_id)
            || employee
                .team_id
                .as_ref()
                .is_some_and(|team| slot.whitelist.team_ids.contains(team));
        if !listed {
            return false;
        }
    }
    if !slot.product_type_ids.is_empty()
        && !employee
            .product_type_id
            .as_ref()
            .is_some_and(|p| slot.product_type_ids.contains(p))
    {
        return false;
    }
    if !slot.rank_ids.is_empty()
        && !employee
            .rank_id
            .as_ref()
            .is_some_and(|r| slot.rank_ids.contains(r))
    {
        return false;
    }
    if let Some(gender) = &slot.gender {
        if employee.gender.as_deref() != Some(gender.as_str()) {
            return false;
        }
    }
    if !slot.schemes.accepts(view.scheme) {
        return false;
    }
    if slot.gross_hours() > daily_cap_hours {
        return false;
    }
    if !employee.is_available_on(slot.date) {
        return false;
    }
    meets_qualification_groups(employee, &slot.required_qualifications, slot.date)
}

/// Creates the decision variables and the structural groups every solve
/// carries: at-most-one per slot and one-shift-per-day per employee.
pub fn build_model(
    slots: &[Slot],
    employees: &[Employee],
    views: &[EmployeeView],
    config: &crate::domain::ConstraintConfig,
    enforce_ownership: bool,
) -> Model {
    let mut model = Model {
        by_slot: vec![Vec::new(); slots.len()],
        by_emp: vec![Vec::new(); employees.len()],
        ..Model::default()
    };

    for (slot_idx, slot) in slots.iter().enumerate() {
        for (emp_idx, employee) in employees.iter().enumerate() {
            let view = &views[emp_idx];
            let cap = config.value(
                "momDailyHoursCap",
                Some(view.scheme),
                view.scheme.default_daily_cap_hours(),
            );
            if !is_compatible(slot, employee, view, cap, enforce_ownership) {
                continue;
            }
            let var = model.candidates.len();
            model.candidates.push(Candidate {
                slot: slot_idx,
                emp: emp_idx,
            });
            model.by_slot[slot_idx].push(var);
            model.by_emp[emp_idx].push(var);
        }
    }
    model.var_penalty = vec![0; model.candidates.len()];

    // one employee per slot
    for slot_vars in model.by_slot.clone() {
        model.add_group("slot", slot_vars, 1);
    }

    // at most one slot per employee per civil date
    let mut per_day: HashMap<(usize, NaiveDate), Vec<VarId>> = HashMap::new();
    for (var, cand) in model.candidates.iter().enumerate() {
        per_day
            .entry((cand.emp, slots[cand.slot].date))
            .or_default()
            .push(var);
    }
    let mut day_groups: Vec<_> = per_day.into_iter().collect();
    day_groups.sort_by_key(|((emp, date), _)| (*emp, *date));
    for ((_, _), vars) in day_groups {
        model.add_group("one-per-day", vars, 1);
    }

    tracing::info!(
        variables = model.var_count(),
        slots = slots.len(),
        employees = employees.len(),
        "decision model built"
    );
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConstraintConfig, QualGroup, QualMatchType, RosterList};
    use crate::scheme::SchemeFilter;
    use chrono::NaiveDate;

    fn slot(date: (i32, u32, u32), hours: i64) -> Slot {
        let d = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        let start = d.and_hms_opt(8, 0, 0).unwrap();
        Slot {
            slot_id: "S1".into(),
            demand_id: "D1".into(),
            requirement_id: "R1".into(),
            date: d,
            shift_code: "D".into(),
            start,
            end: start + chrono::Duration::hours(hours),
            location_id: None,
            ou_id: None,
            product_type_ids: vec!["APO".into()],
            rank_ids: vec![],
            gender: None,
            schemes: SchemeFilter::Any,
            required_qualifications: vec![],
            work_pattern: vec!["D".into(), "O".into()],
            pattern_start_date: d,
            coverage_anchor: d,
            coverage_days: vec![],
            whitelist: RosterList::default(),
            blacklist: RosterList::default(),
            preferred_teams: vec![],
            day_type: Default::default(),
            has_time_override: false,
        }
    }

    fn employee(id: &str, scheme: &str) -> Employee {
        Employee {
            employee_id: id.into(),
            scheme: Some(scheme.into()),
            product_type_id: Some("APO".into()),
            rank_id: None,
            gender: Some("M".into()),
            local: 1,
            qualifications: vec![],
            work_pattern: vec!["D".into(), "O".into()],
            rotation_offset: 0,
            total_working_hours: 0.0,
            team_id: None,
            ou_id: None,
            icpmp_requirement_id: Some("R1".into()),
            not_available_from: None,
            leave_windows: vec![],
        }
    }

    #[test]
    fn incompatible_pairs_get_no_variable() {
        let slots = vec![slot((2026, 1, 5), 12)];
        let employees = vec![
            employee("E1", "Scheme A"),
            // scheme P daily cap is 9h, the 12h slot filters this one out
            employee("E2", "Scheme P"),
        ];
        let views = employee_views(&employees);
        let model = build_model(
            &slots,
            &employees,
            &views,
            &ConstraintConfig::default(),
            true,
        );
        assert_eq!(model.var_count(), 1);
        assert_eq!(model.candidates[0].emp, 0);
    }

    #[test]
    fn ownership_excludes_foreign_requirements() {
        let slots = vec![slot((2026, 1, 5), 8)];
        let mut other = employee("E1", "Scheme A");
        other.icpmp_requirement_id = Some("R2".into());
        let employees = vec![other];
        let views = employee_views(&employees);
        let model = build_model(
            &slots,
            &employees,
            &views,
            &ConstraintConfig::default(),
            true,
        );
        assert_eq!(model.var_count(), 0);
    }

    #[test]
    fn expired_qualification_blocks_variable() {
        // Scenario F: qualification expired before the slot date
        let mut s = slot((2026, 1, 20), 8);
        s.required_qualifications = vec![QualGroup {
            group_id: None,
            match_type: QualMatchType::All,
            qualifications: vec!["Q1".into()],
        }];
        let mut emp = employee("E5", "Scheme A");
        emp.qualifications = vec![crate::domain::employee::Qualification::Full {
            code: "Q1".into(),
            valid_from: None,
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 15),
        }];
        let employees = vec![emp];
        let views = employee_views(&employees);
        let model = build_model(
            &slots_vec(s),
            &employees,
            &views,
            &ConstraintConfig::default(),
            true,
        );
        assert_eq!(model.var_count(), 0);
    }

    fn slots_vec(s: Slot) -> Vec<Slot> {
        vec![s]
    }

    #[test]
    fn one_per_day_groups_cover_same_day_slots() {
        let mut s1 = slot((2026, 1, 5), 8);
        let mut s2 = slot((2026, 1, 5), 8);
        s1.slot_id = "S1".into();
        s2.slot_id = "S2".into();
        let employees = vec![employee("E1", "Scheme A")];
        let views = employee_views(&employees);
        let model = build_model(
            &[s1, s2],
            &employees,
            &views,
            &ConstraintConfig::default(),
            true,
        );
        assert_eq!(model.var_count(), 2);
        assert!(model
            .groups
            .iter()
            .any(|g| g.kind == "one-per-day" && g.vars.len() == 2));
    }
}
