//! Incremental re-solve: keep a locked prefix of a previous roster, free
//! the assignments invalidated by employee changes, and re-solve only the
//! temporal window.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};

use crate::constraints::LockedBookkeeping;
use crate::domain::employee::Employee;
use crate::domain::{
    AssignmentRecord, AssignmentStatus, AuditInfo, EmployeeChanges, IncrementalRequest, Slot,
    TemporalWindow,
};
use crate::error::EngineError;
use crate::hours::HourParams;
use crate::output::{self, IncrementalSummary, SolveOutput, compute_input_hash};
use crate::slots::build_slots;

use super::{SolveOptions, run_pipeline};

pub fn solve_incremental(request: &IncrementalRequest) -> Result<SolveOutput, EngineError> {
    solve_incremental_with_options(request, &SolveOptions::default())
}

pub fn solve_incremental_with_options(
    request: &IncrementalRequest,
    options: &SolveOptions,
) -> Result<SolveOutput, EngineError> {
    validate_window(&request.temporal_window)?;

    let report = crate::validate::validate(&request.base);
    if !report.is_valid() {
        return Err(EngineError::Validation { report });
    }
    let mut warnings: Vec<String> = report
        .warnings
        .iter()
        .map(|w| format!("{}: {}", w.field, w.message))
        .collect();

    let window = request.temporal_window;

    // classify the previous roster into locked and freed assignments
    let (mut locked_assignments, freed) = classify_assignments(
        &request.previous_output.assignments,
        &window,
        &request.employee_changes,
    );
    tracing::info!(
        locked = locked_assignments.len(),
        freed = freed.len(),
        "previous assignments classified"
    );

    // employee pool: base plus joiners, with availability changes applied
    let mut base = request.base.clone();
    base.employees = build_employee_pool(&base.employees, &request.employee_changes);

    // locked hour and streak bookkeeping feeds the hour-cap constraints
    let config = crate::domain::ConstraintConfig::new(base.constraint_list.clone());
    let hour_params = HourParams::from_config(&config);
    output::annotate_hours(&mut locked_assignments, &base.employees, &hour_params);
    let bookkeeping = locked_bookkeeping(&locked_assignments, window.solve_from_date);

    // slots limited to the solve window, minus positions locked in place
    let window_slots = window_slots(&base, &locked_assignments, &window);
    warnings.push(format!(
        "incremental mode: re-solving {} slot(s) between {} and {}",
        window_slots.len(),
        window.solve_from_date,
        window.solve_to_date
    ));

    let outcome = run_pipeline(
        &base,
        options,
        warnings,
        Some(window_slots),
        Some(&bookkeeping),
    )?;
    let solvable = outcome.slots.len();
    let mut output = outcome.output;

    // provenance on every emitted assignment
    let run_id = output.solver_run.run_id.clone();
    let input_hash = compute_input_hash(&base);
    let now = Utc::now().naive_utc();
    for assignment in &mut output.assignments {
        assignment.audit_info = Some(AuditInfo {
            solver_run_id: run_id.clone(),
            source: "incremental".to_string(),
            timestamp: now,
            input_hash: input_hash.clone(),
        });
    }
    for assignment in &mut locked_assignments {
        assignment.audit_info = Some(AuditInfo {
            solver_run_id: run_id.clone(),
            source: "locked".to_string(),
            timestamp: now,
            input_hash: input_hash.clone(),
        });
    }

    let new_count = output.assignments.len();
    let locked_count = locked_assignments.len();

    // merge and rebuild the aggregate views over the full roster
    let mut all_assignments = locked_assignments;
    all_assignments.append(&mut output.assignments);
    all_assignments.sort_by(|a, b| (a.date, &a.employee_id).cmp(&(b.date, &b.employee_id)));

    output.employee_roster =
        output::build_employee_roster(&base, &outcome.selected, &all_assignments);
    output.roster_summary = output::summarise_roster(&output.employee_roster);
    output.meta.employee_hours = output::employee_hour_totals(&all_assignments);
    output.assignments = all_assignments;

    output.incremental_solve = Some(IncrementalSummary {
        cutoff_date: window.cutoff_date,
        solve_from_date: window.solve_from_date,
        solve_to_date: window.solve_to_date,
        locked_assignments_count: locked_count,
        new_assignments_count: new_count,
        solvable_slots: solvable,
        unassigned_slots: solvable.saturating_sub(new_count),
    });

    Ok(output)
}

fn validate_window(window: &TemporalWindow) -> Result<(), EngineError> {
    if window.cutoff_date >= window.solve_from_date {
        return Err(EngineError::Input(format!(
            "cutoffDate {} must be before solveFromDate {}",
            window.cutoff_date, window.solve_from_date
        )));
    }
    if window.solve_from_date > window.solve_to_date {
        return Err(EngineError::Input(format!(
            "solveFromDate {} must not be after solveToDate {}",
            window.solve_from_date, window.solve_to_date
        )));
    }
    Ok(())
}

fn is_departed(changes: &EmployeeChanges, employee_id: &str, date: NaiveDate) -> bool {
    changes
        .not_available_from
        .iter()
        .any(|e| e.employee_id == employee_id && date >= e.not_available_from)
}

fn is_on_leave(changes: &EmployeeChanges, employee_id: &str, date: NaiveDate) -> bool {
    changes
        .long_leave
        .iter()
        .any(|e| e.employee_id == employee_id && e.leave_from <= date && date <= e.leave_to)
}

/// Locked/freed classification.
///
/// Assignments before the cutoff are locked unconditionally. Within the
/// solve window, assignments held by departed or on-leave employees are
/// freed for re-solve; everything else stays locked.
pub(crate) fn classify_assignments(
    previous: &[AssignmentRecord],
    window: &TemporalWindow,
    changes: &EmployeeChanges,
) -> (Vec<AssignmentRecord>, Vec<AssignmentRecord>) {
    let mut locked = Vec::new();
    let mut freed = Vec::new();

    for assignment in previous {
        if assignment.status != AssignmentStatus::Assigned {
            continue;
        }
        if assignment.date < window.cutoff_date {
            locked.push(assignment.clone());
            continue;
        }
        let in_window = assignment.date >= window.solve_from_date
            && assignment.date <= window.solve_to_date;
        if in_window
            && (is_departed(changes, &assignment.employee_id, assignment.date)
                || is_on_leave(changes, &assignment.employee_id, assignment.date))
        {
            freed.push(assignment.clone());
        } else {
            locked.push(assignment.clone());
        }
    }
    (locked, freed)
}

fn build_employee_pool(employees: &[Employee], changes: &EmployeeChanges) -> Vec<Employee> {
    let mut pool: Vec<Employee> = employees.to_vec();
    let known: HashSet<String> = pool.iter().map(|e| e.employee_id.clone()).collect();
    for joiner in &changes.new_joiners {
        if !known.contains(joiner.employee_id.as_str()) {
            pool.push(joiner.clone());
        }
    }
    for employee in &mut pool {
        if let Some(entry) = changes
            .not_available_from
            .iter()
            .find(|e| e.employee_id == employee.employee_id)
        {
            employee.not_available_from = Some(entry.not_available_from);
        }
        for leave in &changes.long_leave {
            if leave.employee_id == employee.employee_id {
                employee.leave_windows.push((leave.leave_from, leave.leave_to));
            }
        }
    }
    pool
}

/// Committed totals from the locked roster: per-week normal hours, the work
/// streak ending right before the window, and the last shift end.
pub(crate) fn locked_bookkeeping(
    locked: &[AssignmentRecord],
    solve_from: NaiveDate,
) -> LockedBookkeeping {
    let mut bookkeeping = LockedBookkeeping {
        solve_from: Some(solve_from),
        ..LockedBookkeeping::default()
    };

    let mut worked_dates: HashMap<&str, HashSet<NaiveDate>> = HashMap::new();
    for assignment in locked {
        let week = shared::time::week_key(assignment.date);
        *bookkeeping
            .weekly_normal_hours
            .entry((assignment.employee_id.clone(), week))
            .or_default() += assignment.hours.normal;

        worked_dates
            .entry(assignment.employee_id.as_str())
            .or_default()
            .insert(assignment.date);

        let last = bookkeeping
            .last_shift_end
            .entry(assignment.employee_id.clone())
            .or_insert(assignment.end_date_time);
        if assignment.end_date_time > *last {
            *last = assignment.end_date_time;
        }
    }

    for (employee_id, dates) in worked_dates {
        let mut streak = 0u32;
        let mut day = solve_from.pred_opt();
        while let Some(d) = day {
            if !dates.contains(&d) {
                break;
            }
            streak += 1;
            day = d.pred_opt();
        }
        if streak > 0 {
            bookkeeping
                .consecutive_before
                .insert(employee_id.to_string(), streak);
        }
    }
    bookkeeping
}

/// Slots inside the solve window, with positions already held by locked
/// assignments removed.
fn window_slots(
    base: &crate::domain::SolveRequest,
    locked: &[AssignmentRecord],
    window: &TemporalWindow,
) -> Vec<Slot> {
    let mut occupied: HashMap<(NaiveDate, String, String), usize> = HashMap::new();
    for assignment in locked {
        if assignment.date >= window.solve_from_date && assignment.date <= window.solve_to_date {
            let demand = assignment.demand_id.as_deref().unwrap_or("").to_string();
            *occupied
                .entry((assignment.date, demand, assignment.shift_code.clone()))
                .or_default() += 1;
        }
    }

    build_slots(base)
        .into_iter()
        .filter(|slot| slot.date >= window.solve_from_date && slot.date <= window.solve_to_date)
        .filter(|slot| {
            let key = (slot.date, slot.demand_id.clone(), slot.shift_code.clone());
            match occupied.get_mut(&key) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::{LongLeaveEntry, NotAvailableEntry};
    use crate::domain::HourBreakdown;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn window() -> TemporalWindow {
        TemporalWindow {
            cutoff_date: date(2026, 1, 15),
            solve_from_date: date(2026, 1, 16),
            solve_to_date: date(2026, 1, 31),
        }
    }

    fn assignment(emp: &str, y: i32, m: u32, d: u32) -> AssignmentRecord {
        let day = date(y, m, d);
        AssignmentRecord {
            slot_id: None,
            employee_id: emp.into(),
            demand_id: Some("D1".into()),
            requirement_id: Some("R1".into()),
            date: day,
            shift_code: "D".into(),
            start_date_time: day.and_hms_opt(8, 0, 0).unwrap(),
            end_date_time: day.and_hms_opt(20, 0, 0).unwrap(),
            pattern_day: None,
            status: AssignmentStatus::Assigned,
            day_type: None,
            hours: HourBreakdown {
                normal: 8.8,
                ..Default::default()
            },
            audit_info: None,
        }
    }

    #[test]
    fn window_validation_rejects_bad_orderings() {
        let bad = TemporalWindow {
            cutoff_date: date(2026, 1, 16),
            solve_from_date: date(2026, 1, 16),
            solve_to_date: date(2026, 1, 31),
        };
        assert!(matches!(
            validate_window(&bad),
            Err(EngineError::Input(_))
        ));
        assert!(validate_window(&window()).is_ok());
    }

    #[test]
    fn pre_cutoff_assignments_stay_locked_even_for_departed() {
        let changes = EmployeeChanges {
            new_joiners: vec![],
            not_available_from: vec![NotAvailableEntry {
                employee_id: "E1".into(),
                not_available_from: date(2026, 1, 1),
            }],
            long_leave: vec![],
        };
        let previous = vec![assignment("E1", 2026, 1, 10)];
        let (locked, freed) = classify_assignments(&previous, &window(), &changes);
        assert_eq!(locked.len(), 1);
        assert!(freed.is_empty());
    }

    #[test]
    fn departed_and_on_leave_assignments_in_window_are_freed() {
        let changes = EmployeeChanges {
            new_joiners: vec![],
            not_available_from: vec![NotAvailableEntry {
                employee_id: "E1".into(),
                not_available_from: date(2026, 1, 20),
            }],
            long_leave: vec![LongLeaveEntry {
                employee_id: "E2".into(),
                leave_from: date(2026, 1, 18),
                leave_to: date(2026, 1, 22),
            }],
        };
        let previous = vec![
            assignment("E1", 2026, 1, 18), // before departure: locked
            assignment("E1", 2026, 1, 25), // after departure: freed
            assignment("E2", 2026, 1, 20), // on leave: freed
            assignment("E2", 2026, 1, 28), // back from leave: locked
        ];
        let (locked, freed) = classify_assignments(&previous, &window(), &changes);
        assert_eq!(locked.len(), 2);
        assert_eq!(freed.len(), 2);
        assert!(freed.iter().any(|a| a.employee_id == "E1" && a.date == date(2026, 1, 25)));
        assert!(freed.iter().any(|a| a.employee_id == "E2" && a.date == date(2026, 1, 20)));
    }

    #[test]
    fn bookkeeping_accumulates_weekly_hours_and_streaks() {
        let locked: Vec<_> = (12..=15).map(|d| assignment("E1", 2026, 1, d)).collect();
        let bookkeeping = locked_bookkeeping(&locked, date(2026, 1, 16));

        // Jan 12-15 2026 is ISO week 3
        let hours = bookkeeping.weekly_normal_hours[&("E1".to_string(), (2026, 3))];
        assert!((hours - 4.0 * 8.8).abs() < 1e-9);
        assert_eq!(bookkeeping.consecutive_before["E1"], 4);
        assert_eq!(
            bookkeeping.last_shift_end["E1"],
            date(2026, 1, 15).and_hms_opt(20, 0, 0).unwrap()
        );
    }

    #[test]
    fn leave_windows_block_availability() {
        let changes = EmployeeChanges {
            new_joiners: vec![],
            not_available_from: vec![],
            long_leave: vec![LongLeaveEntry {
                employee_id: "E1".into(),
                leave_from: date(2026, 1, 18),
                leave_to: date(2026, 1, 22),
            }],
        };
        let base = vec![Employee {
            employee_id: "E1".into(),
            scheme: Some("Scheme A".into()),
            product_type_id: None,
            rank_id: None,
            gender: None,
            local: 1,
            qualifications: vec![],
            work_pattern: vec![],
            rotation_offset: 0,
            total_working_hours: 0.0,
            team_id: None,
            ou_id: None,
            icpmp_requirement_id: None,
            not_available_from: None,
            leave_windows: vec![],
        }];
        let pool = build_employee_pool(&base, &changes);
        assert!(!pool[0].is_available_on(date(2026, 1, 20)));
        assert!(pool[0].is_available_on(date(2026, 1, 23)));
    }
}
