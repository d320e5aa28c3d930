//! Output assembly: annotated assignments, the per-employee roster with
//! synthesised off-days, aggregate totals, solution quality grading and the
//! deterministic input hash.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::calendar::pattern_day;
use crate::domain::employee::Employee;
use crate::domain::{AssignmentRecord, AssignmentStatus, DayType, Slot, SolveRequest};
use crate::hours::{HourParams, WeekContext, round2, shift_hours};
use crate::icpmp::IcpmpOutcome;
use crate::scheme::{Scheme, normalize_scheme};
use crate::solver::SolveStatus;
use shared::time::week_key;

pub const SOLVER_VERSION: &str = concat!("roster-engine-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverRun {
    pub run_id: String,
    pub solver_version: String,
    pub started_at: NaiveDateTime,
    pub ended: NaiveDateTime,
    pub duration_seconds: f64,
    pub status: SolveStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Score {
    pub overall: i64,
    pub hard: i64,
    pub soft: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub hard: HardBreakdown,
    /// Soft penalty total per constraint family.
    pub soft: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardBreakdown {
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatus {
    pub date: NaiveDate,
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_day: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRoster {
    pub employee_id: String,
    pub rotation_offset: usize,
    pub work_pattern: Vec<String>,
    pub daily_status: Vec<DailyStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub total_daily_statuses: usize,
    pub by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityGrade {
    Optimal,
    Excellent,
    VeryGood,
    Good,
    Acceptable,
    Infeasible,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionQuality {
    pub quality_grade: QualityGrade,
    pub coverage_rate: f64,
    /// Spread between the busiest and the lightest used employee, in shifts.
    pub workload_variance: f64,
    /// Share of the pool actually used.
    pub utilization_rate: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHours {
    /// ISO week key `"YYYY-Www"` to normal-hour total.
    pub weekly_normal: BTreeMap<String, f64>,
    /// `"YYYY-MM"` to OT-hour total.
    pub monthly_ot: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMeta {
    pub input_hash: String,
    pub generated_at: NaiveDateTime,
    pub employee_hours: BTreeMap<String, EmployeeHours>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCoverageEntry {
    pub date: NaiveDate,
    pub shift_code: String,
    pub day_type: DayType,
    pub target_headcount: usize,
    pub assigned_count: usize,
    pub coverage_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalSummary {
    pub cutoff_date: NaiveDate,
    pub solve_from_date: NaiveDate,
    pub solve_to_date: NaiveDate,
    pub locked_assignments_count: usize,
    pub new_assignments_count: usize,
    pub solvable_slots: usize,
    pub unassigned_slots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptySlotsMetadata {
    pub requested_slots: usize,
    pub filled_slots: usize,
    pub locked_employees: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOutput {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_reference: Option<String>,
    pub public_holidays: Vec<NaiveDate>,
    pub solver_run: SolverRun,
    pub score: Score,
    pub score_breakdown: ScoreBreakdown,
    pub assignments: Vec<AssignmentRecord>,
    pub employee_roster: Vec<EmployeeRoster>,
    pub roster_summary: RosterSummary,
    pub solution_quality: SolutionQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icpmp: Option<Vec<IcpmpOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_coverage: Option<Vec<DailyCoverageEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_solve: Option<IncrementalSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_slots_metadata: Option<EmptySlotsMetadata>,
    pub warnings: Vec<String>,
    pub meta: OutputMeta,
}

/// SHA-256 of the cleaned input document.
///
/// Solver-internal keys are stripped and object keys serialise in sorted
/// order, so the hash is stable across runs and insensitive to runtime
/// state leaking into the request.
pub fn compute_input_hash(request: &SolveRequest) -> String {
    const EXCLUDE: [&str; 10] = [
        "slots",
        "x",
        "model",
        "timeLimit",
        "unassigned",
        "offset_vars",
        "optimized_offsets",
        "total_unassigned",
        "solver",
        "variables",
    ];

    let mut value = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(map) = &mut value {
        for key in EXCLUDE {
            map.remove(key);
        }
    }
    let canonical = value.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("sha256:{digest:x}")
}

/// Annotates solved assignments with their hour breakdowns.
///
/// The week context comes from the actual assignments: for full-timers the
/// number of assigned work days in the ISO week and this shift's 1-based
/// rank among them; part-timers use their pattern's work-day count.
pub fn annotate_hours(
    assignments: &mut [AssignmentRecord],
    employees: &[Employee],
    params: &HourParams,
) {
    let schemes: HashMap<&str, Scheme> = employees
        .iter()
        .map(|e| (e.employee_id.as_str(), normalize_scheme(e.scheme.as_deref())))
        .collect();
    let pattern_work_days: HashMap<&str, usize> = employees
        .iter()
        .map(|e| (e.employee_id.as_str(), e.pattern_work_days()))
        .collect();

    // employee -> sorted assigned work dates
    let mut dates_by_emp: HashMap<String, Vec<NaiveDate>> = HashMap::new();
    for a in assignments.iter() {
        if a.status == AssignmentStatus::Assigned {
            dates_by_emp.entry(a.employee_id.clone()).or_default().push(a.date);
        }
    }
    for dates in dates_by_emp.values_mut() {
        dates.sort();
        dates.dedup();
    }

    for assignment in assignments.iter_mut() {
        if assignment.status != AssignmentStatus::Assigned {
            continue;
        }
        let scheme = schemes
            .get(assignment.employee_id.as_str())
            .copied()
            .unwrap_or(Scheme::A);
        let dates = dates_by_emp
            .get(assignment.employee_id.as_str())
            .cloned()
            .unwrap_or_default();

        let week = week_key(assignment.date);
        let week_dates: Vec<&NaiveDate> =
            dates.iter().filter(|d| week_key(**d) == week).collect();
        let work_days_in_week = match scheme {
            Scheme::P => {
                let from_pattern = pattern_work_days
                    .get(assignment.employee_id.as_str())
                    .copied()
                    .unwrap_or(0);
                if from_pattern > 0 {
                    from_pattern
                } else {
                    week_dates.len()
                }
            }
            _ => week_dates.len(),
        };
        let week_position = week_dates
            .iter()
            .filter(|d| ***d <= assignment.date)
            .count();

        assignment.hours = shift_hours(
            assignment.start_date_time,
            assignment.end_date_time,
            scheme,
            WeekContext {
                work_days_in_week: work_days_in_week.max(1),
                week_position: week_position.max(1),
            },
            params,
        );
    }
}

/// One roster entry per pool employee, with `OFF_DAY` synthesised from the
/// rotated pattern even when the solver produced nothing for that date.
pub fn build_employee_roster(
    request: &SolveRequest,
    selected: &[Employee],
    assignments: &[AssignmentRecord],
) -> Vec<EmployeeRoster> {
    let selected_ids: HashMap<&str, &Employee> = selected
        .iter()
        .map(|e| (e.employee_id.as_str(), e))
        .collect();

    let mut assigned_by_emp_date: HashMap<(&str, NaiveDate), &AssignmentRecord> = HashMap::new();
    for a in assignments {
        if a.status == AssignmentStatus::Assigned {
            assigned_by_emp_date.insert((a.employee_id.as_str(), a.date), a);
        }
    }

    let horizon = request.planning_horizon;
    let mut roster = Vec::new();

    for employee in &request.employees {
        let selected_view = selected_ids.get(employee.employee_id.as_str());
        let (pattern, offset) = match selected_view {
            Some(sel) => (sel.work_pattern.clone(), sel.rotation_offset),
            None => (employee.work_pattern.clone(), employee.rotation_offset),
        };

        let mut daily_status = Vec::new();
        for date in shared::time::date_range(horizon.start_date, horizon.end_date) {
            let key = (employee.employee_id.as_str(), date);
            let idx = if pattern.is_empty() {
                None
            } else {
                Some(pattern_day(date, horizon.start_date, 0, pattern.len()))
            };

            let entry = if let Some(assignment) = assigned_by_emp_date.get(&key) {
                DailyStatus {
                    date,
                    status: AssignmentStatus::Assigned,
                    shift_code: Some(assignment.shift_code.clone()),
                    pattern_day: idx,
                }
            } else if selected_view.is_none() {
                DailyStatus {
                    date,
                    status: AssignmentStatus::NotUsed,
                    shift_code: None,
                    pattern_day: None,
                }
            } else {
                match idx {
                    Some(i) if pattern[i] == "O" => DailyStatus {
                        date,
                        status: AssignmentStatus::OffDay,
                        shift_code: None,
                        pattern_day: Some(i),
                    },
                    Some(i) => DailyStatus {
                        date,
                        status: AssignmentStatus::Unassigned,
                        shift_code: Some(pattern[i].clone()),
                        pattern_day: Some(i),
                    },
                    None => DailyStatus {
                        date,
                        status: AssignmentStatus::Unassigned,
                        shift_code: None,
                        pattern_day: None,
                    },
                }
            };
            daily_status.push(entry);
        }

        roster.push(EmployeeRoster {
            employee_id: employee.employee_id.clone(),
            rotation_offset: offset,
            work_pattern: pattern,
            daily_status,
        });
    }

    roster
}

pub fn summarise_roster(roster: &[EmployeeRoster]) -> RosterSummary {
    let mut summary = RosterSummary::default();
    for status in ["ASSIGNED", "OFF_DAY", "UNASSIGNED", "NOT_USED"] {
        summary.by_status.insert(status.to_string(), 0);
    }
    for entry in roster {
        for day in &entry.daily_status {
            summary.total_daily_statuses += 1;
            let key = match day.status {
                AssignmentStatus::Assigned => "ASSIGNED",
                AssignmentStatus::OffDay => "OFF_DAY",
                AssignmentStatus::Unassigned => "UNASSIGNED",
                AssignmentStatus::NotUsed => "NOT_USED",
            };
            *summary.by_status.entry(key.to_string()).or_default() += 1;
        }
    }
    summary
}

/// Grade ladder: `OPTIMAL` only on a solver optimality proof; `EXCELLENT`
/// needs full coverage, a workload spread of at most one shift and pool
/// utilisation at or below 60%; lower grades cascade as coverage and
/// balance worsen.
pub fn grade_solution(
    status: SolveStatus,
    slot_count: usize,
    assignments: &[AssignmentRecord],
    pool_size: usize,
) -> SolutionQuality {
    let assigned = assignments
        .iter()
        .filter(|a| a.status == AssignmentStatus::Assigned)
        .count();
    let coverage_rate = if slot_count == 0 {
        100.0
    } else {
        round2(assigned as f64 / slot_count as f64 * 100.0)
    };

    let mut per_emp: HashMap<&str, usize> = HashMap::new();
    for a in assignments {
        if a.status == AssignmentStatus::Assigned {
            *per_emp.entry(a.employee_id.as_str()).or_default() += 1;
        }
    }
    let workload_variance = if per_emp.len() <= 1 {
        0.0
    } else {
        let max = per_emp.values().max().copied().unwrap_or(0);
        let min = per_emp.values().min().copied().unwrap_or(0);
        (max - min) as f64
    };
    let utilization_rate = if pool_size == 0 {
        0.0
    } else {
        round2(per_emp.len() as f64 / pool_size as f64)
    };

    let (grade, explanation) = match status {
        SolveStatus::Infeasible => (
            QualityGrade::Infeasible,
            "no feasible assignment exists for the given constraints".to_string(),
        ),
        SolveStatus::Optimal => (
            QualityGrade::Optimal,
            "full coverage with zero soft penalty".to_string(),
        ),
        SolveStatus::Feasible => {
            if slot_count == 0 {
                (QualityGrade::Unknown, "no slots were demanded".to_string())
            } else if coverage_rate >= 100.0 && workload_variance <= 1.0 && utilization_rate <= 0.6
            {
                (
                    QualityGrade::Excellent,
                    "full coverage with balanced workload".to_string(),
                )
            } else if coverage_rate >= 98.0 && workload_variance <= 2.0 {
                (
                    QualityGrade::VeryGood,
                    "near-complete coverage with small imbalance".to_string(),
                )
            } else if coverage_rate >= 90.0 {
                (QualityGrade::Good, "most demand covered".to_string())
            } else if assigned > 0 {
                (
                    QualityGrade::Acceptable,
                    format!("partial coverage at {coverage_rate:.1}%"),
                )
            } else {
                (QualityGrade::Unknown, "nothing could be assigned".to_string())
            }
        }
    };

    SolutionQuality {
        quality_grade: grade,
        coverage_rate,
        workload_variance,
        utilization_rate,
        explanation,
    }
}

/// Per-employee weekly-normal and monthly-OT totals for the output meta.
pub fn employee_hour_totals(assignments: &[AssignmentRecord]) -> BTreeMap<String, EmployeeHours> {
    let mut totals: BTreeMap<String, EmployeeHours> = BTreeMap::new();
    for a in assignments {
        if a.status != AssignmentStatus::Assigned {
            continue;
        }
        let entry = totals.entry(a.employee_id.clone()).or_default();
        let (iso_year, iso_week) = week_key(a.date);
        let week = format!("{iso_year}-W{iso_week:02}");
        *entry.weekly_normal.entry(week).or_default() += a.hours.normal;
        let month = a.date.format("%Y-%m").to_string();
        *entry.monthly_ot.entry(month).or_default() += a.hours.ot;
    }
    for hours in totals.values_mut() {
        for v in hours.weekly_normal.values_mut() {
            *v = round2(*v);
        }
        for v in hours.monthly_ot.values_mut() {
            *v = round2(*v);
        }
    }
    totals
}

/// Per-(date, shift) coverage summary for the v2 response.
pub fn daily_coverage(slots: &[Slot], assignments: &[AssignmentRecord]) -> Vec<DailyCoverageEntry> {
    let mut targets: BTreeMap<(NaiveDate, String), (usize, DayType)> = BTreeMap::new();
    for slot in slots {
        let entry = targets
            .entry((slot.date, slot.shift_code.clone()))
            .or_insert((0, slot.day_type));
        entry.0 += 1;
    }
    let mut assigned: HashMap<(NaiveDate, String), usize> = HashMap::new();
    for a in assignments {
        if a.status == AssignmentStatus::Assigned {
            *assigned
                .entry((a.date, a.shift_code.clone()))
                .or_default() += 1;
        }
    }

    targets
        .into_iter()
        .map(|((date, shift_code), (target, day_type))| {
            let got = assigned
                .get(&(date, shift_code.clone()))
                .copied()
                .unwrap_or(0);
            DailyCoverageEntry {
                date,
                shift_code,
                day_type,
                target_headcount: target,
                assigned_count: got,
                coverage_rate: if target == 0 {
                    100.0
                } else {
                    round2(got as f64 / target as f64 * 100.0)
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HourBreakdown;

    fn base_request() -> SolveRequest {
        serde_json::from_value(serde_json::json!({
            "planningHorizon": {"startDate": "2026-01-05", "endDate": "2026-01-11"},
            "employees": [
                {"employeeId": "E1", "scheme": "Scheme A"},
                {"employeeId": "E2", "scheme": "Scheme A"}
            ]
        }))
        .unwrap()
    }

    fn assignment(emp: &str, y: i32, m: u32, d: u32) -> AssignmentRecord {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        AssignmentRecord {
            slot_id: Some(format!("S-{date}")),
            employee_id: emp.into(),
            demand_id: Some("D1".into()),
            requirement_id: Some("R1".into()),
            date,
            shift_code: "D".into(),
            start_date_time: date.and_hms_opt(8, 0, 0).unwrap(),
            end_date_time: date.and_hms_opt(20, 0, 0).unwrap(),
            pattern_day: None,
            status: AssignmentStatus::Assigned,
            day_type: None,
            hours: HourBreakdown::default(),
            audit_info: None,
        }
    }

    #[test]
    fn input_hash_is_stable_and_input_sensitive() {
        // Property 10
        let a = base_request();
        let b = base_request();
        assert_eq!(compute_input_hash(&a), compute_input_hash(&b));

        let mut c = base_request();
        c.employees.pop();
        assert_ne!(compute_input_hash(&a), compute_input_hash(&c));

        // solver-internal keys do not affect the hash
        let mut d = base_request();
        d.extra
            .insert("timeLimit".into(), serde_json::json!(30));
        assert_eq!(compute_input_hash(&a), compute_input_hash(&d));
    }

    #[test]
    fn rest_day_pay_annotation_on_sixth_assignment() {
        // Scenario B: six consecutive 12h shifts Mon-Sat
        let request = base_request();
        let mut assignments: Vec<_> = (5..=10).map(|d| assignment("E1", 2026, 1, d)).collect();
        annotate_hours(&mut assignments, &request.employees, &HourParams::default());

        let saturday = assignments.last().unwrap();
        assert_eq!(saturday.hours.gross, 12.0);
        assert_eq!(saturday.hours.lunch, 1.0);
        assert_eq!(saturday.hours.normal, 0.0);
        assert_eq!(saturday.hours.ot, 3.0);
        assert_eq!(saturday.hours.rest_day_pay, 8.0);
        assert_eq!(saturday.hours.paid, 12.0);

        let weekly_normal: f64 = assignments.iter().map(|a| a.hours.normal).sum();
        assert!(weekly_normal <= 44.0 + 1e-9);
    }

    #[test]
    fn roster_synthesises_off_days_and_not_used() {
        let request = base_request();
        let mut selected = request.employees[0].clone();
        selected.work_pattern = ["D", "D", "D", "D", "D", "O", "O"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        selected.rotation_offset = 0;
        selected.icpmp_requirement_id = Some("R1".into());

        let mut assignments = vec![assignment("E1", 2026, 1, 5)];
        annotate_hours(&mut assignments, &request.employees, &HourParams::default());

        let roster = build_employee_roster(&request, &[selected], &assignments);
        assert_eq!(roster.len(), 2);

        let e1 = &roster[0];
        assert_eq!(e1.daily_status.len(), 7);
        assert_eq!(e1.daily_status[0].status, AssignmentStatus::Assigned);
        // pattern work days without assignments are UNASSIGNED
        assert_eq!(e1.daily_status[1].status, AssignmentStatus::Unassigned);
        // pattern rest days are OFF_DAY
        assert_eq!(e1.daily_status[5].status, AssignmentStatus::OffDay);
        assert_eq!(e1.daily_status[6].status, AssignmentStatus::OffDay);

        let e2 = &roster[1];
        assert!(e2
            .daily_status
            .iter()
            .all(|d| d.status == AssignmentStatus::NotUsed));

        let summary = summarise_roster(&roster);
        assert_eq!(summary.total_daily_statuses, 14);
        assert_eq!(summary.by_status["NOT_USED"], 7);
        assert_eq!(summary.by_status["ASSIGNED"], 1);
    }

    #[test]
    fn grading_follows_the_ladder() {
        let full: Vec<_> = (5..=8)
            .map(|d| assignment(&format!("E{}", d % 2), 2026, 1, d))
            .collect();
        let quality = grade_solution(SolveStatus::Feasible, 4, &full, 10);
        assert_eq!(quality.quality_grade, QualityGrade::Excellent);
        assert_eq!(quality.coverage_rate, 100.0);

        let partial: Vec<_> = (5..=7).map(|d| assignment("E1", 2026, 1, d)).collect();
        let quality = grade_solution(SolveStatus::Feasible, 10, &partial, 10);
        assert_eq!(quality.quality_grade, QualityGrade::Acceptable);

        let quality = grade_solution(SolveStatus::Infeasible, 10, &[], 10);
        assert_eq!(quality.quality_grade, QualityGrade::Infeasible);

        let quality = grade_solution(SolveStatus::Optimal, 4, &full, 10);
        assert_eq!(quality.quality_grade, QualityGrade::Optimal);
    }

    #[test]
    fn hour_totals_group_by_iso_week_and_month() {
        let request = base_request();
        let mut assignments: Vec<_> = (5..=9).map(|d| assignment("E1", 2026, 1, d)).collect();
        annotate_hours(&mut assignments, &request.employees, &HourParams::default());

        let totals = employee_hour_totals(&assignments);
        let e1 = &totals["E1"];
        // Jan 5-9 2026 is ISO week 2; five 12h shifts at 8.8 normal each
        assert_eq!(e1.weekly_normal["2026-W02"], 44.0);
        assert_eq!(e1.monthly_ot["2026-01"], 11.0);
    }
}
