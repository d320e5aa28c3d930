//! The solve driver: validate, preprocess, build, search, assemble.
//!
//! Three entry points share one pipeline: the full solve, the incremental
//! re-solve (locked prefix plus a solve window) and the empty-slots fill.

pub mod empty_slots;
pub mod incremental;

use std::time::Duration;

use chrono::Utc;

use crate::constraints::{self, ConstraintContext, LockedBookkeeping};
use crate::domain::employee::Employee;
use crate::domain::{
    AssignmentRecord, AssignmentStatus, ConstraintConfig, RosteringBasis, Slot, SolveRequest,
    SolverScoreConfig,
};
use crate::error::EngineError;
use crate::hours::HourParams;
use crate::icpmp;
use crate::limits::{ServerTier, check_problem_size, estimate_problem};
use crate::model::{build_model, employee_views};
use crate::output::{
    self, Score, ScoreBreakdown, SolveOutput, SolverRun, compute_input_hash,
};
use crate::slots::{build_employee_based_slots, build_slots};
use crate::solver::{SearchConfig, search};
use crate::validate::validate;

pub use empty_slots::{solve_empty_slots, solve_empty_slots_with_options};
pub use incremental::{solve_incremental, solve_incremental_with_options};

#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub tier: ServerTier,
    /// Ceiling on the solver's parallel workers.
    pub max_workers: usize,
    /// Ceiling on the per-request time limit.
    pub max_time_seconds: u64,
    pub seed: u64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tier: ServerTier::Medium,
            max_workers: 4,
            max_time_seconds: 300,
            seed: 42,
        }
    }
}

/// Everything a mode-specific entry point needs after the shared pipeline.
pub(crate) struct PipelineOutcome {
    pub output: SolveOutput,
    pub slots: Vec<Slot>,
    pub selected: Vec<Employee>,
}

/// Full solve with default options.
pub fn solve(request: &SolveRequest) -> Result<SolveOutput, EngineError> {
    solve_with_options(request, &SolveOptions::default())
}

pub fn solve_with_options(
    request: &SolveRequest,
    options: &SolveOptions,
) -> Result<SolveOutput, EngineError> {
    let report = validate(request);
    if !report.is_valid() {
        return Err(EngineError::Validation { report });
    }
    let warnings = report
        .warnings
        .iter()
        .map(|w| format!("{}: {}", w.field, w.message))
        .collect();

    run_pipeline(request, options, warnings, None, None).map(|outcome| outcome.output)
}

/// The shared pipeline. `slots_override` substitutes pre-built slots
/// (empty-slots mode, incremental windows); `locked` feeds committed hour
/// and streak totals into the hour-cap constraints.
pub(crate) fn run_pipeline(
    request: &SolveRequest,
    options: &SolveOptions,
    mut warnings: Vec<String>,
    slots_override: Option<Vec<Slot>>,
    locked: Option<&LockedBookkeeping>,
) -> Result<PipelineOutcome, EngineError> {
    let started_at = Utc::now().naive_utc();
    let run_id = format!("SRN-{}", uuid::Uuid::new_v4());
    let input_hash = compute_input_hash(request);
    let basis = request.effective_rostering_basis();

    // preprocess: ICPMP selection, or OU-template replication
    let (selected, icpmp_outcomes, enforce_ownership) = match (&slots_override, basis) {
        (Some(_), _) => (request.employees.clone(), Vec::new(), false),
        (None, RosteringBasis::OutcomeBased) => {
            (outcome_based_selection(request), Vec::new(), false)
        }
        (None, RosteringBasis::DemandBased) => {
            let result = icpmp::preprocess(request);
            warnings.extend(result.warnings);
            (result.selected, result.outcomes, true)
        }
    };

    let slots = match slots_override {
        Some(slots) => slots,
        None => match basis {
            RosteringBasis::OutcomeBased => build_employee_based_slots(request, &selected),
            RosteringBasis::DemandBased => build_slots(request),
        },
    };

    let estimate = estimate_problem(slots.len(), &selected);
    check_problem_size(&estimate, options.tier).map_err(EngineError::Capacity)?;

    let config = ConstraintConfig::new(request.constraint_list.clone());
    let hour_params = HourParams::from_config(&config);
    let views = employee_views(&selected);

    let mut model = build_model(&slots, &selected, &views, &config, enforce_ownership);
    let ctx = ConstraintContext {
        slots: &slots,
        employees: &selected,
        views: &views,
        config: &config,
        hour_params,
        horizon: request.planning_horizon,
        monthly_limits: &request.monthly_hour_limits,
        locked,
    };
    constraints::apply_all(&mut model, &ctx);
    let score_config = request
        .solver_score_config
        .clone()
        .unwrap_or_else(SolverScoreConfig::default);
    constraints::soft::apply(&mut model, &ctx, &score_config);

    let run_time = request.run_time();
    let search_config = SearchConfig {
        time_limit: Duration::from_secs(
            run_time.max_seconds.clamp(1, options.max_time_seconds),
        ),
        workers: run_time
            .parallel_workers
            .unwrap_or(options.max_workers)
            .clamp(1, options.max_workers),
        seed: options.seed,
        balance_weight: (score_config.workload_balance * 10.0) as i64,
    };
    let outcome = search(&model, slots.len(), selected.len(), &search_config);

    // materialise assignments and annotate hours
    let mut assignments = Vec::new();
    for (slot_idx, chosen) in outcome.solution.chosen.iter().enumerate() {
        let Some(var) = chosen else { continue };
        let cand = model.candidates[*var];
        let slot = &slots[slot_idx];
        let employee = &selected[cand.emp];
        let pattern = &employee.work_pattern;
        let pattern_day = if pattern.is_empty() {
            None
        } else {
            Some(crate::calendar::pattern_day(
                slot.date,
                slot.pattern_start_date,
                0,
                pattern.len(),
            ))
        };
        assignments.push(AssignmentRecord {
            slot_id: Some(slot.slot_id.clone()),
            employee_id: employee.employee_id.clone(),
            demand_id: Some(slot.demand_id.clone()),
            requirement_id: Some(slot.requirement_id.clone()),
            date: slot.date,
            shift_code: slot.shift_code.clone(),
            start_date_time: slot.start,
            end_date_time: slot.end,
            pattern_day,
            status: AssignmentStatus::Assigned,
            day_type: Some(slot.day_type),
            hours: Default::default(),
            audit_info: None,
        });
    }
    output::annotate_hours(&mut assignments, &request.employees, &hour_params);

    let employee_roster = output::build_employee_roster(request, &selected, &assignments);
    let roster_summary = output::summarise_roster(&employee_roster);
    let solution_quality = output::grade_solution(
        outcome.status,
        slots.len(),
        &assignments,
        request.employees.len(),
    );
    let employee_hours = output::employee_hour_totals(&assignments);

    let v2_mode = request
        .demand_items
        .iter()
        .flat_map(|d| &d.requirements)
        .any(|r| !r.daily_headcount.is_empty());
    let daily_coverage = v2_mode.then(|| output::daily_coverage(&slots, &assignments));

    let ended = Utc::now().naive_utc();
    let assigned = assignments.len() as i64;
    let output = SolveOutput {
        schema_version: "0.4".to_string(),
        planning_reference: request.planning_reference.clone(),
        public_holidays: request.public_holidays.clone(),
        solver_run: SolverRun {
            run_id,
            solver_version: output::SOLVER_VERSION.to_string(),
            started_at,
            ended,
            duration_seconds: (ended - started_at).num_milliseconds() as f64 / 1000.0,
            status: outcome.status,
        },
        score: Score {
            overall: assigned * 100 - outcome.solution.penalty,
            hard: 0,
            soft: -outcome.solution.penalty,
        },
        score_breakdown: ScoreBreakdown {
            hard: Default::default(),
            soft: std::collections::BTreeMap::from([(
                "softPenalty".to_string(),
                outcome.solution.penalty,
            )]),
        },
        assignments,
        employee_roster,
        roster_summary,
        solution_quality,
        icpmp: (!icpmp_outcomes.is_empty()).then_some(icpmp_outcomes),
        daily_coverage,
        incremental_solve: None,
        empty_slots_metadata: None,
        warnings,
        meta: output::OutputMeta {
            input_hash,
            generated_at: ended,
            employee_hours,
        },
    };

    Ok(PipelineOutcome {
        output,
        slots,
        selected,
    })
}

/// Outcome-based preprocessing: every pool employee in an outcome-based
/// demand's OU takes the OU's rotation offset and the requirement's pattern
/// rotated by it. No headcount maths, no pool minimisation.
fn outcome_based_selection(request: &SolveRequest) -> Vec<Employee> {
    let mut selected = Vec::new();
    for demand in &request.demand_items {
        let Some(requirement) = demand.requirements.first() else {
            continue;
        };
        let offset = request
            .ou_offsets
            .iter()
            .find(|o| Some(&o.ou_id) == demand.ou_id.as_ref())
            .map(|o| o.rotation_offset)
            .unwrap_or(0);
        for employee in &request.employees {
            if employee.ou_id != demand.ou_id {
                continue;
            }
            let mut emp = employee.clone();
            emp.rotation_offset = offset;
            emp.work_pattern =
                crate::icpmp::selection::rotate_pattern(&requirement.work_pattern, offset);
            emp.icpmp_requirement_id = Some(requirement.requirement_id.clone());
            selected.push(emp);
        }
    }
    selected
}
