use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::assignment::AssignmentRecord;
use crate::domain::config::{
    ConstraintSetting, MonthlyHourLimit, OffsetPolicy, SolverRunTime, SolverScoreConfig,
};
use crate::domain::demand::{DemandItem, RosteringBasis};
use crate::domain::employee::Employee;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningHorizon {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PlanningHorizon {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Per-OU rotation offset, required in outcome-based mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuOffset {
    pub ou_id: String,
    pub rotation_offset: usize,
}

/// The full solve request document.
///
/// Unknown fields are retained in `extra` so the input hash covers the
/// document as submitted, not just the fields this engine models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    #[serde(default)]
    pub planning_reference: Option<String>,
    pub planning_horizon: PlanningHorizon,
    #[serde(default)]
    pub public_holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub demand_items: Vec<DemandItem>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub constraint_list: Vec<ConstraintSetting>,
    #[serde(default)]
    pub monthly_hour_limits: Vec<MonthlyHourLimit>,
    #[serde(default)]
    pub solver_score_config: Option<SolverScoreConfig>,
    #[serde(default)]
    pub solver_run_time: Option<SolverRunTime>,
    #[serde(default)]
    pub fixed_rotation_offset: Option<OffsetPolicy>,
    #[serde(default)]
    pub rostering_basis: Option<RosteringBasis>,
    #[serde(default)]
    pub ou_offsets: Vec<OuOffset>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SolveRequest {
    /// Request-level rostering basis: the root field wins, then the first
    /// demand item's, defaulting to demand-based.
    pub fn effective_rostering_basis(&self) -> RosteringBasis {
        self.rostering_basis
            .or_else(|| self.demand_items.iter().find_map(|d| d.rostering_basis))
            .unwrap_or_default()
    }

    pub fn run_time(&self) -> SolverRunTime {
        self.solver_run_time.clone().unwrap_or_default()
    }
}

// region: Incremental mode

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalWindow {
    /// Assignments strictly before this date are locked unconditionally.
    pub cutoff_date: NaiveDate,
    pub solve_from_date: NaiveDate,
    pub solve_to_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotAvailableEntry {
    pub employee_id: String,
    pub not_available_from: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongLeaveEntry {
    pub employee_id: String,
    pub leave_from: NaiveDate,
    pub leave_to: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeChanges {
    #[serde(default)]
    pub new_joiners: Vec<Employee>,
    #[serde(default)]
    pub not_available_from: Vec<NotAvailableEntry>,
    #[serde(default)]
    pub long_leave: Vec<LongLeaveEntry>,
}

/// The previous solve's output, reduced to what reclassification needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousOutput {
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalRequest {
    #[serde(flatten)]
    pub base: SolveRequest,
    pub temporal_window: TemporalWindow,
    pub previous_output: PreviousOutput,
    #[serde(default)]
    pub employee_changes: EmployeeChanges,
}

// endregion

// region: Empty-slots mode

/// An explicit unfilled slot handed in by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptySlotSpec {
    #[serde(default)]
    pub slot_id: Option<String>,
    pub demand_id: String,
    #[serde(default)]
    pub requirement_id: Option<String>,
    pub date: NaiveDate,
    pub shift_code: String,
    /// `HH:MM` or `HH:MM:SS`.
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub next_day: bool,
    #[serde(default)]
    pub required_qualifications: Vec<crate::domain::QualificationSpec>,
    #[serde(default)]
    pub schemes: Option<Vec<String>>,
    #[serde(default)]
    pub product_type_id: Option<String>,
    #[serde(default)]
    pub rank_ids: Vec<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub work_pattern: Vec<String>,
}

/// Hour and streak bookkeeping carried over from locked assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedEmployeeContext {
    pub employee_id: String,
    /// ISO week key `"YYYY-Www"` to committed normal hours.
    #[serde(default)]
    pub weekly_hours: std::collections::BTreeMap<String, f64>,
    /// Locked streak length immediately before the solve window.
    #[serde(default)]
    pub consecutive_working_days: u32,
    #[serde(default)]
    pub last_shift_end: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedContext {
    #[serde(default)]
    pub cutoff_date: Option<NaiveDate>,
    #[serde(default)]
    pub employee_assignments: Vec<LockedEmployeeContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptySlotsRequest {
    #[serde(flatten)]
    pub base: SolveRequest,
    #[serde(default)]
    pub empty_slots: Vec<EmptySlotSpec>,
    #[serde(default)]
    pub locked_context: LockedContext,
}

// endregion
