use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    /// Work assignment produced by the solver (or locked from a prior run).
    Assigned,
    /// Pattern rest day, synthesised from pattern + offset.
    OffDay,
    /// Pattern work day the solver left uncovered.
    Unassigned,
    /// Employee was in the pool but not selected for any requirement.
    NotUsed,
}

/// Canonical per-shift hour breakdown, all values in fractional hours
/// rounded to two decimals at this boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBreakdown {
    pub gross: f64,
    pub lunch: f64,
    pub normal: f64,
    pub ot: f64,
    pub rest_day_pay: f64,
    pub paid: f64,
}

/// Provenance attached to every assignment in incremental mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditInfo {
    pub solver_run_id: String,
    /// `locked` (carried over unchanged) or `incremental` (newly solved).
    pub source: String,
    pub timestamp: NaiveDateTime,
    pub input_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    pub employee_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demand_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<String>,
    pub date: NaiveDate,
    pub shift_code: String,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_day: Option<usize>,
    #[serde(default = "default_status")]
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_type: Option<crate::domain::DayType>,
    #[serde(default)]
    pub hours: HourBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_info: Option<AuditInfo>,
}

fn default_status() -> AssignmentStatus {
    AssignmentStatus::Assigned
}
