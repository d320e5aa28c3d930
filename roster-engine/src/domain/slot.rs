use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{DayType, QualGroup, RosterList};
use crate::scheme::SchemeFilter;

/// One demanded staffing position: the unit the solver assigns employees to.
///
/// Filters are copied down from the owning requirement so the model builder
/// can test `(slot, employee)` compatibility without chasing references.
/// Invariant: `start < end` (the builder pushes `end` to the next civil day
/// for overnight shifts).
#[derive(Debug, Clone)]
pub struct Slot {
    pub slot_id: String,
    pub demand_id: String,
    pub requirement_id: String,
    pub date: NaiveDate,
    pub shift_code: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location_id: Option<String>,
    pub ou_id: Option<String>,
    /// OR-matched set; empty means any product type.
    pub product_type_ids: Vec<String>,
    /// OR-matched set; empty means any rank.
    pub rank_ids: Vec<String>,
    /// `None` means any gender.
    pub gender: Option<String>,
    pub schemes: SchemeFilter,
    pub required_qualifications: Vec<QualGroup>,
    /// The requirement's base (unrotated) pattern.
    pub work_pattern: Vec<String>,
    pub pattern_start_date: NaiveDate,
    pub coverage_anchor: NaiveDate,
    pub coverage_days: Vec<String>,
    pub whitelist: RosterList,
    pub blacklist: RosterList,
    pub preferred_teams: Vec<String>,
    pub day_type: DayType,
    pub has_time_override: bool,
}

impl Slot {
    pub fn gross_hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }
}
