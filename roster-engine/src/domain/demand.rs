use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a demand item is rostered.
///
/// `demandBased` fans slots out per headcount position and lets the solver
/// fill them; `outcomeBased` replicates a per-OU pattern template across
/// employees without enforcing per-day headcount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RosteringBasis {
    #[default]
    #[serde(rename = "demandBased")]
    DemandBased,
    #[serde(rename = "outcomeBased")]
    OutcomeBased,
}

/// Public-holiday classification of a roster day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DayType {
    #[default]
    Normal,
    PublicHoliday,
    #[serde(rename = "EveOfPH")]
    EveOfPh,
}

/// Per-day headcount, either the legacy per-shift-type integer or the
/// explicit per-shift-code map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Headcount {
    PerShiftType(u32),
    ByShift(BTreeMap<String, u32>),
}

impl Headcount {
    /// Headcount for one shift code.
    pub fn for_shift(&self, shift_code: &str) -> u32 {
        match self {
            Self::PerShiftType(n) => *n,
            Self::ByShift(map) => map.get(shift_code).copied().unwrap_or(0),
        }
    }

    /// Total staffing positions per day across all shift codes in the pattern.
    pub fn total_per_day(&self, shift_codes: &[String]) -> u32 {
        match self {
            Self::PerShiftType(n) => *n * shift_codes.len() as u32,
            Self::ByShift(map) => map.values().sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualMatchType {
    #[default]
    All,
    Any,
}

/// A qualification group: `ALL` requires every listed code, `ANY` at least one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualGroup {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub match_type: QualMatchType,
    #[serde(default)]
    pub qualifications: Vec<String>,
}

/// Wire form of `requiredQualifications`: either flat codes or groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualificationSpec {
    Code(String),
    Group(QualGroup),
}

/// Folds the legacy flat form into a single `ALL` group.
pub fn normalize_qualifications(specs: &[QualificationSpec]) -> Vec<QualGroup> {
    let mut groups = Vec::new();
    let mut flat = Vec::new();
    for spec in specs {
        match spec {
            QualificationSpec::Code(code) => flat.push(code.clone()),
            QualificationSpec::Group(group) => groups.push(group.clone()),
        }
    }
    if !flat.is_empty() {
        groups.push(QualGroup {
            group_id: None,
            match_type: QualMatchType::All,
            qualifications: flat,
        });
    }
    groups
}

/// Covered weekdays: either a list of day names or a count of leading days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoverageDays {
    Names(Vec<String>),
    Count(u8),
}

impl CoverageDays {
    pub fn day_names(&self) -> Vec<String> {
        const WEEK: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        match self {
            Self::Names(names) => names.clone(),
            Self::Count(n) => WEEK
                .iter()
                .take((*n).min(7) as usize)
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for CoverageDays {
    fn default() -> Self {
        Self::Count(7)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterList {
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub employee_ids: Vec<String>,
}

impl RosterList {
    pub fn is_empty(&self) -> bool {
        self.team_ids.is_empty() && self.employee_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDetail {
    pub shift_code: String,
    /// `HH:MM` or `HH:MM:SS`.
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub next_day: bool,
}

/// A shift set: coverage calendar settings plus the shift timing definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftGroup {
    #[serde(default)]
    pub coverage_days: CoverageDays,
    #[serde(default)]
    pub coverage_anchor: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub include_public_holidays: bool,
    #[serde(default = "default_true")]
    pub include_eve_of_public_holidays: bool,
    #[serde(default)]
    pub whitelist: RosterList,
    #[serde(default)]
    pub blacklist: RosterList,
    #[serde(default)]
    pub preferred_teams: Vec<String>,
    #[serde(default)]
    pub shift_details: Vec<ShiftDetail>,
}

fn default_true() -> bool {
    true
}

/// One row of the enhanced per-day headcount table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHeadcountEntry {
    pub date: NaiveDate,
    pub shift_code: String,
    pub headcount: u32,
    #[serde(default)]
    pub day_type: DayType,
    #[serde(default)]
    pub start_time_override: Option<String>,
    #[serde(default)]
    pub end_time_override: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub requirement_id: String,
    #[serde(default)]
    pub product_type_id: Option<String>,
    /// OR-matched alternative to the singular form; takes precedence.
    #[serde(default)]
    pub product_type_ids: Vec<String>,
    #[serde(default)]
    pub rank_ids: Vec<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub schemes: Option<Vec<String>>,
    /// Legacy singular scheme, still accepted.
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub headcount: Option<Headcount>,
    #[serde(default)]
    pub daily_headcount: Vec<DailyHeadcountEntry>,
    #[serde(default)]
    pub work_pattern: Vec<String>,
    #[serde(default)]
    pub required_qualifications: Vec<QualificationSpec>,
    /// Extra heads on top of the computed minimum, as a percentage.
    #[serde(default)]
    pub icpmp_buffer_percentage: Option<f64>,
    /// Consider monthly OT budget as extra capacity when sizing the pool.
    #[serde(default = "default_true")]
    pub enable_ot_aware_icpmp: bool,
}

impl Requirement {
    /// All product type ids this requirement accepts (singular folded in).
    pub fn accepted_product_types(&self) -> Vec<String> {
        if !self.product_type_ids.is_empty() {
            self.product_type_ids.clone()
        } else {
            self.product_type_id.iter().cloned().collect()
        }
    }

    /// Distinct non-rest shift codes referenced by the work pattern.
    pub fn pattern_shift_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .work_pattern
            .iter()
            .filter(|code| *code != "O")
            .cloned()
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }

    pub fn pattern_work_days(&self) -> usize {
        self.work_pattern.iter().filter(|s| *s != "O").count()
    }

    pub fn qualification_groups(&self) -> Vec<QualGroup> {
        normalize_qualifications(&self.required_qualifications)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandItem {
    pub demand_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub ou_id: Option<String>,
    #[serde(default)]
    pub rostering_basis: Option<RosteringBasis>,
    /// Required in outcome-based mode; percentage in `[1, 100]`.
    #[serde(default)]
    pub min_staff_threshold_percentage: Option<f64>,
    /// Anchor for the rotation cycle; falls back to the horizon start.
    #[serde(default)]
    pub shift_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub shifts: Vec<ShiftGroup>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

impl DemandItem {
    /// Longest shift duration in hours across all shift details, honouring
    /// `nextDay`. Used to filter employees whose scheme daily cap is shorter.
    pub fn max_shift_hours(&self) -> f64 {
        let mut max_hours: f64 = 0.0;
        for group in &self.shifts {
            for detail in &group.shift_details {
                let (Some(start), Some(end)) = (
                    shared::time::parse_clock(&detail.start),
                    shared::time::parse_clock(&detail.end),
                ) else {
                    continue;
                };
                let mut minutes = (end - start).num_minutes();
                if detail.next_day || minutes <= 0 {
                    minutes += 24 * 60;
                }
                max_hours = max_hours.max(minutes as f64 / 60.0);
            }
        }
        max_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headcount_accepts_both_wire_forms() {
        let legacy: Headcount = serde_json::from_str("5").unwrap();
        assert_eq!(legacy.for_shift("D"), 5);
        assert_eq!(legacy.total_per_day(&["D".into(), "N".into()]), 10);

        let by_shift: Headcount = serde_json::from_str(r#"{"D": 3, "N": 2}"#).unwrap();
        assert_eq!(by_shift.for_shift("D"), 3);
        assert_eq!(by_shift.for_shift("X"), 0);
        assert_eq!(by_shift.total_per_day(&["D".into()]), 5);
    }

    #[test]
    fn flat_qualifications_fold_into_one_all_group() {
        let specs = vec![
            QualificationSpec::Code("Q1".into()),
            QualificationSpec::Code("Q2".into()),
        ];
        let groups = normalize_qualifications(&specs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].match_type, QualMatchType::All);
        assert_eq!(groups[0].qualifications, vec!["Q1", "Q2"]);
    }

    #[test]
    fn group_qualifications_pass_through() {
        let raw = r#"[{"groupId":"G1","matchType":"ANY","qualifications":["Q1","Q2"]}]"#;
        let specs: Vec<QualificationSpec> = serde_json::from_str(raw).unwrap();
        let groups = normalize_qualifications(&specs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].match_type, QualMatchType::Any);
    }

    #[test]
    fn coverage_day_count_expands_to_leading_names() {
        let c = CoverageDays::Count(5);
        assert_eq!(c.day_names(), vec!["Mon", "Tue", "Wed", "Thu", "Fri"]);
    }

    #[test]
    fn overnight_shift_duration_counts_past_midnight() {
        let demand = DemandItem {
            demand_id: "D1".into(),
            location_id: None,
            ou_id: None,
            rostering_basis: None,
            min_staff_threshold_percentage: None,
            shift_start_date: None,
            shifts: vec![ShiftGroup {
                coverage_days: CoverageDays::default(),
                coverage_anchor: None,
                include_public_holidays: true,
                include_eve_of_public_holidays: true,
                whitelist: RosterList::default(),
                blacklist: RosterList::default(),
                preferred_teams: vec![],
                shift_details: vec![ShiftDetail {
                    shift_code: "N".into(),
                    start: "19:00".into(),
                    end: "07:00".into(),
                    next_day: true,
                }],
            }],
            requirements: vec![],
        };
        assert!((demand.max_shift_hours() - 12.0).abs() < 1e-9);
    }
}
