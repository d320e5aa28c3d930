use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A credential held by an employee, checked per-date at assignment time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum Qualification {
    /// Legacy flat form: just the code, never expires.
    Code(String),
    Full {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valid_from: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiry_date: Option<NaiveDate>,
    },
}

impl Qualification {
    pub fn code(&self) -> &str {
        match self {
            Self::Code(code) => code,
            Self::Full { code, .. } => code,
        }
    }

    /// A qualification is valid on `date` when it has started and not expired.
    /// Missing bounds are treated as open-ended.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        match self {
            Self::Code(_) => true,
            Self::Full {
                valid_from,
                expiry_date,
                ..
            } => {
                valid_from.is_none_or(|from| from <= date)
                    && expiry_date.is_none_or(|until| date <= until)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: String,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub product_type_id: Option<String>,
    #[serde(default)]
    pub rank_id: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// 1 = local, 0 = foreign. Defaults to local when absent.
    #[serde(default = "default_local")]
    pub local: u8,
    #[serde(default)]
    pub qualifications: Vec<Qualification>,
    /// Cyclic pattern of shift codes with `"O"` as the rest symbol. The
    /// preprocessor overwrites this with the rotated pattern for selected
    /// employees.
    #[serde(default)]
    pub work_pattern: Vec<String>,
    #[serde(default)]
    pub rotation_offset: usize,
    /// Accumulated hours used for fairness ordering during selection.
    #[serde(default)]
    pub total_working_hours: f64,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub ou_id: Option<String>,
    /// Soft back-reference to the requirement that selected this employee.
    /// An identifier value, never a pointer: it only marks pool ownership so
    /// no employee is double-booked across requirements.
    #[serde(
        default,
        rename = "_icpmpRequirementId",
        skip_serializing_if = "Option::is_none"
    )]
    pub icpmp_requirement_id: Option<String>,
    #[serde(default)]
    pub not_available_from: Option<NaiveDate>,
    /// Inclusive leave ranges during which the employee must not be
    /// scheduled. Populated by the incremental entry point, never from the
    /// wire.
    #[serde(skip)]
    pub leave_windows: Vec<(NaiveDate, NaiveDate)>,
}

fn default_local() -> u8 {
    1
}

impl Employee {
    /// Whether the employee can work at all on `date`.
    pub fn is_available_on(&self, date: NaiveDate) -> bool {
        if self.not_available_from.is_some_and(|from| date >= from) {
            return false;
        }
        !self
            .leave_windows
            .iter()
            .any(|(from, to)| *from <= date && date <= *to)
    }

    pub fn holds_valid(&self, code: &str, date: NaiveDate) -> bool {
        self.qualifications
            .iter()
            .any(|q| q.code() == code && q.is_valid_on(date))
    }

    /// Work days per cycle of the employee's current pattern.
    pub fn pattern_work_days(&self) -> usize {
        self.work_pattern.iter().filter(|s| *s != "O").count()
    }
}
