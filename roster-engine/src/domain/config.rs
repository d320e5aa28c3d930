use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scheme::Scheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    #[default]
    Hard,
    Medium,
    Soft,
}

/// One entry of `constraintList`: enables a constraint and carries its
/// parameters (cap hours, rest minutes, lunch rules, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSetting {
    pub id: String,
    #[serde(default)]
    pub enforcement: Enforcement,
    #[serde(default)]
    pub default_value: Option<f64>,
    #[serde(default)]
    pub scheme_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Lookup view over `constraintList`.
///
/// Every C-constraint consults this for its parameters; missing entries fall
/// back to the regulatory defaults baked into each call site.
#[derive(Debug, Clone, Default)]
pub struct ConstraintConfig {
    settings: Vec<ConstraintSetting>,
}

impl ConstraintConfig {
    pub fn new(settings: Vec<ConstraintSetting>) -> Self {
        Self { settings }
    }

    pub fn get(&self, id: &str) -> Option<&ConstraintSetting> {
        self.settings.iter().find(|s| s.id == id)
    }

    /// A constraint is enabled unless its entry exists with `enforcement`
    /// other than hard/medium (soft entries move to the penalty objective).
    pub fn is_hard(&self, id: &str) -> bool {
        self.get(id)
            .is_none_or(|s| s.enforcement != Enforcement::Soft)
    }

    /// Value for a constraint, preferring the per-scheme override.
    pub fn value(&self, id: &str, scheme: Option<Scheme>, default: f64) -> f64 {
        let Some(setting) = self.get(id) else {
            return default;
        };
        if let Some(scheme) = scheme {
            if let Some(v) = setting.scheme_overrides.get(scheme.as_str()) {
                return *v;
            }
        }
        setting.default_value.unwrap_or(default)
    }

    /// Numeric parameter from the `params` map.
    pub fn param(&self, id: &str, name: &str, default: f64) -> f64 {
        self.get(id)
            .and_then(|s| s.params.get(name))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(default)
    }

    /// Boolean parameter from the `params` map.
    pub fn param_bool(&self, id: &str, name: &str, default: bool) -> bool {
        self.get(id)
            .and_then(|s| s.params.get(name))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicableTo {
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub product_types: Vec<String>,
}

/// Month-length-dependent hour values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthValues {
    #[serde(default)]
    pub max_overtime_hours: Option<f64>,
    #[serde(default)]
    pub max_total_hours: Option<f64>,
    #[serde(default)]
    pub max_total_hours_foreign_cpl_sgt: Option<f64>,
    #[serde(default)]
    pub normal_hours_cap: Option<f64>,
}

/// One entry of `monthlyHourLimits`, keyed by month length (28..31).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyHourLimit {
    pub id: String,
    #[serde(default)]
    pub applicable_to: ApplicableTo,
    #[serde(default)]
    pub values_by_month_length: BTreeMap<String, MonthValues>,
}

impl MonthlyHourLimit {
    pub fn applies_to(&self, scheme: Scheme, product_type: &str) -> bool {
        let scheme_match = self.applicable_to.schemes.is_empty()
            || self.applicable_to.schemes.iter().any(|s| {
                s.eq_ignore_ascii_case("any")
                    || s.eq_ignore_ascii_case("all")
                    || crate::scheme::normalize_scheme_opt(s) == Some(scheme)
            });
        let product_match = self.applicable_to.product_types.is_empty()
            || self
                .applicable_to
                .product_types
                .iter()
                .any(|p| p.eq_ignore_ascii_case(product_type) || p.eq_ignore_ascii_case("all"));
        scheme_match && product_match
    }

    pub fn values_for(&self, month_length: u32) -> Option<&MonthValues> {
        self.values_by_month_length.get(&month_length.to_string())
    }
}

/// Per-soft-constraint weights for the objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverScoreConfig {
    pub workload_balance: f64,
    pub pattern_adherence: f64,
    pub preferred_teams: f64,
    pub ot_minimization: f64,
}

impl Default for SolverScoreConfig {
    fn default() -> Self {
        Self {
            workload_balance: 1.0,
            pattern_adherence: 2.0,
            preferred_teams: 0.5,
            ot_minimization: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverRunTime {
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
    #[serde(default)]
    pub parallel_workers: Option<usize>,
}

fn default_max_seconds() -> u64 {
    15
}

impl Default for SolverRunTime {
    fn default() -> Self {
        Self {
            max_seconds: default_max_seconds(),
            parallel_workers: None,
        }
    }
}

/// Rotation-offset policy. The boolean forms are legacy; string forms pick a
/// staggering strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetPolicy {
    Fixed(bool),
    Named(String),
}

impl Default for OffsetPolicy {
    fn default() -> Self {
        Self::Named("auto".to_string())
    }
}

impl OffsetPolicy {
    /// Whether employee offsets should be staggered by the preprocessor.
    pub fn staggers(&self) -> bool {
        match self {
            Self::Fixed(fixed) => !fixed,
            Self::Named(name) => matches!(name.as_str(), "auto" | "solverOptimized"),
        }
    }

    pub fn is_ou_based(&self) -> bool {
        matches!(self, Self::Named(name) if name == "ouOffsets")
    }

    pub fn is_team_based(&self) -> bool {
        matches!(self, Self::Named(name) if name == "teamOffsets")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_override_beats_default_value() {
        let config = ConstraintConfig::new(vec![ConstraintSetting {
            id: "momDailyHoursCap".into(),
            enforcement: Enforcement::Hard,
            default_value: Some(14.0),
            scheme_overrides: BTreeMap::from([("B".to_string(), 13.0), ("P".to_string(), 9.0)]),
            params: BTreeMap::new(),
        }]);
        assert_eq!(config.value("momDailyHoursCap", Some(Scheme::A), 14.0), 14.0);
        assert_eq!(config.value("momDailyHoursCap", Some(Scheme::B), 14.0), 13.0);
        assert_eq!(config.value("momDailyHoursCap", Some(Scheme::P), 14.0), 9.0);
        assert_eq!(config.value("missing", Some(Scheme::A), 42.0), 42.0);
    }

    #[test]
    fn monthly_limit_matches_scheme_and_product() {
        let limit: MonthlyHourLimit = serde_json::from_str(
            r#"{
                "id": "apgdMaximumOvertimeHours",
                "applicableTo": {"schemes": ["Scheme A"], "productTypes": ["APO"]},
                "valuesByMonthLength": {"31": {"maxOvertimeHours": 124}}
            }"#,
        )
        .unwrap();
        assert!(limit.applies_to(Scheme::A, "APO"));
        assert!(!limit.applies_to(Scheme::B, "APO"));
        assert!(!limit.applies_to(Scheme::A, "CVSO"));
        assert_eq!(
            limit.values_for(31).and_then(|v| v.max_overtime_hours),
            Some(124.0)
        );
        assert!(limit.values_for(30).is_none());
    }

    #[test]
    fn offset_policy_accepts_bool_and_string() {
        let fixed: OffsetPolicy = serde_json::from_str("true").unwrap();
        assert!(!fixed.staggers());
        let auto: OffsetPolicy = serde_json::from_str("\"auto\"").unwrap();
        assert!(auto.staggers());
        let ou: OffsetPolicy = serde_json::from_str("\"ouOffsets\"").unwrap();
        assert!(ou.is_ou_based());
    }
}
