//! Scheme normalisation and the support predicates shared by the
//! preprocessor, the constraint layer and the output builder.

use serde::{Deserialize, Serialize};

use crate::domain::employee::Employee;
use crate::domain::{QualGroup, QualMatchType, Requirement};

/// Employment scheme. A and B are full-time variants with different daily
/// caps; P is part-time and hour-limited rather than day-limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    A,
    B,
    P,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::P => "P",
        }
    }

    /// Default daily gross-hour cap, overridable via `constraintList`.
    pub fn default_daily_cap_hours(&self) -> f64 {
        match self {
            Self::A => 14.0,
            Self::B => 13.0,
            Self::P => 9.0,
        }
    }
}

/// Strictly parses a scheme string; `None` for anything unrecognised.
/// Accepts both short codes (`"A"`) and the long form (`"Scheme A"`).
pub fn normalize_scheme_opt(value: &str) -> Option<Scheme> {
    let trimmed = value.trim();
    let letter = trimmed.strip_prefix("Scheme ").unwrap_or(trimmed).trim();
    match letter.to_ascii_uppercase().as_str() {
        "A" => Some(Scheme::A),
        "B" => Some(Scheme::B),
        "P" => Some(Scheme::P),
        _ => None,
    }
}

/// Lenient normalisation: unknown or missing values default to Scheme A.
pub fn normalize_scheme(value: Option<&str>) -> Scheme {
    match value {
        Some(raw) => normalize_scheme_opt(raw).unwrap_or_else(|| {
            tracing::warn!(scheme = raw, "unknown scheme, defaulting to A");
            Scheme::A
        }),
        None => Scheme::A,
    }
}

/// Scheme filter on a requirement: a concrete list or the `Any` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeFilter {
    Any,
    List(Vec<Scheme>),
}

impl SchemeFilter {
    pub fn accepts(&self, scheme: Scheme) -> bool {
        match self {
            Self::Any => true,
            Self::List(schemes) => schemes.contains(&scheme),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// True when selection should be partitioned across schemes.
    pub fn is_multi(&self) -> bool {
        match self {
            Self::Any => true,
            Self::List(schemes) => schemes.len() > 1,
        }
    }
}

/// Normalises a requirement's scheme specification.
///
/// Plural `schemes` wins over the legacy singular `scheme`; `"Global"` and
/// `"Any"` (and an empty list) accept every scheme.
pub fn requirement_schemes(req: &Requirement) -> SchemeFilter {
    let raw: Vec<String> = match (&req.schemes, &req.scheme) {
        (Some(list), _) => list.clone(),
        (None, Some(single)) => vec![single.clone()],
        (None, None) => return SchemeFilter::Any,
    };
    if raw.is_empty() {
        return SchemeFilter::Any;
    }
    let mut schemes = Vec::new();
    for value in &raw {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered == "any" || lowered == "global" || lowered == "all" {
            return SchemeFilter::Any;
        }
        if let Some(scheme) = normalize_scheme_opt(value) {
            if !schemes.contains(&scheme) {
                schemes.push(scheme);
            }
        }
    }
    if schemes.is_empty() {
        SchemeFilter::Any
    } else {
        SchemeFilter::List(schemes)
    }
}

/// APGD-D10 detection is automatic on Scheme A + APO product. Any legacy
/// `enableAPGD-D10` flag in the input is ignored.
pub fn is_apgd_d10(employee: &Employee) -> bool {
    normalize_scheme(employee.scheme.as_deref()) == Scheme::A
        && employee
            .product_type_id
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case("APO"))
}

/// Monthly-cap category for APGD-D10 employees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApgdCategory {
    Standard,
    ForeignCplSgt,
}

pub fn apgd_category(employee: &Employee) -> ApgdCategory {
    let rank = employee
        .rank_id
        .as_deref()
        .map(|r| r.trim().to_ascii_uppercase())
        .unwrap_or_default();
    if employee.local == 0 && (rank == "CPL" || rank == "SGT") {
        ApgdCategory::ForeignCplSgt
    } else {
        ApgdCategory::Standard
    }
}

/// Evaluates qualification groups for one employee on one date.
/// Groups are ANDed; within a group `ALL` requires every code and `ANY`
/// at least one, each held and valid on the date.
pub fn meets_qualification_groups(
    employee: &Employee,
    groups: &[QualGroup],
    date: chrono::NaiveDate,
) -> bool {
    groups.iter().all(|group| {
        if group.qualifications.is_empty() {
            return true;
        }
        match group.match_type {
            QualMatchType::All => group
                .qualifications
                .iter()
                .all(|code| employee.holds_valid(code, date)),
            QualMatchType::Any => group
                .qualifications
                .iter()
                .any(|code| employee.holds_valid(code, date)),
        }
    })
}
