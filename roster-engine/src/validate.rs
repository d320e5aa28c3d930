//! Input validation: fail fast with field-path pinpointed errors on inputs
//! the pipeline cannot safely handle, warn on inputs that are legal but
//! likely wrong. Every failure is reported as data, never raised.

use serde::{Deserialize, Serialize};

use crate::domain::{Headcount, RosteringBasis, SolveRequest};
use crate::scheme::{normalize_scheme, normalize_scheme_opt, requirement_schemes};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, field: impl Into<String>, code: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        });
    }
}

const MAX_HORIZON_DAYS_BEFORE_WARNING: i64 = 62;

pub fn validate(request: &SolveRequest) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_horizon(request, &mut report);
    validate_demand_items(request, &mut report);
    validate_employees(request, &mut report);
    validate_rostering_basis(request, &mut report);
    validate_feasibility(request, &mut report);

    if !report.errors.is_empty() {
        tracing::warn!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "request rejected by validation"
        );
    }
    report
}

fn validate_horizon(request: &SolveRequest, report: &mut ValidationReport) {
    let horizon = &request.planning_horizon;
    if horizon.start_date > horizon.end_date {
        report.error(
            "planningHorizon",
            "INVALID_DATE_RANGE",
            format!(
                "startDate {} is after endDate {}",
                horizon.start_date, horizon.end_date
            ),
        );
    } else if horizon.days() > MAX_HORIZON_DAYS_BEFORE_WARNING {
        report.warn(
            "planningHorizon",
            "LONG_HORIZON",
            format!(
                "planning horizon spans {} days; solves beyond {MAX_HORIZON_DAYS_BEFORE_WARNING} days may be slow",
                horizon.days()
            ),
        );
    }
}

fn validate_demand_items(request: &SolveRequest, report: &mut ValidationReport) {
    if request.demand_items.is_empty() {
        report.error("demandItems", "EMPTY", "at least one demand item is required");
        return;
    }

    for (d, demand) in request.demand_items.iter().enumerate() {
        let demand_path = format!("demandItems[{d}]");
        if demand.shifts.is_empty() {
            report.error(
                format!("{demand_path}.shifts"),
                "EMPTY",
                "demand item has no shift definitions",
            );
        }
        if demand.requirements.is_empty() {
            report.error(
                format!("{demand_path}.requirements"),
                "EMPTY",
                "demand item has no requirements",
            );
        }

        let mut known_codes: Vec<&str> = Vec::new();
        for group in &demand.shifts {
            for (s, detail) in group.shift_details.iter().enumerate() {
                known_codes.push(&detail.shift_code);
                for (field, value) in [("start", &detail.start), ("end", &detail.end)] {
                    if shared::time::parse_clock(value).is_none() {
                        report.error(
                            format!("{demand_path}.shifts.shiftDetails[{s}].{field}"),
                            "INVALID_TIME",
                            format!("'{value}' is not HH:MM or HH:MM:SS"),
                        );
                    }
                }
            }
        }

        let basis = demand
            .rostering_basis
            .unwrap_or(request.effective_rostering_basis());

        for (r, requirement) in demand.requirements.iter().enumerate() {
            let req_path = format!("{demand_path}.requirements[{r}]");

            if requirement.work_pattern.is_empty() {
                report.error(
                    format!("{req_path}.workPattern"),
                    "EMPTY",
                    "requirement has no work pattern",
                );
            }
            let pattern_codes = requirement.pattern_shift_codes();
            if !pattern_codes.is_empty() && known_codes.is_empty() {
                report.error(
                    format!("{req_path}.workPattern"),
                    "MISSING_SHIFT_DETAILS",
                    "work pattern references shifts but the demand has no shiftDetails",
                );
            } else {
                for code in &pattern_codes {
                    if !known_codes.contains(&code.as_str()) {
                        report.error(
                            format!("{req_path}.workPattern"),
                            "UNKNOWN_SHIFT_CODE",
                            format!("pattern shift code '{code}' has no shiftDetails entry"),
                        );
                    }
                }
            }

            match &requirement.headcount {
                Some(Headcount::PerShiftType(0)) if basis != RosteringBasis::OutcomeBased => {
                    report.error(
                        format!("{req_path}.headcount"),
                        "ZERO_HEADCOUNT",
                        "headcount 0 is only allowed in outcomeBased mode",
                    );
                }
                Some(Headcount::ByShift(map)) => {
                    if map.is_empty() {
                        report.error(
                            format!("{req_path}.headcount"),
                            "EMPTY_HEADCOUNT",
                            "per-shift headcount map is empty",
                        );
                    }
                    if basis != RosteringBasis::OutcomeBased && map.values().all(|v| *v == 0) {
                        report.error(
                            format!("{req_path}.headcount"),
                            "ZERO_HEADCOUNT",
                            "headcount 0 is only allowed in outcomeBased mode",
                        );
                    }
                }
                _ => {}
            }

            // unknown scheme strings surface as errors, 'Any'/'Global' pass
            let raw_schemes: Vec<String> = match (&requirement.schemes, &requirement.scheme) {
                (Some(list), _) => list.clone(),
                (None, Some(single)) => vec![single.clone()],
                (None, None) => vec![],
            };
            for value in raw_schemes {
                let lowered = value.trim().to_ascii_lowercase();
                if lowered != "any" && lowered != "global" && lowered != "all"
                    && normalize_scheme_opt(&value).is_none()
                {
                    report.error(
                        format!("{req_path}.schemes"),
                        "UNKNOWN_SCHEME",
                        format!("'{value}' does not normalise to A, B, P or Any"),
                    );
                }
            }
        }
    }
}

fn validate_employees(request: &SolveRequest, report: &mut ValidationReport) {
    if request.employees.is_empty() {
        report.error("employees", "EMPTY", "at least one employee is required");
        return;
    }
    for (e, employee) in request.employees.iter().enumerate() {
        if employee.employee_id.is_empty() {
            report.error(
                format!("employees[{e}].employeeId"),
                "EMPTY",
                "employeeId must not be empty",
            );
        }
        if let Some(raw) = employee.scheme.as_deref() {
            if normalize_scheme_opt(raw).is_none() {
                report.warn(
                    format!("employees[{e}].scheme"),
                    "UNKNOWN_SCHEME",
                    format!("'{raw}' does not normalise to A, B or P; defaulting to A"),
                );
            }
        }
    }
}

fn validate_rostering_basis(request: &SolveRequest, report: &mut ValidationReport) {
    for (d, demand) in request.demand_items.iter().enumerate() {
        if demand.rostering_basis != Some(RosteringBasis::OutcomeBased) {
            continue;
        }
        match demand.min_staff_threshold_percentage {
            Some(p) if (1.0..=100.0).contains(&p) => {}
            Some(p) => report.error(
                format!("demandItems[{d}].minStaffThresholdPercentage"),
                "OUT_OF_RANGE",
                format!("{p} is outside [1, 100]"),
            ),
            None => report.error(
                format!("demandItems[{d}].minStaffThresholdPercentage"),
                "MISSING",
                "outcomeBased demands require minStaffThresholdPercentage",
            ),
        }
        if request.ou_offsets.is_empty() {
            report.error(
                "ouOffsets",
                "MISSING",
                "outcomeBased mode requires a non-empty ouOffsets array at the root",
            );
        }
    }
}

/// Per-requirement pre-check: the filtered pool must reach the mathematical
/// lower bound `ceil(headcount * cycleLength / workDaysInPattern)`.
fn validate_feasibility(request: &SolveRequest, report: &mut ValidationReport) {
    for (d, demand) in request.demand_items.iter().enumerate() {
        for (r, requirement) in demand.requirements.iter().enumerate() {
            let work_days = requirement.pattern_work_days();
            if work_days == 0 {
                continue;
            }
            let shift_codes = requirement.pattern_shift_codes();
            let headcount = requirement
                .headcount
                .as_ref()
                .map(|h| h.total_per_day(&shift_codes))
                .unwrap_or(1);
            if headcount == 0 {
                continue;
            }
            let cycle = requirement.work_pattern.len();
            let lower_bound =
                (headcount as f64 * cycle as f64 / work_days as f64).ceil() as usize;

            let scheme_filter = requirement_schemes(requirement);
            let products = requirement.accepted_product_types();
            let candidates = request
                .employees
                .iter()
                .filter(|emp| {
                    products.is_empty()
                        || emp
                            .product_type_id
                            .as_ref()
                            .is_some_and(|p| products.contains(p))
                })
                .filter(|emp| {
                    requirement.rank_ids.is_empty()
                        || emp
                            .rank_id
                            .as_ref()
                            .is_some_and(|rank| requirement.rank_ids.contains(rank))
                })
                .filter(|emp| scheme_filter.accepts(normalize_scheme(emp.scheme.as_deref())))
                .count();

            let field = format!("demandItems[{d}].requirements[{r}]");
            if candidates == 0 {
                report.error(
                    field,
                    "NO_MATCHING_EMPLOYEES",
                    format!(
                        "no employee matches the product/rank/scheme filters of requirement {}",
                        requirement.requirement_id
                    ),
                );
            } else if candidates < lower_bound {
                report.warn(
                    field,
                    "LIKELY_INSUFFICIENT_EMPLOYEES",
                    format!(
                        "requirement {} needs at least {lower_bound} matching employees, found {candidates}",
                        requirement.requirement_id
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> SolveRequest {
        serde_json::from_value(json).unwrap()
    }

    fn valid_request() -> serde_json::Value {
        serde_json::json!({
            "planningHorizon": {"startDate": "2026-01-01", "endDate": "2026-01-31"},
            "demandItems": [{
                "demandId": "D1",
                "shifts": [{
                    "shiftDetails": [{"shiftCode": "D", "start": "08:00", "end": "20:00"}]
                }],
                "requirements": [{
                    "requirementId": "R1",
                    "headcount": 1,
                    "schemes": ["Scheme A"],
                    "workPattern": ["D", "D", "D", "D", "D", "O", "O"]
                }]
            }],
            "employees": (0..4).map(|i| serde_json::json!({
                "employeeId": format!("E{i}"),
                "scheme": "Scheme A"
            })).collect::<Vec<_>>()
        })
    }

    #[test]
    fn valid_request_passes() {
        let report = validate(&request(valid_request()));
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn reversed_dates_are_an_error() {
        let mut json = valid_request();
        json["planningHorizon"]["startDate"] = "2026-02-01".into();
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.code == "INVALID_DATE_RANGE"));
    }

    #[test]
    fn long_horizon_warns() {
        let mut json = valid_request();
        json["planningHorizon"]["endDate"] = "2026-03-31".into();
        let report = validate(&request(json));
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.code == "LONG_HORIZON"));
    }

    #[test]
    fn pattern_code_without_shift_details_is_an_error() {
        let mut json = valid_request();
        json["demandItems"][0]["requirements"][0]["workPattern"] =
            serde_json::json!(["N", "N", "O"]);
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.code == "UNKNOWN_SHIFT_CODE"));
    }

    #[test]
    fn zero_headcount_rejected_outside_outcome_based() {
        let mut json = valid_request();
        json["demandItems"][0]["requirements"][0]["headcount"] = 0.into();
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.code == "ZERO_HEADCOUNT"));
    }

    #[test]
    fn unknown_scheme_is_an_error() {
        let mut json = valid_request();
        json["demandItems"][0]["requirements"][0]["schemes"] = serde_json::json!(["Scheme Z"]);
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.code == "UNKNOWN_SCHEME"));
    }

    #[test]
    fn outcome_based_requires_threshold_and_offsets() {
        let mut json = valid_request();
        json["demandItems"][0]["rosteringBasis"] = "outcomeBased".into();
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.field.contains("minStaffThresholdPercentage")));
        assert!(report.errors.iter().any(|e| e.field == "ouOffsets"));
    }

    #[test]
    fn feasibility_precheck_warns_on_thin_pools() {
        let mut json = valid_request();
        // headcount 5 on a 5/7 pattern needs ceil(5*7/5) = 7 employees
        json["demandItems"][0]["requirements"][0]["headcount"] = 5.into();
        let report = validate(&request(json));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.code == "LIKELY_INSUFFICIENT_EMPLOYEES"));
    }

    #[test]
    fn empty_pools_and_demands_are_errors() {
        let mut json = valid_request();
        json["employees"] = serde_json::json!([]);
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.field == "employees"));

        let mut json = valid_request();
        json["demandItems"] = serde_json::json!([]);
        let report = validate(&request(json));
        assert!(report.errors.iter().any(|e| e.field == "demandItems"));
    }
}
