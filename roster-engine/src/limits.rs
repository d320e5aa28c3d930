//! Pre-solve resource ceilings.
//!
//! The estimated decision-variable count is checked against a per-server
//! cap before any model is built, so oversized problems are rejected with a
//! remediation hint instead of exhausting the worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerTier {
    Small,
    #[default]
    Medium,
    Large,
}

impl ServerTier {
    pub fn max_estimated_variables(&self) -> u64 {
        match self {
            Self::Small => 50_000,
            Self::Medium => 200_000,
            Self::Large => 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemEstimate {
    pub slot_count: u64,
    pub employee_count: u64,
    pub avg_pattern_length: f64,
    pub estimated_variables: u64,
}

/// `|slots| * |employees| * avgPatternLength`, the same estimator the job
/// submission path uses before work is enqueued.
pub fn estimate_problem(slot_count: usize, employees: &[crate::domain::employee::Employee]) -> ProblemEstimate {
    let employee_count = employees.len() as u64;
    let avg_pattern_length = if employees.is_empty() {
        7.0
    } else {
        let total: usize = employees
            .iter()
            .map(|e| e.work_pattern.len().max(7))
            .sum();
        total as f64 / employees.len() as f64
    };
    let estimated = (slot_count as f64 * employee_count as f64 * avg_pattern_length) as u64;
    ProblemEstimate {
        slot_count: slot_count as u64,
        employee_count,
        avg_pattern_length,
        estimated_variables: estimated,
    }
}

/// Rejects problems beyond the tier ceiling with a remediation hint.
pub fn check_problem_size(estimate: &ProblemEstimate, tier: ServerTier) -> Result<(), String> {
    let cap = tier.max_estimated_variables();
    if estimate.estimated_variables > cap {
        return Err(format!(
            "estimated {} decision variables exceeds the {:?}-tier cap of {}; \
             split the planning horizon, reduce headcount, or move to a larger server",
            estimate.estimated_variables, tier, cap
        ));
    }
    Ok(())
}
