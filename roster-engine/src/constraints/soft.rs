//! Soft constraints: per-variable penalties mixed into the objective.
//!
//! Same shapes as the hard catalogue but weighted instead of bounded.
//! Weights come from `solverScoreConfig`; the workload-balance term is
//! solution-level and handled by the search itself.

use crate::calendar::pattern_day;
use crate::hours::tenths;
use crate::model::Model;

use super::ConstraintContext;

/// Penalty scale: one weight unit costs this many objective points, keeping
/// penalties well below the reward for assigning a slot.
pub const PENALTY_SCALE: i64 = 10;

pub fn apply(model: &mut Model, ctx: &ConstraintContext, weights: &crate::domain::SolverScoreConfig) {
    let pattern_weight = (weights.pattern_adherence * PENALTY_SCALE as f64) as i64;
    let team_weight = (weights.preferred_teams * PENALTY_SCALE as f64) as i64;
    let ot_weight = (weights.ot_minimization * PENALTY_SCALE as f64) as i64;

    for (var, cand) in model.candidates.clone().iter().enumerate() {
        let slot = &ctx.slots[cand.slot];
        let employee = &ctx.employees[cand.emp];
        let mut penalty = 0;

        // working against the employee's rotated pattern
        let pattern = ctx.pattern_of(cand.emp);
        if !pattern.is_empty() {
            let idx = pattern_day(slot.date, slot.pattern_start_date, 0, pattern.len());
            let scheduled = &pattern[idx];
            if scheduled == "O" {
                penalty += pattern_weight;
            } else if *scheduled != slot.shift_code {
                penalty += pattern_weight / 2;
            }
        }

        // outside the shift's preferred teams
        if !slot.preferred_teams.is_empty()
            && !employee
                .team_id
                .as_ref()
                .is_some_and(|team| slot.preferred_teams.contains(team))
        {
            penalty += team_weight;
        }

        // overtime is paid time: discourage it proportionally
        let ot = ctx.var_hours(slot, cand.emp).ot;
        if ot > 0.0 {
            penalty += ot_weight * tenths(ot) / 10;
        }

        model.var_penalty[var] += penalty;
    }
}
