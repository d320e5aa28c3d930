//! The 0/1 search over the decision model.
//!
//! Greedy construction followed by local-search improvement, restarted from
//! shuffled orderings until the time budget runs out. Hard feasibility is
//! maintained incrementally: every at-most group and linear constraint keeps
//! a running left-hand side, so a candidate move is accepted or rejected in
//! O(constraints touching the variable).
//!
//! The objective is lexicographic: maximise assigned slots, then minimise
//! the soft penalty (per-variable penalties plus a workload-balance term).
//! Multi-start runs across a configured worker count with per-worker seeds,
//! so results are reproducible for a fixed seed and iteration budget.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::model::{Model, VarId};

const ASSIGN_REWARD: i64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub time_limit: Duration,
    pub workers: usize,
    pub seed: u64,
    /// Weight of the workload-balance penalty (tenths of a shift of
    /// per-employee deviation from the mean).
    pub balance_weight: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(15),
            workers: 1,
            seed: 42,
            balance_weight: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Full coverage with zero penalty: provably unimprovable.
    Optimal,
    /// Best solution found within the budget.
    Feasible,
    /// The model admits no assignment at all.
    Infeasible,
}

#[derive(Debug, Clone)]
pub struct Solution {
    /// Chosen variable per slot.
    pub chosen: Vec<Option<VarId>>,
    pub assigned: usize,
    pub penalty: i64,
}

impl Solution {
    fn score(&self) -> i64 {
        self.assigned as i64 * ASSIGN_REWARD - self.penalty
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub solution: Solution,
    pub status: SolveStatus,
    pub restarts: u64,
}

/// Static per-variable constraint membership, shared across workers.
struct VarIndex {
    /// var -> group indices
    groups: Vec<Vec<usize>>,
    /// var -> (linear index, coefficient)
    linear: Vec<Vec<(usize, i64)>>,
}

impl VarIndex {
    fn build(model: &Model) -> Self {
        let mut groups = vec![Vec::new(); model.var_count()];
        for (g, group) in model.groups.iter().enumerate() {
            for var in &group.vars {
                groups[*var].push(g);
            }
        }
        let mut linear = vec![Vec::new(); model.var_count()];
        for (c, constraint) in model.linear.iter().enumerate() {
            for (var, coeff) in &constraint.terms {
                linear[*var].push((c, *coeff));
            }
        }
        Self { groups, linear }
    }
}

/// Incrementally maintained assignment state.
struct State<'a> {
    model: &'a Model,
    index: &'a VarIndex,
    chosen: Vec<Option<VarId>>,
    group_counts: Vec<u32>,
    linear_lhs: Vec<i64>,
    emp_counts: Vec<u32>,
    assigned: usize,
    penalty: i64,
}

impl<'a> State<'a> {
    fn new(model: &'a Model, index: &'a VarIndex, slot_count: usize, emp_count: usize) -> Self {
        Self {
            model,
            index,
            chosen: vec![None; slot_count],
            group_counts: vec![0; model.groups.len()],
            linear_lhs: vec![0; model.linear.len()],
            emp_counts: vec![0; emp_count],
            assigned: 0,
            penalty: 0,
        }
    }

    fn can_set(&self, var: VarId) -> bool {
        let slot = self.model.candidates[var].slot;
        if self.chosen[slot].is_some() {
            return false;
        }
        for g in &self.index.groups[var] {
            let group = &self.model.groups[*g];
            if self.group_counts[*g] >= group.cap {
                return false;
            }
        }
        for (c, coeff) in &self.index.linear[var] {
            if self.linear_lhs[*c] + coeff > self.model.linear[*c].upper {
                return false;
            }
        }
        true
    }

    fn set(&mut self, var: VarId) {
        let cand = self.model.candidates[var];
        debug_assert!(self.chosen[cand.slot].is_none());
        self.chosen[cand.slot] = Some(var);
        for g in &self.index.groups[var] {
            self.group_counts[*g] += 1;
        }
        for (c, coeff) in &self.index.linear[var] {
            self.linear_lhs[*c] += coeff;
        }
        self.emp_counts[cand.emp] += 1;
        self.assigned += 1;
        self.penalty += self.model.var_penalty[var];
    }

    fn unset(&mut self, var: VarId) {
        let cand = self.model.candidates[var];
        debug_assert_eq!(self.chosen[cand.slot], Some(var));
        self.chosen[cand.slot] = None;
        for g in &self.index.groups[var] {
            self.group_counts[*g] -= 1;
        }
        for (c, coeff) in &self.index.linear[var] {
            self.linear_lhs[*c] -= coeff;
        }
        self.emp_counts[cand.emp] -= 1;
        self.assigned -= 1;
        self.penalty -= self.model.var_penalty[var];
    }

    /// Workload spread: total absolute deviation from the mean assignment
    /// count, in tenths of a shift.
    fn balance_penalty(&self) -> i64 {
        let active: Vec<u32> = self
            .emp_counts
            .iter()
            .copied()
            .filter(|c| *c > 0)
            .collect();
        if active.len() <= 1 {
            return 0;
        }
        let total: i64 = active.iter().map(|c| *c as i64).sum();
        let n = active.len() as i64;
        active
            .iter()
            .map(|c| ((*c as i64) * n - total).abs())
            .sum::<i64>()
            * 10
            / n
    }

    fn solution(&self, balance_weight: i64) -> Solution {
        Solution {
            chosen: self.chosen.clone(),
            assigned: self.assigned,
            penalty: self.penalty + balance_weight * self.balance_penalty(),
        }
    }
}

/// Greedy construction: slots in a (possibly shuffled) order, each taking
/// the feasible candidate with the lightest-loaded employee and the lowest
/// penalty.
fn construct(state: &mut State, slot_order: &[usize]) {
    for &slot in slot_order {
        let mut best: Option<(u32, i64, VarId)> = None;
        for &var in &state.model.by_slot[slot] {
            if !state.can_set(var) {
                continue;
            }
            let cand = state.model.candidates[var];
            let key = (state.emp_counts[cand.emp], state.model.var_penalty[var], var);
            if best.is_none_or(|b| key < (b.0, b.1, b.2)) {
                best = Some(key);
            }
        }
        if let Some((_, _, var)) = best {
            state.set(var);
        }
    }
}

/// Hill-climbing pass: repair unassigned slots (with single-eject chains)
/// and drift assigned slots toward cheaper candidates.
fn improve(state: &mut State, rng: &mut StdRng, deadline: Instant) {
    let slot_count = state.chosen.len();
    if slot_count == 0 {
        return;
    }
    let mut stale = 0u32;
    while Instant::now() < deadline && stale < 2_000 {
        stale += 1;
        let slot = rng.gen_range(0..slot_count);
        match state.chosen[slot] {
            None => {
                // direct repair
                let vars = state.model.by_slot[slot].clone();
                if let Some(&var) = vars.iter().find(|v| state.can_set(**v)) {
                    state.set(var);
                    stale = 0;
                    continue;
                }
                // single eject: free one blocking assignment, then try to
                // re-place it elsewhere; keep only a net improvement
                for &var in &vars {
                    let Some(blocking) = find_blocking(state, var) else {
                        continue;
                    };
                    let before = state.assigned;
                    state.unset(blocking);
                    if !state.can_set(var) {
                        state.set(blocking);
                        continue;
                    }
                    state.set(var);
                    let blocked_slot = state.model.candidates[blocking].slot;
                    let replacement = state.model.by_slot[blocked_slot]
                        .clone()
                        .into_iter()
                        .find(|v| state.can_set(*v));
                    if let Some(repl) = replacement {
                        state.set(repl);
                    }
                    if state.assigned > before {
                        stale = 0;
                    } else {
                        // revert: drop the ejected placement, restore
                        state.unset(var);
                        if state.can_set(blocking) {
                            state.set(blocking);
                        }
                    }
                    break;
                }
            }
            Some(current) => {
                // penalty-reducing reassignment
                let current_penalty = state.model.var_penalty[current];
                if current_penalty == 0 {
                    continue;
                }
                let vars = state.model.by_slot[slot].clone();
                state.unset(current);
                let better = vars
                    .into_iter()
                    .filter(|v| *v != current)
                    .filter(|v| state.model.var_penalty[*v] < current_penalty)
                    .find(|v| state.can_set(*v));
                match better {
                    Some(var) => {
                        state.set(var);
                        stale = 0;
                    }
                    None => state.set(current),
                }
            }
        }
    }
}

/// A chosen variable that shares a saturated at-most group with `var`.
fn find_blocking(state: &State, var: VarId) -> Option<VarId> {
    for g in &state.index.groups[var] {
        let group = &state.model.groups[*g];
        if state.group_counts[*g] < group.cap {
            continue;
        }
        for &other in &group.vars {
            if other != var {
                let slot = state.model.candidates[other].slot;
                if state.chosen[slot] == Some(other) {
                    return Some(other);
                }
            }
        }
    }
    None
}

/// Runs the full search: multi-start local search across `workers` threads.
pub fn search(model: &Model, slot_count: usize, emp_count: usize, config: &SearchConfig) -> SearchOutcome {
    let start = Instant::now();
    let deadline = start + config.time_limit;

    if slot_count > 0 && model.var_count() == 0 {
        return SearchOutcome {
            solution: Solution {
                chosen: vec![None; slot_count],
                assigned: 0,
                penalty: 0,
            },
            status: SolveStatus::Infeasible,
            restarts: 0,
        };
    }

    let index = VarIndex::build(model);
    let workers = config.workers.max(1);

    let results: Vec<(Solution, u64)> = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let index = &index;
            let seed = config.seed.wrapping_add(worker as u64);
            handles.push(scope.spawn(move || {
                run_worker(model, index, slot_count, emp_count, seed, deadline, config.balance_weight)
            }));
        }
        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .collect()
    });

    let restarts = results.iter().map(|(_, r)| r).sum();
    let best = results
        .into_iter()
        .map(|(s, _)| s)
        .max_by_key(Solution::score)
        .unwrap_or(Solution {
            chosen: vec![None; slot_count],
            assigned: 0,
            penalty: 0,
        });

    let status = if best.assigned == slot_count && best.penalty == 0 {
        SolveStatus::Optimal
    } else {
        SolveStatus::Feasible
    };

    tracing::info!(
        assigned = best.assigned,
        slots = slot_count,
        penalty = best.penalty,
        restarts,
        elapsed_ms = start.elapsed().as_millis() as u64,
        status = ?status,
        "search finished"
    );

    SearchOutcome {
        solution: best,
        status,
        restarts,
    }
}

fn run_worker(
    model: &Model,
    index: &VarIndex,
    slot_count: usize,
    emp_count: usize,
    seed: u64,
    deadline: Instant,
    balance_weight: i64,
) -> (Solution, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<Solution> = None;
    let mut restarts = 0u64;

    loop {
        restarts += 1;
        let mut order: Vec<usize> = (0..slot_count).collect();
        if restarts > 1 {
            order.shuffle(&mut rng);
        }

        let mut state = State::new(model, index, slot_count, emp_count);
        construct(&mut state, &order);
        improve(&mut state, &mut rng, deadline);

        let solution = state.solution(balance_weight);
        if best.as_ref().is_none_or(|b| solution.score() > b.score()) {
            best = Some(solution);
        }

        // perfect coverage with no penalty cannot be improved
        if best.as_ref().is_some_and(|b| b.assigned == slot_count && b.penalty == 0) {
            break;
        }
        if Instant::now() >= deadline {
            break;
        }
    }

    (
        best.unwrap_or(Solution {
            chosen: vec![None; slot_count],
            assigned: 0,
            penalty: 0,
        }),
        restarts,
    )
}
