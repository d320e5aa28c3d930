//! C4: minimum rest between shifts.
//!
//! For every employee, any pair of candidate shifts whose gap is shorter
//! than the minimum rest becomes an at-most-one group. Overlapping pairs on
//! different civil days fall out of the same test (negative gap). In
//! incremental mode the first shifts after the window are also checked
//! against the end of the employee's last locked shift.

use crate::model::Model;

use super::ConstraintContext;

const STANDARD_REST_MINUTES: i64 = 660;
const APGD_REST_MINUTES: i64 = 480;

pub fn apply(model: &mut Model, ctx: &ConstraintContext) {
    let mut pairs = 0;
    let mut fixed = 0;

    for (emp, vars) in model.by_emp.clone().iter().enumerate() {
        if vars.is_empty() {
            continue;
        }
        let rest_minutes = if ctx.views[emp].apgd_d10 {
            ctx.config
                .param("minRestBetweenShifts", "apgdMinRestMinutes", APGD_REST_MINUTES as f64)
                as i64
        } else {
            ctx.config
                .value("minRestBetweenShifts", None, STANDARD_REST_MINUTES as f64) as i64
        };

        // sort the employee's candidates by start time
        let mut ordered = vars.clone();
        ordered.sort_by_key(|v| ctx.slots[model.candidates[*v].slot].start);

        for (i, first) in ordered.iter().enumerate() {
            let s1 = &ctx.slots[model.candidates[*first].slot];
            for second in ordered.iter().skip(i + 1) {
                let s2 = &ctx.slots[model.candidates[*second].slot];
                if s1.date == s2.date {
                    continue; // one-per-day already forbids this pair
                }
                let gap = (s2.start - s1.end).num_minutes();
                if gap >= rest_minutes {
                    break; // ordered by start: later pairs only rest longer
                }
                model.add_group("C4", vec![*first, *second], 1);
                pairs += 1;
            }
        }

        // rest against the last locked shift
        if let Some(locked) = ctx.locked {
            let employee_id = &ctx.employees[emp].employee_id;
            if let Some(last_end) = locked.last_shift_end.get(employee_id) {
                for var in vars {
                    let slot = &ctx.slots[model.candidates[*var].slot];
                    if slot.start <= *last_end {
                        continue;
                    }
                    let gap = (slot.start - *last_end).num_minutes();
                    if gap < rest_minutes {
                        model.add_group("C4-locked", vec![*var], 0);
                        fixed += 1;
                    }
                }
            }
        }
    }
    tracing::debug!(pairs, fixed, "rest-period constraints emitted");
}
