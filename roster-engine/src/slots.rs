//! Slot materialisation: expanding demand items into the flat list of
//! staffing positions the solver assigns employees to.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use crate::calendar::{parse_day_name, pattern_day};
use crate::domain::employee::Employee;
use crate::domain::{
    DailyHeadcountEntry, DayType, DemandItem, QualGroup, Requirement, RosteringBasis, ShiftDetail,
    Slot, SolveRequest,
};
use crate::scheme::requirement_schemes;

/// Builds slots for every demand-based requirement.
///
/// Headcount per `(date, shiftCode)` comes from the requirement's
/// `dailyHeadcount` table when present (zero suppresses the day entirely,
/// and time overrides replace the default shift window); otherwise the
/// static headcount applies and the day type is inferred from the
/// public-holiday set.
pub fn build_slots(request: &SolveRequest) -> Vec<Slot> {
    let horizon = request.planning_horizon;
    let holidays: HashSet<NaiveDate> = request.public_holidays.iter().copied().collect();
    let mut slots = Vec::new();

    for demand in &request.demand_items {
        if demand.rostering_basis.unwrap_or(request.effective_rostering_basis())
            == RosteringBasis::OutcomeBased
        {
            continue;
        }
        let anchor = demand.shift_start_date.unwrap_or(horizon.start_date);

        for group in &demand.shifts {
            let details: HashMap<&str, &ShiftDetail> = group
                .shift_details
                .iter()
                .map(|d| (d.shift_code.as_str(), d))
                .collect();
            let coverage_names = group.coverage_days.day_names();
            let coverage_weekdays: HashSet<chrono::Weekday> = coverage_names
                .iter()
                .filter_map(|d| parse_day_name(d))
                .collect();
            let coverage_anchor = group.coverage_anchor.unwrap_or(anchor);

            for requirement in &demand.requirements {
                let daily_lookup = daily_headcount_lookup(&requirement.daily_headcount);
                let qual_groups = requirement.qualification_groups();
                let shift_codes = requirement.pattern_shift_codes();
                if shift_codes.is_empty() {
                    tracing::warn!(
                        requirement_id = %requirement.requirement_id,
                        "work pattern has no shift codes, skipping requirement"
                    );
                    continue;
                }

                for shift_code in &shift_codes {
                    let Some(detail) = details.get(shift_code.as_str()) else {
                        tracing::warn!(
                            requirement_id = %requirement.requirement_id,
                            %shift_code,
                            "shift code missing from shiftDetails, skipping"
                        );
                        continue;
                    };

                    for date in shared::time::date_range(horizon.start_date, horizon.end_date) {
                        if !coverage_weekdays.contains(&date.weekday()) {
                            continue;
                        }
                        let next_day = date + Days::new(1);
                        let is_holiday = holidays.contains(&date);
                        let is_eve = holidays.contains(&next_day);
                        if is_holiday && !group.include_public_holidays {
                            continue;
                        }
                        if is_eve && !group.include_eve_of_public_holidays {
                            continue;
                        }

                        let (headcount, day_type, start_override, end_override) =
                            match daily_lookup.get(&(date, shift_code.clone())) {
                                Some(entry) => (
                                    entry.headcount,
                                    entry.day_type,
                                    entry.start_time_override.clone(),
                                    entry.end_time_override.clone(),
                                ),
                                None => {
                                    let day_type = if is_holiday {
                                        DayType::PublicHoliday
                                    } else if is_eve {
                                        DayType::EveOfPh
                                    } else {
                                        DayType::Normal
                                    };
                                    (
                                        requirement
                                            .headcount
                                            .as_ref()
                                            .map(|h| h.for_shift(shift_code))
                                            .unwrap_or(1),
                                        day_type,
                                        None,
                                        None,
                                    )
                                }
                            };
                        if headcount == 0 {
                            continue;
                        }

                        let start_str = start_override.as_deref().unwrap_or(&detail.start);
                        let end_str = end_override.as_deref().unwrap_or(&detail.end);
                        let Some((start, end)) =
                            shift_window(date, start_str, end_str, detail.next_day)
                        else {
                            continue;
                        };
                        let has_override = start_override.is_some() || end_override.is_some();

                        for position in 0..headcount {
                            slots.push(make_slot(
                                demand,
                                requirement,
                                group,
                                &qual_groups,
                                date,
                                shift_code,
                                start,
                                end,
                                position,
                                anchor,
                                coverage_anchor,
                                &coverage_names,
                                day_type,
                                has_override,
                            ));
                        }
                    }
                }
            }
        }
    }

    tracing::info!(count = slots.len(), "slots built");
    slots
}

/// Outcome-based variant: one slot per pattern work day of each selected
/// employee. Headcount is not enforced; template fidelity is the objective.
pub fn build_employee_based_slots(request: &SolveRequest, employees: &[Employee]) -> Vec<Slot> {
    let horizon = request.planning_horizon;
    let mut slots = Vec::new();

    for demand in &request.demand_items {
        let anchor = demand.shift_start_date.unwrap_or(horizon.start_date);
        let Some(group) = demand.shifts.first() else {
            continue;
        };
        let details: HashMap<&str, &ShiftDetail> = group
            .shift_details
            .iter()
            .map(|d| (d.shift_code.as_str(), d))
            .collect();
        let Some(requirement) = demand.requirements.first() else {
            continue;
        };
        let qual_groups = requirement.qualification_groups();

        for employee in employees {
            if employee.ou_id != demand.ou_id {
                continue;
            }
            let pattern = &employee.work_pattern;
            if pattern.is_empty() {
                continue;
            }
            for date in shared::time::date_range(horizon.start_date, horizon.end_date) {
                let idx = pattern_day(date, anchor, 0, pattern.len());
                let code = &pattern[idx];
                if code == "O" {
                    continue;
                }
                let Some(detail) = details.get(code.as_str()) else {
                    continue;
                };
                let Some((start, end)) = shift_window(date, &detail.start, &detail.end, detail.next_day)
                else {
                    continue;
                };
                let mut slot = make_slot(
                    demand,
                    requirement,
                    group,
                    &qual_groups,
                    date,
                    code,
                    start,
                    end,
                    0,
                    anchor,
                    group.coverage_anchor.unwrap_or(anchor),
                    &group.coverage_days.day_names(),
                    DayType::Normal,
                    false,
                );
                slot.slot_id = format!(
                    "{}-{}-{}-{}",
                    demand.demand_id,
                    employee.employee_id,
                    code,
                    date.format("%Y-%m-%d")
                );
                // template slots belong to their employee alone
                slot.whitelist = crate::domain::RosterList {
                    team_ids: vec![],
                    employee_ids: vec![employee.employee_id.clone()],
                };
                slots.push(slot);
            }
        }
    }

    slots
}

fn daily_headcount_lookup(
    entries: &[DailyHeadcountEntry],
) -> HashMap<(NaiveDate, String), &DailyHeadcountEntry> {
    entries
        .iter()
        .map(|e| ((e.date, e.shift_code.clone()), e))
        .collect()
}

/// Concrete start/end datetimes for a shift on a date. `end` lands on the
/// next civil day when `nextDay` is set or the naive end is not after the
/// start, keeping the slot invariant `start < end`.
fn shift_window(
    date: NaiveDate,
    start: &str,
    end: &str,
    next_day: bool,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let start_time = shared::time::parse_clock(start)?;
    let end_time = shared::time::parse_clock(end)?;
    let start_dt = date.and_time(start_time);
    let mut end_dt = date.and_time(end_time);
    if next_day || end_dt <= start_dt {
        end_dt += chrono::Duration::days(1);
    }
    Some((start_dt, end_dt))
}

#[allow(clippy::too_many_arguments)]
fn make_slot(
    demand: &DemandItem,
    requirement: &Requirement,
    group: &crate::domain::ShiftGroup,
    qual_groups: &[QualGroup],
    date: NaiveDate,
    shift_code: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    position: u32,
    anchor: NaiveDate,
    coverage_anchor: NaiveDate,
    coverage_names: &[String],
    day_type: DayType,
    has_override: bool,
) -> Slot {
    Slot {
        slot_id: format!(
            "{}-{}-{}-P{}-{}",
            demand.demand_id,
            requirement.requirement_id,
            shift_code,
            position,
            date.format("%Y-%m-%d")
        ),
        demand_id: demand.demand_id.clone(),
        requirement_id: requirement.requirement_id.clone(),
        date,
        shift_code: shift_code.to_string(),
        start,
        end,
        location_id: demand.location_id.clone(),
        ou_id: demand.ou_id.clone(),
        product_type_ids: requirement.accepted_product_types(),
        rank_ids: requirement.rank_ids.clone(),
        gender: requirement
            .gender
            .clone()
            .filter(|g| !g.eq_ignore_ascii_case("any")),
        schemes: requirement_schemes(requirement),
        required_qualifications: qual_groups.to_vec(),
        work_pattern: requirement.work_pattern.clone(),
        pattern_start_date: anchor,
        coverage_anchor,
        coverage_days: coverage_names.to_vec(),
        whitelist: group.whitelist.clone(),
        blacklist: group.blacklist.clone(),
        preferred_teams: group.preferred_teams.clone(),
        day_type,
        has_time_override: has_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_json(daily_headcount: serde_json::Value) -> SolveRequest {
        serde_json::from_value(serde_json::json!({
            "planningHorizon": {"startDate": "2026-01-05", "endDate": "2026-01-11"},
            "publicHolidays": ["2026-01-09"],
            "demandItems": [{
                "demandId": "D1",
                "locationId": "L1",
                "shifts": [{
                    "coverageDays": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
                    "includePublicHolidays": true,
                    "shiftDetails": [
                        {"shiftCode": "D", "start": "08:00", "end": "20:00"},
                        {"shiftCode": "N", "start": "20:00", "end": "08:00", "nextDay": true}
                    ]
                }],
                "requirements": [{
                    "requirementId": "R1",
                    "headcount": 2,
                    "workPattern": ["D", "D", "D", "D", "D", "O", "O"],
                    "dailyHeadcount": daily_headcount
                }]
            }],
            "employees": []
        }))
        .unwrap()
    }

    #[test]
    fn static_headcount_fans_out_positions_per_day() {
        let request = request_json(serde_json::json!([]));
        let slots = build_slots(&request);
        // 7 days x 2 positions, single shift code in pattern
        assert_eq!(slots.len(), 14);
        assert!(slots.iter().all(|s| s.shift_code == "D"));
        assert!(slots.iter().all(|s| s.start < s.end));

        // public holiday day type inferred, and its eve marked
        let ph_date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let eve = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        assert!(slots
            .iter()
            .filter(|s| s.date == ph_date)
            .all(|s| s.day_type == DayType::PublicHoliday));
        assert!(slots
            .iter()
            .filter(|s| s.date == eve)
            .all(|s| s.day_type == DayType::EveOfPh));
    }

    #[test]
    fn daily_headcount_overrides_count_and_times() {
        let request = request_json(serde_json::json!([
            {"date": "2026-01-06", "shiftCode": "D", "headcount": 0, "dayType": "Normal"},
            {"date": "2026-01-07", "shiftCode": "D", "headcount": 3, "dayType": "Normal",
             "startTimeOverride": "09:00", "endTimeOverride": "15:00"}
        ]));
        let slots = build_slots(&request);

        let jan6 = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        assert!(slots.iter().all(|s| s.date != jan6));

        let jan7: Vec<_> = slots
            .iter()
            .filter(|s| s.date == NaiveDate::from_ymd_opt(2026, 1, 7).unwrap())
            .collect();
        assert_eq!(jan7.len(), 3);
        assert!(jan7.iter().all(|s| s.has_time_override));
        assert!(jan7.iter().all(|s| s.start.time()
            == shared::time::parse_clock("09:00").unwrap()));
    }

    #[test]
    fn overnight_shift_ends_on_next_civil_day() {
        let (start, end) = shift_window(
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            "20:00",
            "08:00",
            true,
        )
        .unwrap();
        assert_eq!((end - start).num_hours(), 12);
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
    }

    #[test]
    fn excluded_public_holidays_drop_slots() {
        let mut request = request_json(serde_json::json!([]));
        request.demand_items[0].shifts[0].include_public_holidays = false;
        let slots = build_slots(&request);
        let ph_date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert!(slots.iter().all(|s| s.date != ph_date));
        assert_eq!(slots.len(), 12);
    }
}
