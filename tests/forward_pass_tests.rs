use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use production_schedule::{
    Algorithm, CalendarSet, DateConstraint, Dependency, JobBundle, JobWindow, Operation, RunOptions,
    RunState, ScheduleWarning, TimeWindow, WorkCalendar, schedule_bundle,
};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn chain() -> JobBundle {
    // A(4h) -> B(6h) -> C(2h)
    JobBundle::new(JobWindow::new(1, "Bracket").with_release(at(2025, 1, 1, 8)))
        .with_operation(Operation::new(1, 1, "A", 240))
        .with_operation(Operation::new(2, 1, "B", 360))
        .with_operation(Operation::new(3, 1, "C", 120))
        .with_dependency(Dependency::finish_to_start(1, 2))
        .with_dependency(Dependency::finish_to_start(2, 3))
}

fn window(plan: &production_schedule::SchedulePlan, id: i32) -> TimeWindow {
    plan.resolved_windows[&id].window()
}

#[test]
fn asap_chain_on_unrestricted_calendar() {
    let plan = schedule_bundle(&chain(), Algorithm::Asap, &RunOptions::default()).unwrap();

    assert_eq!(window(&plan, 1), TimeWindow::new(at(2025, 1, 1, 8), at(2025, 1, 1, 12)));
    assert_eq!(window(&plan, 2), TimeWindow::new(at(2025, 1, 1, 12), at(2025, 1, 1, 18)));
    assert_eq!(window(&plan, 3), TimeWindow::new(at(2025, 1, 1, 18), at(2025, 1, 1, 20)));
    assert_eq!(plan.state, RunState::Done);
    assert!(plan.warnings.is_empty());
}

#[test]
fn asap_starts_at_latest_predecessor_finish() {
    // 1 -> {2, 3} -> 4
    let bundle = JobBundle::new(JobWindow::new(1, "Frame").with_release(at(2025, 1, 1, 8)))
        .with_operation(Operation::new(1, 1, "Cut", 120))
        .with_operation(Operation::new(2, 1, "Drill", 180))
        .with_operation(Operation::new(3, 1, "Bend", 60))
        .with_operation(Operation::new(4, 1, "Assemble", 60))
        .with_dependency(Dependency::finish_to_start(1, 2))
        .with_dependency(Dependency::finish_to_start(1, 3))
        .with_dependency(Dependency::finish_to_start(2, 4))
        .with_dependency(Dependency::finish_to_start(3, 4));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 2).start, at(2025, 1, 1, 10));
    assert_eq!(window(&plan, 3).start, at(2025, 1, 1, 10));
    assert_eq!(window(&plan, 4), TimeWindow::new(at(2025, 1, 1, 13), at(2025, 1, 1, 14)));
}

#[test]
fn missing_release_uses_planning_start() {
    let mut bundle = chain();
    bundle.job.release = None;
    let options = RunOptions::default().with_planning_start(at(2025, 3, 3, 6));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &options).unwrap();
    assert_eq!(window(&plan, 1).start, at(2025, 3, 3, 6));
}

#[test]
fn must_start_on_is_kept_and_reported_when_predecessor_runs_late() {
    // Predecessor finishes at 11:00, MSO asks for 10:00.
    let bundle = JobBundle::new(JobWindow::new(1, "Gear").with_release(at(2025, 1, 1, 8)))
        .with_operation(Operation::new(1, 1, "Turn", 180))
        .with_operation(
            Operation::new(2, 1, "Hob", 120).with_constraint(DateConstraint::Mso(at(2025, 1, 1, 10))),
        )
        .with_dependency(Dependency::finish_to_start(1, 2));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 2), TimeWindow::new(at(2025, 1, 1, 10), at(2025, 1, 1, 12)));
    assert_eq!(plan.state, RunState::DoneWithWarnings);

    let violation = plan.warnings[0].as_violation().unwrap();
    assert_eq!(violation.operation_id, 2);
    assert_eq!(violation.requested_date, at(2025, 1, 1, 10));
    assert_eq!(violation.actual_date, at(2025, 1, 1, 11));
}

#[test]
fn must_start_on_without_conflict_has_no_warning() {
    let bundle = JobBundle::new(JobWindow::new(1, "Gear").with_release(at(2025, 1, 1, 8)))
        .with_operation(
            Operation::new(1, 1, "Hob", 120).with_constraint(DateConstraint::Mso(at(2025, 1, 1, 10))),
        );

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 1), TimeWindow::new(at(2025, 1, 1, 10), at(2025, 1, 1, 12)));
    assert!(plan.warnings.is_empty());
}

#[test]
fn blackout_on_resource_pushes_operation_past_it() {
    let mut press = WorkCalendar::unrestricted("press");
    press.add_blackout(
        TimeWindow::new(at(2025, 1, 1, 6), at(2025, 1, 1, 14)),
        "die change",
    );
    let bundle = JobBundle::new(JobWindow::new(1, "Panel").with_release(at(2025, 1, 1, 8)))
        .with_operation(Operation::new(1, 1, "Stamp", 120).with_resource("press"))
        .with_calendars(CalendarSet::default().with_resource("press", press));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 1), TimeWindow::new(at(2025, 1, 1, 14), at(2025, 1, 1, 16)));
}

#[test]
fn start_no_earlier_than_reanchors_to_working_time() {
    let shift = WorkCalendar::with_shift(
        "day",
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    );
    // 2025-01-06 is a Monday; SNET at 15:00 leaves one hour on Monday.
    let bundle = JobBundle::new(JobWindow::new(1, "Shaft").with_release(at(2025, 1, 6, 8)))
        .with_operation(
            Operation::new(1, 1, "Grind", 180).with_constraint(DateConstraint::Snet(at(2025, 1, 6, 15))),
        )
        .with_calendars(CalendarSet::default().with_facility(shift));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 1), TimeWindow::new(at(2025, 1, 6, 15), at(2025, 1, 7, 10)));
    assert!(plan.warnings.is_empty());
}

fn day_shift() -> WorkCalendar {
    WorkCalendar::with_shift(
        "day",
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
    )
}

fn constrained_on_day_shift(minutes: i64, constraint: DateConstraint) -> JobBundle {
    JobBundle::new(JobWindow::new(1, "Spindle").with_release(at(2025, 1, 6, 8)))
        .with_operation(Operation::new(1, 1, "Turn", minutes).with_constraint(constraint))
        .with_calendars(CalendarSet::default().with_facility(day_shift()))
}

#[test]
fn finish_no_earlier_than_in_off_hours_finishes_in_next_shift() {
    // Monday 20:00 is after the shift; the operation straddles the night.
    let bundle = constrained_on_day_shift(120, DateConstraint::Fnet(at(2025, 1, 6, 20)));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    let placed = window(&plan, 1);
    assert_eq!(
        placed,
        TimeWindow::new(
            at(2025, 1, 6, 14) + Duration::minutes(1),
            at(2025, 1, 7, 8) + Duration::minutes(1)
        )
    );
    assert!(placed.end >= at(2025, 1, 6, 20));
    assert_eq!(day_shift().working_time_between(placed.start, placed.end), Duration::hours(2));
    assert!(plan.warnings.is_empty());
}

#[test]
fn finish_no_earlier_than_in_shift_ends_on_the_date() {
    let bundle = constrained_on_day_shift(120, DateConstraint::Fnet(at(2025, 1, 6, 12)));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 1), TimeWindow::new(at(2025, 1, 6, 10), at(2025, 1, 6, 12)));
    assert!(plan.warnings.is_empty());
}

#[test]
fn must_start_on_counts_only_working_time() {
    // Three hours from Monday 15:00: one on Monday, two on Tuesday.
    let bundle = constrained_on_day_shift(180, DateConstraint::Mso(at(2025, 1, 6, 15)));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    let placed = window(&plan, 1);
    assert_eq!(placed, TimeWindow::new(at(2025, 1, 6, 15), at(2025, 1, 7, 10)));
    assert_eq!(day_shift().working_time_between(placed.start, placed.end), Duration::hours(3));
    assert!(plan.warnings.is_empty());
}

#[test]
fn must_finish_on_counts_only_working_time() {
    let bundle = constrained_on_day_shift(180, DateConstraint::Mfo(at(2025, 1, 7, 9)));

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    let placed = window(&plan, 1);
    assert_eq!(placed, TimeWindow::new(at(2025, 1, 6, 14), at(2025, 1, 7, 9)));
    assert_eq!(day_shift().working_time_between(placed.start, placed.end), Duration::hours(3));
    assert!(plan.warnings.is_empty());
}

#[test]
fn manual_operation_keeps_its_window() {
    let pinned = TimeWindow::new(at(2025, 1, 1, 9), at(2025, 1, 1, 10));
    let mut bundle = chain();
    bundle.operations[1] = Operation::new(2, 1, "B", 360).pinned(pinned);

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert_eq!(window(&plan, 2), pinned);
    assert!(plan.resolved_windows[&2].manual);
    // C follows the pinned window, and the overlap with A is reported.
    assert_eq!(window(&plan, 3).start, at(2025, 1, 1, 10));
    assert_eq!(
        plan.warnings,
        vec![ScheduleWarning::ManualPrecedenceConflict {
            operation_id: 2,
            neighbor_id: 1,
        }]
    );
}

#[test]
fn manual_operation_without_window_is_reported_and_skipped() {
    let mut bundle = chain();
    bundle.operations[0].is_manually_scheduled = true;

    let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
    assert!(!plan.resolved_windows.contains_key(&1));
    assert_eq!(window(&plan, 2).start, at(2025, 1, 1, 8));
    assert!(plan.needs_review().contains(&1));
}
