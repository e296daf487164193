use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use production_schedule::persistence::{
    PersistenceError, load_bundle_from_json, load_windows_from_csv, save_bundle_to_json,
    save_windows_to_csv,
};
use production_schedule::{
    Algorithm, CalendarSet, DateConstraint, Dependency, JobBundle, JobWindow, LinkType, Operation,
    RunOptions, TimeWindow, WorkCalendar, schedule_bundle,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn build_sample_bundle() -> JobBundle {
    let mut lathe = WorkCalendar::with_shift(
        "lathe",
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
    );
    lathe.add_holiday(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    lathe.add_blackout(TimeWindow::new(at(7, 6), at(7, 10)), "spindle service");

    JobBundle::new(JobWindow::new(5, "Export Job").with_release(at(6, 6)).with_due(at(17, 14)))
        .with_operation(Operation::new(1, 5, "Rough", 300).with_resource("lathe"))
        .with_operation(
            Operation::new(2, 5, "Finish", 120)
                .with_resource("lathe")
                .with_constraint(DateConstraint::Snet(at(8, 6))),
        )
        .with_operation(Operation::new(3, 5, "Inspect", 60).pinned(TimeWindow::new(at(9, 9), at(9, 10))))
        .with_dependency(Dependency::finish_to_start(1, 2))
        .with_dependency(Dependency::finish_to_start(2, 3).with_link_type(LinkType::StartToStart))
        .with_calendars(CalendarSet::default().with_resource("lathe", lathe))
}

#[test]
fn bundle_round_trips_through_json() {
    let bundle = build_sample_bundle();
    let file = NamedTempFile::new().unwrap();
    save_bundle_to_json(&bundle, file.path()).unwrap();

    let loaded = load_bundle_from_json(file.path()).unwrap();
    assert_eq!(loaded, bundle);
    assert_eq!(loaded.operations[1].constraint, DateConstraint::Snet(at(8, 6)));
    assert_eq!(loaded.dependencies[1].link_type, LinkType::StartToStart);
}

#[test]
fn json_with_duplicate_operation_is_rejected() {
    let mut bundle = build_sample_bundle();
    bundle.operations.push(Operation::new(1, 5, "Again", 10));
    let file = NamedTempFile::new().unwrap();

    let err = save_bundle_to_json(&bundle, file.path()).unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(msg) if msg.contains("duplicate")));
}

#[test]
fn windows_round_trip_through_csv() {
    let plan = schedule_bundle(&build_sample_bundle(), Algorithm::Asap, &RunOptions::default()).unwrap();
    let file = NamedTempFile::new().unwrap();
    save_windows_to_csv(&plan.resolved_windows, file.path()).unwrap();

    let loaded = load_windows_from_csv(file.path()).unwrap();
    assert_eq!(loaded, plan.resolved_windows);
    assert!(loaded[&3].manual);
}

#[test]
fn csv_with_inverted_window_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "operation_id,start,end,calendar_unresolved,manual").unwrap();
    writeln!(file, "1,2025-01-06T10:00:00,2025-01-06T08:00:00,false,false").unwrap();
    file.flush().unwrap();

    assert!(matches!(
        load_windows_from_csv(file.path()),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn csv_with_bad_datetime_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "operation_id,start,end,calendar_unresolved,manual").unwrap();
    writeln!(file, "1,yesterday,2025-01-06T08:00:00,false,false").unwrap();
    file.flush().unwrap();

    let err = load_windows_from_csv(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid datetime"));
}
