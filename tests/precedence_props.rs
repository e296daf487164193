use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use production_schedule::{
    Algorithm, CalendarSet, Dependency, JobBundle, JobWindow, Operation, RunOptions, WorkCalendar,
    schedule_bundle,
};
use proptest::prelude::*;

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn shift_calendar() -> WorkCalendar {
    WorkCalendar::with_shift(
        "day",
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
        NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
    )
}

/// Random DAG: edges only run from lower to higher index.
fn job_strategy() -> impl Strategy<Value = (JobBundle, Vec<(i32, i32)>)> {
    (1usize..10, any::<bool>())
        .prop_flat_map(|(n, shifts)| {
            (
                Just(n),
                Just(shifts),
                prop::collection::vec(0i64..600, n),
                prop::collection::vec(any::<bool>(), n * n),
            )
        })
        .prop_map(|(n, shifts, durations, edge_bits)| {
            let mut bundle = JobBundle::new(
                JobWindow::new(1, "Random")
                    .with_release(at(6, 7))
                    .with_due(at(24, 15)),
            );
            for (i, minutes) in durations.iter().enumerate() {
                let id = (i as i32 + 1) * 10;
                bundle = bundle.with_operation(Operation::new(id, 1, format!("Op {id}"), *minutes));
            }
            let mut edges = Vec::new();
            for i in 0..n {
                for j in (i + 1)..n {
                    if edge_bits[i * n + j] {
                        let (pred, succ) = ((i as i32 + 1) * 10, (j as i32 + 1) * 10);
                        edges.push((pred, succ));
                        bundle = bundle.with_dependency(Dependency::finish_to_start(pred, succ));
                    }
                }
            }
            if shifts {
                bundle = bundle.with_calendars(CalendarSet::default().with_facility(shift_calendar()));
            }
            (bundle, edges)
        })
}

proptest! {
    #[test]
    fn asap_never_starts_before_a_predecessor_ends((bundle, edges) in job_strategy()) {
        let plan = schedule_bundle(&bundle, Algorithm::Asap, &RunOptions::default()).unwrap();
        prop_assert_eq!(plan.resolved_windows.len(), bundle.operations.len());
        for (pred, succ) in edges {
            prop_assert!(plan.resolved_windows[&succ].start >= plan.resolved_windows[&pred].end);
        }
        for window in plan.resolved_windows.values() {
            prop_assert!(window.start >= at(6, 7));
        }
    }

    #[test]
    fn alap_never_ends_after_a_successor_starts((bundle, edges) in job_strategy()) {
        let plan = schedule_bundle(&bundle, Algorithm::Alap, &RunOptions::default()).unwrap();
        for (pred, succ) in edges {
            prop_assert!(plan.resolved_windows[&pred].end <= plan.resolved_windows[&succ].start);
        }
        for window in plan.resolved_windows.values() {
            prop_assert!(window.end <= at(24, 15));
        }
    }

    #[test]
    fn repeated_runs_give_identical_windows((bundle, _edges) in job_strategy()) {
        let options = RunOptions::default();
        let first = schedule_bundle(&bundle, Algorithm::Asap, &options).unwrap();
        let second = schedule_bundle(&bundle, Algorithm::Asap, &options).unwrap();
        prop_assert_eq!(first.resolved_windows, second.resolved_windows);
    }
}
