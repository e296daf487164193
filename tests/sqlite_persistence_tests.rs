#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, NaiveDateTime};
use production_schedule::{
    Algorithm, Dependency, EngineConfig, JobBundle, JobWindow, Operation, PersistenceError,
    ScheduleRepository, SchedulingEngine, SqliteScheduleStore, VersionSnapshotManager,
    VersionStore,
};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn at(d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn bundle() -> JobBundle {
    JobBundle::new(JobWindow::new(3, "SQLite Job").with_release(at(1, 8)))
        .with_operation(Operation::new(1, 3, "Design", 240))
        .with_operation(Operation::new(2, 3, "Build", 360))
        .with_dependency(Dependency::finish_to_start(1, 2))
}

#[test]
fn sqlite_store_round_trips_jobs() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteScheduleStore::new(file.path()).unwrap();
    store.save_job(&bundle()).unwrap();

    let loaded = store.load_job(3).unwrap();
    assert_eq!(loaded, bundle());
    assert!(matches!(store.load_job(4), Err(PersistenceError::JobNotFound(4))));
}

#[test]
fn engine_runs_against_sqlite_and_versions_persist() {
    let file = NamedTempFile::new().unwrap();
    {
        let store = Arc::new(SqliteScheduleStore::new(file.path()).unwrap());
        store.save_job(&bundle()).unwrap();
        let engine = SchedulingEngine::new(store.clone(), store, EngineConfig::default());
        engine.run_asap(3).unwrap();
        engine.run_alap(3).unwrap();
    }

    let reopened = Arc::new(SqliteScheduleStore::new(file.path()).unwrap());
    let versions = VersionSnapshotManager::new(reopened.clone());
    let history = versions.history(3, 10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version_number, 2);
    assert_eq!(history[0].algorithm, Algorithm::Alap);
    assert_eq!(history[1].windows[&2].start, Some(at(1, 12)));
    assert!(history.iter().all(|v| v.verify_checksum()));
    assert_eq!(reopened.max_version_id().unwrap(), Some(history[0].id));
}

#[test]
fn sqlite_versions_are_write_once() {
    let store = Arc::new(SqliteScheduleStore::in_memory().unwrap());
    let versions = VersionSnapshotManager::new(store.clone());
    let mut ops = bundle().operations;
    ops[0].scheduled_start = Some(at(1, 8));
    ops[0].scheduled_end = Some(at(1, 12));

    let version = versions.snapshot(3, Algorithm::Asap, &ops).unwrap();
    assert!(matches!(
        store.insert_version(&version),
        Err(PersistenceError::VersionConflict { .. })
    ));
    assert_eq!(store.get_version(version.id).unwrap(), Some(version));
    assert!(store.get_version(999).unwrap().is_none());
}
