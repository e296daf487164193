pub mod algorithm;
pub mod calculations;
pub mod calendar;
pub mod config;
pub mod constraint;
pub mod engine;
pub mod graph;
pub mod job;
pub mod operation;
pub mod persistence;
pub mod version;
pub mod window;

pub use algorithm::Algorithm;
pub use calculations::{ResolvedWindow, ScheduleWarning};
pub use calendar::{CalendarError, CalendarService, WorkCalendar};
pub use config::{CancellationToken, EngineConfig, RunBudget, RunOptions};
pub use constraint::{ConstraintEvaluator, ConstraintViolation, Direction};
pub use engine::{
    RunState, ScheduleError, ScheduleOutcome, SchedulePlan, SchedulingEngine, schedule_bundle,
};
pub use graph::{GraphError, OperationDag};
pub use job::{CalendarSet, JobBundle, JobWindow};
pub use operation::{
    ConstraintKind, DateConstraint, Dependency, LinkType, MAX_DURATION_MINUTES, Operation,
};
pub use persistence::{MemoryStore, PersistenceError, ScheduleRepository, VersionStore};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteScheduleStore;
pub use version::{ScheduleDiff, ScheduleVersion, VersionSnapshotManager};
pub use window::TimeWindow;
