use crate::calendar::WorkCalendar;
use crate::operation::{Dependency, JobId, MAX_DURATION_MINUTES, Operation, ResourceId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobWindow {
    pub job_id: JobId,
    pub name: String,
    #[serde(default)]
    pub release: Option<NaiveDateTime>,
    #[serde(default)]
    pub due: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobWindowError {
    #[error("job {job_id} release {release} is after its due date {due}")]
    ReleaseAfterDue {
        job_id: JobId,
        release: NaiveDateTime,
        due: NaiveDateTime,
    },
    #[error("operation {operation_id} belongs to job {actual}, not job {expected}")]
    ForeignOperation {
        operation_id: i32,
        expected: JobId,
        actual: JobId,
    },
    #[error("operation {operation_id} has negative duration {duration_minutes}")]
    NegativeDuration {
        operation_id: i32,
        duration_minutes: i64,
    },
    #[error(
        "operation {operation_id} duration {duration_minutes} exceeds {max} minutes",
        max = MAX_DURATION_MINUTES
    )]
    DurationTooLong {
        operation_id: i32,
        duration_minutes: i64,
    },
}

impl JobWindow {
    pub fn new(job_id: JobId, name: impl Into<String>) -> Self {
        Self {
            job_id,
            name: name.into(),
            release: None,
            due: None,
        }
    }

    pub fn with_release(mut self, release: NaiveDateTime) -> Self {
        self.release = Some(release);
        self
    }

    pub fn with_due(mut self, due: NaiveDateTime) -> Self {
        self.due = Some(due);
        self
    }

    pub fn validate(&self) -> Result<(), JobWindowError> {
        if let (Some(release), Some(due)) = (self.release, self.due) {
            if release > due {
                return Err(JobWindowError::ReleaseAfterDue {
                    job_id: self.job_id,
                    release,
                    due,
                });
            }
        }
        Ok(())
    }
}

/// Facility default calendar plus per-resource overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarSet {
    #[serde(default)]
    pub facility: WorkCalendar,
    #[serde(default)]
    pub resources: HashMap<ResourceId, WorkCalendar>,
}

impl CalendarSet {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_facility(mut self, calendar: WorkCalendar) -> Self {
        self.facility = calendar;
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<ResourceId>, calendar: WorkCalendar) -> Self {
        self.resources.insert(resource_id.into(), calendar);
        self
    }
}

/// Read-only input of a single scheduling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBundle {
    pub job: JobWindow,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub calendars: CalendarSet,
}

impl JobBundle {
    pub fn new(job: JobWindow) -> Self {
        Self {
            job,
            operations: Vec::new(),
            dependencies: Vec::new(),
            calendars: CalendarSet::default(),
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_calendars(mut self, calendars: CalendarSet) -> Self {
        self.calendars = calendars;
        self
    }

    pub fn validate(&self) -> Result<(), JobWindowError> {
        self.job.validate()?;
        for operation in &self.operations {
            if operation.job_id != self.job.job_id {
                return Err(JobWindowError::ForeignOperation {
                    operation_id: operation.id,
                    expected: self.job.job_id,
                    actual: operation.job_id,
                });
            }
            if operation.duration_minutes < 0 {
                return Err(JobWindowError::NegativeDuration {
                    operation_id: operation.id,
                    duration_minutes: operation.duration_minutes,
                });
            }
            if operation.duration_minutes > MAX_DURATION_MINUTES {
                return Err(JobWindowError::DurationTooLong {
                    operation_id: operation.id,
                    duration_minutes: operation.duration_minutes,
                });
            }
        }
        Ok(())
    }
}
