use crate::job::JobBundle;
use crate::operation::JobId;
use crate::version::{ScheduleVersion, VersionId};
use serde_json::Error as SerdeJsonError;
use std::collections::HashSet;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    /// Another writer already stored this id or this job's version number.
    #[error("schedule version {version_id} (job {job_id} v{version_number}) already exists")]
    VersionConflict {
        version_id: VersionId,
        job_id: JobId,
        version_number: u32,
    },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Read side of the host's operation store.
pub trait ScheduleRepository: Send + Sync {
    fn load_job(&self, job_id: JobId) -> PersistenceResult<JobBundle>;
}

/// Append-only storage for schedule versions.
pub trait VersionStore: Send + Sync {
    /// Fails with [`PersistenceError::VersionConflict`] when the id, or the
    /// job's version number, is already taken. The check and the write are
    /// atomic so writers sharing a store can retry.
    fn insert_version(&self, version: &ScheduleVersion) -> PersistenceResult<()>;
    fn get_version(&self, version_id: VersionId) -> PersistenceResult<Option<ScheduleVersion>>;
    fn versions_for_job(&self, job_id: JobId) -> PersistenceResult<Vec<ScheduleVersion>>;
    fn max_version_id(&self) -> PersistenceResult<Option<VersionId>>;
}

pub fn validate_bundle(bundle: &JobBundle) -> PersistenceResult<()> {
    bundle
        .validate()
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;

    let mut seen_ids = HashSet::with_capacity(bundle.operations.len());
    for operation in &bundle.operations {
        if !seen_ids.insert(operation.id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate operation id {}",
                operation.id
            )));
        }
        if operation.is_manually_scheduled && operation.scheduled_window().is_none() {
            log::warn!(
                "operation {} is manually scheduled without a stored window",
                operation.id
            );
        }
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_bundle_from_json, load_windows_from_csv, save_bundle_to_json, save_windows_to_csv,
};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteScheduleStore;
