use super::{PersistenceError, PersistenceResult, ScheduleRepository, VersionStore};
use crate::job::JobBundle;
use crate::operation::{JobId, OperationId};
use crate::version::{ScheduleVersion, VersionId};
use crate::window::TimeWindow;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// In-process repository and version store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, JobBundle>>,
    versions: RwLock<BTreeMap<VersionId, ScheduleVersion>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, bundle: JobBundle) -> PersistenceResult<()> {
        super::validate_bundle(&bundle)?;
        self.jobs.write().insert(bundle.job.job_id, bundle);
        Ok(())
    }

    /// Write computed windows back onto the stored operations. Operations
    /// that are not in `windows` keep what they had.
    pub fn apply_windows<I>(&self, job_id: JobId, windows: I) -> PersistenceResult<()>
    where
        I: IntoIterator<Item = (OperationId, TimeWindow)>,
    {
        let mut jobs = self.jobs.write();
        let bundle = jobs
            .get_mut(&job_id)
            .ok_or(PersistenceError::JobNotFound(job_id))?;
        let windows: HashMap<OperationId, TimeWindow> = windows.into_iter().collect();
        for operation in &mut bundle.operations {
            if let Some(window) = windows.get(&operation.id) {
                operation.scheduled_start = Some(window.start);
                operation.scheduled_end = Some(window.end);
            }
        }
        Ok(())
    }
}

impl ScheduleRepository for MemoryStore {
    fn load_job(&self, job_id: JobId) -> PersistenceResult<JobBundle> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(PersistenceError::JobNotFound(job_id))
    }
}

impl VersionStore for MemoryStore {
    fn insert_version(&self, version: &ScheduleVersion) -> PersistenceResult<()> {
        let mut versions = self.versions.write();
        let taken = versions.contains_key(&version.id)
            || versions.values().any(|v| {
                v.job_id == version.job_id && v.version_number == version.version_number
            });
        if taken {
            return Err(PersistenceError::VersionConflict {
                version_id: version.id,
                job_id: version.job_id,
                version_number: version.version_number,
            });
        }
        versions.insert(version.id, version.clone());
        Ok(())
    }

    fn get_version(&self, version_id: VersionId) -> PersistenceResult<Option<ScheduleVersion>> {
        Ok(self.versions.read().get(&version_id).cloned())
    }

    fn versions_for_job(&self, job_id: JobId) -> PersistenceResult<Vec<ScheduleVersion>> {
        Ok(self
            .versions
            .read()
            .values()
            .filter(|v| v.job_id == job_id)
            .cloned()
            .collect())
    }

    fn max_version_id(&self) -> PersistenceResult<Option<VersionId>> {
        Ok(self.versions.read().keys().next_back().copied())
    }
}
