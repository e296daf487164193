pub mod frame;

use crate::algorithm::Algorithm;
use crate::operation::{DateConstraint, JobId, Operation, OperationId, ResourceId};
use crate::persistence::{PersistenceError, VersionStore};
use crate::window::TimeWindow;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

pub type VersionId = u64;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("schedule version {0} not found")]
    NotFound(VersionId),
    #[error("schedule version {version_id} belongs to job {actual}, not job {expected}")]
    JobMismatch {
        version_id: VersionId,
        expected: JobId,
        actual: JobId,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type VersionResult<T> = Result<T, VersionError>;

/// What produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    Optimization,
    Manual,
    Import,
    AutoSave,
    Rollback,
}

/// One operation's state as captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub manually_scheduled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub constraint: DateConstraint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i32>,
}

impl OperationWindow {
    pub fn capture(operation: &Operation) -> Self {
        Self {
            start: operation.scheduled_start,
            end: operation.scheduled_end,
            manually_scheduled: operation.is_manually_scheduled,
            resource_id: operation.resource_id.clone(),
            constraint: operation.constraint,
            sequence_number: operation.sequence_number,
        }
    }

    pub fn window(&self) -> Option<TimeWindow> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        }
    }

    /// Write the captured state back onto `operation` (caller-side write-back).
    pub fn apply_to(&self, operation: &mut Operation) {
        operation.scheduled_start = self.start;
        operation.scheduled_end = self.end;
        operation.is_manually_scheduled = self.manually_scheduled;
        operation.constraint = self.constraint;
        operation.sequence_number = self.sequence_number;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionSummary {
    pub operation_count: usize,
    /// Operations whose window differs from the parent version; every
    /// scheduled operation counts for a job's first version.
    pub changed_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionMetrics {
    pub makespan_hours: f64,
    pub total_working_hours: f64,
    /// Share of the makespan the involved resources spend working, 0..=100.
    pub resource_utilization: f64,
    pub constrained_operations: usize,
}

impl VersionMetrics {
    pub fn from_windows(windows: &BTreeMap<OperationId, OperationWindow>) -> Self {
        let mut earliest: Option<NaiveDateTime> = None;
        let mut latest: Option<NaiveDateTime> = None;
        let mut total_hours = 0.0;
        let mut resources: BTreeSet<&str> = BTreeSet::new();

        for captured in windows.values() {
            let Some(window) = captured.window() else {
                continue;
            };
            earliest = Some(earliest.map_or(window.start, |e| e.min(window.start)));
            latest = Some(latest.map_or(window.end, |l| l.max(window.end)));
            total_hours += hours(window.span());
            if let Some(resource) = captured.resource_id.as_deref() {
                resources.insert(resource);
            }
        }

        let makespan_hours = match (earliest, latest) {
            (Some(start), Some(end)) => hours(end - start),
            _ => 0.0,
        };
        let resource_utilization = if makespan_hours > 0.0 {
            let capacity = makespan_hours * resources.len().max(1) as f64;
            (total_hours / capacity * 100.0).min(100.0)
        } else {
            0.0
        };

        Self {
            makespan_hours,
            total_working_hours: round_tenth(total_hours),
            resource_utilization: round_tenth(resource_utilization),
            constrained_operations: windows.values().filter(|w| !w.constraint.is_none()).count(),
        }
    }
}

fn hours(duration: chrono::Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Immutable, point-in-time capture of a job's operation windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleVersion {
    pub id: VersionId,
    pub job_id: JobId,
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    pub algorithm: Algorithm,
    pub source: VersionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version_id: Option<VersionId>,
    pub windows: BTreeMap<OperationId, OperationWindow>,
    pub summary: VersionSummary,
    pub metrics: VersionMetrics,
    /// SHA-256 of the serialised windows.
    pub checksum: String,
}

impl ScheduleVersion {
    pub fn verify_checksum(&self) -> bool {
        checksum(&self.windows).is_ok_and(|sum| sum == self.checksum)
    }
}

fn checksum(windows: &BTreeMap<OperationId, OperationWindow>) -> VersionResult<String> {
    let bytes = serde_json::to_vec(windows)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowChange {
    pub operation_id: OperationId,
    pub old: Option<TimeWindow>,
    pub new: Option<TimeWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub makespan_hours: f64,
    pub total_working_hours: f64,
    pub resource_utilization: f64,
    pub constrained_operations: i64,
}

impl MetricsDelta {
    fn between(from: &VersionMetrics, to: &VersionMetrics) -> Self {
        Self {
            makespan_hours: to.makespan_hours - from.makespan_hours,
            total_working_hours: to.total_working_hours - from.total_working_hours,
            resource_utilization: to.resource_utilization - from.resource_utilization,
            constrained_operations: to.constrained_operations as i64
                - from.constrained_operations as i64,
        }
    }
}

/// Differences between two versions, all lists in ascending operation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDiff {
    pub from_version: VersionId,
    pub to_version: VersionId,
    /// Operations present in both versions whose window moved.
    pub changed: Vec<WindowChange>,
    pub added: Vec<OperationId>,
    pub removed: Vec<OperationId>,
    pub metrics_delta: MetricsDelta,
}

impl ScheduleDiff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyCheck {
    pub is_valid: bool,
    pub current_version: u32,
    pub expected_version: u32,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    pub source: Option<VersionSource>,
    pub comment: Option<String>,
    pub tag: Option<String>,
}

const MAX_RECORD_ATTEMPTS: u32 = 32;

/// Creates, looks up and compares schedule versions. Versions are written
/// once and never updated; restoring only hands windows back to the caller.
pub struct VersionSnapshotManager {
    store: Arc<dyn VersionStore>,
    // Serialises allocation among this manager's callers.
    allocation: Mutex<()>,
}

impl VersionSnapshotManager {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            allocation: Mutex::new(()),
        }
    }

    /// Capture every operation of `job_id` in `operations`.
    pub fn snapshot(
        &self,
        job_id: JobId,
        algorithm: Algorithm,
        operations: &[Operation],
    ) -> VersionResult<ScheduleVersion> {
        self.snapshot_with(job_id, algorithm, operations, SnapshotRequest::default())
    }

    pub fn snapshot_with(
        &self,
        job_id: JobId,
        algorithm: Algorithm,
        operations: &[Operation],
        request: SnapshotRequest,
    ) -> VersionResult<ScheduleVersion> {
        let windows: BTreeMap<OperationId, OperationWindow> = operations
            .iter()
            .filter(|op| op.job_id == job_id)
            .map(|op| (op.id, OperationWindow::capture(op)))
            .collect();
        self.record(job_id, algorithm, windows, request)
    }

    pub fn get(&self, version_id: VersionId) -> VersionResult<ScheduleVersion> {
        self.store
            .get_version(version_id)?
            .ok_or(VersionError::NotFound(version_id))
    }

    /// Windows of `version_id` for the caller to write back.
    pub fn restore(&self, version_id: VersionId) -> VersionResult<BTreeMap<OperationId, OperationWindow>> {
        Ok(self.get(version_id)?.windows)
    }

    pub fn diff(&self, from: VersionId, to: VersionId) -> VersionResult<ScheduleDiff> {
        let old = self.get(from)?;
        let new = self.get(to)?;

        let changed = new
            .windows
            .iter()
            .filter_map(|(id, captured)| {
                let before = old.windows.get(id)?;
                (before.window() != captured.window()).then_some(WindowChange {
                    operation_id: *id,
                    old: before.window(),
                    new: captured.window(),
                })
            })
            .collect();
        let added = new
            .windows
            .keys()
            .filter(|id| !old.windows.contains_key(*id))
            .copied()
            .collect();
        let removed = old
            .windows
            .keys()
            .filter(|id| !new.windows.contains_key(*id))
            .copied()
            .collect();

        Ok(ScheduleDiff {
            from_version: from,
            to_version: to,
            changed,
            added,
            removed,
            metrics_delta: MetricsDelta::between(&old.metrics, &new.metrics),
        })
    }

    pub fn latest(&self, job_id: JobId) -> VersionResult<Option<ScheduleVersion>> {
        Ok(self
            .store
            .versions_for_job(job_id)?
            .into_iter()
            .max_by_key(|v| v.version_number))
    }

    /// Newest first.
    pub fn history(&self, job_id: JobId, limit: usize) -> VersionResult<Vec<ScheduleVersion>> {
        let mut versions = self.store.versions_for_job(job_id)?;
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions.truncate(limit);
        Ok(versions)
    }

    /// Optimistic concurrency check before a caller writes a plan back.
    pub fn check_concurrency(&self, job_id: JobId, expected_version: u32) -> VersionResult<ConcurrencyCheck> {
        let current = self.latest(job_id)?;
        let current_version = current.as_ref().map_or(0, |v| v.version_number);
        let is_valid = current.is_none() || current_version == expected_version;
        Ok(ConcurrencyCheck {
            is_valid,
            current_version,
            expected_version,
            conflicts: if is_valid {
                Vec::new()
            } else {
                vec!["Version mismatch - schedule has been modified".to_string()]
            },
        })
    }

    /// Record a new version carrying `target_version_id`'s windows.
    pub fn rollback(
        &self,
        job_id: JobId,
        target_version_id: VersionId,
        reason: &str,
    ) -> VersionResult<ScheduleVersion> {
        let target = self.get(target_version_id)?;
        if target.job_id != job_id {
            return Err(VersionError::JobMismatch {
                version_id: target_version_id,
                expected: job_id,
                actual: target.job_id,
            });
        }
        let request = SnapshotRequest {
            source: Some(VersionSource::Rollback),
            comment: Some(format!(
                "Rollback to version {}: {reason}",
                target.version_number
            )),
            tag: Some(format!("rollback-v{}", target.version_number)),
        };
        self.record(job_id, target.algorithm, target.windows, request)
    }

    fn record(
        &self,
        job_id: JobId,
        algorithm: Algorithm,
        windows: BTreeMap<OperationId, OperationWindow>,
        request: SnapshotRequest,
    ) -> VersionResult<ScheduleVersion> {
        let _guard = self.allocation.lock();

        // Other managers may share the store; the store rejects a taken id
        // or version number and the next attempt re-reads both.
        let mut attempt = 1;
        let version = loop {
            let version = self.build_version(job_id, algorithm, &windows, &request)?;
            match self.store.insert_version(&version) {
                Ok(()) => break version,
                Err(PersistenceError::VersionConflict { .. }) if attempt < MAX_RECORD_ATTEMPTS => {
                    debug!(
                        "schedule version {} for job {} was taken, retrying",
                        version.id, job_id
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(
            "recorded schedule version {} (job {} v{}, {}, {} of {} operations changed)",
            version.id,
            job_id,
            version.version_number,
            version.algorithm,
            version.summary.changed_count,
            version.summary.operation_count
        );
        Ok(version)
    }

    fn build_version(
        &self,
        job_id: JobId,
        algorithm: Algorithm,
        windows: &BTreeMap<OperationId, OperationWindow>,
        request: &SnapshotRequest,
    ) -> VersionResult<ScheduleVersion> {
        let parent = self.latest(job_id)?;
        let changed_count = match &parent {
            Some(parent) => windows
                .iter()
                .filter(|(id, captured)| {
                    parent.windows.get(*id).and_then(OperationWindow::window) != captured.window()
                })
                .count(),
            None => windows.values().filter(|w| w.window().is_some()).count(),
        };

        Ok(ScheduleVersion {
            id: self.store.max_version_id()?.map_or(1, |max| max + 1),
            job_id,
            version_number: parent.as_ref().map_or(1, |p| p.version_number + 1),
            created_at: Utc::now(),
            algorithm,
            source: request.source.unwrap_or(VersionSource::Optimization),
            comment: request.comment.clone(),
            tag: request.tag.clone(),
            parent_version_id: parent.as_ref().map(|p| p.id),
            summary: VersionSummary {
                operation_count: windows.len(),
                changed_count,
            },
            metrics: VersionMetrics::from_windows(windows),
            checksum: checksum(windows)?,
            windows: windows.clone(),
        })
    }
}
