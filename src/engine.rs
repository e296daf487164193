use crate::algorithm::Algorithm;
use crate::calculations::{BackwardPass, ForwardPass, ResolvedWindow, ScheduleWarning, StepMeter};
use crate::calendar::{CalendarError, CalendarService};
use crate::config::{EngineConfig, RunOptions};
use crate::constraint::ConstraintViolation;
use crate::graph::{GraphError, OperationDag};
use crate::job::{JobBundle, JobWindowError};
use crate::operation::{JobId, Operation, OperationId};
use crate::persistence::{MemoryStore, PersistenceError, ScheduleRepository, VersionStore};
use crate::version::{ScheduleVersion, VersionError, VersionSnapshotManager};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("constraint conflict: {0}")]
    ConstraintConflict(ConstraintViolation),
    #[error(transparent)]
    CalendarExhausted(CalendarError),
    #[error("run budget exceeded after {steps} steps ({elapsed_ms} ms)")]
    BudgetExceeded { steps: u64, elapsed_ms: u64 },
    #[error("run cancelled")]
    Cancelled,
    #[error(transparent)]
    InvalidJobWindow(#[from] JobWindowError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Lifecycle of one run. `Failed` is only ever logged; callers see the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Init,
    GraphBuilt,
    Placing,
    Done,
    DoneWithWarnings,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Init => "init",
            RunState::GraphBuilt => "graph-built",
            RunState::Placing => "placing",
            RunState::Done => "done",
            RunState::DoneWithWarnings => "done-with-warnings",
            RunState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Computed windows of a run, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub job_id: JobId,
    pub algorithm: Algorithm,
    pub state: RunState,
    pub resolved_windows: BTreeMap<OperationId, ResolvedWindow>,
    pub warnings: Vec<ScheduleWarning>,
    pub steps: u64,
}

impl SchedulePlan {
    /// Copy the computed windows onto matching operations.
    pub fn apply_to(&self, operations: &mut [Operation]) {
        for operation in operations {
            if let Some(window) = self.resolved_windows.get(&operation.id) {
                operation.scheduled_start = Some(window.start);
                operation.scheduled_end = Some(window.end);
            }
        }
    }

    /// Operations named by at least one warning.
    pub fn needs_review(&self) -> BTreeSet<OperationId> {
        self.warnings.iter().map(ScheduleWarning::operation_id).collect()
    }
}

/// A plan together with the version recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    pub plan: SchedulePlan,
    pub version: ScheduleVersion,
}

impl ScheduleOutcome {
    pub fn resolved_windows(&self) -> &BTreeMap<OperationId, ResolvedWindow> {
        &self.plan.resolved_windows
    }

    pub fn warnings(&self) -> &[ScheduleWarning] {
        &self.plan.warnings
    }

    pub fn apply_to(&self, operations: &mut [Operation]) {
        self.plan.apply_to(operations);
    }
}

struct Run<'a> {
    job_id: JobId,
    algorithm: Algorithm,
    state: RunState,
    options: &'a RunOptions,
}

impl Run<'_> {
    fn transition(&mut self, next: RunState) {
        debug!("job {} ({}) {} -> {}", self.job_id, self.algorithm, self.state, next);
        self.state = next;
    }
}

/// Schedule one job without touching any store.
pub fn schedule_bundle(
    bundle: &JobBundle,
    algorithm: Algorithm,
    options: &RunOptions,
) -> Result<SchedulePlan, ScheduleError> {
    let mut run = Run {
        job_id: bundle.job.job_id,
        algorithm,
        state: RunState::Init,
        options,
    };
    match execute(&mut run, bundle) {
        Ok(plan) => Ok(plan),
        Err(err) => {
            run.transition(RunState::Failed);
            warn!("scheduling job {} ({}) failed: {err}", run.job_id, algorithm);
            Err(err)
        }
    }
}

fn execute(run: &mut Run<'_>, bundle: &JobBundle) -> Result<SchedulePlan, ScheduleError> {
    let options = run.options;
    let config = &options.config;
    info!(
        "scheduling job {} with {} ({} operations)",
        run.job_id,
        run.algorithm,
        bundle.operations.len()
    );

    bundle.validate()?;
    let dag = OperationDag::build(&bundle.operations, &bundle.dependencies)?;
    run.transition(RunState::GraphBuilt);

    let mut warnings: Vec<ScheduleWarning> = dag
        .degraded_links()
        .into_iter()
        .map(|dep| ScheduleWarning::LinkTypeDegraded {
            predecessor: dep.predecessor,
            successor: dep.successor,
            link_type: dep.link_type,
        })
        .collect();

    let calendars = CalendarService::new(
        bundle.calendars.facility.clone(),
        bundle.calendars.resources.clone(),
        config.horizon_days,
    )
    .with_contiguous_placement(config.contiguous_placement);

    run.transition(RunState::Placing);
    let mut meter = StepMeter::new(config.budget);
    let release = bundle
        .job
        .release
        .or(options.planning_start)
        .or(config.planning_start)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH.naive_utc());

    let forward = ForwardPass::new(&bundle.operations, &dag, &calendars, options);
    let pass = match run.algorithm {
        Algorithm::Asap => forward.execute(release, &mut meter)?,
        Algorithm::Alap => {
            let due = match bundle.job.due {
                Some(due) => due,
                None => latest_finish(&forward.execute(release, &mut meter)?.windows, release),
            };
            BackwardPass::new(&bundle.operations, &dag, &calendars, options)
                .execute(due, &mut meter)?
        }
    };
    warnings.extend(pass.warnings);

    run.transition(if warnings.is_empty() {
        RunState::Done
    } else {
        RunState::DoneWithWarnings
    });
    info!(
        "job {} scheduled: {} windows, {} warnings, {} steps",
        run.job_id,
        pass.windows.len(),
        warnings.len(),
        meter.steps()
    );

    Ok(SchedulePlan {
        job_id: run.job_id,
        algorithm: run.algorithm,
        state: run.state,
        resolved_windows: pass.windows,
        warnings,
        steps: meter.steps(),
    })
}

// Due date stand-in for ALAP runs on jobs without one.
fn latest_finish(windows: &BTreeMap<OperationId, ResolvedWindow>, fallback: NaiveDateTime) -> NaiveDateTime {
    windows.values().map(|w| w.end).max().unwrap_or(fallback)
}

/// Loads jobs, schedules them and records a version for every successful run.
pub struct SchedulingEngine {
    repository: Arc<dyn ScheduleRepository>,
    versions: VersionSnapshotManager,
    config: EngineConfig,
}

impl SchedulingEngine {
    pub fn new(
        repository: Arc<dyn ScheduleRepository>,
        versions: Arc<dyn VersionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            versions: VersionSnapshotManager::new(versions),
            config,
        }
    }

    /// Engine backed by a single in-memory store for jobs and versions.
    pub fn in_memory(store: Arc<MemoryStore>, config: EngineConfig) -> Self {
        Self::new(store.clone(), store, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn versions(&self) -> &VersionSnapshotManager {
        &self.versions
    }

    pub fn run_asap(&self, job_id: JobId) -> Result<ScheduleOutcome, ScheduleError> {
        self.run(job_id, Algorithm::Asap)
    }

    pub fn run_alap(&self, job_id: JobId) -> Result<ScheduleOutcome, ScheduleError> {
        self.run(job_id, Algorithm::Alap)
    }

    /// Pick the algorithm from a free-text request and run it.
    pub fn run_intent(&self, job_id: JobId, message: &str) -> Result<ScheduleOutcome, ScheduleError> {
        self.run(job_id, Algorithm::from_intent(message))
    }

    pub fn run(&self, job_id: JobId, algorithm: Algorithm) -> Result<ScheduleOutcome, ScheduleError> {
        self.run_with(job_id, algorithm, &RunOptions::new(self.config.clone()))
    }

    pub fn run_with(
        &self,
        job_id: JobId,
        algorithm: Algorithm,
        options: &RunOptions,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let bundle = self.repository.load_job(job_id)?;
        let plan = schedule_bundle(&bundle, algorithm, options)?;

        let mut operations = bundle.operations;
        plan.apply_to(&mut operations);
        let version = self.versions.snapshot(job_id, algorithm, &operations)?;

        Ok(ScheduleOutcome { plan, version })
    }

    /// Schedule independent jobs in parallel. Results keep the input order.
    pub fn run_jobs(
        &self,
        job_ids: &[JobId],
        algorithm: Algorithm,
    ) -> Vec<(JobId, Result<ScheduleOutcome, ScheduleError>)> {
        job_ids
            .par_iter()
            .map(|&job_id| (job_id, self.run(job_id, algorithm)))
            .collect()
    }
}
