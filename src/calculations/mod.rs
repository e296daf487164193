pub mod backward_pass;
pub mod forward_pass;

use crate::calendar::{CalendarError, CalendarService, Search};
use crate::config::{CancellationToken, RunBudget};
use crate::constraint::{ConstraintEvaluator, ConstraintViolation, Direction};
use crate::engine::ScheduleError;
use crate::operation::{DateConstraint, LinkType, Operation, OperationId, ResourceId};
use crate::window::TimeWindow;
use chrono::{Duration, NaiveDateTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

pub use backward_pass::BackwardPass;
pub use forward_pass::ForwardPass;

/// Window computed (or kept, for manual operations) by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Placed without calendar data; the window is plain wall-clock time.
    #[serde(default)]
    pub calendar_unresolved: bool,
    #[serde(default)]
    pub manual: bool,
}

impl ResolvedWindow {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    fn computed(window: TimeWindow, calendar_unresolved: bool) -> Self {
        Self {
            start: window.start,
            end: window.end,
            calendar_unresolved,
            manual: false,
        }
    }

    fn manual(window: TimeWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
            calendar_unresolved: false,
            manual: true,
        }
    }
}

/// Non-fatal finding of a run. Every warning names the operation needing review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleWarning {
    ConstraintViolation(ConstraintViolation),
    CalendarUnresolved {
        operation_id: OperationId,
        resource_id: Option<ResourceId>,
        placed_at: NaiveDateTime,
    },
    LinkTypeDegraded {
        predecessor: OperationId,
        successor: OperationId,
        link_type: LinkType,
    },
    ManualWindowMissing {
        operation_id: OperationId,
    },
    /// A pinned operation overlaps the window its neighbours require.
    ManualPrecedenceConflict {
        operation_id: OperationId,
        neighbor_id: OperationId,
    },
}

impl ScheduleWarning {
    pub fn operation_id(&self) -> OperationId {
        match self {
            ScheduleWarning::ConstraintViolation(v) => v.operation_id,
            ScheduleWarning::CalendarUnresolved { operation_id, .. } => *operation_id,
            ScheduleWarning::LinkTypeDegraded { successor, .. } => *successor,
            ScheduleWarning::ManualWindowMissing { operation_id } => *operation_id,
            ScheduleWarning::ManualPrecedenceConflict { operation_id, .. } => *operation_id,
        }
    }

    pub fn as_violation(&self) -> Option<&ConstraintViolation> {
        match self {
            ScheduleWarning::ConstraintViolation(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleWarning::ConstraintViolation(v) => write!(f, "{v}"),
            ScheduleWarning::CalendarUnresolved {
                operation_id,
                resource_id,
                placed_at,
            } => write!(
                f,
                "operation {operation_id} placed at {placed_at} without calendar data for {}",
                resource_id.as_deref().unwrap_or("facility calendar")
            ),
            ScheduleWarning::LinkTypeDegraded {
                predecessor,
                successor,
                link_type,
            } => write!(
                f,
                "dependency {predecessor} -> {successor} of type {} treated as FS",
                link_type.as_str()
            ),
            ScheduleWarning::ManualWindowMissing { operation_id } => write!(
                f,
                "manually scheduled operation {operation_id} has no stored window"
            ),
            ScheduleWarning::ManualPrecedenceConflict {
                operation_id,
                neighbor_id,
            } => write!(
                f,
                "manually scheduled operation {operation_id} conflicts with dependency on {neighbor_id}"
            ),
        }
    }
}

/// Output of one pass before it is packaged by the engine.
#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub windows: BTreeMap<OperationId, ResolvedWindow>,
    pub warnings: Vec<ScheduleWarning>,
}

/// Step and wall-clock accounting for one run.
#[derive(Debug)]
pub struct StepMeter {
    steps: u64,
    started: Instant,
    budget: RunBudget,
}

impl StepMeter {
    pub fn new(budget: RunBudget) -> Self {
        Self {
            steps: 0,
            started: Instant::now(),
            budget,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn charge(&mut self, steps: u64) -> Result<(), ScheduleError> {
        self.steps = self.steps.saturating_add(steps);
        let elapsed = self.started.elapsed();
        let over_steps = self.budget.max_steps.is_some_and(|max| self.steps > max);
        let over_time = self.budget.max_duration().is_some_and(|max| elapsed > max);
        if over_steps || over_time {
            return Err(ScheduleError::BudgetExceeded {
                steps: self.steps,
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    /// Called before every operation placement.
    pub fn checkpoint(&mut self, cancellation: &CancellationToken) -> Result<(), ScheduleError> {
        if cancellation.is_cancelled() {
            return Err(ScheduleError::Cancelled);
        }
        self.charge(1)
    }
}

/// Calendar placement plus constraint resolution for one operation.
pub(crate) struct Placer<'a> {
    pub calendars: &'a CalendarService,
    pub evaluator: ConstraintEvaluator,
    pub strict: bool,
}

impl<'a> Placer<'a> {
    pub fn new(calendars: &'a CalendarService, strict: bool) -> Self {
        Self {
            calendars,
            evaluator: ConstraintEvaluator::new(),
            strict,
        }
    }

    /// `boundary` is the earliest start (forward) or latest finish (backward)
    /// allowed by dependencies and the job window.
    pub fn place(
        &self,
        operation: &Operation,
        boundary: NaiveDateTime,
        direction: Direction,
        meter: &mut StepMeter,
        warnings: &mut Vec<ScheduleWarning>,
    ) -> Result<ResolvedWindow, ScheduleError> {
        let resource = operation.resource_id.as_deref();
        let duration = operation.duration();

        let search = match direction {
            Direction::Forward => self.calendars.search_forward(resource, boundary, duration),
            Direction::Backward => self.calendars.search_backward(resource, boundary, duration),
        };
        let (tentative, mut unresolved) = match search {
            Ok(search) => {
                meter.charge(search.days_scanned)?;
                (search.window, false)
            }
            Err(err) => {
                meter.charge(u64::from(self.calendars.horizon_days()))?;
                let fallback = match direction {
                    Direction::Forward => TimeWindow::starting_at(boundary, duration),
                    Direction::Backward => TimeWindow::ending_at(boundary, duration),
                };
                self.unresolved(operation, err, boundary, warnings)?;
                (fallback, true)
            }
        };

        let mut outcome = self.evaluator.apply(operation, tentative, direction);
        if !unresolved {
            if let Some(pinned) = self.pinned_span(resource, operation.constraint, duration) {
                match pinned {
                    Ok(search) => {
                        meter.charge(search.days_scanned)?;
                        outcome = self
                            .evaluator
                            .pinned(operation, search.window, tentative, direction);
                    }
                    Err(err) => {
                        meter.charge(u64::from(self.calendars.horizon_days()))?;
                        self.unresolved(operation, err, outcome.window().start, warnings)?;
                        unresolved = true;
                    }
                }
            }
        }
        let mut window = outcome.window();
        let mut violation = outcome.violation().copied();

        if window != tentative && !unresolved {
            let anchored = match operation.constraint {
                DateConstraint::Snet(_) => {
                    Some(self.calendars.search_forward(resource, window.start, duration))
                }
                DateConstraint::Fnet(date) => Some(self.finish_not_before(resource, date, duration)),
                _ => None,
            };
            if let Some(anchored) = anchored {
                match anchored {
                    Ok(search) => {
                        meter.charge(search.days_scanned)?;
                        window = search.window;
                    }
                    Err(err) => {
                        meter.charge(u64::from(self.calendars.horizon_days()))?;
                        self.unresolved(operation, err, window.start, warnings)?;
                        unresolved = true;
                    }
                }
                if violation.is_none() {
                    violation = self.evaluator.check(operation, window);
                }
            }
        }

        if let Some(violation) = violation {
            if self.strict {
                return Err(ScheduleError::ConstraintConflict(violation));
            }
            warn!("{violation}");
            warnings.push(ScheduleWarning::ConstraintViolation(violation));
        }

        debug!(
            "placed operation {} at {} ({:?} pass)",
            operation.id, window, direction
        );
        Ok(ResolvedWindow::computed(window, unresolved))
    }

    /// MSO/MFO window with the pinned edge kept and the other edge counted
    /// in working time.
    fn pinned_span(
        &self,
        resource: Option<&str>,
        constraint: DateConstraint,
        duration: Duration,
    ) -> Option<Result<Search, CalendarError>> {
        match constraint {
            DateConstraint::Mso(date) => Some(
                self.calendars
                    .search_forward(resource, date, duration)
                    .map(|search| Search {
                        window: TimeWindow::new(date, search.window.end),
                        days_scanned: search.days_scanned,
                    }),
            ),
            DateConstraint::Mfo(date) => Some(
                self.calendars
                    .search_backward(resource, date, duration)
                    .map(|search| Search {
                        window: TimeWindow::new(search.window.start, date),
                        days_scanned: search.days_scanned,
                    }),
            ),
            _ => None,
        }
    }

    /// Earliest placement that still finishes at or after `date`.
    ///
    /// When `date` falls in non-working time the backward placement ends at
    /// the last working instant before it, so the operation is instead
    /// finished one minute into the next working stretch.
    fn finish_not_before(
        &self,
        resource: Option<&str>,
        date: NaiveDateTime,
        duration: Duration,
    ) -> Result<Search, CalendarError> {
        let backward = self.calendars.search_backward(resource, date, duration)?;
        if backward.window.end >= date {
            return Ok(backward);
        }
        let mut days_scanned = backward.days_scanned;

        let next = self
            .calendars
            .search_forward(resource, date, Duration::minutes(1))?;
        days_scanned += next.days_scanned;
        let candidate = self
            .calendars
            .search_backward(resource, next.window.end, duration)?;
        days_scanned += candidate.days_scanned;
        if candidate.window.end >= date {
            return Ok(Search {
                window: candidate.window,
                days_scanned,
            });
        }

        // Contiguous placement cannot straddle the gap.
        let forward = self.calendars.search_forward(resource, date, duration)?;
        Ok(Search {
            window: forward.window,
            days_scanned: days_scanned + forward.days_scanned,
        })
    }

    fn unresolved(
        &self,
        operation: &Operation,
        err: CalendarError,
        placed_at: NaiveDateTime,
        warnings: &mut Vec<ScheduleWarning>,
    ) -> Result<(), ScheduleError> {
        if self.strict {
            return Err(ScheduleError::CalendarExhausted(err));
        }
        warn!("operation {}: {err}; placing on wall-clock time", operation.id);
        warnings.push(ScheduleWarning::CalendarUnresolved {
            operation_id: operation.id,
            resource_id: operation.resource_id.clone(),
            placed_at,
        });
        Ok(())
    }
}

pub(crate) fn manual_window(
    operation: &Operation,
    warnings: &mut Vec<ScheduleWarning>,
) -> Option<ResolvedWindow> {
    match operation.scheduled_window() {
        Some(window) => Some(ResolvedWindow::manual(window)),
        None => {
            warn!(
                "operation {} is manually scheduled but has no window",
                operation.id
            );
            warnings.push(ScheduleWarning::ManualWindowMissing {
                operation_id: operation.id,
            });
            None
        }
    }
}
