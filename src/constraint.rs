//! Date-constraint evaluation for a single placed operation.
//!
//! MSO/MFO pin the window, SNET/FNET push it later, SNLT/FNLT are advisory
//! and only ever reported. The evaluator is calendar-blind: the pass lays
//! pinned and shifted windows out on the calendar itself.

use crate::operation::{ConstraintKind, DateConstraint, Operation, OperationId};
use crate::window::TimeWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the pass evaluating a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// ASAP pass, predecessors before successors.
    Forward,
    /// ALAP pass, successors before predecessors.
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub operation_id: OperationId,
    pub constraint_kind: ConstraintKind,
    pub requested_date: NaiveDateTime,
    pub actual_date: NaiveDateTime,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation {} violates {} {} (actual {})",
            self.operation_id,
            self.constraint_kind,
            self.requested_date.format("%Y-%m-%dT%H:%M"),
            self.actual_date.format("%Y-%m-%dT%H:%M")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    /// The constraint holds for `window`.
    Resolved(TimeWindow),
    /// `window` is what the pass records; `violation` is reported as a warning.
    Violated {
        window: TimeWindow,
        violation: ConstraintViolation,
    },
}

impl ConstraintOutcome {
    pub fn window(&self) -> TimeWindow {
        match self {
            ConstraintOutcome::Resolved(window) => *window,
            ConstraintOutcome::Violated { window, .. } => *window,
        }
    }

    pub fn violation(&self) -> Option<&ConstraintViolation> {
        match self {
            ConstraintOutcome::Resolved(_) => None,
            ConstraintOutcome::Violated { violation, .. } => Some(violation),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintEvaluator;

impl ConstraintEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `operation`'s declared constraint against the tentative,
    /// dependency- and calendar-feasible window produced by the pass.
    pub fn apply(
        &self,
        operation: &Operation,
        tentative: TimeWindow,
        direction: Direction,
    ) -> ConstraintOutcome {
        let duration = operation.duration();
        let violation = |kind: ConstraintKind, requested: NaiveDateTime, actual: NaiveDateTime| {
            ConstraintViolation {
                operation_id: operation.id,
                constraint_kind: kind,
                requested_date: requested,
                actual_date: actual,
            }
        };

        match operation.constraint {
            DateConstraint::None => ConstraintOutcome::Resolved(tentative),
            DateConstraint::Mso(date) => {
                self.pinned(operation, TimeWindow::starting_at(date, duration), tentative, direction)
            }
            DateConstraint::Mfo(date) => {
                self.pinned(operation, TimeWindow::ending_at(date, duration), tentative, direction)
            }
            DateConstraint::Snet(date) => {
                if tentative.start >= date {
                    return ConstraintOutcome::Resolved(tentative);
                }
                let window = tentative.shifted(date - tentative.start);
                match direction {
                    Direction::Forward => ConstraintOutcome::Resolved(window),
                    Direction::Backward => ConstraintOutcome::Violated {
                        window,
                        violation: violation(ConstraintKind::Snet, date, tentative.start),
                    },
                }
            }
            DateConstraint::Fnet(date) => {
                if tentative.end >= date {
                    return ConstraintOutcome::Resolved(tentative);
                }
                let window = tentative.shifted(date - tentative.end);
                match direction {
                    Direction::Forward => ConstraintOutcome::Resolved(window),
                    Direction::Backward => ConstraintOutcome::Violated {
                        window,
                        violation: violation(ConstraintKind::Fnet, date, tentative.end),
                    },
                }
            }
            DateConstraint::Snlt(_) | DateConstraint::Fnlt(_) => match self.check(operation, tentative) {
                Some(v) => ConstraintOutcome::Violated {
                    window: tentative,
                    violation: v,
                },
                None => ConstraintOutcome::Resolved(tentative),
            },
        }
    }

    /// Resolve an MSO/MFO constraint whose window was already laid out, with
    /// the pinned edge on the constraint date. Other constraints fall back to
    /// [`ConstraintEvaluator::apply`].
    pub fn pinned(
        &self,
        operation: &Operation,
        window: TimeWindow,
        tentative: TimeWindow,
        direction: Direction,
    ) -> ConstraintOutcome {
        let (kind, requested, actual) = match operation.constraint {
            DateConstraint::Mso(date) => (ConstraintKind::Mso, date, tentative.start),
            DateConstraint::Mfo(date) => (ConstraintKind::Mfo, date, tentative.end),
            _ => return self.apply(operation, tentative, direction),
        };
        let conflict = match direction {
            Direction::Forward => window.start < tentative.start,
            Direction::Backward => window.end > tentative.end,
        };
        if conflict {
            ConstraintOutcome::Violated {
                window,
                violation: ConstraintViolation {
                    operation_id: operation.id,
                    constraint_kind: kind,
                    requested_date: requested,
                    actual_date: actual,
                },
            }
        } else {
            ConstraintOutcome::Resolved(window)
        }
    }

    /// Report whether `window` breaks the declared constraint, without moving it.
    pub fn check(&self, operation: &Operation, window: TimeWindow) -> Option<ConstraintViolation> {
        let (kind, requested, actual, broken) = match operation.constraint {
            DateConstraint::None => return None,
            DateConstraint::Mso(d) => (ConstraintKind::Mso, d, window.start, window.start != d),
            DateConstraint::Mfo(d) => (ConstraintKind::Mfo, d, window.end, window.end != d),
            DateConstraint::Snet(d) => (ConstraintKind::Snet, d, window.start, window.start < d),
            DateConstraint::Fnet(d) => (ConstraintKind::Fnet, d, window.end, window.end < d),
            DateConstraint::Snlt(d) => (ConstraintKind::Snlt, d, window.start, window.start > d),
            DateConstraint::Fnlt(d) => (ConstraintKind::Fnlt, d, window.end, window.end > d),
        };
        broken.then_some(ConstraintViolation {
            operation_id: operation.id,
            constraint_kind: kind,
            requested_date: requested,
            actual_date: actual,
        })
    }
}
