use crate::window::TimeWindow;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OperationId = i32;
pub type JobId = i32;
pub type ResourceId = String;

/// Longest accepted operation: one hundred years of minutes.
pub const MAX_DURATION_MINUTES: i64 = 100 * 366 * 24 * 60;

/// Payload-free discriminant of a [`DateConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "MSO")]
    Mso,
    #[serde(rename = "MFO")]
    Mfo,
    #[serde(rename = "SNET")]
    Snet,
    #[serde(rename = "FNET")]
    Fnet,
    #[serde(rename = "SNLT")]
    Snlt,
    #[serde(rename = "FNLT")]
    Fnlt,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::None => "NONE",
            ConstraintKind::Mso => "MSO",
            ConstraintKind::Mfo => "MFO",
            ConstraintKind::Snet => "SNET",
            ConstraintKind::Fnet => "FNET",
            ConstraintKind::Snlt => "SNLT",
            ConstraintKind::Fnlt => "FNLT",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Some(ConstraintKind::None),
            "MSO" => Some(ConstraintKind::Mso),
            "MFO" => Some(ConstraintKind::Mfo),
            "SNET" => Some(ConstraintKind::Snet),
            "FNET" => Some(ConstraintKind::Fnet),
            "SNLT" => Some(ConstraintKind::Snlt),
            "FNLT" => Some(ConstraintKind::Fnlt),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared date constraint of an operation.
///
/// Serialised as `{"kind": "MSO", "date": "2025-01-01T10:00:00"}`; the short
/// codes are persisted and displayed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "date")]
pub enum DateConstraint {
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// Must start on.
    #[serde(rename = "MSO")]
    Mso(NaiveDateTime),
    /// Must finish on.
    #[serde(rename = "MFO")]
    Mfo(NaiveDateTime),
    /// Start no earlier than.
    #[serde(rename = "SNET")]
    Snet(NaiveDateTime),
    /// Finish no earlier than.
    #[serde(rename = "FNET")]
    Fnet(NaiveDateTime),
    /// Start no later than.
    #[serde(rename = "SNLT")]
    Snlt(NaiveDateTime),
    /// Finish no later than.
    #[serde(rename = "FNLT")]
    Fnlt(NaiveDateTime),
}

impl DateConstraint {
    pub fn new(kind: ConstraintKind, date: Option<NaiveDateTime>) -> Option<Self> {
        match (kind, date) {
            (ConstraintKind::None, _) => Some(DateConstraint::None),
            (ConstraintKind::Mso, Some(d)) => Some(DateConstraint::Mso(d)),
            (ConstraintKind::Mfo, Some(d)) => Some(DateConstraint::Mfo(d)),
            (ConstraintKind::Snet, Some(d)) => Some(DateConstraint::Snet(d)),
            (ConstraintKind::Fnet, Some(d)) => Some(DateConstraint::Fnet(d)),
            (ConstraintKind::Snlt, Some(d)) => Some(DateConstraint::Snlt(d)),
            (ConstraintKind::Fnlt, Some(d)) => Some(DateConstraint::Fnlt(d)),
            (_, None) => None,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            DateConstraint::None => ConstraintKind::None,
            DateConstraint::Mso(_) => ConstraintKind::Mso,
            DateConstraint::Mfo(_) => ConstraintKind::Mfo,
            DateConstraint::Snet(_) => ConstraintKind::Snet,
            DateConstraint::Fnet(_) => ConstraintKind::Fnet,
            DateConstraint::Snlt(_) => ConstraintKind::Snlt,
            DateConstraint::Fnlt(_) => ConstraintKind::Fnlt,
        }
    }

    pub fn date(&self) -> Option<NaiveDateTime> {
        match *self {
            DateConstraint::None => None,
            DateConstraint::Mso(d)
            | DateConstraint::Mfo(d)
            | DateConstraint::Snet(d)
            | DateConstraint::Fnet(d)
            | DateConstraint::Snlt(d)
            | DateConstraint::Fnlt(d) => Some(d),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DateConstraint::None)
    }
}

/// A manufacturing operation as loaded from the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub job_id: JobId,
    pub name: String,
    /// Nominal working duration; non-working calendar time does not count.
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub constraint: DateConstraint,
    #[serde(default)]
    pub is_manually_scheduled: bool,
    #[serde(default)]
    pub scheduled_start: Option<NaiveDateTime>,
    #[serde(default)]
    pub scheduled_end: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i32>,
}

impl Operation {
    pub fn new(id: OperationId, job_id: JobId, name: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            id,
            job_id,
            name: name.into(),
            duration_minutes,
            resource_id: None,
            constraint: DateConstraint::None,
            is_manually_scheduled: false,
            scheduled_start: None,
            scheduled_end: None,
            sequence_number: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<ResourceId>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_constraint(mut self, constraint: DateConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    /// Pins the operation to `window`; the engine will not move it.
    pub fn pinned(mut self, window: TimeWindow) -> Self {
        self.is_manually_scheduled = true;
        self.scheduled_start = Some(window.start);
        self.scheduled_end = Some(window.end);
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::try_minutes(self.duration_minutes.clamp(0, MAX_DURATION_MINUTES))
            .unwrap_or_else(Duration::zero)
    }

    pub fn scheduled_window(&self) -> Option<TimeWindow> {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        }
    }
}

/// Dependency link type. Only finish-to-start is honoured by the passes;
/// the others are recorded and degrade to finish-to-start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkType {
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    #[serde(rename = "SS")]
    StartToStart,
    #[serde(rename = "FF")]
    FinishToFinish,
    #[serde(rename = "SF")]
    StartToFinish,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::FinishToStart => "FS",
            LinkType::StartToStart => "SS",
            LinkType::FinishToFinish => "FF",
            LinkType::StartToFinish => "SF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor: OperationId,
    pub successor: OperationId,
    #[serde(default)]
    pub link_type: LinkType,
}

impl Dependency {
    pub fn finish_to_start(predecessor: OperationId, successor: OperationId) -> Self {
        Self {
            predecessor,
            successor,
            link_type: LinkType::FinishToStart,
        }
    }

    pub fn with_link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }
}
