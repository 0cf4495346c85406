//! Lab procedure record and its lifecycle status.
//!
//! A lab procedure is ordered against an office visit and then worked through
//! the lab: `Pending` → `InTransit` → `Received` → `Testing` → `Completed`.
//! The order is the canonical display sequence. Writes do not enforce it
//! unless the repository is configured with [`TransitionPolicy::Enforced`].
//!
//! [`TransitionPolicy::Enforced`]: crate::config::TransitionPolicy::Enforced

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raised when a status id or name matches none of the declared variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusLookupError {
    #[error("unknown lab procedure status id {0}")]
    UnknownId(i64),
    #[error("unknown lab procedure status name {0:?}")]
    UnknownName(String),
}

/// Lifecycle state of a lab procedure.
///
/// Each variant has a stable numeric id (the stored value) and a display name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabProcedureStatus {
    Pending,
    InTransit,
    Received,
    Testing,
    Completed,
}

impl LabProcedureStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [LabProcedureStatus; 5] = [
        LabProcedureStatus::Pending,
        LabProcedureStatus::InTransit,
        LabProcedureStatus::Received,
        LabProcedureStatus::Testing,
        LabProcedureStatus::Completed,
    ];

    pub fn id(self) -> i64 {
        match self {
            LabProcedureStatus::Pending => 1,
            LabProcedureStatus::InTransit => 2,
            LabProcedureStatus::Received => 3,
            LabProcedureStatus::Testing => 4,
            LabProcedureStatus::Completed => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LabProcedureStatus::Pending => "Pending",
            LabProcedureStatus::InTransit => "In transit",
            LabProcedureStatus::Received => "Received",
            LabProcedureStatus::Testing => "Testing",
            LabProcedureStatus::Completed => "Completed",
        }
    }

    /// Looks up a status by its stored id.
    ///
    /// # Errors
    ///
    /// Returns [`StatusLookupError::UnknownId`] when `id` is not one of the five declared ids.
    pub fn by_id(id: i64) -> Result<Self, StatusLookupError> {
        Self::ALL
            .into_iter()
            .find(|s| s.id() == id)
            .ok_or(StatusLookupError::UnknownId(id))
    }

    /// Looks up a status by its exact display name (case sensitive).
    ///
    /// # Errors
    ///
    /// Returns [`StatusLookupError::UnknownName`] when no variant carries `name`.
    pub fn by_name(name: &str) -> Result<Self, StatusLookupError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| StatusLookupError::UnknownName(name.to_string()))
    }

    /// Statuses from which the procedure may still be handed to another technician.
    pub fn is_reassignable(self) -> bool {
        matches!(
            self,
            LabProcedureStatus::InTransit | LabProcedureStatus::Pending | LabProcedureStatus::Received
        )
    }

    /// Statuses from which the procedure may be withdrawn.
    pub fn is_removable(self) -> bool {
        matches!(
            self,
            LabProcedureStatus::InTransit | LabProcedureStatus::Received
        )
    }

    /// Statuses a procedure currently in `self` may be written to when transitions are enforced.
    ///
    /// Staying in the same status is always allowed so that commentary and reassignment edits
    /// do not need to move the lifecycle.
    pub fn allowed_next(self) -> &'static [LabProcedureStatus] {
        use LabProcedureStatus::*;
        match self {
            Pending => &[Pending, InTransit],
            InTransit => &[InTransit, Received],
            Received => &[Received, Testing],
            Testing => &[Testing, Completed],
            Completed => &[Completed],
        }
    }

    /// Statuses from which a write to `self` is allowed under enforced transitions.
    pub fn allowed_previous(self) -> Vec<LabProcedureStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.allowed_next().contains(&self))
            .collect()
    }
}

impl std::fmt::Display for LabProcedureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for LabProcedureStatus {
    type Err = StatusLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::by_name(s)
    }
}

impl TryFrom<i64> for LabProcedureStatus {
    type Error = StatusLookupError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::by_id(id)
    }
}

/// A lab test ordered during an office visit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabProcedure {
    /// Assigned by the store on insert. `None` until persisted.
    pub lab_procedure_id: Option<i64>,
    pub lab_technician_id: Option<i64>,
    pub office_visit_id: i64,
    pub priority: Option<i32>,
    pub is_restricted: bool,
    pub status: LabProcedureStatus,
    pub commentary: Option<String>,
    pub results: Option<String>,
    pub updated_date: Option<DateTime<Utc>>,
}

impl LabProcedure {
    /// Creates a newly ordered procedure in the `Pending` state.
    pub fn new(office_visit_id: i64) -> Self {
        Self {
            lab_procedure_id: None,
            lab_technician_id: None,
            office_visit_id,
            priority: None,
            is_restricted: false,
            status: LabProcedureStatus::Pending,
            commentary: None,
            results: None,
            updated_date: None,
        }
    }

    /// True once the store has assigned a positive key.
    pub fn is_persisted(&self) -> bool {
        matches!(self.lab_procedure_id, Some(id) if id > 0)
    }
}
