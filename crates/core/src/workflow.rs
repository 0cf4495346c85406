//! Lab procedure workflow actions.
//!
//! The predicates gate what a caller may offer for a procedure identified by
//! raw request text. They never fail: text that is not an integer, an id with no
//! procedure behind it, and a storage failure while loading all mean "not
//! actionable" and yield `false`. The actions (`get`, `reassign`, `remove`)
//! return storage failures to the caller.

use crate::records::{LabProcedure, LabProcedureStatus};
use crate::repositories::LabProcedureRepository;
use crate::RecordResult;

/// Workflow facade over the lab procedure repository.
#[derive(Clone, Debug)]
pub struct LabProcedureWorkflow {
    procedures: LabProcedureRepository,
}

impl LabProcedureWorkflow {
    pub fn new(procedures: LabProcedureRepository) -> Self {
        Self { procedures }
    }

    /// Loads the procedure named by `id_text`.
    ///
    /// Text that does not parse as an integer is treated as "no selection" and returns
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup itself fails.
    pub fn get(&self, id_text: &str) -> RecordResult<Option<LabProcedure>> {
        match parse_id(id_text) {
            Some(id) => self.procedures.get_by_id(id),
            None => Ok(None),
        }
    }

    /// True once the procedure has been stored and given a key.
    pub fn is_created(&self, procedure: &LabProcedure) -> bool {
        procedure.is_persisted()
    }

    /// True iff the procedure is pending, in transit or received.
    pub fn is_reassignable(&self, id_text: &str) -> bool {
        self.current_status(id_text)
            .is_some_and(LabProcedureStatus::is_reassignable)
    }

    /// True iff the procedure is in transit or received.
    pub fn is_removable(&self, id_text: &str) -> bool {
        self.current_status(id_text)
            .is_some_and(LabProcedureStatus::is_removable)
    }

    /// Saves an edited procedure, typically after its technician was changed.
    ///
    /// # Errors
    ///
    /// Propagates validation and storage errors from the repository.
    pub fn submit_reassignment(&self, procedure: &LabProcedure) -> RecordResult<bool> {
        self.procedures.update(procedure)
    }

    /// Hands the procedure to another technician if it is still reassignable.
    ///
    /// Returns `Ok(false)` when the procedure is not reassignable or the update matched no
    /// row.
    ///
    /// # Errors
    ///
    /// Propagates validation and storage errors from the repository.
    pub fn reassign(&self, id_text: &str, lab_technician_id: i64) -> RecordResult<bool> {
        let Some(mut procedure) = self.get(id_text)? else {
            return Ok(false);
        };
        if !procedure.status.is_reassignable() {
            tracing::debug!(id_text, status = %procedure.status, "reassignment refused");
            return Ok(false);
        }

        procedure.lab_technician_id = Some(lab_technician_id);
        self.submit_reassignment(&procedure)
    }

    /// Deletes the procedure if it is removable.
    ///
    /// The removability check and the delete are separate calls; a concurrent status change
    /// in between is not detected.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the repository.
    pub fn remove(&self, id_text: &str) -> RecordResult<bool> {
        let Some(procedure) = self.get(id_text)? else {
            return Ok(false);
        };
        if !procedure.status.is_removable() {
            tracing::debug!(id_text, status = %procedure.status, "removal refused");
            return Ok(false);
        }

        match procedure.lab_procedure_id {
            Some(id) => self.procedures.remove(id),
            None => Ok(false),
        }
    }

    fn current_status(&self, id_text: &str) -> Option<LabProcedureStatus> {
        let id = parse_id(id_text)?;
        match self.procedures.get_by_id(id) {
            Ok(Some(procedure)) => Some(procedure.status),
            Ok(None) => {
                tracing::debug!(id, "no lab procedure with this id");
                None
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to load lab procedure");
                None
            }
        }
    }
}

fn parse_id(id_text: &str) -> Option<i64> {
    id_text.parse::<i64>().ok()
}
