//! Clinical record types.
//!
//! Plain data holders for the records persisted by [`crate::repositories`].
//! Records never hold a reference to the repository that stores them.

pub mod lab_procedure;
pub mod office_visit;
pub mod prescription;

pub use lab_procedure::{LabProcedure, LabProcedureStatus, StatusLookupError};
pub use office_visit::OfficeVisit;
pub use prescription::{DrugCode, Prescription};
