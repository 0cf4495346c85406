//! # Clinical records core
//!
//! Persistence and workflow logic for office visits, prescriptions and lab
//! procedures stored in a relational database.
//!
//! This crate contains:
//! - record types and the lab procedure lifecycle status
//! - validators run before every write
//! - one repository per record type over a pooled SQLite connection source
//! - workflow predicates deciding whether a lab procedure may be reassigned or removed
//!
//! **No presentation concerns**: request parsing, rendering and user messages belong to the
//! caller (see the `clinrec` binary).
//!
//! ## Wiring
//!
//! ```no_run
//! use clinrec_core::{CoreConfig, Database, LabProcedureRepository, LabProcedureWorkflow};
//!
//! # fn main() -> clinrec_core::RecordResult<()> {
//! let cfg = CoreConfig::with_database("clinrec.db")?;
//! let db = Database::open(&cfg)?;
//! db.ensure_schema()?;
//!
//! let workflow = LabProcedureWorkflow::new(LabProcedureRepository::new(db, &cfg));
//! assert!(!workflow.is_reassignable("not-an-id"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod records;
pub mod repositories;
pub mod validation;
pub mod workflow;

pub use clinrec_types::NonEmptyText;
pub use config::{CoreConfig, TransitionPolicy};
pub use db::Database;
pub use error::{FieldError, RecordError, RecordResult, StorageError, ValidationError};
pub use records::{
    DrugCode, LabProcedure, LabProcedureStatus, OfficeVisit, Prescription, StatusLookupError,
};
pub use repositories::{
    DrugCodeRepository, LabProcedureRepository, OfficeVisitRepository, PrescriptionRepository,
};
pub use workflow::LabProcedureWorkflow;
