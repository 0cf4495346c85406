//! Repository modules.
//!
//! One repository per record type. Repositories are cheap to clone, hold no
//! per-request state and each operation checks out its own connection.

pub mod drug_code;
mod helpers;
pub mod lab_procedure;
pub mod office_visit;
pub mod prescription;

pub use drug_code::DrugCodeRepository;
pub use lab_procedure::LabProcedureRepository;
pub use office_visit::OfficeVisitRepository;
pub use prescription::PrescriptionRepository;
