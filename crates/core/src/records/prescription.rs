use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A national drug code and its human readable description.
///
/// Only `code` is written with a prescription; `description` is filled in from the
/// reference table when prescriptions are read back.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrugCode {
    pub code: String,
    pub description: String,
}

impl DrugCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// A medication prescribed to a patient during an office visit.
///
/// `end_date >= start_date` is expected of callers but not checked by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Option<i64>,
    pub patient_mid: i64,
    pub drug_code: DrugCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub office_visit_id: i64,
}

impl Prescription {
    pub fn code(&self) -> &str {
        &self.drug_code.code
    }
}
