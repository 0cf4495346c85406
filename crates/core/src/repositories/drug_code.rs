//! National drug code reference data.
//!
//! Prescription reads join this table to resolve a description for each code.

use super::helpers::{execute_write, query_optional, query_rows};
use crate::db::Database;
use crate::error::ErrorList;
use crate::records::DrugCode;
use crate::validation::is_drug_code;
use crate::RecordResult;
use clinrec_types::NonEmptyText;
use rusqlite::{params, Row};

fn drug_code_from_row(row: &Row<'_>) -> rusqlite::Result<DrugCode> {
    Ok(DrugCode {
        code: row.get(0)?,
        description: row.get(1)?,
    })
}

/// Repository for the drug code reference table.
#[derive(Clone, Debug)]
pub struct DrugCodeRepository {
    db: Database,
}

impl DrugCodeRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a drug code.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` if `code` is not a national drug code, or a storage
    /// error if the code already exists.
    pub fn add(&self, code: &str, description: &NonEmptyText) -> RecordResult<bool> {
        let mut errors = ErrorList::default();
        if !is_drug_code(code) {
            errors.push("code", "must be a national drug code, e.g. 00904-2407");
        }
        errors.into_result()?;

        let conn = self.db.connection()?;
        execute_write(
            &conn,
            "INSERT INTO ndcodes (code, description) VALUES (?1, ?2)",
            params![code, description.as_str()],
        )
    }

    pub fn get_by_code(&self, code: &str) -> RecordResult<Option<DrugCode>> {
        let conn = self.db.connection()?;
        query_optional(
            &conn,
            "SELECT code, description FROM ndcodes WHERE code = ?1",
            params![code],
            drug_code_from_row,
        )
    }

    /// All codes ordered by code.
    pub fn get_all(&self) -> RecordResult<Vec<DrugCode>> {
        let conn = self.db.connection()?;
        query_rows(
            &conn,
            "SELECT code, description FROM ndcodes ORDER BY code",
            [],
            drug_code_from_row,
        )
    }
}
