//! Office visit persistence.
//!
//! Lookups keyed by a patient MID check the MID format before any connection
//! is taken; a malformed MID yields an empty list.

use super::helpers::{execute_insert, execute_write, query_optional, query_rows};
use crate::db::Database;
use crate::records::OfficeVisit;
use crate::validation::{is_patient_mid, validate_office_visit};
use crate::RecordResult;
use rusqlite::{params, Row};

const SELECT_OFFICE_VISIT: &str = "SELECT visitID, patientMID, date, locationID, apptTypeID, \
     notes, sendBill, height, length, weight, headCircumference, bloodPressure, hdl, \
     triglyceride, ldl, householdSmokingStatus, patientSmokingStatus FROM officeVisit";

const INSERT_OFFICE_VISIT: &str = "INSERT INTO officeVisit (patientMID, date, locationID, \
     apptTypeID, notes, sendBill, height, length, weight, headCircumference, bloodPressure, \
     hdl, triglyceride, ldl, householdSmokingStatus, patientSmokingStatus) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const UPDATE_OFFICE_VISIT: &str = "UPDATE officeVisit SET patientMID = ?1, date = ?2, \
     locationID = ?3, apptTypeID = ?4, notes = ?5, sendBill = ?6, height = ?7, length = ?8, \
     weight = ?9, headCircumference = ?10, bloodPressure = ?11, hdl = ?12, triglyceride = ?13, \
     ldl = ?14, householdSmokingStatus = ?15, patientSmokingStatus = ?16 WHERE visitID = ?17";

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<OfficeVisit> {
    Ok(OfficeVisit {
        visit_id: row.get(0)?,
        patient_mid: row.get(1)?,
        date: row.get(2)?,
        location_id: row.get(3)?,
        appt_type_id: row.get(4)?,
        notes: row.get(5)?,
        send_bill: row.get(6)?,
        height: row.get(7)?,
        length: row.get(8)?,
        weight: row.get(9)?,
        head_circumference: row.get(10)?,
        blood_pressure: row.get(11)?,
        hdl: row.get(12)?,
        triglyceride: row.get(13)?,
        ldl: row.get(14)?,
        household_smoking_status: row.get(15)?,
        patient_smoking_status: row.get(16)?,
    })
}

/// Repository for office visits.
#[derive(Clone, Debug)]
pub struct OfficeVisitRepository {
    db: Database,
}

impl OfficeVisitRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Visits recorded for a patient, in key order.
    ///
    /// A MID that is not in patient MID format returns an empty list without querying.
    pub fn get_visits_for_patient(&self, patient_mid: i64) -> RecordResult<Vec<OfficeVisit>> {
        if !is_patient_mid(patient_mid) {
            tracing::debug!(patient_mid, "malformed patient MID, skipping visit lookup");
            return Ok(Vec::new());
        }

        let conn = self.db.connection()?;
        query_rows(
            &conn,
            &format!("{SELECT_OFFICE_VISIT} WHERE patientMID = ?1 ORDER BY visitID"),
            params![patient_mid],
            visit_from_row,
        )
    }

    pub fn get_by_id(&self, visit_id: i64) -> RecordResult<Option<OfficeVisit>> {
        let conn = self.db.connection()?;
        query_optional(
            &conn,
            &format!("{SELECT_OFFICE_VISIT} WHERE visitID = ?1"),
            params![visit_id],
            visit_from_row,
        )
    }

    pub fn get_all(&self) -> RecordResult<Vec<OfficeVisit>> {
        let conn = self.db.connection()?;
        query_rows(
            &conn,
            &format!("{SELECT_OFFICE_VISIT} ORDER BY visitID"),
            [],
            visit_from_row,
        )
    }

    /// Validates and inserts a visit, reporting whether a row was written.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` without touching the store if the visit fails
    /// validation, or a storage error if the insert fails.
    pub fn add(&self, visit: &OfficeVisit) -> RecordResult<bool> {
        Ok(self.add_returning_id(visit)?.is_some())
    }

    /// Validates and inserts a visit, returning the generated visit id.
    ///
    /// An unset `send_bill` is stored as `true`.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn add_returning_id(&self, visit: &OfficeVisit) -> RecordResult<Option<i64>> {
        validate_office_visit(visit)?;

        let conn = self.db.connection()?;
        execute_insert(
            &conn,
            INSERT_OFFICE_VISIT,
            params![
                visit.patient_mid,
                visit.date,
                visit.location_id,
                visit.appt_type_id,
                visit.notes,
                visit.sends_bill(),
                visit.height,
                visit.length,
                visit.weight,
                visit.head_circumference,
                visit.blood_pressure,
                visit.hdl,
                visit.triglyceride,
                visit.ldl,
                visit.household_smoking_status,
                visit.patient_smoking_status,
            ],
        )
    }

    /// Validates and overwrites the visit with the same `visit_id`.
    ///
    /// Returns `Ok(false)` if the visit has no id or no row has that id.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` without touching the store if the visit fails
    /// validation, or a storage error if the update fails.
    pub fn update(&self, visit: &OfficeVisit) -> RecordResult<bool> {
        validate_office_visit(visit)?;

        let Some(visit_id) = visit.visit_id else {
            tracing::debug!("update skipped: office visit has no key");
            return Ok(false);
        };

        let conn = self.db.connection()?;
        execute_write(
            &conn,
            UPDATE_OFFICE_VISIT,
            params![
                visit.patient_mid,
                visit.date,
                visit.location_id,
                visit.appt_type_id,
                visit.notes,
                visit.sends_bill(),
                visit.height,
                visit.length,
                visit.weight,
                visit.head_circumference,
                visit.blood_pressure,
                visit.hdl,
                visit.triglyceride,
                visit.ldl,
                visit.household_smoking_status,
                visit.patient_smoking_status,
                visit_id,
            ],
        )
    }
}
