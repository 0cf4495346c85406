//! Prescription persistence.
//!
//! Reads join `ndcodes` so each prescription carries the drug description.
//! Writes store only the drug code.

use super::helpers::{execute_write, query_optional, query_rows};
use crate::db::Database;
use crate::records::{DrugCode, Prescription};
use crate::validation::{is_patient_mid, validate_prescription};
use crate::RecordResult;
use chrono::NaiveDate;
use rusqlite::{params, Row};

const SELECT_PRESCRIPTION: &str = "SELECT p.id, p.patientMID, n.code, n.description, \
     p.startDate, p.endDate, p.officeVisitId \
     FROM prescription p JOIN ndcodes n ON p.drugCode = n.code";

fn prescription_from_row(row: &Row<'_>) -> rusqlite::Result<Prescription> {
    Ok(Prescription {
        id: row.get(0)?,
        patient_mid: row.get(1)?,
        drug_code: DrugCode {
            code: row.get(2)?,
            description: row.get(3)?,
        },
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        office_visit_id: row.get(6)?,
    })
}

/// Repository for prescriptions.
#[derive(Clone, Debug)]
pub struct PrescriptionRepository {
    db: Database,
}

impl PrescriptionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get_by_id(&self, id: i64) -> RecordResult<Option<Prescription>> {
        let conn = self.db.connection()?;
        query_optional(
            &conn,
            &format!("{SELECT_PRESCRIPTION} WHERE p.id = ?1"),
            params![id],
            prescription_from_row,
        )
    }

    pub fn get_all(&self) -> RecordResult<Vec<Prescription>> {
        let conn = self.db.connection()?;
        query_rows(
            &conn,
            &format!("{SELECT_PRESCRIPTION} ORDER BY p.id"),
            [],
            prescription_from_row,
        )
    }

    /// Prescriptions written during one office visit.
    pub fn get_prescriptions_for_office_visit(
        &self,
        office_visit_id: i64,
    ) -> RecordResult<Vec<Prescription>> {
        let conn = self.db.connection()?;
        query_rows(
            &conn,
            &format!("{SELECT_PRESCRIPTION} WHERE p.officeVisitId = ?1 ORDER BY p.id"),
            params![office_visit_id],
            prescription_from_row,
        )
    }

    /// Prescriptions for a patient that end on or after `as_of`, latest ending first.
    ///
    /// This is the emergency-record view: medication that is still current comes first.
    /// A MID that is not in patient MID format returns an empty list without querying.
    pub fn get_prescriptions_for_patient_ending_after(
        &self,
        patient_mid: i64,
        as_of: NaiveDate,
    ) -> RecordResult<Vec<Prescription>> {
        if !is_patient_mid(patient_mid) {
            tracing::debug!(patient_mid, "malformed patient MID, skipping prescription lookup");
            return Ok(Vec::new());
        }

        let conn = self.db.connection()?;
        query_rows(
            &conn,
            &format!(
                "{SELECT_PRESCRIPTION} WHERE p.patientMID = ?1 AND p.endDate >= ?2 \
                 ORDER BY p.endDate DESC"
            ),
            params![patient_mid, as_of],
            prescription_from_row,
        )
    }

    /// Validates and inserts a prescription, reporting whether a row was written.
    ///
    /// Any `id` on the argument is ignored; the store assigns the key.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` without touching the store if the prescription
    /// fails validation, or a storage error if the insert fails (for example an unknown
    /// drug code or office visit).
    pub fn add(&self, prescription: &Prescription) -> RecordResult<bool> {
        validate_prescription(prescription)?;

        let conn = self.db.connection()?;
        execute_write(
            &conn,
            "INSERT INTO prescription (patientMID, drugCode, startDate, endDate, officeVisitId) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                prescription.patient_mid,
                prescription.code(),
                prescription.start_date,
                prescription.end_date,
                prescription.office_visit_id,
            ],
        )
    }

    /// Validates and overwrites the prescription with the same `id`.
    ///
    /// Returns `Ok(false)` if the prescription has no id or no row has that id.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` without touching the store if the prescription
    /// fails validation, or a storage error if the update fails.
    pub fn update(&self, prescription: &Prescription) -> RecordResult<bool> {
        validate_prescription(prescription)?;

        let Some(id) = prescription.id else {
            tracing::debug!("update skipped: prescription has no key");
            return Ok(false);
        };

        let conn = self.db.connection()?;
        execute_write(
            &conn,
            "UPDATE prescription SET patientMID = ?1, drugCode = ?2, startDate = ?3, \
             endDate = ?4, officeVisitId = ?5 WHERE id = ?6",
            params![
                prescription.patient_mid,
                prescription.code(),
                prescription.start_date,
                prescription.end_date,
                prescription.office_visit_id,
                id,
            ],
        )
    }

    /// Deletes the stored prescription with the same `id`; every other field is ignored.
    ///
    /// Returns `Ok(false)` if the prescription has no id or no row has that id.
    pub fn remove(&self, prescription: &Prescription) -> RecordResult<bool> {
        let Some(id) = prescription.id else {
            return Ok(false);
        };

        let conn = self.db.connection()?;
        execute_write(&conn, "DELETE FROM prescription WHERE id = ?1", params![id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionPolicy;
    use crate::db::test_support::setup_test_db;
    use crate::records::OfficeVisit;
    use crate::repositories::drug_code::DrugCodeRepository;
    use crate::repositories::office_visit::OfficeVisitRepository;
    use clinrec_types::NonEmptyText;
    use tempfile::TempDir;

    const PATIENT: i64 = 2;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (TempDir, PrescriptionRepository, i64) {
        let (temp, _cfg, db) = setup_test_db(TransitionPolicy::Permissive);

        let codes = DrugCodeRepository::new(db.clone());
        for (code, description) in [("00904-2407", "Tetracycline"), ("64764-1512", "Prioglitazone")] {
            codes
                .add(code, &NonEmptyText::new(description).unwrap())
                .unwrap();
        }

        let visit_date = date(2020, 1, 1).and_hms_opt(9, 0, 0).unwrap();
        let visit_id = OfficeVisitRepository::new(db.clone())
            .add_returning_id(&OfficeVisit::new(PATIENT, visit_date, "1", 1))
            .unwrap()
            .unwrap();

        (temp, PrescriptionRepository::new(db), visit_id)
    }

    fn prescription(visit_id: i64, code: &str, start: NaiveDate, end: NaiveDate) -> Prescription {
        Prescription {
            id: None,
            patient_mid: PATIENT,
            drug_code: DrugCode::new(code, ""),
            start_date: start,
            end_date: end,
            office_visit_id: visit_id,
        }
    }

    #[test]
    fn add_then_read_through_office_visit() {
        let (_temp, repo, visit_id) = setup();
        let p = prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 6, 1));
        assert!(repo.add(&p).unwrap());

        let stored = repo.get_prescriptions_for_office_visit(visit_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].start_date, date(2020, 1, 1));
        assert_eq!(stored[0].end_date, date(2020, 6, 1));
        assert_eq!(stored[0].code(), "00904-2407");
        assert_eq!(stored[0].drug_code.description, "Tetracycline");
        assert!(stored[0].id.is_some());
    }

    #[test]
    fn emergency_view_filters_and_orders_by_end_date() {
        let (_temp, repo, visit_id) = setup();
        repo.add(&prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 2, 1)))
            .unwrap();
        repo.add(&prescription(visit_id, "64764-1512", date(2020, 1, 1), date(2020, 4, 1)))
            .unwrap();
        repo.add(&prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 5, 1)))
            .unwrap();
        repo.add(&prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 3, 1)))
            .unwrap();

        let current = repo
            .get_prescriptions_for_patient_ending_after(PATIENT, date(2020, 3, 1))
            .unwrap();
        let ends: Vec<_> = current.iter().map(|p| p.end_date).collect();
        assert_eq!(ends, vec![date(2020, 5, 1), date(2020, 4, 1), date(2020, 3, 1)]);
        assert!(current.iter().all(|p| p.end_date != date(2020, 2, 1)));
    }

    #[test]
    fn emergency_view_is_scoped_to_patient() {
        let (_temp, repo, visit_id) = setup();
        repo.add(&prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 6, 1)))
            .unwrap();

        assert!(repo
            .get_prescriptions_for_patient_ending_after(PATIENT + 1, date(2020, 1, 1))
            .unwrap()
            .is_empty());
        assert!(repo
            .get_prescriptions_for_patient_ending_after(0, date(2020, 1, 1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn update_and_remove_by_id() {
        let (_temp, repo, visit_id) = setup();
        repo.add(&prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 6, 1)))
            .unwrap();
        let mut stored = repo.get_all().unwrap().remove(0);

        stored.drug_code = DrugCode::new("64764-1512", "ignored on write");
        stored.end_date = date(2020, 9, 1);
        assert!(repo.update(&stored).unwrap());

        let reloaded = repo.get_by_id(stored.id.unwrap()).unwrap().unwrap();
        assert_eq!(reloaded.drug_code.description, "Prioglitazone");
        assert_eq!(reloaded.end_date, date(2020, 9, 1));

        // Only the id matters for removal.
        let handle = Prescription {
            patient_mid: 99,
            drug_code: DrugCode::default(),
            ..reloaded
        };
        assert!(repo.remove(&handle).unwrap());
        assert!(!repo.remove(&handle).unwrap());
        assert!(repo.get_all().unwrap().is_empty());
    }

    #[test]
    fn missing_key_reports_false() {
        let (_temp, repo, visit_id) = setup();
        let unsaved = prescription(visit_id, "00904-2407", date(2020, 1, 1), date(2020, 6, 1));
        assert!(!repo.update(&unsaved).unwrap());
        assert!(!repo.remove(&unsaved).unwrap());

        let stale = Prescription {
            id: Some(77),
            ..unsaved
        };
        assert!(!repo.update(&stale).unwrap());
    }

    #[test]
    fn invalid_prescription_is_never_written() {
        let (_temp, repo, visit_id) = setup();
        let invalid = prescription(visit_id, "not-a-code", date(2020, 1, 1), date(2020, 6, 1));
        assert!(repo.add(&invalid).unwrap_err().is_validation());
        assert!(repo.get_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_drug_code_is_a_storage_error() {
        let (_temp, repo, visit_id) = setup();
        let unknown = prescription(visit_id, "11111-1111", date(2020, 1, 1), date(2020, 6, 1));
        assert!(repo.add(&unknown).unwrap_err().is_storage());
    }
}
