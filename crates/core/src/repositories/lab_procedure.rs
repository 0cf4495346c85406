//! Lab procedure persistence.
//!
//! Status is stored as its numeric id. A stored id outside the declared
//! lifecycle is a data-integrity failure and surfaces as
//! [`RecordError::Status`](crate::RecordError::Status) when the row is read.
//!
//! By default an update may write any status over any other. With
//! [`TransitionPolicy::Enforced`] the UPDATE only matches rows whose current
//! status may move to the new one, so an out-of-order write affects no rows
//! and reports `false`.

use super::helpers::{convert_all, execute_insert, execute_write, query_optional, query_rows};
use crate::config::{CoreConfig, TransitionPolicy};
use crate::db::Database;
use crate::records::{LabProcedure, LabProcedureStatus, StatusLookupError};
use crate::validation::validate_lab_procedure;
use crate::RecordResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const SELECT_LAB_PROCEDURE: &str = "SELECT labProcedureID, labTechnicianID, officeVisitID, \
     priority, isRestricted, status, commentary, results, updatedDate FROM labProcedure";

const INSERT_LAB_PROCEDURE: &str = "INSERT INTO labProcedure (labTechnicianID, officeVisitID, \
     priority, isRestricted, status, commentary, results, updatedDate) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const UPDATE_LAB_PROCEDURE: &str = "UPDATE labProcedure SET labTechnicianID = ?1, \
     officeVisitID = ?2, priority = ?3, isRestricted = ?4, status = ?5, commentary = ?6, \
     results = ?7, updatedDate = ?8 WHERE labProcedureID = ?9";

/// Column values exactly as stored, before the status id is resolved.
struct LabProcedureRow {
    lab_procedure_id: i64,
    lab_technician_id: Option<i64>,
    office_visit_id: i64,
    priority: Option<i32>,
    is_restricted: bool,
    status_id: i64,
    commentary: Option<String>,
    results: Option<String>,
    updated_date: Option<DateTime<Utc>>,
}

impl LabProcedureRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            lab_procedure_id: row.get(0)?,
            lab_technician_id: row.get(1)?,
            office_visit_id: row.get(2)?,
            priority: row.get(3)?,
            is_restricted: row.get(4)?,
            status_id: row.get(5)?,
            commentary: row.get(6)?,
            results: row.get(7)?,
            updated_date: row.get(8)?,
        })
    }
}

impl TryFrom<LabProcedureRow> for LabProcedure {
    type Error = StatusLookupError;

    fn try_from(row: LabProcedureRow) -> Result<Self, Self::Error> {
        Ok(LabProcedure {
            lab_procedure_id: Some(row.lab_procedure_id),
            lab_technician_id: row.lab_technician_id,
            office_visit_id: row.office_visit_id,
            priority: row.priority,
            is_restricted: row.is_restricted,
            status: LabProcedureStatus::try_from(row.status_id)?,
            commentary: row.commentary,
            results: row.results,
            updated_date: row.updated_date,
        })
    }
}

/// Repository for lab procedures.
#[derive(Clone, Debug)]
pub struct LabProcedureRepository {
    db: Database,
    transition_policy: TransitionPolicy,
}

impl LabProcedureRepository {
    /// Creates a repository over `db`, taking the transition policy from `cfg`.
    pub fn new(db: Database, cfg: &CoreConfig) -> Self {
        Self {
            db,
            transition_policy: cfg.transition_policy(),
        }
    }

    /// Fetches one procedure by key. `Ok(None)` when no row matches.
    pub fn get_by_id(&self, id: i64) -> RecordResult<Option<LabProcedure>> {
        let conn = self.db.connection()?;
        let row = query_optional(
            &conn,
            &format!("{SELECT_LAB_PROCEDURE} WHERE labProcedureID = ?1"),
            params![id],
            LabProcedureRow::from_row,
        )?;
        Ok(row.map(LabProcedure::try_from).transpose()?)
    }

    /// All procedures in key order, which is insertion order for this store.
    pub fn get_all(&self) -> RecordResult<Vec<LabProcedure>> {
        let conn = self.db.connection()?;
        let rows = query_rows(
            &conn,
            &format!("{SELECT_LAB_PROCEDURE} ORDER BY labProcedureID"),
            [],
            LabProcedureRow::from_row,
        )?;
        convert_all(rows)
    }

    /// Procedures ordered on the given office visit, in key order.
    pub fn get_by_office_visit(&self, office_visit_id: i64) -> RecordResult<Vec<LabProcedure>> {
        let conn = self.db.connection()?;
        let rows = query_rows(
            &conn,
            &format!("{SELECT_LAB_PROCEDURE} WHERE officeVisitID = ?1 ORDER BY labProcedureID"),
            params![office_visit_id],
            LabProcedureRow::from_row,
        )?;
        convert_all(rows)
    }

    /// Procedures assigned to a lab technician, most urgent first.
    ///
    /// Procedures without a priority sort last.
    pub fn get_for_lab_technician(&self, technician_id: i64) -> RecordResult<Vec<LabProcedure>> {
        let conn = self.db.connection()?;
        let rows = query_rows(
            &conn,
            &format!(
                "{SELECT_LAB_PROCEDURE} WHERE labTechnicianID = ?1 \
                 ORDER BY priority IS NULL, priority, labProcedureID"
            ),
            params![technician_id],
            LabProcedureRow::from_row,
        )?;
        convert_all(rows)
    }

    /// Inserts a procedure and reports whether a row was written.
    ///
    /// Any `lab_procedure_id` on the argument is ignored; the store assigns the key.
    /// `updatedDate` is stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` (without touching the store) if the procedure
    /// fails validation, or a storage error if the insert fails, for example because the
    /// office visit does not exist.
    pub fn add(&self, procedure: &LabProcedure) -> RecordResult<bool> {
        Ok(self.add_returning_id(procedure)?.is_some())
    }

    /// Inserts a procedure and returns the key the store assigned.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn add_returning_id(&self, procedure: &LabProcedure) -> RecordResult<Option<i64>> {
        validate_lab_procedure(procedure)?;

        let conn = self.db.connection()?;
        let id = execute_insert(
            &conn,
            INSERT_LAB_PROCEDURE,
            params![
                procedure.lab_technician_id,
                procedure.office_visit_id,
                procedure.priority,
                procedure.is_restricted,
                procedure.status.id(),
                procedure.commentary,
                procedure.results,
                Utc::now(),
            ],
        )?;
        tracing::debug!(?id, status = %procedure.status, "added lab procedure");
        Ok(id)
    }

    /// Overwrites the stored procedure with the same key.
    ///
    /// Returns `Ok(false)` if the procedure has no key, no row has that key, or (under
    /// enforced transitions) the stored status may not move to `procedure.status`.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Validation` without touching the store if the procedure fails
    /// validation, or a storage error if the statement fails.
    pub fn update(&self, procedure: &LabProcedure) -> RecordResult<bool> {
        validate_lab_procedure(procedure)?;

        let Some(id) = procedure.lab_procedure_id else {
            tracing::debug!("update skipped: lab procedure has no key");
            return Ok(false);
        };

        let sql = match self.transition_policy {
            TransitionPolicy::Permissive => UPDATE_LAB_PROCEDURE.to_string(),
            TransitionPolicy::Enforced => {
                let allowed = procedure
                    .status
                    .allowed_previous()
                    .iter()
                    .map(|s| s.id().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{UPDATE_LAB_PROCEDURE} AND status IN ({allowed})")
            }
        };

        let conn = self.db.connection()?;
        let updated = execute_write(
            &conn,
            &sql,
            params![
                procedure.lab_technician_id,
                procedure.office_visit_id,
                procedure.priority,
                procedure.is_restricted,
                procedure.status.id(),
                procedure.commentary,
                procedure.results,
                Utc::now(),
                id,
            ],
        )?;
        if !updated {
            tracing::debug!(id, status = %procedure.status, "lab procedure update matched no row");
        }
        Ok(updated)
    }

    /// Deletes the procedure with key `id`. `Ok(false)` if there was none.
    pub fn remove(&self, id: i64) -> RecordResult<bool> {
        let conn = self.db.connection()?;
        execute_write(
            &conn,
            "DELETE FROM labProcedure WHERE labProcedureID = ?1",
            params![id],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::records::OfficeVisit;
    use crate::repositories::office_visit::OfficeVisitRepository;
    use crate::RecordError;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn setup(policy: TransitionPolicy) -> (TempDir, LabProcedureRepository, i64) {
        let (temp, cfg, db) = setup_test_db(policy);
        let date = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let visit_id = OfficeVisitRepository::new(db.clone())
            .add_returning_id(&OfficeVisit::new(1, date, "1", 1))
            .unwrap()
            .unwrap();
        (temp, LabProcedureRepository::new(db, &cfg), visit_id)
    }

    fn procedure(visit_id: i64, commentary: &str, status: LabProcedureStatus) -> LabProcedure {
        LabProcedure {
            lab_technician_id: Some(5_000_000_001),
            priority: Some(3),
            is_restricted: true,
            status,
            commentary: Some(commentary.to_string()),
            results: Some("Foobar".to_string()),
            ..LabProcedure::new(visit_id)
        }
    }

    #[test]
    fn add_then_get_by_id() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let id = repo
            .add_returning_id(&procedure(
                visit_id,
                "This is a lo-pri lab procedure",
                LabProcedureStatus::Pending,
            ))
            .unwrap()
            .unwrap();

        let stored = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(stored.lab_procedure_id, Some(id));
        assert_eq!(stored.status.id(), 1);
        assert_eq!(
            stored.commentary.as_deref(),
            Some("This is a lo-pri lab procedure")
        );
        assert_eq!(stored.results.as_deref(), Some("Foobar"));
        assert!(stored.is_restricted);
        assert!(stored.updated_date.is_some());
    }

    #[test]
    fn get_by_id_missing_is_none() {
        let (_temp, repo, _visit_id) = setup(TransitionPolicy::Permissive);
        assert!(repo.get_by_id(42).unwrap().is_none());
    }

    #[test]
    fn get_all_returns_insertion_order() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        for i in 0..6 {
            let p = procedure(
                visit_id,
                &format!("procedure {i}"),
                LabProcedureStatus::ALL[i % 5],
            );
            assert!(repo.add(&p).unwrap());
        }

        let all = repo.get_all().unwrap();
        assert_eq!(all.len(), 6);
        for (i, p) in all.iter().enumerate() {
            assert_eq!(p.commentary.as_deref(), Some(format!("procedure {i}").as_str()));
        }
    }

    #[test]
    fn invalid_procedure_is_never_written() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let invalid = LabProcedure {
            priority: Some(9),
            ..procedure(visit_id, "bad", LabProcedureStatus::Pending)
        };

        let err = repo.add(&invalid).unwrap_err();
        assert!(err.is_validation());
        assert!(repo.get_all().unwrap().is_empty());

        let id = repo
            .add_returning_id(&procedure(visit_id, "good", LabProcedureStatus::Pending))
            .unwrap()
            .unwrap();
        let invalid_update = LabProcedure {
            lab_procedure_id: Some(id),
            commentary: Some("changed".into()),
            ..invalid
        };
        assert!(matches!(
            repo.update(&invalid_update),
            Err(RecordError::Validation(_))
        ));
        let stored = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(stored.commentary.as_deref(), Some("good"));
        assert_eq!(stored.priority, Some(3));
    }

    #[test]
    fn add_for_unknown_visit_is_a_storage_error() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let orphan = procedure(visit_id + 100, "orphan", LabProcedureStatus::Pending);
        let err = repo.add(&orphan).unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn update_missing_key_reports_false() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let unsaved = procedure(visit_id, "unsaved", LabProcedureStatus::Pending);
        assert!(!repo.update(&unsaved).unwrap());

        let stale = LabProcedure {
            lab_procedure_id: Some(999),
            ..unsaved
        };
        assert!(!repo.update(&stale).unwrap());
    }

    #[test]
    fn permissive_update_allows_any_status_jump() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let id = repo
            .add_returning_id(&procedure(visit_id, "jump", LabProcedureStatus::Completed))
            .unwrap()
            .unwrap();

        let mut stored = repo.get_by_id(id).unwrap().unwrap();
        stored.status = LabProcedureStatus::Pending;
        assert!(repo.update(&stored).unwrap());
        assert_eq!(
            repo.get_by_id(id).unwrap().unwrap().status,
            LabProcedureStatus::Pending
        );
    }

    #[test]
    fn enforced_update_follows_lifecycle() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Enforced);
        let id = repo
            .add_returning_id(&procedure(visit_id, "ordered", LabProcedureStatus::Pending))
            .unwrap()
            .unwrap();
        let mut stored = repo.get_by_id(id).unwrap().unwrap();

        stored.status = LabProcedureStatus::Testing;
        assert!(!repo.update(&stored).unwrap());
        assert_eq!(
            repo.get_by_id(id).unwrap().unwrap().status,
            LabProcedureStatus::Pending
        );

        stored.status = LabProcedureStatus::InTransit;
        assert!(repo.update(&stored).unwrap());

        stored.commentary = Some("still in transit".into());
        assert!(repo.update(&stored).unwrap());

        stored.status = LabProcedureStatus::Pending;
        assert!(!repo.update(&stored).unwrap());
    }

    #[test]
    fn filtered_queries() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let mut low = procedure(visit_id, "low", LabProcedureStatus::Pending);
        low.priority = Some(3);
        let mut high = procedure(visit_id, "high", LabProcedureStatus::Pending);
        high.priority = Some(1);
        let mut other_tech = procedure(visit_id, "other", LabProcedureStatus::Pending);
        other_tech.lab_technician_id = Some(5_000_000_002);
        for p in [&low, &high, &other_tech] {
            repo.add(p).unwrap();
        }

        let for_tech = repo.get_for_lab_technician(5_000_000_001).unwrap();
        let comments: Vec<_> = for_tech
            .iter()
            .map(|p| p.commentary.clone().unwrap())
            .collect();
        assert_eq!(comments, vec!["high", "low"]);

        assert_eq!(repo.get_by_office_visit(visit_id).unwrap().len(), 3);
        assert!(repo.get_by_office_visit(visit_id + 1).unwrap().is_empty());
    }

    #[test]
    fn remove_deletes_by_key() {
        let (_temp, repo, visit_id) = setup(TransitionPolicy::Permissive);
        let id = repo
            .add_returning_id(&procedure(visit_id, "gone", LabProcedureStatus::Received))
            .unwrap()
            .unwrap();
        assert!(repo.remove(id).unwrap());
        assert!(!repo.remove(id).unwrap());
        assert!(repo.get_by_id(id).unwrap().is_none());
    }
}
