//! Database connection source.
//!
//! [`Database`] is built once from [`CoreConfig`] at startup and cloned into each
//! repository. Every repository operation takes one pooled connection, runs a
//! single statement on it and hands it back to the pool when the guard drops,
//! on success and error paths alike.

use crate::config::CoreConfig;
use crate::{RecordError, RecordResult};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

/// A pooled connection checked out for the duration of one repository call.
pub type Connection = PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS officeVisit (
    visitID INTEGER PRIMARY KEY AUTOINCREMENT,
    patientMID INTEGER NOT NULL,
    date TEXT NOT NULL,
    locationID TEXT NOT NULL,
    apptTypeID INTEGER NOT NULL,
    notes TEXT,
    sendBill INTEGER NOT NULL DEFAULT 1,
    height REAL,
    length REAL,
    weight REAL,
    headCircumference REAL,
    bloodPressure TEXT,
    hdl INTEGER,
    triglyceride INTEGER,
    ldl INTEGER,
    householdSmokingStatus INTEGER,
    patientSmokingStatus INTEGER
);

CREATE INDEX IF NOT EXISTS officeVisit_patientMID ON officeVisit (patientMID);

CREATE TABLE IF NOT EXISTS ndcodes (
    code TEXT PRIMARY KEY NOT NULL,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prescription (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patientMID INTEGER NOT NULL,
    drugCode TEXT NOT NULL REFERENCES ndcodes (code),
    startDate TEXT NOT NULL,
    endDate TEXT NOT NULL,
    officeVisitId INTEGER NOT NULL REFERENCES officeVisit (visitID)
);

CREATE INDEX IF NOT EXISTS prescription_patientMID ON prescription (patientMID);

CREATE TABLE IF NOT EXISTS labProcedure (
    labProcedureID INTEGER PRIMARY KEY AUTOINCREMENT,
    labTechnicianID INTEGER,
    officeVisitID INTEGER NOT NULL REFERENCES officeVisit (visitID),
    priority INTEGER,
    isRestricted INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL CHECK (status BETWEEN 1 AND 5),
    commentary TEXT,
    results TEXT,
    updatedDate TEXT
);

CREATE INDEX IF NOT EXISTS labProcedure_officeVisitID ON labProcedure (officeVisitID);
CREATE INDEX IF NOT EXISTS labProcedure_labTechnicianID ON labProcedure (labTechnicianID);
";

/// Shared source of database connections.
///
/// Cloning is cheap; all clones draw from the same pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Database")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}

impl Database {
    /// Opens the connection pool described by `cfg`.
    ///
    /// Connections are established eagerly so that a bad path or unreadable file fails
    /// here, at startup, rather than on the first request. Each connection enables
    /// foreign key enforcement and waits up to the configured timeout on a locked database.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::PoolSetup`] if the pool cannot be built.
    pub fn open(cfg: &CoreConfig) -> RecordResult<Self> {
        let busy_timeout = cfg.connect_timeout();
        let manager = SqliteConnectionManager::file(cfg.database_path()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(cfg.pool_size())
            .connection_timeout(cfg.connect_timeout())
            .build(manager)
            .map_err(|source| RecordError::PoolSetup {
                path: cfg.database_path().to_path_buf(),
                source,
            })?;

        tracing::info!(
            "opened database {} (pool size {})",
            cfg.database_path().display(),
            cfg.pool_size()
        );

        Ok(Self { pool })
    }

    /// Checks a connection out of the pool.
    ///
    /// # Errors
    ///
    /// Returns a storage error if no connection becomes available within the configured
    /// timeout.
    pub fn connection(&self) -> RecordResult<Connection> {
        Ok(self.pool.get()?)
    }

    /// Creates any missing tables and indexes. Safe to run on every start.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a connection cannot be acquired or the DDL fails.
    pub fn ensure_schema(&self) -> RecordResult<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!("database schema is up to date");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::TransitionPolicy;
    use std::time::Duration;
    use tempfile::TempDir;

    /// A schema-initialised database in a temporary directory.
    ///
    /// The `TempDir` must be kept alive for as long as the database is used.
    pub(crate) fn setup_test_db(policy: TransitionPolicy) -> (TempDir, CoreConfig, Database) {
        setup_test_db_with_pool(policy, 2)
    }

    /// Same as [`setup_test_db`] with an explicit pool size.
    pub(crate) fn setup_test_db_with_pool(
        policy: TransitionPolicy,
        pool_size: u32,
    ) -> (TempDir, CoreConfig, Database) {
        let temp_dir = TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            temp_dir.path().join("clinrec-test.db"),
            pool_size,
            Duration::from_secs(2),
            policy,
        )
        .unwrap();
        let db = Database::open(&cfg).unwrap();
        db.ensure_schema().unwrap();
        (temp_dir, cfg, db)
    }
}
