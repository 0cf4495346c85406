//! Statement helpers shared by the repositories.
//!
//! Each helper borrows a connection that the caller checked out for exactly one
//! operation. Statements and row cursors are dropped before the helper returns,
//! so the connection goes back to the pool clean whichever way the call ends.

use crate::db::Connection;
use crate::RecordResult;
use rusqlite::{Params, Row};

/// Runs a query and maps every row with `map_row`.
///
/// `map_row` decodes raw column values; converting them into records (which may
/// itself fail, e.g. on an unknown status id) happens in the caller via `TryFrom`.
pub(crate) fn query_rows<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    map_row: F,
) -> RecordResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_row)?
        .collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Runs a query expected to return at most one row.
///
/// Zero rows is `Ok(None)`; only the first row is used if the key is not unique.
pub(crate) fn query_optional<T, P, F>(
    conn: &Connection,
    sql: &str,
    params: P,
    map_row: F,
) -> RecordResult<Option<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, map_row)?;
    Ok(rows.next().transpose()?)
}

/// Executes a write statement and reports whether any row was affected.
///
/// Zero affected rows is a normal outcome (`Ok(false)`), not an error.
pub(crate) fn execute_write<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RecordResult<bool> {
    let affected = conn.execute(sql, params)?;
    tracing::debug!(affected, "executed write statement");
    Ok(affected > 0)
}

/// Executes an INSERT and returns the generated key when a row was written.
pub(crate) fn execute_insert<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RecordResult<Option<i64>> {
    let affected = conn.execute(sql, params)?;
    tracing::debug!(affected, "executed insert statement");
    if affected == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

/// Converts raw rows into records, failing on the first inconsistent row.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> RecordResult<Vec<T>>
where
    T: TryFrom<R>,
    crate::RecordError: From<T::Error>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(Into::into))
        .collect()
}
