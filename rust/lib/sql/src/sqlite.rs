use std::path::Path;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLExec, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// One connection is shared behind a mutex. Waiting for it is bounded by the
/// same timeout SQLite uses for file locks, so every call either runs or
/// fails with [`SQLError::Busy`] within that window.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    ///
    /// `busy_timeout` bounds how long any statement waits on a lock held by
    /// another connection before failing with [`SQLError::Busy`].
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL lets readers proceed while a writer holds the lock.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        debug!(path = %path.display(), ?busy_timeout, "opened sqlite store");
        Self::configure(conn, busy_timeout)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        Self::open_in_memory_with(Duration::from_secs(5))
    }

    /// In-memory database with an explicit lock wait bound.
    pub fn open_in_memory_with(busy_timeout: Duration) -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Self::configure(conn, busy_timeout)
    }

    fn configure(conn: Connection, busy_timeout: Duration) -> Result<Self, SQLError> {
        conn.busy_timeout(busy_timeout)
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy_timeout,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SQLError> {
        self.conn.try_lock_for(self.busy_timeout).ok_or_else(|| {
            SQLError::Busy(format!(
                "connection held by another caller for more than {:?}",
                self.busy_timeout
            ))
        })
    }
}

/// Map a rusqlite error, keeping lock and constraint failures distinct.
fn classify(err: rusqlite::Error, fallback: fn(String) -> SQLError) -> SQLError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return SQLError::Busy(err.to_string());
            }
            ErrorCode::ConstraintViolation => {
                return SQLError::Constraint(err.to_string());
            }
            _ => {}
        }
    }
    fallback(err.to_string())
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| classify(e, SQLError::Query))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| classify(e, SQLError::Query))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| classify(e, SQLError::Query))?);
    }
    Ok(result)
}

fn exec_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| classify(e, SQLError::Execution))?;

    Ok(affected as u64)
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

/// Statement access inside an open transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl SQLExec for SqliteTx<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        query_on(self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        exec_on(self.conn, sql, params)
    }
}

impl SQLExec for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self.lock()?;
        query_on(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self.lock()?;
        exec_on(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn transaction(
        &self,
        body: &mut dyn FnMut(&dyn SQLExec) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| classify(e, SQLError::Execution))?;

        // Dropping `tx` without commit rolls back.
        body(&SqliteTx { conn: &*tx })?;

        tx.commit().map_err(|e| classify(e, SQLError::Execution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE counters (id TEXT PRIMARY KEY, n INTEGER NOT NULL, cap INTEGER NOT NULL)",
                &[],
            )
            .unwrap();
        store
            .exec(
                "INSERT INTO counters (id, n, cap) VALUES (?1, ?2, ?3)",
                &[Value::Text("c1".into()), Value::Integer(0), Value::Integer(2)],
            )
            .unwrap();
        store
    }

    #[test]
    fn query_returns_typed_columns() {
        let store = store_with_table();
        let rows = store
            .query("SELECT id, n, NULL AS missing FROM counters", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("c1"));
        assert_eq!(rows[0].get_i64("n"), Some(0));
        assert_eq!(rows[0].get("missing"), Some(&Value::Null));
    }

    #[test]
    fn conditional_update_reports_affected_rows() {
        let store = store_with_table();
        let bump = "UPDATE counters SET n = n + 1 WHERE id = ?1 AND n < cap";
        let id = [Value::Text("c1".into())];
        assert_eq!(store.exec(bump, &id).unwrap(), 1);
        assert_eq!(store.exec(bump, &id).unwrap(), 1);
        assert_eq!(store.exec(bump, &id).unwrap(), 0);
    }

    #[test]
    fn transaction_commits_on_ok() {
        let store = store_with_table();
        store
            .transaction(&mut |tx| {
                tx.exec("UPDATE counters SET n = 1 WHERE id = 'c1'", &[])?;
                Ok(())
            })
            .unwrap();
        let rows = store.query("SELECT n FROM counters", &[]).unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(1));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = store_with_table();
        let result = store.transaction(&mut |tx| {
            tx.exec("UPDATE counters SET n = 2 WHERE id = 'c1'", &[])?;
            Err(SQLError::Aborted)
        });
        assert!(matches!(result, Err(SQLError::Aborted)));
        let rows = store.query("SELECT n FROM counters", &[]).unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(0));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let store = store_with_table();
        let err = store
            .exec(
                "INSERT INTO counters (id, n, cap) VALUES ('c1', 0, 1)",
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)));
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        {
            let store = SqliteStore::open(&path, Duration::from_millis(200)).unwrap();
            store.exec("CREATE TABLE t (v TEXT)", &[]).unwrap();
            store
                .exec("INSERT INTO t (v) VALUES (?1)", &[Value::Text("kept".into())])
                .unwrap();
        }
        let store = SqliteStore::open(&path, Duration::from_millis(200)).unwrap();
        let rows = store.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_str("v"), Some("kept"));
    }

    #[test]
    fn held_connection_reports_busy_after_timeout() {
        let store = SqliteStore::open_in_memory_with(Duration::from_millis(50)).unwrap();
        store.exec("CREATE TABLE t (v INTEGER)", &[]).unwrap();

        let result = store.transaction(&mut |_tx| {
            // This body holds the connection; a second caller must give up.
            let waited = std::thread::scope(|s| {
                s.spawn(|| {
                    let start = std::time::Instant::now();
                    let res = store.exec("INSERT INTO t (v) VALUES (1)", &[]);
                    (res, start.elapsed())
                })
                .join()
                .unwrap()
            });
            let (res, elapsed) = waited;
            assert!(res.unwrap_err().is_busy());
            assert!(elapsed < Duration::from_secs(2), "waited {elapsed:?}");
            Ok(())
        });
        assert!(result.is_ok());

        // The connection is usable again once released.
        assert_eq!(store.exec("INSERT INTO t (v) VALUES (2)", &[]).unwrap(), 1);
    }

    #[test]
    fn locked_database_reports_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.sqlite");
        let a = SqliteStore::open(&path, Duration::from_millis(50)).unwrap();
        a.exec("CREATE TABLE t (v INTEGER)", &[]).unwrap();
        let b = SqliteStore::open(&path, Duration::from_millis(50)).unwrap();

        let result = a.transaction(&mut |_tx| {
            // `a` holds the write lock for the duration of this body.
            b.exec("INSERT INTO t (v) VALUES (1)", &[]).map(|_| ())
        });
        let err = result.unwrap_err();
        assert!(err.is_busy(), "expected busy, got {err:?}");
    }
}
