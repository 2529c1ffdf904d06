pub mod allocate;
pub mod allocation;
pub mod directory;
pub mod history;
pub mod schema;
pub mod stats;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use placement_core::new_id;
use placement_sql::{Row, SQLError, SQLExec, SQLStore, Value};

use crate::error::LedgerError;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeOp, ChangeTable};
use crate::model::{AllocationRecord, AllocationStatus, HistoryAction, HistoryEntry};

/// Ledger behaviour switches, read from the `[ledger]` config section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Append a `QUOTA_EXHAUSTED` entry when an allocation takes the last unit.
    pub record_exhaustion: bool,
}

/// The allocation ledger. Holds its storage backend, change feed and config.
pub struct AllocationService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) feed: Arc<ChangeFeed>,
    pub(crate) config: LedgerConfig,
}

impl AllocationService {
    /// Create the service, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        feed: Arc<ChangeFeed>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self { sql, feed, config })
    }

    /// The feed this service publishes committed changes to.
    pub fn feed(&self) -> &Arc<ChangeFeed> {
        &self.feed
    }

    /// Run `body` in one write transaction.
    ///
    /// An error returned by `body` rolls the transaction back and is passed
    /// through unchanged; storage failures are converted.
    pub(crate) fn in_tx<T>(
        &self,
        body: impl FnOnce(&dyn SQLExec) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut body = Some(body);
        let mut outcome: Option<Result<T, LedgerError>> = None;

        let committed = self.sql.transaction(&mut |tx| {
            let Some(body) = body.take() else {
                return Err(SQLError::Aborted);
            };
            let result = body(tx);
            let failed = result.is_err();
            outcome = Some(result);
            if failed { Err(SQLError::Aborted) } else { Ok(()) }
        });

        match (committed, outcome) {
            (_, Some(Err(e))) => Err(e),
            (Ok(()), Some(Ok(value))) => Ok(value),
            (Err(e), _) => Err(e.into()),
            (Ok(()), None) => Err(LedgerError::Internal("transaction body did not run".into())),
        }
    }
}

// ── Row mapping ──

pub(crate) const ALLOCATION_COLUMNS: &str = "id, college_id, course, batch_year, total_quota, \
     allocated_count, available_count, status, renewal_date, notes, created_by, create_at, update_at";

fn text(row: &Row, col: &str) -> Result<String, LedgerError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Storage(format!("bad row: missing {col}")))
}

fn int(row: &Row, col: &str) -> Result<i64, LedgerError> {
    row.get_i64(col)
        .ok_or_else(|| LedgerError::Storage(format!("bad row: missing {col}")))
}

fn opt_text(row: &Row, col: &str) -> Option<String> {
    row.get_str(col).map(str::to_string)
}

/// Decode an allocation row. Derived fields are as stored; callers
/// reconcile before returning records.
pub(crate) fn row_to_record(row: &Row) -> Result<AllocationRecord, LedgerError> {
    let renewal_date = match row.get_str("renewal_date") {
        Some(s) => Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            LedgerError::Storage(format!("bad renewal_date {s:?}: {e}"))
        })?),
        None => None,
    };
    let batch_year = int(row, "batch_year")?;

    Ok(AllocationRecord {
        id: text(row, "id")?,
        college_id: text(row, "college_id")?,
        course: text(row, "course")?,
        batch_year: i32::try_from(batch_year)
            .map_err(|_| LedgerError::Storage(format!("bad batch_year {batch_year}")))?,
        total_quota: int(row, "total_quota")?,
        allocated_count: int(row, "allocated_count")?,
        available_count: int(row, "available_count")?,
        status: row
            .get_str("status")
            .and_then(AllocationStatus::parse)
            .unwrap_or_default(),
        renewal_date,
        notes: opt_text(row, "notes"),
        created_by: opt_text(row, "created_by"),
        create_at: text(row, "create_at")?,
        update_at: text(row, "update_at")?,
    })
}

pub(crate) fn row_to_history(row: &Row) -> Result<HistoryEntry, LedgerError> {
    Ok(HistoryEntry {
        id: text(row, "id")?,
        allocation_id: text(row, "allocation_id")?,
        action_type: HistoryAction::parse(&text(row, "action_type")?),
        previous_allocated: row.get_i64("previous_allocated"),
        new_allocated: row.get_i64("new_allocated"),
        student_id: opt_text(row, "student_id"),
        performed_by: opt_text(row, "performed_by"),
        notes: opt_text(row, "notes"),
        create_at: text(row, "create_at")?,
        student_name: opt_text(row, "student_name"),
        performed_by_name: opt_text(row, "performed_by_name"),
    })
}

fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

// ── Shared statements ──

/// Load one allocation by id.
pub(crate) fn fetch_allocation<Q: SQLExec + ?Sized>(
    q: &Q,
    id: &str,
) -> Result<AllocationRecord, LedgerError> {
    let sql = format!("SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE id = ?1");
    let rows = q.query(&sql, &[Value::Text(id.to_string())])?;
    let row = rows
        .first()
        .ok_or_else(|| LedgerError::NotFound(format!("allocation {id}")))?;
    row_to_record(row)
}

pub(crate) fn insert_record(q: &dyn SQLExec, r: &AllocationRecord) -> Result<(), LedgerError> {
    q.exec(
        &format!(
            "INSERT INTO allocations ({ALLOCATION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
        ),
        &[
            Value::Text(r.id.clone()),
            Value::Text(r.college_id.clone()),
            Value::Text(r.course.clone()),
            Value::Integer(i64::from(r.batch_year)),
            Value::Integer(r.total_quota),
            Value::Integer(r.allocated_count),
            Value::Integer(r.available_count),
            Value::Text(r.status.as_str().to_string()),
            r.renewal_date.map(|d| d.to_string()).into(),
            r.notes.clone().into(),
            r.created_by.clone().into(),
            Value::Text(r.create_at.clone()),
            Value::Text(r.update_at.clone()),
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing allocation.
pub(crate) fn write_record(q: &dyn SQLExec, r: &AllocationRecord) -> Result<(), LedgerError> {
    let affected = q.exec(
        "UPDATE allocations SET course = ?1, batch_year = ?2, total_quota = ?3, \
         allocated_count = ?4, available_count = ?5, status = ?6, renewal_date = ?7, \
         notes = ?8, update_at = ?9 WHERE id = ?10",
        &[
            Value::Text(r.course.clone()),
            Value::Integer(i64::from(r.batch_year)),
            Value::Integer(r.total_quota),
            Value::Integer(r.allocated_count),
            Value::Integer(r.available_count),
            Value::Text(r.status.as_str().to_string()),
            r.renewal_date.map(|d| d.to_string()).into(),
            r.notes.clone().into(),
            Value::Text(r.update_at.clone()),
            Value::Text(r.id.clone()),
        ],
    )?;
    if affected == 0 {
        return Err(LedgerError::NotFound(format!("allocation {}", r.id)));
    }
    Ok(())
}

/// Write back only the derived columns after a counter change.
pub(crate) fn write_derived(q: &dyn SQLExec, r: &AllocationRecord) -> Result<(), LedgerError> {
    q.exec(
        "UPDATE allocations SET available_count = ?1, status = ?2, update_at = ?3 WHERE id = ?4",
        &[
            Value::Integer(r.available_count),
            Value::Text(r.status.as_str().to_string()),
            Value::Text(r.update_at.clone()),
            Value::Text(r.id.clone()),
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_history(q: &dyn SQLExec, e: &HistoryEntry) -> Result<(), LedgerError> {
    q.exec(
        "INSERT INTO allocation_history (id, allocation_id, action_type, previous_allocated, \
         new_allocated, student_id, performed_by, notes, create_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        &[
            Value::Text(e.id.clone()),
            Value::Text(e.allocation_id.clone()),
            Value::Text(e.action_type.as_str().to_string()),
            opt_int(e.previous_allocated),
            opt_int(e.new_allocated),
            e.student_id.clone().into(),
            e.performed_by.clone().into(),
            e.notes.clone().into(),
            Value::Text(e.create_at.clone()),
        ],
    )?;
    Ok(())
}

/// A fresh history entry with no resolved names.
pub(crate) fn history_entry(
    allocation_id: &str,
    action_type: HistoryAction,
    previous_allocated: i64,
    new_allocated: i64,
    create_at: &str,
) -> HistoryEntry {
    HistoryEntry {
        id: new_id(),
        allocation_id: allocation_id.to_string(),
        action_type,
        previous_allocated: Some(previous_allocated),
        new_allocated: Some(new_allocated),
        student_id: None,
        performed_by: None,
        notes: None,
        create_at: create_at.to_string(),
        student_name: None,
        performed_by_name: None,
    }
}

pub(crate) fn change(
    table: ChangeTable,
    op: ChangeOp,
    college_id: &str,
    record_id: &str,
) -> ChangeEvent {
    ChangeEvent {
        table,
        op,
        college_id: college_id.to_string(),
        record_id: record_id.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;
    use std::time::Duration;

    use placement_sql::SqliteStore;

    use super::{AllocationService, LedgerConfig};
    use crate::feed::ChangeFeed;
    use crate::model::CreateAllocation;

    pub fn service() -> AllocationService {
        service_with(LedgerConfig::default())
    }

    pub fn service_with(config: LedgerConfig) -> AllocationService {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        AllocationService::new(sql, Arc::new(ChangeFeed::new()), config).unwrap()
    }

    /// Service whose store gives up waiting for the connection after `timeout`.
    pub fn service_with_timeout(timeout: Duration) -> AllocationService {
        let sql = Arc::new(SqliteStore::open_in_memory_with(timeout).unwrap());
        AllocationService::new(sql, Arc::new(ChangeFeed::new()), LedgerConfig::default()).unwrap()
    }

    pub fn input(college: &str, course: &str, year: i64, total: i64, allocated: i64) -> CreateAllocation {
        CreateAllocation {
            college_id: college.into(),
            course: course.into(),
            batch_year: year,
            total_quota: total,
            allocated_count: allocated,
            renewal_date: None,
            notes: None,
        }
    }
}
