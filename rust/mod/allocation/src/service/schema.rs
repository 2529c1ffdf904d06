use placement_sql::{SQLExec, SQLStore};

use crate::error::LedgerError;

/// SQL DDL statements to initialize the ledger schema.
///
/// Allocation and history rows map 1:1 to columns (no JSON blob) so the
/// quota columns can be updated with conditional statements. The CHECK
/// constraints back the quota invariant at the storage layer.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS allocations (
        id              TEXT PRIMARY KEY,
        college_id      TEXT NOT NULL,
        course          TEXT NOT NULL,
        batch_year      INTEGER NOT NULL,
        total_quota     INTEGER NOT NULL CHECK (total_quota >= 0),
        allocated_count INTEGER NOT NULL DEFAULT 0
                        CHECK (allocated_count >= 0 AND allocated_count <= total_quota),
        available_count INTEGER NOT NULL,
        status          TEXT NOT NULL,
        renewal_date    TEXT,
        notes           TEXT,
        created_by      TEXT,
        create_at       TEXT NOT NULL,
        update_at       TEXT NOT NULL,
        UNIQUE(college_id, course, batch_year)
    )",
    "CREATE TABLE IF NOT EXISTS allocation_history (
        seq                INTEGER PRIMARY KEY AUTOINCREMENT,
        id                 TEXT NOT NULL UNIQUE,
        allocation_id      TEXT NOT NULL REFERENCES allocations(id) ON DELETE CASCADE,
        action_type        TEXT NOT NULL,
        previous_allocated INTEGER,
        new_allocated      INTEGER,
        student_id         TEXT,
        performed_by       TEXT,
        notes              TEXT,
        create_at          TEXT NOT NULL
    )",
    // Name directory for resolving history references.
    "CREATE TABLE IF NOT EXISTS students (
        id        TEXT PRIMARY KEY,
        full_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS profiles (
        id        TEXT PRIMARY KEY,
        full_name TEXT NOT NULL
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_alloc_college ON allocations(college_id, batch_year)",
    "CREATE INDEX IF NOT EXISTS idx_alloc_status ON allocations(status)",
    "CREATE INDEX IF NOT EXISTS idx_hist_alloc ON allocation_history(allocation_id, seq)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), LedgerError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| LedgerError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
