use tracing::debug;

use placement_sql::{SQLExec, Value};

use crate::error::LedgerError;

use super::AllocationService;

impl AllocationService {
    /// Register or rename a student for history name resolution.
    pub fn upsert_student(&self, id: &str, full_name: &str) -> Result<(), LedgerError> {
        self.upsert_name("students", id, full_name)
    }

    /// Register or rename an actor profile for history name resolution.
    pub fn upsert_profile(&self, id: &str, full_name: &str) -> Result<(), LedgerError> {
        self.upsert_name("profiles", id, full_name)
    }

    fn upsert_name(&self, table: &str, id: &str, full_name: &str) -> Result<(), LedgerError> {
        let id = id.trim();
        let full_name = full_name.trim();
        let mut errs = placement_core::FieldErrors::new();
        if id.is_empty() {
            errs.push("id", "is required");
        }
        if full_name.is_empty() {
            errs.push("fullName", "is required");
        }
        errs.into_result()?;

        self.sql.exec(
            &format!(
                "INSERT INTO {table} (id, full_name) VALUES (?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name"
            ),
            &[Value::Text(id.to_string()), Value::Text(full_name.to_string())],
        )?;
        debug!(table, id, "directory name stored");
        Ok(())
    }
}
