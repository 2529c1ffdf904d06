use placement_sql::{SQLExec, Value};

use crate::error::LedgerError;
use crate::model::HistoryEntry;

use super::{AllocationService, fetch_allocation, row_to_history};

impl AllocationService {
    /// Audit trail of one allocation, newest first, with student and actor
    /// names resolved from the directory.
    pub fn get_history(&self, allocation_id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        fetch_allocation(self.sql.as_ref(), allocation_id)?;

        let rows = self.sql.query(
            "SELECT h.id, h.allocation_id, h.action_type, h.previous_allocated, \
                    h.new_allocated, h.student_id, h.performed_by, h.notes, h.create_at, \
                    s.full_name AS student_name, p.full_name AS performed_by_name \
             FROM allocation_history h \
             LEFT JOIN students s ON s.id = h.student_id \
             LEFT JOIN profiles p ON p.id = h.performed_by \
             WHERE h.allocation_id = ?1 \
             ORDER BY h.create_at DESC, h.seq DESC",
            &[Value::Text(allocation_id.to_string())],
        )?;

        rows.iter().map(row_to_history).collect()
    }
}
