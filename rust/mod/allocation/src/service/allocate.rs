use tracing::{info, warn};

use placement_core::{now_rfc3339, today};
use placement_sql::Value;

use crate::error::LedgerError;
use crate::feed::{ChangeOp, ChangeTable};
use crate::model::{AllocationRecord, HistoryAction};

use super::{
    ALLOCATION_COLUMNS, AllocationService, change, fetch_allocation, history_entry,
    insert_history, row_to_record, write_derived,
};

const ALLOCATED_NOTE: &str = "Account allocated to student";
const EXHAUSTED_NOTE: &str = "Quota exhausted";

impl AllocationService {
    /// Take one unit of an allocation for a student.
    ///
    /// The increment is a single conditional statement, so two callers racing
    /// for the last unit cannot both succeed. Expired allocations still accept
    /// students while capacity remains.
    pub fn allocate_to_student(
        &self,
        allocation_id: &str,
        student_id: &str,
        actor: Option<&str>,
    ) -> Result<AllocationRecord, LedgerError> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(LedgerError::field("studentId", "is required"));
        }

        let increment = format!(
            "UPDATE allocations SET allocated_count = allocated_count + 1 \
             WHERE id = ?1 AND allocated_count < total_quota \
             RETURNING {ALLOCATION_COLUMNS}"
        );
        let today = today();

        let (record, entries) = self.in_tx(|tx| {
            let rows = tx.query(&increment, &[Value::Text(allocation_id.to_string())])?;
            let Some(row) = rows.first() else {
                // Missing and full are told apart only after the update failed.
                let current = fetch_allocation(tx, allocation_id)?;
                return Err(LedgerError::CapacityExhausted(current.id));
            };

            let mut record = row_to_record(row)?;
            record.reconcile(today);
            record.update_at = now_rfc3339();
            write_derived(tx, &record)?;

            let count = record.allocated_count;
            let mut allocated = history_entry(
                &record.id,
                HistoryAction::AccountAllocated,
                count - 1,
                count,
                &record.update_at,
            );
            allocated.student_id = Some(student_id.to_string());
            allocated.performed_by = actor.map(str::to_string);
            allocated.notes = Some(ALLOCATED_NOTE.to_string());
            insert_history(tx, &allocated)?;

            let mut entries = vec![allocated];
            if self.config.record_exhaustion && record.available_count == 0 {
                let mut exhausted = history_entry(
                    &record.id,
                    HistoryAction::QuotaExhausted,
                    count,
                    count,
                    &record.update_at,
                );
                exhausted.performed_by = actor.map(str::to_string);
                exhausted.notes = Some(EXHAUSTED_NOTE.to_string());
                insert_history(tx, &exhausted)?;
                entries.push(exhausted);
            }
            Ok((record, entries))
        })?;

        info!(
            allocation_id = %record.id,
            student_id,
            allocated_count = record.allocated_count,
            available_count = record.available_count,
            "account allocated"
        );
        if record.available_count == 0 {
            warn!(allocation_id = %record.id, total_quota = record.total_quota, "allocation depleted");
        }

        let mut events = vec![change(
            ChangeTable::Allocations,
            ChangeOp::Update,
            &record.college_id,
            &record.id,
        )];
        events.extend(
            entries
                .iter()
                .map(|e| change(ChangeTable::History, ChangeOp::Insert, &record.college_id, &e.id)),
        );
        self.feed.publish_all(&events);

        Ok(record)
    }
}
