use tracing::{debug, info};

use placement_core::{new_id, now_rfc3339, today};
use placement_sql::{SQLExec, Value};

use crate::error::LedgerError;
use crate::feed::{ChangeOp, ChangeTable};
use crate::model::{
    AllocationPatch, AllocationRecord, AllocationStatus, CreateAllocation, HistoryAction,
};
use crate::validate;

use super::{
    ALLOCATION_COLUMNS, AllocationService, change, fetch_allocation, history_entry,
    insert_history, insert_record, row_to_record, write_record,
};

/// History note used when an update does not carry its own.
pub const DEFAULT_UPDATE_NOTE: &str = "Allocation updated";

const INITIAL_NOTE: &str = "Initial allocation created";

impl AllocationService {
    /// All allocations of a college, newest batch first.
    pub fn list_allocations(&self, college_id: &str) -> Result<Vec<AllocationRecord>, LedgerError> {
        let sql = format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE college_id = ?1 \
             ORDER BY batch_year DESC, create_at DESC, id ASC"
        );
        let rows = self.sql.query(&sql, &[Value::Text(college_id.to_string())])?;

        let today = today();
        rows.iter()
            .map(|row| -> Result<AllocationRecord, LedgerError> {
                let mut record = row_to_record(row)?;
                record.reconcile(today);
                Ok(record)
            })
            .collect()
    }

    pub fn get_allocation(&self, id: &str) -> Result<AllocationRecord, LedgerError> {
        let mut record = fetch_allocation(self.sql.as_ref(), id)?;
        record.reconcile(today());
        Ok(record)
    }

    /// Create an allocation and its `INITIAL_ALLOCATION` history entry.
    pub fn create_allocation(
        &self,
        input: CreateAllocation,
        actor: Option<&str>,
    ) -> Result<AllocationRecord, LedgerError> {
        validate::check_new(&input)?;

        let now = now_rfc3339();
        let mut record = AllocationRecord {
            id: new_id(),
            college_id: input.college_id.trim().to_string(),
            course: input.course.trim().to_string(),
            // Range-checked by validation.
            batch_year: input.batch_year as i32,
            total_quota: input.total_quota,
            allocated_count: input.allocated_count,
            available_count: 0,
            status: AllocationStatus::Active,
            renewal_date: input.renewal_date,
            notes: input.notes,
            created_by: actor.map(str::to_string),
            create_at: now.clone(),
            update_at: now.clone(),
        };
        record.reconcile(today());

        let mut initial = history_entry(
            &record.id,
            HistoryAction::InitialAllocation,
            0,
            record.allocated_count,
            &now,
        );
        initial.performed_by = record.created_by.clone();
        initial.notes = Some(INITIAL_NOTE.to_string());

        self.in_tx(|tx| {
            insert_record(tx, &record).map_err(|e| duplicate_scope(e, &record))?;
            insert_history(tx, &initial)
        })?;

        info!(
            allocation_id = %record.id,
            college_id = %record.college_id,
            course = %record.course,
            batch_year = record.batch_year,
            total_quota = record.total_quota,
            "allocation created"
        );
        self.feed.publish_all(&[
            change(ChangeTable::Allocations, ChangeOp::Insert, &record.college_id, &record.id),
            change(ChangeTable::History, ChangeOp::Insert, &record.college_id, &initial.id),
        ]);

        Ok(record)
    }

    /// Apply a JSON merge patch to an allocation.
    ///
    /// Appends an `ALLOCATION_UPDATED` entry when the allocated count changes.
    pub fn update_allocation(
        &self,
        id: &str,
        patch: &serde_json::Value,
        actor: Option<&str>,
    ) -> Result<AllocationRecord, LedgerError> {
        let patch = AllocationPatch::from_json(patch)?;
        let today = today();

        let (record, entry) = self.in_tx(|tx| {
            let mut record = fetch_allocation(tx, id)?;
            let previous = record.allocated_count;

            patch.apply(&mut record);
            validate::check_record(&record)?;
            record.reconcile(today);

            if let Some(available) = patch.available_count {
                if available != record.available_count {
                    return Err(LedgerError::field(
                        "availableCount",
                        format!(
                            "must equal totalQuota - allocatedCount ({})",
                            record.available_count
                        ),
                    ));
                }
            }

            record.update_at = now_rfc3339();
            write_record(tx, &record).map_err(|e| duplicate_scope(e, &record))?;

            let entry = if record.allocated_count != previous {
                let mut e = history_entry(
                    &record.id,
                    HistoryAction::AllocationUpdated,
                    previous,
                    record.allocated_count,
                    &record.update_at,
                );
                e.performed_by = actor.map(str::to_string);
                e.notes = Some(patch.note().unwrap_or(DEFAULT_UPDATE_NOTE).to_string());
                insert_history(tx, &e)?;
                Some(e)
            } else {
                None
            };
            Ok((record, entry))
        })?;

        info!(
            allocation_id = %record.id,
            allocated_count = record.allocated_count,
            total_quota = record.total_quota,
            status = %record.status,
            "allocation updated"
        );
        let mut events = vec![change(
            ChangeTable::Allocations,
            ChangeOp::Update,
            &record.college_id,
            &record.id,
        )];
        if let Some(ref e) = entry {
            events.push(change(ChangeTable::History, ChangeOp::Insert, &record.college_id, &e.id));
        }
        self.feed.publish_all(&events);

        Ok(record)
    }

    /// Delete an allocation together with its history.
    pub fn delete_allocation(&self, id: &str) -> Result<(), LedgerError> {
        let (college_id, history_removed) = self.in_tx(|tx| {
            let record = fetch_allocation(tx, id)?;
            let history_removed = delete_history(tx, id)?;
            let affected = tx.exec(
                "DELETE FROM allocations WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )?;
            if affected == 0 {
                return Err(LedgerError::NotFound(format!("allocation {id}")));
            }
            Ok((record.college_id, history_removed))
        })?;

        info!(allocation_id = %id, history_removed, "allocation deleted");
        self.feed
            .publish(&change(ChangeTable::Allocations, ChangeOp::Delete, &college_id, id));
        Ok(())
    }
}

fn delete_history(tx: &dyn SQLExec, allocation_id: &str) -> Result<u64, LedgerError> {
    let n = tx.exec(
        "DELETE FROM allocation_history WHERE allocation_id = ?1",
        &[Value::Text(allocation_id.to_string())],
    )?;
    debug!(allocation_id, removed = n, "history removed");
    Ok(n)
}

/// Name the clashing scope when a write hits the uniqueness constraint.
fn duplicate_scope(err: LedgerError, record: &AllocationRecord) -> LedgerError {
    match err {
        LedgerError::Conflict(_) => LedgerError::Conflict(format!(
            "an allocation for {} batch {} already exists in college {}",
            record.course, record.batch_year, record.college_id
        )),
        other => other,
    }
}
