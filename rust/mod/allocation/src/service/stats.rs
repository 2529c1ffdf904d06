use crate::error::LedgerError;
use crate::model::AllocationStats;

use super::AllocationService;

impl AllocationService {
    /// Totals across a college's allocations.
    ///
    /// Tallied over reconciled records so expiry reflects today's date. Any
    /// storage failure is returned; there are no partial results.
    pub fn get_stats(&self, college_id: &str) -> Result<AllocationStats, LedgerError> {
        let records = self.list_allocations(college_id)?;
        let stats = AllocationStats::tally(&records);
        tracing::debug!(college_id, allocations = stats.total_allocations, "stats computed");
        Ok(stats)
    }
}
