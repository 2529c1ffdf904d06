use serde::Serialize;

use super::{AllocationRecord, AllocationStatus};

/// Per-college totals across all allocation records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStats {
    pub total_quota: i64,
    pub total_allocated: i64,
    pub total_available: i64,
    pub total_allocations: i64,
    pub active_allocations: i64,
    pub depleted_allocations: i64,
    pub expired_allocations: i64,
}

impl AllocationStats {
    /// Fold reconciled records into totals.
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a AllocationRecord>) -> Self {
        let mut stats = Self::default();
        for r in records {
            stats.total_quota += r.total_quota;
            stats.total_allocated += r.allocated_count;
            stats.total_available += r.available_count;
            stats.total_allocations += 1;
            match r.status {
                AllocationStatus::Active => stats.active_allocations += 1,
                AllocationStatus::Depleted => stats.depleted_allocations += 1,
                AllocationStatus::Expired => stats.expired_allocations += 1,
            }
        }
        stats
    }
}
