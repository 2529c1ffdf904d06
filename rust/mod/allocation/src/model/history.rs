use serde::{Deserialize, Serialize};

/// Kind of mutation a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    InitialAllocation,
    AccountAllocated,
    AllocationUpdated,
    QuotaExhausted,
    /// Stored value this build does not recognize.
    #[serde(other)]
    Unknown,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialAllocation => "INITIAL_ALLOCATION",
            Self::AccountAllocated => "ACCOUNT_ALLOCATED",
            Self::AllocationUpdated => "ALLOCATION_UPDATED",
            Self::QuotaExhausted => "QUOTA_EXHAUSTED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a stored action; unrecognized values become `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "INITIAL_ALLOCATION" => Self::InitialAllocation,
            "ACCOUNT_ALLOCATED" => Self::AccountAllocated,
            "ALLOCATION_UPDATED" => Self::AllocationUpdated,
            "QUOTA_EXHAUSTED" => Self::QuotaExhausted,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record of a mutation against an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,

    pub allocation_id: String,

    pub action_type: HistoryAction,

    /// Allocated count before the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_allocated: Option<i64>,

    /// Allocated count after the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_allocated: Option<i64>,

    /// Student the unit went to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,

    /// Actor who performed the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub create_at: String,

    // --- resolved on read ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by_name: Option<String>,
}

impl HistoryEntry {
    /// Change in allocated count, when both snapshots are present.
    pub fn delta(&self) -> Option<i64> {
        Some(self.new_allocated? - self.previous_allocated?)
    }
}
