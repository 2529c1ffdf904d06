use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AllocationStatus
// ---------------------------------------------------------------------------

/// Derived state of an allocation.
///
/// ```text
/// ACTIVE ──(last unit allocated)──→ DEPLETED
///    │                                  │
///    └──────(renewal date passes)───────┴──→ EXPIRED
/// ```
///
/// Never stored as caller input; see [`AllocationStatus::derive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    #[default]
    Active,
    Depleted,
    Expired,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Depleted => "depleted",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "depleted" => Some(Self::Depleted),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Status for the given quantities as of `today`.
    ///
    /// A passed renewal date wins over availability.
    pub fn derive(
        total_quota: i64,
        allocated_count: i64,
        renewal_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        if renewal_date.is_some_and(|d| d < today) {
            Self::Expired
        } else if total_quota - allocated_count <= 0 {
            Self::Depleted
        } else {
            Self::Active
        }
    }
}

impl std::fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AllocationRecord
// ---------------------------------------------------------------------------

/// Free-account quota for one (college, course, batch year).
///
/// All fields map directly to SQL columns. `available_count` and `status`
/// are derived and only ever written through [`AllocationRecord::reconcile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub id: String,

    /// Owning college (external tenant).
    pub college_id: String,

    /// Course name, e.g. "B.Tech CSE".
    pub course: String,

    pub batch_year: i32,

    /// Operator-set ceiling on allocations.
    pub total_quota: i64,

    /// Units consumed so far.
    pub allocated_count: i64,

    /// `total_quota - allocated_count`.
    pub available_count: i64,

    pub status: AllocationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Actor who created the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    pub create_at: String,
    pub update_at: String,
}

impl AllocationRecord {
    /// Recompute the derived fields from quota, allocation and renewal date.
    pub fn reconcile(&mut self, today: NaiveDate) {
        self.available_count = self.total_quota - self.allocated_count;
        self.status = AllocationStatus::derive(
            self.total_quota,
            self.allocated_count,
            self.renewal_date,
            today,
        );
    }

    pub fn is_depleted(&self) -> bool {
        self.available_count == 0
    }
}
