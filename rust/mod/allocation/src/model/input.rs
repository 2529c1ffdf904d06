use chrono::NaiveDate;
use serde_json::{Map, Value};

use placement_core::FieldErrors;

use crate::validate;

use super::AllocationRecord;

/// Request body for creating an allocation.
///
/// Quantities are wide signed integers so out-of-range values reach
/// validation and are reported per field instead of failing to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAllocation {
    pub college_id: String,
    pub course: String,
    pub batch_year: i64,
    pub total_quota: i64,
    pub allocated_count: i64,
    pub renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Keys a create body must carry.
const REQUIRED_CREATE_KEYS: &[&str] = &["collegeId", "course", "batchYear", "totalQuota"];

/// Server-assigned keys; tolerated in a create body and ignored.
const ASSIGNED_KEYS: &[&str] = &["id", "status", "availableCount", "createdBy", "createAt", "updateAt"];

impl CreateAllocation {
    /// Decode a create body.
    ///
    /// Missing, mistyped and unknown keys are reported together with the
    /// value checks of [`validate::check_new`], one entry per field.
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errs = FieldErrors::new();
        let obj = object(body, &mut errs)?;

        let mut input = Self {
            college_id: String::new(),
            course: String::new(),
            batch_year: 0,
            total_quota: 0,
            allocated_count: 0,
            renewal_date: None,
            notes: None,
        };

        for (key, value) in obj {
            match key.as_str() {
                "collegeId" => {
                    if let Some(s) = string(&mut errs, key, value) {
                        input.college_id = s;
                    }
                }
                "course" => {
                    if let Some(s) = string(&mut errs, key, value) {
                        input.course = s;
                    }
                }
                "batchYear" => {
                    if let Some(n) = integer(&mut errs, key, value) {
                        input.batch_year = n;
                    }
                }
                "totalQuota" => {
                    if let Some(n) = integer(&mut errs, key, value) {
                        input.total_quota = n;
                    }
                }
                "allocatedCount" => {
                    if let Some(n) = integer(&mut errs, key, value) {
                        input.allocated_count = n;
                    }
                }
                "renewalDate" => {
                    if let Some(d) = nullable_date(&mut errs, key, value) {
                        input.renewal_date = d;
                    }
                }
                "notes" => {
                    if let Some(n) = nullable_string(&mut errs, key, value) {
                        input.notes = n;
                    }
                }
                k if ASSIGNED_KEYS.contains(&k) => {}
                _ => errs.push(key, "unknown field"),
            }
        }
        for key in REQUIRED_CREATE_KEYS {
            if !obj.contains_key(*key) {
                errs.push(key, "is required");
            }
        }

        // Value checks only for fields that decoded.
        if let Err(invalid) = validate::check_new(&input) {
            for e in invalid.iter() {
                if !errs.contains(&e.field) {
                    errs.push(&e.field, e.message.clone());
                }
            }
        }

        errs.into_result()?;
        Ok(input)
    }
}

/// Body of an allocate call.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocateRequest {
    pub student_id: String,
}

impl AllocateRequest {
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errs = FieldErrors::new();
        let obj = object(body, &mut errs)?;

        let mut student_id = None;
        for (key, value) in obj {
            match key.as_str() {
                "studentId" => student_id = string(&mut errs, key, value),
                _ => errs.push(key, "unknown field"),
            }
        }
        if !obj.contains_key("studentId") {
            errs.push("studentId", "is required");
        }

        errs.into_result()?;
        Ok(Self { student_id: student_id.unwrap_or_default() })
    }
}

/// Body of a student or profile name registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NameInput {
    pub full_name: String,
}

impl NameInput {
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errs = FieldErrors::new();
        let obj = object(body, &mut errs)?;

        let mut full_name = None;
        for (key, value) in obj {
            match key.as_str() {
                "fullName" => full_name = string(&mut errs, key, value),
                // The id comes from the path.
                "id" => {}
                _ => errs.push(key, "unknown field"),
            }
        }
        if !obj.contains_key("fullName") {
            errs.push("fullName", "is required");
        }

        errs.into_result()?;
        Ok(Self { full_name: full_name.unwrap_or_default() })
    }
}

/// Partial update parsed from a JSON merge patch.
///
/// `Some(None)` on a nullable field clears it. `notes` is stored on the
/// record; `history_note` only annotates the audit entry the update writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationPatch {
    pub course: Option<String>,
    pub batch_year: Option<i32>,
    pub total_quota: Option<i64>,
    pub allocated_count: Option<i64>,
    /// Only accepted when it matches the reconciled value.
    pub available_count: Option<i64>,
    pub renewal_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
    pub history_note: Option<String>,
}

/// Keys that may appear in a patch but never change a record.
const IMMUTABLE_KEYS: &[&str] = &["id", "collegeId", "createdBy", "createAt", "updateAt"];

fn object<'a>(body: &'a Value, errs: &mut FieldErrors) -> Result<&'a Map<String, Value>, FieldErrors> {
    match body.as_object() {
        Some(obj) => Ok(obj),
        None => {
            errs.push("body", "must be a JSON object");
            Err(std::mem::take(errs))
        }
    }
}

fn string(errs: &mut FieldErrors, key: &str, value: &Value) -> Option<String> {
    let s = value.as_str().map(str::to_string);
    if s.is_none() {
        errs.push(key, "must be a string");
    }
    s
}

fn integer(errs: &mut FieldErrors, key: &str, value: &Value) -> Option<i64> {
    let n = value.as_i64();
    if n.is_none() {
        errs.push(key, "must be an integer");
    }
    n
}

/// `Some(None)` for JSON null.
fn nullable_string(errs: &mut FieldErrors, key: &str, value: &Value) -> Option<Option<String>> {
    if value.is_null() {
        return Some(None);
    }
    let s = value.as_str().map(|s| Some(s.to_string()));
    if s.is_none() {
        errs.push(key, "must be a string or null");
    }
    s
}

/// `Some(None)` for JSON null.
fn nullable_date(errs: &mut FieldErrors, key: &str, value: &Value) -> Option<Option<NaiveDate>> {
    if value.is_null() {
        return Some(None);
    }
    let d = value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .map(Some);
    if d.is_none() {
        errs.push(key, "must be a date (YYYY-MM-DD) or null");
    }
    d
}

impl AllocationPatch {
    /// Parse a merge patch, collecting one error per bad field.
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errs = FieldErrors::new();
        let obj = object(body, &mut errs)?;
        let mut patch = Self::default();

        for (key, value) in obj {
            match key.as_str() {
                "course" => patch.course = string(&mut errs, key, value),
                "batchYear" => match value.as_i64() {
                    Some(y) if validate::batch_year_in_range(y) => {
                        patch.batch_year = Some(y as i32);
                    }
                    Some(_) => errs.push(key, validate::BATCH_YEAR_MESSAGE),
                    None => errs.push(key, "must be an integer"),
                },
                "totalQuota" => patch.total_quota = integer(&mut errs, key, value),
                "allocatedCount" => patch.allocated_count = integer(&mut errs, key, value),
                "availableCount" => patch.available_count = integer(&mut errs, key, value),
                "renewalDate" => patch.renewal_date = nullable_date(&mut errs, key, value),
                "notes" => patch.notes = nullable_string(&mut errs, key, value),
                "historyNote" => match nullable_string(&mut errs, key, value) {
                    Some(Some(n)) if n.chars().count() > validate::MAX_NOTES_LEN => errs.push(
                        key,
                        format!("must be at most {} characters", validate::MAX_NOTES_LEN),
                    ),
                    Some(n) => {
                        patch.history_note =
                            n.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
                    }
                    None => {}
                },
                "status" => errs.push(key, "is derived and cannot be set"),
                k if IMMUTABLE_KEYS.contains(&k) => {}
                _ => errs.push(key, "unknown field"),
            }
        }

        errs.into_result()?;
        Ok(patch)
    }

    /// Copy the patched fields onto `record`. Derived fields are left stale
    /// for the caller to reconcile.
    pub fn apply(&self, record: &mut AllocationRecord) {
        if let Some(ref c) = self.course {
            record.course = c.trim().to_string();
        }
        if let Some(y) = self.batch_year {
            record.batch_year = y;
        }
        if let Some(t) = self.total_quota {
            record.total_quota = t;
        }
        if let Some(a) = self.allocated_count {
            record.allocated_count = a;
        }
        if let Some(ref d) = self.renewal_date {
            record.renewal_date = *d;
        }
        if let Some(ref n) = self.notes {
            record.notes = n.clone();
        }
    }

    /// Note for the audit entry: `historyNote` when given, else the new
    /// record `notes`.
    pub fn note(&self) -> Option<&str> {
        self.history_note
            .as_deref()
            .or_else(|| self.notes.as_ref().and_then(|n| n.as_deref()))
    }
}
