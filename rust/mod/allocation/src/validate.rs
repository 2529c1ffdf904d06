//! Field validation for allocation input.
//!
//! Every check pushes onto a shared [`FieldErrors`] so callers see all
//! failing fields at once.

use placement_core::FieldErrors;

use crate::model::{AllocationRecord, CreateAllocation};

pub const MIN_BATCH_YEAR: i64 = 2000;
pub const MAX_BATCH_YEAR: i64 = 2100;
pub const MAX_NOTES_LEN: usize = 2000;

pub(crate) const BATCH_YEAR_MESSAGE: &str = "must be between 2000 and 2100";

pub fn batch_year_in_range(year: i64) -> bool {
    (MIN_BATCH_YEAR..=MAX_BATCH_YEAR).contains(&year)
}

/// Validate a create request before anything is written.
pub fn check_new(input: &CreateAllocation) -> Result<(), FieldErrors> {
    let mut errs = FieldErrors::new();
    if input.college_id.trim().is_empty() {
        errs.push("collegeId", "must not be empty");
    }
    check_course(&mut errs, &input.course);
    if !batch_year_in_range(input.batch_year) {
        errs.push("batchYear", BATCH_YEAR_MESSAGE);
    }
    check_quantities(&mut errs, input.total_quota, input.allocated_count);
    check_notes(&mut errs, input.notes.as_deref());
    errs.into_result()
}

/// Validate a record after a patch has been applied to it.
pub fn check_record(record: &AllocationRecord) -> Result<(), FieldErrors> {
    let mut errs = FieldErrors::new();
    check_course(&mut errs, &record.course);
    if !batch_year_in_range(i64::from(record.batch_year)) {
        errs.push("batchYear", BATCH_YEAR_MESSAGE);
    }
    check_quantities(&mut errs, record.total_quota, record.allocated_count);
    check_notes(&mut errs, record.notes.as_deref());
    errs.into_result()
}

fn check_course(errs: &mut FieldErrors, course: &str) {
    if course.trim().is_empty() {
        errs.push("course", "must not be empty");
    }
}

fn check_quantities(errs: &mut FieldErrors, total_quota: i64, allocated_count: i64) {
    if total_quota <= 0 {
        errs.push("totalQuota", "must be greater than 0");
    }
    if allocated_count < 0 {
        errs.push("allocatedCount", "must not be negative");
    } else if total_quota > 0 && allocated_count > total_quota {
        errs.push("allocatedCount", "must not exceed totalQuota");
    }
}

fn check_notes(errs: &mut FieldErrors, notes: Option<&str>) {
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        errs.push("notes", format!("must be at most {MAX_NOTES_LEN} characters"));
    }
}
