use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use placement_core::ServiceError;

use crate::error::LedgerError;
use crate::model::{AllocateRequest, AllocationRecord, AllocationStats, CreateAllocation};

use super::{AppState, actor};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/colleges/{college_id}/allocations", get(list_allocations))
        .route("/colleges/{college_id}/allocations/stats", get(get_stats))
        .route("/allocations", post(create_allocation))
        .route(
            "/allocations/{id}",
            get(get_allocation)
                .patch(update_allocation)
                .delete(delete_allocation),
        )
        .route("/allocations/{id}/allocate", post(allocate_to_student))
}

// ---------------------------------------------------------------------------
// GET /colleges/{college_id}/allocations
// ---------------------------------------------------------------------------

async fn list_allocations(
    State(svc): State<AppState>,
    Path(college_id): Path<String>,
) -> Result<Json<Vec<AllocationRecord>>, ServiceError> {
    Ok(Json(svc.list_allocations(&college_id)?))
}

// ---------------------------------------------------------------------------
// GET /colleges/{college_id}/allocations/stats
// ---------------------------------------------------------------------------

async fn get_stats(
    State(svc): State<AppState>,
    Path(college_id): Path<String>,
) -> Result<Json<AllocationStats>, ServiceError> {
    Ok(Json(svc.get_stats(&college_id)?))
}

// ---------------------------------------------------------------------------
// POST /allocations
// ---------------------------------------------------------------------------

async fn create_allocation(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<AllocationRecord>), ServiceError> {
    let input = CreateAllocation::from_json(&body).map_err(LedgerError::from)?;
    let record = svc.create_allocation(input, actor(&headers).as_deref())?;
    Ok((StatusCode::CREATED, Json(record)))
}

// ---------------------------------------------------------------------------
// GET /allocations/{id}
// ---------------------------------------------------------------------------

async fn get_allocation(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AllocationRecord>, ServiceError> {
    Ok(Json(svc.get_allocation(&id)?))
}

// ---------------------------------------------------------------------------
// PATCH /allocations/{id}
// ---------------------------------------------------------------------------

async fn update_allocation(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<AllocationRecord>, ServiceError> {
    Ok(Json(svc.update_allocation(&id, &patch, actor(&headers).as_deref())?))
}

// ---------------------------------------------------------------------------
// DELETE /allocations/{id}
// ---------------------------------------------------------------------------

async fn delete_allocation(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_allocation(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /allocations/{id}/allocate
// ---------------------------------------------------------------------------

async fn allocate_to_student(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<AllocationRecord>, ServiceError> {
    let body = AllocateRequest::from_json(&body).map_err(LedgerError::from)?;
    let record = svc.allocate_to_student(&id, &body.student_id, actor(&headers).as_deref())?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testutil::{call, setup};
    use super::*;

    fn create_body(course: &str, total: i64, allocated: i64) -> serde_json::Value {
        json!({
            "collegeId": "c1",
            "course": course,
            "batchYear": 2025,
            "totalQuota": total,
            "allocatedCount": allocated,
        })
    }

    #[tokio::test]
    async fn create_then_get() {
        let (r, _) = setup();
        let (s, created) = call(&r, "POST", "/allocation/v1/allocations", Some("admin"),
            Some(create_body("B.Tech CSE", 50, 0))).await;
        assert_eq!(s, StatusCode::CREATED);
        assert_eq!(created["availableCount"], 50);
        assert_eq!(created["status"], "active");
        assert_eq!(created["createdBy"], "admin");

        let id = created["id"].as_str().unwrap();
        let (s, got) = call(&r, "GET", &format!("/allocation/v1/allocations/{id}"), None, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(got, created);
    }

    #[tokio::test]
    async fn create_reports_every_bad_field() {
        let (r, _) = setup();
        let (s, body) = call(&r, "POST", "/allocation/v1/allocations", None, Some(json!({
            "collegeId": "c1",
            "course": " ",
            "batchYear": 1990,
            "totalQuota": 5,
            "allocatedCount": 9,
        }))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"course"));
        assert!(fields.contains(&"batchYear"));
        assert!(fields.contains(&"allocatedCount"));

        let (_, list) = call(&r, "GET", "/allocation/v1/colleges/c1/allocations", None, None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn malformed_create_lists_each_field() {
        let (r, _) = setup();
        let (s, body) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(json!({"collegeId": "c1", "course": "", "batchYear": "soon"}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");

        let fields = body["fields"].as_array().unwrap();
        let message = |name: &str| {
            fields
                .iter()
                .find(|f| f["field"] == name)
                .and_then(|f| f["message"].as_str())
                .map(str::to_string)
        };
        assert_eq!(fields.len(), 3, "{body}");
        assert_eq!(message("totalQuota").as_deref(), Some("is required"));
        assert_eq!(message("batchYear").as_deref(), Some("must be an integer"));
        assert_eq!(message("course").as_deref(), Some("must not be empty"));

        let (_, list) = call(&r, "GET", "/allocation/v1/colleges/c1/allocations", None, None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn allocate_without_student_is_field_error() {
        let (r, _) = setup();
        let (_, created) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(create_body("MBA", 1, 0))).await;
        let uri = format!("/allocation/v1/allocations/{}/allocate", created["id"].as_str().unwrap());

        let (s, body) = call(&r, "POST", &uri, None, Some(json!({}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"][0]["field"], "studentId");
        assert_eq!(body["fields"][0]["message"], "is required");
    }

    #[tokio::test]
    async fn allocate_until_exhausted() {
        let (r, _) = setup();
        let (_, created) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(create_body("MBA", 1, 0))).await;
        let uri = format!("/allocation/v1/allocations/{}/allocate", created["id"].as_str().unwrap());

        let (s, body) = call(&r, "POST", &uri, Some("admin"), Some(json!({"studentId": "s1"}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["allocatedCount"], 1);
        assert_eq!(body["status"], "depleted");

        let (s, body) = call(&r, "POST", &uri, None, Some(json!({"studentId": "s2"}))).await;
        assert_eq!(s, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CAPACITY_EXHAUSTED");
    }

    #[tokio::test]
    async fn allocate_unknown_is_not_found() {
        let (r, _) = setup();
        let (s, body) = call(&r, "POST", "/allocation/v1/allocations/nope/allocate", None,
            Some(json!({"studentId": "s1"}))).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn patch_and_delete() {
        let (r, _) = setup();
        let (_, created) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(create_body("MBA", 10, 0))).await;
        let uri = format!("/allocation/v1/allocations/{}", created["id"].as_str().unwrap());

        let (s, body) = call(&r, "PATCH", &uri, None, Some(json!({"allocatedCount": 4}))).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(body["availableCount"], 6);

        let (s, body) = call(&r, "PATCH", &uri, None, Some(json!({"status": "expired"}))).await;
        assert_eq!(s, StatusCode::BAD_REQUEST);
        assert_eq!(body["fields"][0]["field"], "status");

        let (s, _) = call(&r, "DELETE", &uri, None, None).await;
        assert_eq!(s, StatusCode::NO_CONTENT);
        let (s, _) = call(&r, "GET", &uri, None, None).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_scope_conflicts() {
        let (r, _) = setup();
        let (s, _) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(create_body("MBA", 10, 0))).await;
        assert_eq!(s, StatusCode::CREATED);
        let (s, body) = call(&r, "POST", "/allocation/v1/allocations", None,
            Some(create_body("MBA", 10, 0))).await;
        assert_eq!(s, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn list_and_stats() {
        let (r, _) = setup();
        for (course, total, allocated) in [("A", 50, 50), ("B", 30, 10), ("C", 20, 20)] {
            call(&r, "POST", "/allocation/v1/allocations", None,
                Some(create_body(course, total, allocated))).await;
        }

        let (s, list) = call(&r, "GET", "/allocation/v1/colleges/c1/allocations", None, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 3);

        let (s, stats) = call(&r, "GET", "/allocation/v1/colleges/c1/allocations/stats", None, None).await;
        assert_eq!(s, StatusCode::OK);
        assert_eq!(stats["totalQuota"], 100);
        assert_eq!(stats["totalAllocated"], 80);
        assert_eq!(stats["totalAvailable"], 20);
        assert_eq!(stats["depletedAllocations"], 2);
    }
}
