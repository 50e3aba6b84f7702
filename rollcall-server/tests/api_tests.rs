//! HTTP API integration tests
//!
//! Drives the router with `oneshot`; handlers use the wall clock, so the
//! seeded timetable slot is placed on today's weekday.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use http_body_util::BodyExt;
use rollcall_common::events::EventBus;
use rollcall_server::api::auth::{DEPARTMENT_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use rollcall_server::config::AttendanceSettings;
use rollcall_server::models::Actor;
use rollcall_server::services::JobState;
use rollcall_server::{build_router, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    app: Router,
    state: AppState,
    campus: Campus,
}

async fn test_app(faces: Vec<rollcall_server::models::Embedding>) -> TestApp {
    let db = create_test_db().await;
    let campus = seed_campus(&db, 2, chrono::Utc::now()).await;
    let state = AppState::new(
        db,
        EventBus::new(100),
        AttendanceSettings::default(),
        StubFaceService::with_faces(faces),
    );
    TestApp {
        app: build_router(state.clone()),
        state,
        campus,
    }
}

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.user_id.to_string())
            .header(USER_ROLE_HEADER, actor.role.as_str());
        if let Some(department) = actor.department_id {
            builder = builder.header(DEPARTMENT_HEADER, department.to_string());
        }
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = test_app(vec![]).await;

    let (status, body) = send(&t.app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "rollcall-server");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    t.state.shutdown();
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let t = test_app(vec![]).await;

    let (status, body) = send(&t.app, request("GET", "/attendance/my", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    t.state.shutdown();
}

#[tokio::test]
async fn test_error_mapping() {
    let t = test_app(vec![]).await;
    let faculty = t.campus.faculty();

    let (status, body) = send(
        &t.app,
        request("GET", &format!("/lectures/{}", Uuid::new_v4()), Some(&faculty), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&t.app, request("GET", "/audit/recent", Some(&faculty), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = send(
        &t.app,
        request("GET", "/audit/logs?action=DROP_TABLE", Some(&t.campus.admin()), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = send(
        &t.app,
        request(
            "POST",
            &format!("/lectures/{}/photos", Uuid::new_v4()),
            Some(&faculty),
            Some(json!({ "photos": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    t.state.shutdown();
}

#[tokio::test]
async fn test_attendance_lifecycle_over_http() {
    // Student 0's face is in the photo, student 1's is not
    let t = test_app(vec![unit_embedding(0)]).await;
    let faculty = t.campus.faculty();
    let student = t.campus.student(1);
    let admin = t.campus.admin();

    // Create lecture
    let (status, lecture) = send(
        &t.app,
        request(
            "POST",
            "/lectures",
            Some(&faculty),
            Some(json!({ "class_id": t.campus.class_id, "timetable_slot_id": t.campus.slot_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(lecture["status"], "CREATED");
    let lecture_id: Uuid = serde_json::from_value(lecture["id"].clone()).unwrap();

    let (status, today) = send(&t.app, request("GET", "/lectures/today", Some(&faculty), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(today.as_array().unwrap().len(), 1);

    // Upload photos; generation runs in the background
    let (status, uploaded) = send(
        &t.app,
        request(
            "POST",
            &format!("/lectures/{}/photos", lecture_id),
            Some(&faculty),
            Some(json!({ "photos": ["photos/room-101.jpg"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(uploaded["status"], "PHOTO_UPLOADED");

    let queue = t.state.pipeline.queue().clone();
    let done = wait_until(Duration::from_secs(5), || {
        let queue = queue.clone();
        async move { queue.job_state(lecture_id).await == Some(JobState::Completed) }
    })
    .await;
    assert!(done, "generation did not complete");

    let (status, detail) = send(
        &t.app,
        request("GET", &format!("/lectures/{}", lecture_id), Some(&faculty), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status"], "LOCKED");
    assert_eq!(detail["photo_count"], 1);
    assert_eq!(detail["generation"]["state"], "completed");

    // Student sees an ABSENT entry and disputes it
    let (status, mine) = send(&t.app, request("GET", "/attendance/my", Some(&student), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["status"], "ABSENT");
    let entry_id: Uuid = serde_json::from_value(mine[0]["entry_id"].clone()).unwrap();

    let (status, dispute) = send(
        &t.app,
        request(
            "POST",
            "/disputes",
            Some(&student),
            Some(json!({ "entry_id": entry_id, "reason": "camera missed me" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dispute["status"], "OPEN");
    let dispute_id: Uuid = serde_json::from_value(dispute["id"].clone()).unwrap();

    let (status, _) = send(
        &t.app,
        request(
            "POST",
            "/disputes",
            Some(&student),
            Some(json!({ "entry_id": entry_id, "reason": "again" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Faculty approves
    let (status, resolved) = send(
        &t.app,
        request(
            "POST",
            &format!("/disputes/{}/resolve", dispute_id),
            Some(&faculty),
            Some(json!({ "action": "APPROVE", "comment": "seen in class" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "FACULTY_APPROVED");

    let (_, effective) = send(
        &t.app,
        request("GET", "/attendance/effective/my", Some(&student), None),
    )
    .await;
    assert_eq!(effective[0]["original_status"], "ABSENT");
    assert_eq!(effective[0]["effective_status"], "PRESENT");
    assert_eq!(effective[0]["is_overridden"], true);

    // Admin overrides back to ABSENT
    let (status, override_row) = send(
        &t.app,
        request(
            "POST",
            &format!("/overrides/{}", entry_id),
            Some(&admin),
            Some(json!({ "new_status": "ABSENT", "reason": "video review" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(override_row["previous_status"], "PRESENT");
    assert_eq!(override_row["new_status"], "ABSENT");

    let (_, effective) = send(
        &t.app,
        request("GET", "/attendance/effective/my", Some(&student), None),
    )
    .await;
    assert_eq!(effective[0]["effective_status"], "ABSENT");

    let (status, history) = send(&t.app, request("GET", "/overrides", Some(&t.campus.hod()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, class_view) = send(
        &t.app,
        request("GET", &format!("/classes/{}/attendance", t.campus.class_id), Some(&faculty), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(class_view[0]["present"], 1);
    assert_eq!(class_view[0]["effective_present"], 1);

    let (status, class_disputes) = send(
        &t.app,
        request("GET", &format!("/disputes/class/{}", t.campus.class_id), Some(&faculty), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(class_disputes[0]["status"], "ADMIN_OVERRIDDEN");

    // Ledger
    let (status, page) = send(&t.app, request("GET", "/audit/logs", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    let actions: Vec<&str> = page["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["ADMIN_OVERRIDE", "DISPUTE_RESULT", "DISPUTE_RAISED"]);

    let (_, page) = send(
        &t.app,
        request(
            "GET",
            "/audit/logs?entity_type=AttendanceDispute&page=1&limit=1",
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["pages"], 2);

    let (status, recent) = send(&t.app, request("GET", "/audit/recent", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent.as_array().unwrap().len(), 3);

    t.state.shutdown();
}

#[tokio::test]
async fn test_face_enrollment() {
    let t = test_app(vec![]).await;
    let student = t.campus.student(0);

    let (status, body) = send(
        &t.app,
        request(
            "POST",
            "/face/enroll",
            Some(&student),
            Some(json!({ "image_paths": ["faces/1.jpg", "faces/2.jpg"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &t.app,
        request(
            "POST",
            "/face/enroll",
            Some(&student),
            Some(json!({ "image_paths": ["faces/1.jpg", "faces/2.jpg", "faces/3.jpg"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["images_used"], 3);

    let stored = rollcall_server::db::embeddings::load_embedding(&t.state.db, student.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, unit_embedding(7));

    let (status, _) = send(
        &t.app,
        request(
            "POST",
            "/face/enroll",
            Some(&t.campus.faculty()),
            Some(json!({ "image_paths": ["a", "b", "c"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.state.shutdown();
}

#[tokio::test]
async fn test_audit_page_beyond_range_returns_empty_page() {
    let t = test_app(vec![]).await;

    // Given: an admin asking for the largest representable page
    let uri = format!("/audit/logs?page={}&limit=50", i64::MAX);

    // When: the ledger is queried
    let (status, page) = send(&t.app, request("GET", &uri, Some(&t.campus.admin()), None)).await;

    // Then: the page is clamped and served, not an error
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page"], rollcall_server::models::pagination::MAX_PAGE);
    assert!(page["logs"].as_array().unwrap().is_empty());

    t.state.shutdown();
}
