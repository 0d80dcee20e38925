//! HTTP integration tests, driven against the in-memory backend.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

use colloquia::review::store::InMemoryReviewStore;
use colloquia::routes::build_router;
use colloquia::state::AppState;

fn setup_app() -> axum::Router {
    let state = Arc::new(AppState {
        store: Arc::new(InMemoryReviewStore::new()),
    });
    build_router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Helper: create a paper and n reviewers, assign them all, return
/// (paper_id, reviewer_ids).
async fn seed_paper(app: &axum::Router, reviewer_count: usize) -> (String, Vec<String>) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/papers",
            json!({ "title": "Spectral Methods for Crowd Flow" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let paper = extract_json(response.into_body()).await;
    let paper_id = paper["id"].as_str().unwrap().to_string();
    assert_eq!(paper["status"], "PENDING");
    assert_eq!(paper["phase"], "FIRST_ROUND");

    let mut reviewer_ids = Vec::new();
    for i in 0..reviewer_count {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/reviewers",
                json!({ "name": format!("Reviewer {}", i + 1) }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let reviewer = extract_json(response.into_body()).await;
        reviewer_ids.push(reviewer["id"].as_str().unwrap().to_string());
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/papers/{}/reviewers", paper_id),
            json!({ "reviewer_ids": reviewer_ids }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    (paper_id, reviewer_ids)
}

async fn submit(
    app: &axum::Router,
    paper_id: &str,
    reviewer_id: &str,
    verdict: &str,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/papers/{}/decisions", paper_id),
            json!({ "reviewer_id": reviewer_id, "verdict": verdict }),
        ))
        .await
        .unwrap();
    let status = response.status();
    let body = extract_json(response.into_body()).await;
    (status, body)
}

#[tokio::test]
async fn health_reports_package() {
    let app = setup_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["package"], "colloquia");
}

#[tokio::test]
async fn full_first_round_with_reject_priority() {
    let app = setup_app();
    let (paper_id, reviewers) = seed_paper(&app, 3).await;

    // Assignment alone moved the paper under review.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/papers/{}", paper_id)))
        .await
        .unwrap();
    let paper = extract_json(response.into_body()).await;
    assert_eq!(paper["status"], "UNDER_REVIEW");

    let (status, body) = submit(&app, &paper_id, &reviewers[0], "ACCEPT").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status_changed"], false);
    assert!(body.get("new_status").is_none());

    let (_, body) = submit(&app, &paper_id, &reviewers[1], "ACCEPT").await;
    assert_eq!(body["status_changed"], false);

    // Two of three voted: quorum open, nothing resolved.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/papers/{}/aggregation", paper_id)))
        .await
        .unwrap();
    let view = extract_json(response.into_body()).await;
    assert_eq!(view["quorum_met"], false);
    assert_eq!(view["current_status"], "UNDER_REVIEW");
    assert_eq!(view["latest_by_reviewer"].as_object().unwrap().len(), 2);

    // Third vote completes the quorum; one REJECT kills the paper.
    let (_, body) = submit(&app, &paper_id, &reviewers[2], "REJECT").await;
    assert_eq!(body["status_changed"], true);
    assert_eq!(body["new_status"], "REJECTED");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/papers/{}/decisions", paper_id)))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    assert_eq!(history.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn revision_round_trip() {
    let app = setup_app();
    let (paper_id, reviewers) = seed_paper(&app, 3).await;

    submit(&app, &paper_id, &reviewers[0], "ACCEPT").await;
    submit(&app, &paper_id, &reviewers[1], "REVISE").await;
    let (_, body) = submit(&app, &paper_id, &reviewers[2], "ACCEPT").await;
    assert_eq!(body["new_status"], "REVISION_REQUESTED");

    // Editorial resubmission opens the re-review round.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/papers/{}/phase", paper_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let advanced = extract_json(response.into_body()).await;
    assert_eq!(advanced["phase"], "POST_REVISION_ROUND");

    // One re-vote: prior-round verdicts are out of scope, quorum is open,
    // and the status holds at REVISION_REQUESTED.
    let (_, body) = submit(&app, &paper_id, &reviewers[0], "ACCEPT").await;
    assert_eq!(body["status_changed"], false);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/papers/{}/aggregation", paper_id)))
        .await
        .unwrap();
    let view = extract_json(response.into_body()).await;
    assert_eq!(view["quorum_met"], false);
    assert_eq!(view["latest_by_reviewer"].as_object().unwrap().len(), 1);
    assert_eq!(view["current_status"], "REVISION_REQUESTED");

    submit(&app, &paper_id, &reviewers[1], "ACCEPT").await;
    let (_, body) = submit(&app, &paper_id, &reviewers[2], "ACCEPT").await;
    assert_eq!(body["new_status"], "ACCEPTED");
}

#[tokio::test]
async fn invalid_verdict_is_rejected_at_the_boundary() {
    let app = setup_app();
    let (paper_id, reviewers) = seed_paper(&app, 1).await;

    let (status, body) = submit(&app, &paper_id, &reviewers[0], "MAYBE").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("MAYBE"));

    // Nothing was logged.
    let response = app
        .clone()
        .oneshot(get(&format!("/api/papers/{}/decisions", paper_id)))
        .await
        .unwrap();
    let history = extract_json(response.into_body()).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unassigned_reviewer_gets_forbidden() {
    let app = setup_app();
    let (paper_id, _) = seed_paper(&app, 2).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/reviewers",
            json!({ "name": "Outsider" }),
        ))
        .await
        .unwrap();
    let outsider = extract_json(response.into_body()).await;
    let outsider_id = outsider["id"].as_str().unwrap();

    let (status, body) = submit(&app, &paper_id, outsider_id, "REJECT").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("not assigned"));
}

#[tokio::test]
async fn unknown_paper_is_not_found() {
    let app = setup_app();
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/papers/{}",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn phase_advance_outside_revision_conflicts() {
    let app = setup_app();
    let (paper_id, _) = seed_paper(&app, 2).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/papers/{}/phase", paper_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
