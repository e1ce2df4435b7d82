// 🌐 REST API - axum routes over a shared GradebookService
//
// Handlers lock the service, run one operation to completion (including the
// save to disk) and map the outcome onto a status code:
//   success            → 200 / 201
//   kind = validation  → 400
//   kind = not_found   → 404

use crate::outcome::Outcome;
use crate::service::GradebookService;
use crate::store::parse_grades;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::debug;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<GradebookService>>,
    web_dir: PathBuf,
}

impl AppState {
    pub fn new(service: GradebookService, web_dir: impl Into<PathBuf>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            web_dir: web_dir.into(),
        }
    }

    /// Exclusive access to the service. A panic in another handler does not
    /// make the store unusable.
    fn service(&self) -> MutexGuard<'_, GradebookService> {
        self.service
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn respond(outcome: Outcome, success_status: StatusCode) -> Response {
    let status = if outcome.is_not_found() {
        StatusCode::NOT_FOUND
    } else if outcome.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        success_status
    };

    (status, Json(outcome)).into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "message": message, "kind": "validation" })),
    )
        .into_response()
}

/// Body as a JSON object, or None for a missing / malformed body
fn json_object(payload: Result<Json<Value>, JsonRejection>) -> Option<Value> {
    match payload {
        Ok(Json(value)) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected request body");
            None
        }
    }
}

/// Non-empty string field
fn text_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "success": true, "message": "OK" }))
}

/// GET /students - The raw store: { name: { subject: [grades] } }
async fn list_students(State(state): State<AppState>) -> impl IntoResponse {
    let book = state.service().book().clone();
    Json(book)
}

/// POST /students - { "name": "..." }
async fn create_student(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(body) = json_object(payload) else {
        return bad_request("Student name is required");
    };
    let Some(name) = text_field(&body, "name") else {
        return bad_request("Student name is required");
    };

    let outcome = state.service().add_student(name);
    respond(outcome, StatusCode::CREATED)
}

#[derive(Deserialize)]
struct RemoveStudentsBody {
    names: Vec<String>,
}

/// DELETE /students - { "names": ["...", ...] }
async fn delete_students(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let parsed = json_object(payload)
        .and_then(|body| serde_json::from_value::<RemoveStudentsBody>(body).ok());
    let Some(RemoveStudentsBody { names }) = parsed else {
        return bad_request("Missing required field: names");
    };

    let outcome = state.service().remove_students(&names);
    respond(outcome, StatusCode::OK)
}

/// GET /students/:name - One student's report
async fn student_report(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let outcome = state.service().student_report(&name);
    respond(outcome, StatusCode::OK)
}

/// DELETE /students/:name
async fn delete_student(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let outcome = state.service().remove_student(&name);
    respond(outcome, StatusCode::OK)
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// GET /search?q=... - Names containing the query
async fn search_students(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    if params.q.trim().is_empty() {
        return bad_request("Missing search query");
    }
    let outcome = state.service().search(&params.q);
    respond(outcome, StatusCode::OK)
}

/// GET /reports - Reports for every student
async fn all_reports(State(state): State<AppState>) -> Response {
    let outcome = state.service().all_reports();
    respond(outcome, StatusCode::OK)
}

/// GET /rankings
async fn rankings(State(state): State<AppState>) -> Response {
    let outcome = state.service().rankings();
    respond(outcome, StatusCode::OK)
}

/// GET /subjects/:subject/average
async fn subject_average(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Response {
    let outcome = state.service().subject_average(&subject);
    respond(outcome, StatusCode::OK)
}

/// POST /grades - { "name", "subject", "grades": number | [number] }
async fn add_grades(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(body) = json_object(payload) else {
        return bad_request("No data provided");
    };

    let (Some(name), Some(subject), Some(raw_grades)) = (
        text_field(&body, "name"),
        text_field(&body, "subject"),
        body.get("grades").filter(|v| !v.is_null()),
    ) else {
        return bad_request("Missing required fields");
    };

    let grades = match parse_grades(raw_grades) {
        Ok(grades) => grades,
        Err(e) => return respond(Outcome::failure(&e), StatusCode::CREATED),
    };

    let outcome = state.service().set_grades(name, subject, &grades);
    respond(outcome, StatusCode::CREATED)
}

/// DELETE /grades - { "name", "subject", "grade": number }
async fn delete_grade(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(body) = json_object(payload) else {
        return bad_request("No data provided");
    };

    let (Some(name), Some(subject), Some(raw_grade)) = (
        text_field(&body, "name"),
        text_field(&body, "subject"),
        body.get("grade").filter(|v| !v.is_null()),
    ) else {
        return bad_request("Missing required fields: name, subject, grade");
    };

    // Numeric strings are accepted here, e.g. straight from a form field
    let grade = match raw_grade {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(grade) = grade.filter(|g| g.is_finite()) else {
        return bad_request("Grade must be a number");
    };

    let outcome = state.service().remove_grade(name, subject, grade);
    respond(outcome, StatusCode::OK)
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .route("/", get(serve_index))
        .route(
            "/students",
            get(list_students).post(create_student).delete(delete_students),
        )
        .route("/students/:name", get(student_report).delete(delete_student))
        .route("/search", get(search_students))
        .route("/search/:name", get(student_report))
        .route("/reports", get(all_reports))
        .route("/rankings", get(rankings))
        .route("/subjects/:subject/average", get(subject_average))
        .route("/grades", post(add_grades).delete(delete_grade))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(&state.web_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::JsonFileStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Method, Request};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn test_app() -> (Router, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "gradebook-api-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let storage = JsonFileStore::new(dir.join("students.json"), dir.join("backups"));
        let state = AppState::new(GradebookService::open(storage), dir.join("web"));
        (router(state), dir)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_create_student_and_duplicate() {
        let (app, _dir) = test_app();

        let (status, body) = call(&app, Method::POST, "/students", Some(json!({"name": "kat"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(true));

        let (status, body) = call(&app, Method::POST, "/students", Some(json!({"name": "KAT "}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Student 'Kat' already exists."));

        let (status, _) = call(&app, Method::POST, "/students", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::POST, "/students", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_grades_flow_and_report() {
        let (app, dir) = test_app();

        let (status, _) = call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "kat ", "subject": "math", "grades": [91, 99, 23]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math", "grades": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, report) = call(&app, Method::GET, "/students/KAT", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["subjects"][0]["grades"], json!([91, 99, 23, 50]));
        assert_eq!(report["subjects"][0]["average"], json!(65.75));
        assert_eq!(report["subjects"][0]["letter"], json!("C+"));

        let (_, store) = call(&app, Method::GET, "/students", None).await;
        assert_eq!(store, json!({"Kat": {"Math": [91, 99, 23, 50]}}));

        // Every mutation is on disk
        let saved: Value =
            serde_json::from_str(&fs::read_to_string(dir.join("students.json")).unwrap()).unwrap();
        assert_eq!(saved, store);
    }

    #[tokio::test]
    async fn test_invalid_grades_are_rejected() {
        let (app, _dir) = test_app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math", "grades": [90, "A"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("validation"));

        let (status, _) = call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, store) = call(&app, Method::GET, "/students", None).await;
        assert_eq!(store, json!({}));
    }

    #[test]
    fn test_web_script_escapes_stored_text() {
        let script = include_str!("../web/app.js");

        for raw in ["${report.name}", "${s.subject}", "${r.name}", "${data.message}", "${data.subject}"] {
            assert!(!script.contains(raw), "unescaped interpolation {}", raw);
        }
        assert!(script.contains("escapeHtml(report.name)"));
        assert!(script.contains("escapeHtml(r.name)"));

        // Unparseable grade tokens reach the server instead of being dropped
        assert!(!script.contains("isNaN(g)"));
    }

    #[tokio::test]
    async fn test_script_style_grade_payload_is_rejected_whole() {
        let (app, _dir) = test_app();

        // "90, abc" from the form
        let (status, body) = call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "<img src=x>", "subject": "Math", "grades": [90, "abc"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));

        let (_, store) = call(&app, Method::GET, "/students", None).await;
        assert_eq!(store, json!({}));
    }

    #[tokio::test]
    async fn test_delete_grade() {
        let (app, _dir) = test_app();
        call(
            &app,
            Method::POST,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math", "grades": [70, 80]})),
        )
        .await;

        let (status, body) = call(
            &app,
            Method::DELETE,
            "/grades",
            Some(json!({"name": "kat", "subject": "math", "grade": "70"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remaining"], json!([80]));

        let (status, _) = call(
            &app,
            Method::DELETE,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math", "grade": 70})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            Method::DELETE,
            "/grades",
            Some(json!({"name": "Kat", "subject": "Math", "grade": "seventy"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_students() {
        let (app, _dir) = test_app();
        call(&app, Method::POST, "/students", Some(json!({"name": "Kat"}))).await;
        call(&app, Method::POST, "/students", Some(json!({"name": "Emu"}))).await;

        let (status, _) = call(&app, Method::DELETE, "/students/kat", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::DELETE, "/students/kat", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            Method::DELETE,
            "/students",
            Some(json!({"names": ["emu", "ghost"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][1], json!({"name": "Ghost", "removed": false}));
    }

    #[tokio::test]
    async fn test_read_routes_map_missing_data_to_404() {
        let (app, _dir) = test_app();

        for uri in ["/reports", "/rankings", "/subjects/science/average", "/students/ghost", "/search/ghost"] {
            let (status, body) = call(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body["success"], json!(false));
        }
    }

    #[tokio::test]
    async fn test_rankings_and_subject_average() {
        let (app, _dir) = test_app();
        for (name, grades) in [("A", json!([90])), ("B", json!([90])), ("C", json!([80]))] {
            call(
                &app,
                Method::POST,
                "/grades",
                Some(json!({"name": name, "subject": "Math", "grades": grades})),
            )
            .await;
        }

        let (status, body) = call(&app, Method::GET, "/rankings", None).await;
        assert_eq!(status, StatusCode::OK);
        let ranks: Vec<i64> = body["rankings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["rank"].as_i64().unwrap())
            .collect();
        assert_eq!(ranks, vec![1, 1, 3]);

        let (status, body) = call(&app, Method::GET, "/subjects/math/average", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["average"], json!(86.67));
        assert_eq!(body["letter"], json!("A"));

        let (status, body) = call(&app, Method::GET, "/reports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reports"].as_array().unwrap().len(), 3);

        let (status, body) = call(&app, Method::GET, "/search?q=b", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["matches"], json!(["B"]));
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (app, _dir) = test_app();

        let (status, body) = call(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], json!("OK"));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
