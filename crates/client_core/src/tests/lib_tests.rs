use super::*;
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode as AxumStatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{Modality, ProjectSortMode, ProjectStatus};
use storage::SessionStore;
use tokio::{net::TcpListener, sync::Mutex};

const TEST_TOKEN: &str = "token-123";

#[derive(Default)]
struct ServerSeen {
    hits: Mutex<usize>,
    list_queries: Mutex<Vec<HashMap<String, String>>>,
    auth_headers: Mutex<Vec<Option<String>>>,
}

type ApiState = Arc<ServerSeen>;

fn envelope(code: u16, message: &str, data: Value) -> Value {
    json!({ "code": code, "message": message, "data": data })
}

fn sample_user_json() -> Value {
    json!({
        "id": 1,
        "username": "alice",
        "display_name": "Alice",
        "email": "alice@example.com",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    })
}

fn sample_project_json(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("project-{id}"),
        "modality": "2D",
        "status": "active",
        "description": "",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    })
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn record_hit(state: &ApiState, headers: &HeaderMap) {
    *state.hits.lock().await += 1;
    state.auth_headers.lock().await.push(bearer(headers));
}

async fn handle_login(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    if body["username"] == "alice" && body["password"] == "password-1" {
        (
            AxumStatusCode::OK,
            Json(envelope(
                200,
                "",
                json!({ "token": TEST_TOKEN, "user": sample_user_json() }),
            )),
        )
    } else {
        (
            AxumStatusCode::UNAUTHORIZED,
            Json(envelope(401, "Invalid username or password.", json!({}))),
        )
    }
}

async fn handle_logout(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    (AxumStatusCode::OK, Json(envelope(200, "", json!({}))))
}

async fn handle_me(State(state): State<ApiState>, headers: HeaderMap) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    if bearer(&headers).as_deref() == Some(format!("Bearer {TEST_TOKEN}").as_str()) {
        (
            AxumStatusCode::OK,
            Json(envelope(200, "", sample_user_json())),
        )
    } else {
        (
            AxumStatusCode::UNAUTHORIZED,
            Json(envelope(401, "Invalid Bearer Token", json!({}))),
        )
    }
}

/// Serves a fixed 13-project listing, sliced by offset/limit.
async fn handle_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    state.list_queries.lock().await.push(params.clone());

    let offset: u64 = params
        .get("offset")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);
    let limit: u64 = params
        .get("limit")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(20);

    let total: u64 = 13;
    let end = (offset + limit).min(total);
    let results: Vec<Value> = (offset..end)
        .map(|index| sample_project_json(index as i64 + 1))
        .collect();

    (
        AxumStatusCode::OK,
        Json(envelope(
            200,
            "",
            json!({ "limit": limit, "offset": offset, "total": total, "results": results }),
        )),
    )
}

async fn handle_create_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    if body["name"] == "duplicate" {
        (
            AxumStatusCode::BAD_REQUEST,
            Json(envelope(400, "Project already exists.", json!({}))),
        )
    } else {
        // The reference server returns an empty data object on creation.
        (AxumStatusCode::CREATED, Json(envelope(201, "", json!({}))))
    }
}

async fn handle_create_dataset(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    if body["project_id"] == 404 {
        (
            AxumStatusCode::NOT_FOUND,
            Json(envelope(404, "Project not found.", json!({}))),
        )
    } else {
        // Creation answers with an empty data object, like project creation.
        (AxumStatusCode::CREATED, Json(envelope(201, "", json!({}))))
    }
}

async fn handle_get_project(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    record_hit(&state, &headers).await;
    match id {
        // Simulates a crash that produces no envelope at all.
        500 => (AxumStatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response(),
        1 => (
            AxumStatusCode::OK,
            Json(envelope(200, "", sample_project_json(1))),
        )
            .into_response(),
        _ => (
            AxumStatusCode::NOT_FOUND,
            Json(envelope(404, "Project not found.", json!({}))),
        )
            .into_response(),
    }
}

async fn spawn_api_server() -> (String, ApiState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let state: ApiState = Arc::new(ServerSeen::default());
    let app = Router::new()
        .route("/v1/auth/login", post(handle_login))
        .route("/v1/auth/logout", post(handle_logout))
        .route("/v1/users/me", get(handle_me))
        .route("/v1/projects/list", get(handle_list))
        .route("/v1/projects/create", post(handle_create_project))
        .route("/v1/projects/:id", get(handle_get_project))
        .route("/v1/datasets/create", post(handle_create_dataset))
        .with_state(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

async fn fresh_client(server_url: &str) -> (AnnotateClient, SessionStore) {
    let persistence = SessionStore::new("sqlite::memory:").await.expect("store");
    let auth = Arc::new(
        AuthSession::restore(persistence.clone())
            .await
            .expect("restore"),
    );
    let client = AnnotateClient::new(server_url, auth).expect("client");
    (client, persistence)
}

#[tokio::test]
async fn validation_failures_issue_no_request() {
    let (server_url, state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client.login("ab", "password-1").await.expect_err("short username");
    assert!(matches!(err, ClientError::Validation { field: "username", .. }));

    let err = client.login("alice", "short").await.expect_err("short password");
    assert!(matches!(err, ClientError::Validation { field: "password", .. }));

    let err = client
        .create_project(&CreateProjectRequest {
            name: "ab".to_string(),
            modality: Modality::TwoD,
            description: String::new(),
        })
        .await
        .expect_err("short project name");
    assert!(matches!(err, ClientError::Validation { field: "name", .. }));

    assert_eq!(*state.hits.lock().await, 0);
}

#[tokio::test]
async fn login_persists_token_and_signs_later_requests() {
    let (server_url, state) = spawn_api_server().await;
    let (client, persistence) = fresh_client(&server_url).await;

    let user = client.login("alice", "password-1").await.expect("login");
    assert_eq!(user.username, "alice");
    assert_eq!(
        persistence.load_token().await.expect("load"),
        Some(TEST_TOKEN.to_string())
    );

    let me = client.current_user().await.expect("me");
    assert_eq!(me.username, "alice");

    let headers = state.auth_headers.lock().await;
    assert_eq!(
        headers.last().expect("header").as_deref(),
        Some(format!("Bearer {TEST_TOKEN}").as_str())
    );
}

#[tokio::test]
async fn restored_session_reuses_persisted_token() {
    let (server_url, _state) = spawn_api_server().await;
    let persistence = SessionStore::new("sqlite::memory:").await.expect("store");
    persistence.store_token(TEST_TOKEN).await.expect("seed");

    let auth = Arc::new(AuthSession::restore(persistence).await.expect("restore"));
    let client = AnnotateClient::new(&server_url, auth).expect("client");

    let me = client.current_user().await.expect("me");
    assert_eq!(me.username, "alice");
}

#[tokio::test]
async fn missing_session_maps_to_not_logged_in() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client.current_user().await.expect_err("no token");
    assert!(matches!(err, ClientError::NotLoggedIn));
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn rejected_login_maps_to_not_logged_in() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, persistence) = fresh_client(&server_url).await;

    let err = client
        .login("alice", "wrong-password")
        .await
        .expect_err("bad credentials");
    assert!(matches!(err, ClientError::NotLoggedIn));
    assert_eq!(persistence.load_token().await.expect("load"), None);
}

#[tokio::test]
async fn api_error_carries_server_message() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client
        .create_project(&CreateProjectRequest {
            name: "duplicate".to_string(),
            modality: Modality::Text,
            description: "already there".to_string(),
        })
        .await
        .expect_err("duplicate");
    match err {
        ClientError::Api { code, message } => {
            assert_eq!(code, ErrorCode::Validation);
            assert_eq!(message, "Project already exists.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn fallback_message_when_server_gives_none() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client
        .get_project(ProjectId(500))
        .await
        .expect_err("server crash");
    match err {
        ClientError::Api { code, message } => {
            assert_eq!(code, ErrorCode::Internal);
            assert_eq!(message, GENERIC_FAILURE_MESSAGE);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn create_project_accepts_empty_data_object() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    client
        .create_project(&CreateProjectRequest {
            name: "fresh project".to_string(),
            modality: Modality::Audio,
            description: String::new(),
        })
        .await
        .expect("create");
}

#[tokio::test]
async fn create_dataset_validates_before_requesting() {
    let (server_url, state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client
        .create_dataset(&CreateDatasetRequest {
            project_id: ProjectId(1),
            name: "  ".to_string(),
            description: String::new(),
            format_version: "v1".to_string(),
        })
        .await
        .expect_err("blank dataset name");
    assert!(matches!(err, ClientError::Validation { field: "name", .. }));

    let err = client
        .create_dataset(&CreateDatasetRequest {
            project_id: ProjectId(1),
            name: "train split".to_string(),
            description: String::new(),
            format_version: String::new(),
        })
        .await
        .expect_err("blank format version");
    assert!(matches!(
        err,
        ClientError::Validation { field: "format_version", .. }
    ));

    assert_eq!(*state.hits.lock().await, 0);
}

#[tokio::test]
async fn create_dataset_accepts_empty_data_object() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    client
        .create_dataset(&CreateDatasetRequest {
            project_id: ProjectId(1),
            name: "train split".to_string(),
            description: "initial import".to_string(),
            format_version: "v1".to_string(),
        })
        .await
        .expect("create dataset");
}

#[tokio::test]
async fn create_dataset_surfaces_missing_project() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let err = client
        .create_dataset(&CreateDatasetRequest {
            project_id: ProjectId(404),
            name: "train split".to_string(),
            description: String::new(),
            format_version: "v1".to_string(),
        })
        .await
        .expect_err("unknown project");
    match err {
        ClientError::Api { code, message } => {
            assert_eq!(code, ErrorCode::NotFound);
            assert_eq!(message, "Project not found.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn get_project_parses_domain_types() {
    let (server_url, _state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let project = client.get_project(ProjectId(1)).await.expect("get");
    assert_eq!(project.id, ProjectId(1));
    assert_eq!(project.modality, Modality::TwoD);
    assert_eq!(project.status, ProjectStatus::Active);
}

#[tokio::test]
async fn logout_clears_session_even_when_endpoint_fails() {
    // Point at a closed port: the logout POST cannot succeed, the local
    // session must still be cleared.
    let (client, persistence) = fresh_client("http://127.0.0.1:9").await;
    persistence.store_token(TEST_TOKEN).await.expect("seed");
    client.auth().log_in(TEST_TOKEN.to_string()).await.expect("seed");

    client.logout().await.expect("logout");
    assert_eq!(persistence.load_token().await.expect("load"), None);
    assert!(!client.auth().is_authenticated().await);
}

#[tokio::test]
async fn feed_paginates_the_listing_end_to_end() {
    let (server_url, state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let store = Arc::new(ProjectStore::new());
    let feed = ProjectFeed::new(Arc::new(client), Arc::clone(&store));

    loop {
        match feed.request_more().await.expect("page") {
            FeedProgress::Appended { .. } => continue,
            FeedProgress::Exhausted => break,
            other => panic!("unexpected progress: {other:?}"),
        }
    }

    assert_eq!(store.len().await, 13);
    assert!(feed.is_exhausted().await);

    let queries = state.list_queries.lock().await;
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0]["offset"], "0");
    assert_eq!(queries[0]["order"], "desc");
    assert_eq!(queries[0]["order_by"], "created_at");
    assert_eq!(queries[1]["offset"], "10");
    assert_eq!(queries[2]["offset"], "13");
}

#[tokio::test]
async fn feed_switches_sort_parameters_end_to_end() {
    let (server_url, state) = spawn_api_server().await;
    let (client, _persistence) = fresh_client(&server_url).await;

    let store = Arc::new(ProjectStore::new());
    let feed = ProjectFeed::new(Arc::new(client), Arc::clone(&store));

    feed.request_more().await.expect("first page");
    feed.change_sort_mode(ProjectSortMode::NameAsc).await;
    feed.request_more().await.expect("restarted page");

    let queries = state.list_queries.lock().await;
    let last = queries.last().expect("query");
    assert_eq!(last["offset"], "0");
    assert_eq!(last["order"], "asc");
    assert_eq!(last["order_by"], "name");
}
