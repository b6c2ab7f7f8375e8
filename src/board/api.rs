use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use taskboard_common::{CardMove, CardPatch, ColumnMove, ColumnPatch, NewBoard, NewCard, NewColumn};
use tracing::warn;

use super::service::BoardService;
use crate::errors::{BoardError, ErrorKind};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub service: BoardService,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound(err.to_string()),
            ErrorKind::IllegalArgument => ApiError::BadRequest(err.to_string()),
            ErrorKind::TransientStoreFailure => {
                warn!(error = ?err, "store failure");
                ApiError::Unavailable(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{board_id}", get(get_board))
        .route("/api/boards/{board_id}/repair", post(repair_board))
        .route("/api/boards/{board_id}/lists", post(create_column))
        .route(
            "/api/boards/{board_id}/lists/{column_id}",
            patch(edit_column).put(move_column).delete(delete_column),
        )
        .route("/api/boards/{board_id}/cards", post(create_card))
        .route(
            "/api/boards/{board_id}/cards/{task_id}",
            patch(edit_card).put(move_card).delete(delete_card),
        )
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_boards().await?))
}

async fn create_board(
    State(state): State<SharedState>,
    Json(req): Json<NewBoard>,
) -> Result<impl IntoResponse, ApiError> {
    let board = state.service.create_board(req).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(state): State<SharedState>,
    Path(board_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.get_board_contents(&board_id).await?))
}

async fn repair_board(
    State(state): State<SharedState>,
    Path(board_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.service.repair_board(&board_id).await?;
    Ok(Json(report))
}

async fn create_column(
    State(state): State<SharedState>,
    Path(board_id): Path<String>,
    Json(req): Json<NewColumn>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state.service.create_column(&board_id, req).await?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn edit_column(
    State(state): State<SharedState>,
    Path((board_id, column_id)): Path<(String, String)>,
    Json(req): Json<ColumnPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let column = state.service.edit_column(&board_id, &column_id, req).await?;
    Ok(Json(column))
}

async fn move_column(
    State(state): State<SharedState>,
    Path((board_id, column_id)): Path<(String, String)>,
    Json(req): Json<ColumnMove>,
) -> Result<impl IntoResponse, ApiError> {
    let columns = state
        .service
        .move_column(&board_id, &column_id, req)
        .await?;
    Ok(Json(columns))
}

async fn delete_column(
    State(state): State<SharedState>,
    Path((board_id, column_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let removal = state.service.delete_column(&board_id, &column_id).await?;
    Ok(Json(removal))
}

async fn create_card(
    State(state): State<SharedState>,
    Path(board_id): Path<String>,
    Json(req): Json<NewCard>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state.service.create_card(&board_id, req).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn edit_card(
    State(state): State<SharedState>,
    Path((board_id, task_id)): Path<(String, String)>,
    Json(req): Json<CardPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state.service.edit_card(&board_id, &task_id, req).await?;
    Ok(Json(card))
}

async fn move_card(
    State(state): State<SharedState>,
    Path((board_id, task_id)): Path<(String, String)>,
    Json(req): Json<CardMove>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state.service.move_card(&board_id, &task_id, req).await?;
    Ok(Json(card))
}

async fn delete_card(
    State(state): State<SharedState>,
    Path((board_id, task_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.service.delete_card(&board_id, &task_id).await? {
        return Err(ApiError::NotFound(format!(
            "Card {} not found on board {}",
            task_id, board_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::db::{BoardDb, DbHandle};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use taskboard_common::ReorderPolicy;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let db = DbHandle::new(BoardDb::new_in_memory().unwrap());
        Arc::new(AppState {
            service: BoardService::new(Arc::new(db), ReorderPolicy::Swap),
        })
    }

    fn test_app() -> Router {
        api_router().with_state(test_state())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    /// Board "b1" with columns A and B.
    async fn seeded_app() -> Router {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/boards",
                serde_json::json!({"id": "b1", "title": "Sprint"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        for column in ["A", "B"] {
            let resp = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/boards/b1/lists",
                    serde_json::json!({"column_id": column, "title": column}),
                ))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        app
    }

    async fn add_card(app: &Router, column: &str, task: &str) -> serde_json::Value {
        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/boards/b1/cards",
                serde_json::json!({"column_id": column, "task_id": task, "title": task}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp.into_body()).await
    }

    async fn contents(app: &Router) -> serde_json::Value {
        let resp = app
            .clone()
            .oneshot(empty_request("GET", "/api/boards/b1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp.into_body()).await
    }

    fn card_rows(contents: &serde_json::Value) -> Vec<(String, String, i64)> {
        contents["cards"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| {
                (
                    c["task_id"].as_str().unwrap().to_string(),
                    c["column_id"].as_str().unwrap().to_string(),
                    c["position"].as_i64().unwrap(),
                )
            })
            .collect()
    }

    fn row(task: &str, column: &str, position: i64) -> (String, String, i64) {
        (task.into(), column.into(), position)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_boards_empty() {
        let app = test_app();
        let response = app.oneshot(empty_request("GET", "/api/boards")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let boards: Vec<serde_json::Value> = body_json(response.into_body()).await;
        assert!(boards.is_empty());
    }

    #[tokio::test]
    async fn test_create_board_generates_id() {
        let app = test_app();
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/boards",
                serde_json::json!({"title": "Roadmap"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let board: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(board["title"], "Roadmap");
        assert!(!board["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_board_is_404() {
        let app = test_app();
        let response = app
            .oneshot(empty_request("GET", "/api/boards/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_create_cards_append() {
        let app = seeded_app().await;
        for (i, id) in ["a0", "a1", "a2"].iter().enumerate() {
            let card = add_card(&app, "A", id).await;
            assert_eq!(card["position"], i as i64);
        }
    }

    #[tokio::test]
    async fn test_move_card_swap_within_column() {
        let app = seeded_app().await;
        for id in ["a0", "a1", "a2"] {
            add_card(&app, "A", id).await;
        }
        let resp = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/cards/a0",
                serde_json::json!({"column_id": "A", "position": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            card_rows(&contents(&app).await),
            vec![row("a2", "A", 0), row("a1", "A", 1), row("a0", "A", 2)]
        );
    }

    #[tokio::test]
    async fn test_move_card_across_columns() {
        let app = seeded_app().await;
        add_card(&app, "A", "a0").await;
        add_card(&app, "A", "a1").await;
        add_card(&app, "B", "b0").await;
        let resp = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/cards/a1",
                serde_json::json!({"column_id": "B", "position": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let card: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(card["column_id"], "B");
        assert_eq!(
            card_rows(&contents(&app).await),
            vec![row("a0", "A", 0), row("a1", "B", 0), row("b0", "B", 1)]
        );
    }

    #[tokio::test]
    async fn test_move_card_error_statuses() {
        let app = seeded_app().await;
        add_card(&app, "A", "a0").await;

        let missing = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/cards/ghost",
                serde_json::json!({"column_id": "A", "position": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad_column = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/cards/a0",
                serde_json::json!({"column_id": "Z", "position": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(bad_column.status(), StatusCode::BAD_REQUEST);

        let negative = app
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/cards/a0",
                serde_json::json!({"column_id": "A", "position": -2}),
            ))
            .await
            .unwrap();
        assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_card() {
        let app = seeded_app().await;
        add_card(&app, "A", "a0").await;
        let resp = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/boards/b1/cards/a0",
                serde_json::json!({"title": "Test", "label": "urgent"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let card: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(card["title"], "Test");
        assert_eq!(card["label"], "urgent");
        assert!(card["description"].is_null());
        assert_eq!(card["position"], 0);
    }

    #[tokio::test]
    async fn test_delete_card_compacts_and_404s_twice() {
        let app = seeded_app().await;
        for id in ["a0", "a1", "a2"] {
            add_card(&app, "A", id).await;
        }
        let resp = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/boards/b1/cards/a0"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            card_rows(&contents(&app).await),
            vec![row("a1", "A", 0), row("a2", "A", 1)]
        );

        let again = app
            .oneshot(empty_request("DELETE", "/api/boards/b1/cards/a0"))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_column_routes() {
        let app = seeded_app().await;
        add_card(&app, "A", "a0").await;

        let renamed = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/boards/b1/lists/B",
                serde_json::json!({"title": "Done"}),
            ))
            .await
            .unwrap();
        assert_eq!(renamed.status(), StatusCode::OK);

        let moved = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/boards/b1/lists/B",
                serde_json::json!({"position": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(moved.status(), StatusCode::OK);
        let order: Vec<serde_json::Value> = body_json(moved.into_body()).await;
        assert_eq!(order[0]["column_id"], "B");
        assert_eq!(order[0]["title"], "Done");

        let deleted = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/boards/b1/lists/A"))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        let removal: serde_json::Value = body_json(deleted.into_body()).await;
        assert_eq!(removal["removed_card_count"], 1);

        let board = contents(&app).await;
        assert_eq!(board["columns"].as_array().unwrap().len(), 1);
        assert_eq!(board["columns"][0]["position"], 0);
        assert!(board["cards"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repair_route_on_clean_board() {
        let app = seeded_app().await;
        let resp = app
            .oneshot(empty_request("POST", "/api/boards/b1/repair"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report: serde_json::Value = body_json(resp.into_body()).await;
        assert_eq!(report["cards_repositioned"], 0);
    }
}
