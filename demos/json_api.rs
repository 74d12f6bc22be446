//! Minimal JSON front end over [`MastodonClient`].
//!
//! ```bash
//! MASTODON_ACCESS_TOKEN=... cargo run --example json_api --features tracing
//! curl -X POST localhost:3000/create -H 'content-type: application/json' -d '{"status":"hi"}'
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use mastodon_status_http::{ErrorKind, MastodonClient, MastodonError};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

type ApiResponse = (StatusCode, Json<Value>);

fn failure(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (
        status,
        Json(json!({"success": false, "error": message.into()})),
    )
}

fn error_response(err: MastodonError, invalid_input_status: StatusCode) -> ApiResponse {
    let status = match err.kind() {
        ErrorKind::InvalidInput => invalid_input_status,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Api => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, err.to_string())
}

async fn create_post(
    State(client): State<Arc<MastodonClient>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResponse {
    let Ok(Json(payload)) = payload else {
        return failure(StatusCode::BAD_REQUEST, "Request must be JSON");
    };
    let Some(status) = payload.get("status") else {
        return failure(StatusCode::BAD_REQUEST, "Missing status field");
    };
    let Some(text) = status.as_str() else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Status text cannot be empty and must be a string",
        );
    };

    match client.create(text).await {
        Ok(post) => (
            StatusCode::OK,
            Json(json!({"success": true, "post_id": post.id})),
        ),
        Err(err) => error_response(err, StatusCode::BAD_REQUEST),
    }
}

async fn retrieve_post(
    State(client): State<Arc<MastodonClient>>,
    Path(post_id): Path<String>,
) -> ApiResponse {
    match client.retrieve(&post_id).await {
        Ok(post) => (StatusCode::OK, Json(json!({"success": true, "post": post}))),
        Err(err) => error_response(err, StatusCode::NOT_FOUND),
    }
}

async fn delete_post(
    State(client): State<Arc<MastodonClient>>,
    Path(post_id): Path<String>,
) -> ApiResponse {
    match client.delete(&post_id).await {
        Ok(_) => (StatusCode::OK, Json(json!({"success": true}))),
        Err(err) => error_response(err, StatusCode::NOT_FOUND),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let client = Arc::new(MastodonClient::from_env().map_err(anyhow::Error::msg)?);

    let app = Router::new()
        .route("/create", post(create_post))
        .route("/retrieve/:post_id", get(retrieve_post))
        .route("/delete/:post_id", delete(delete_post))
        .with_state(client);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
