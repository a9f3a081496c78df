use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::middleware::correlation_id;
use crate::state::AppState;

/// GET /
pub async fn root_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "message": format!("Hello World! Welcome to {}", state.settings.app.name),
        "correlation_id": correlation_id(&headers),
    }))
}
