use axum::{extract::State, Json};
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Entity totals for the admin dashboard. Served without authentication,
/// matching the observed surface.
pub async fn analytics(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let counts = state.db.counts().await?;
    Ok(Json(json!({
        "users": counts.users,
        "classrooms": counts.classrooms,
        "tasks": counts.tasks,
        "messages": counts.messages,
    })))
}
