use axum::{
    extract::{Path, State},
    Json,
};
use shared::ChatMessage;

use crate::{error::AppError, extract::AuthUser, state::AppState};

/// Full chat history for a classroom code, oldest first. The same payload
/// shape the socket broadcasts, so clients can merge the two.
pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.db.messages_for_classroom(&code).await?;
    Ok(Json(messages.into_iter().map(ChatMessage::from).collect()))
}
