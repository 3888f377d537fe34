use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::routes::auth::verify_token;
use crate::state::AppState;

/// Identity decoded from a `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication; requests
/// without a usable token are rejected before the handler body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Access token required".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::AuthError("Access token required".to_string()))?;

        let claims = verify_token(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::Forbidden("Invalid token".to_string()))?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}
