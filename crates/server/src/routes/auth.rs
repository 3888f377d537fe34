use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{User, DEFAULT_AVATAR, ROLE_ADMIN, ROLE_STUDENT},
    error::AppError,
    extract::AuthUser,
    state::AppState,
    validate::{validate, validate_role},
};

/// Registrations with this email are promoted to admin regardless of the
/// requested role.
const ADMIN_EMAIL: &str = "aiwaris9484@gmail.com";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "Nickname must be at least 2 characters"))]
    pub nickname: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(custom(function = validate_role))]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "Nickname must be at least 2 characters"))]
    pub nickname: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateEmailRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// A user as exposed over the API -- everything except the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub email: String,
    pub role: String,
    pub avatar: String,
    pub created_at: Option<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            nickname: user.nickname,
            email: user.email,
            role: user.role,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validate(&req)?;

    // Check if user already exists
    if state.db.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::BadRequest(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;

    // The requested role wins, except for the hardcoded admin account
    let role = if req.email == ADMIN_EMAIL {
        ROLE_ADMIN.to_string()
    } else {
        req.role.unwrap_or_else(|| ROLE_STUDENT.to_string())
    };

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        nickname: req.nickname,
        email: req.email,
        password_hash,
        role,
        avatar: DEFAULT_AVATAR.to_string(),
        created_at: None,
    };
    state.db.create_user(&user).await?;

    let token = generate_token(&user, &state.config.auth)?;
    tracing::info!("Registered user {} ({})", user.email, user.role);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate(&req)?;

    // The same error for an unknown email and a wrong password
    let user = state
        .db
        .get_user_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".to_string()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::BadRequest(
            "Invalid email or password".to_string(),
        ));
    }

    let token = generate_token(&user, &state.config.auth)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let user = state
        .db
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserView>, AppError> {
    validate(&req)?;

    state
        .db
        .update_user_profile(&auth.user_id, &req.name, &req.nickname, req.avatar.as_deref())
        .await?;

    let user = state
        .db
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

pub async fn update_email(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateEmailRequest>,
) -> Result<Json<UserView>, AppError> {
    validate(&req)?;

    // Reject emails held by a different account
    if let Some(existing) = state.db.get_user_by_email(&req.email).await? {
        if existing.id != auth.user_id {
            return Err(AppError::BadRequest("Email already in use".to_string()));
        }
    }

    state.db.update_user_email(&auth.user_id, &req.email).await?;

    let user = state
        .db
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    validate(&req)?;

    let user = state
        .db
        .get_user_by_id(&auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .db
        .update_user_password(&auth.user_id, &password_hash)
        .await?;

    Ok(Json(json!({ "success": true })))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .to_string())
}

/// True if the password matches the stored hash. Only a malformed stored
/// hash is an error; a mismatch is a normal `false`.
fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(stored_hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_token(
    user: &User,
    auth_config: &crate::config::AuthConfig,
) -> Result<String, AppError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::ROLE_TEACHER;
    use crate::state::test_state;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            token_expiry_hours: 24,
        }
    }

    fn test_user(email: &str, role: &str) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            name: "Maya Santos".to_string(),
            nickname: "maya".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
            created_at: None,
        }
    }

    fn register_request(email: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: "Maya Santos".to_string(),
            nickname: "maya".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
            role: role.map(|r| r.to_string()),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let config = test_auth_config();
        let user = test_user("maya@example.com", ROLE_TEACHER);
        let token = generate_token(&user, &config).expect("token generation should succeed");

        let claims =
            verify_token(&token, &config.jwt_secret).expect("token validation should succeed");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "maya@example.com");
        assert_eq!(claims.role, ROLE_TEACHER);
    }

    #[test]
    fn test_token_wrong_secret_fails() {
        let config = test_auth_config();
        let user = test_user("maya@example.com", ROLE_STUDENT);
        let token = generate_token(&user, &config).expect("token generation should succeed");

        assert!(verify_token(&token, "some-other-secret").is_err());
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_auth_config();

        // Encode an already-expired claim set, past the default leeway.
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "u1".to_string(),
            email: "maya@example.com".to_string(),
            role: ROLE_STUDENT.to_string(),
            exp: (now - 300) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .expect("encoding should succeed");

        assert!(verify_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register_request("maya@example.com", None).validate().is_ok());
        assert!(register_request("maya@example.com", Some("teacher"))
            .validate()
            .is_ok());

        let mut bad_email = register_request("not-an-email", None);
        assert!(bad_email.validate().is_err());
        bad_email.email = "maya@example.com".to_string();
        bad_email.password = "short".to_string();
        assert!(bad_email.validate().is_err());

        // Only student/teacher may be requested
        assert!(register_request("maya@example.com", Some("admin"))
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_register_then_duplicate_fails() {
        let state = test_state().await;

        let (status, Json(response)) = register(
            State(state.clone()),
            Json(register_request("maya@example.com", None)),
        )
        .await
        .expect("first registration should succeed");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.user.role, ROLE_STUDENT);

        // Token decodes back to the stored identity
        let claims = verify_token(&response.token, &state.config.auth.jwt_secret).unwrap();
        assert_eq!(claims.email, "maya@example.com");
        assert_eq!(claims.role, ROLE_STUDENT);

        let result = register(
            State(state),
            Json(register_request("maya@example.com", Some("teacher"))),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_admin_email_is_promoted() {
        let state = test_state().await;
        let (_, Json(response)) = register(
            State(state),
            Json(register_request(ADMIN_EMAIL, Some("student"))),
        )
        .await
        .unwrap();
        assert_eq!(response.user.role, ROLE_ADMIN);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("maya@example.com", None)),
        )
        .await
        .unwrap();

        let wrong_password = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "maya@example.com".to_string(),
                password: "wrong-password".to_string(),
            }),
        )
        .await;
        assert!(matches!(wrong_password, Err(AppError::BadRequest(_))));

        let unknown_email = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await;
        // Indistinguishable from a wrong password
        assert!(matches!(unknown_email, Err(AppError::BadRequest(_))));

        let ok = login(
            State(state),
            Json(LoginRequest {
                email: "maya@example.com".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_update_password_requires_current() {
        let state = test_state().await;
        let (_, Json(response)) = register(
            State(state.clone()),
            Json(register_request("maya@example.com", None)),
        )
        .await
        .unwrap();
        let auth = AuthUser {
            user_id: response.user.id.clone(),
            email: response.user.email.clone(),
            role: response.user.role.clone(),
        };

        let wrong = update_password(
            State(state.clone()),
            auth.clone(),
            Json(UpdatePasswordRequest {
                current_password: "not-it".to_string(),
                new_password: "new-password".to_string(),
            }),
        )
        .await;
        assert!(matches!(wrong, Err(AppError::BadRequest(_))));

        update_password(
            State(state.clone()),
            auth,
            Json(UpdatePasswordRequest {
                current_password: "hunter22".to_string(),
                new_password: "new-password".to_string(),
            }),
        )
        .await
        .expect("password change should succeed");

        // Old password no longer works, new one does
        let old = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "maya@example.com".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await;
        assert!(old.is_err());
        let new = login(
            State(state),
            Json(LoginRequest {
                email: "maya@example.com".to_string(),
                password: "new-password".to_string(),
            }),
        )
        .await;
        assert!(new.is_ok());
    }

    #[tokio::test]
    async fn test_update_email_rejects_taken_address() {
        let state = test_state().await;
        register(
            State(state.clone()),
            Json(register_request("maya@example.com", None)),
        )
        .await
        .unwrap();
        let (_, Json(other)) = register(
            State(state.clone()),
            Json(register_request("omar@example.com", None)),
        )
        .await
        .unwrap();
        let auth = AuthUser {
            user_id: other.user.id.clone(),
            email: other.user.email.clone(),
            role: other.user.role.clone(),
        };

        let taken = update_email(
            State(state.clone()),
            auth.clone(),
            Json(UpdateEmailRequest {
                email: "maya@example.com".to_string(),
            }),
        )
        .await;
        assert!(matches!(taken, Err(AppError::BadRequest(_))));

        // Re-submitting your own address is fine
        let own = update_email(
            State(state),
            auth,
            Json(UpdateEmailRequest {
                email: "omar@example.com".to_string(),
            }),
        )
        .await;
        assert!(own.is_ok());
    }
}
