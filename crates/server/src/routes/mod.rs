use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod admin;
pub mod auth;
mod classrooms;
mod health;
mod messages;
mod tasks;
mod ws;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/auth/profile",
            get(auth::profile).put(auth::update_profile),
        )
        .route("/api/auth/email", put(auth::update_email))
        .route("/api/auth/password", put(auth::update_password))
        // Classroom routes
        .route(
            "/api/classrooms",
            post(classrooms::create).get(classrooms::list),
        )
        .route("/api/classrooms/join", post(classrooms::join))
        .route("/api/classrooms/:code/leave", post(classrooms::leave))
        .route(
            "/api/classrooms/:code",
            get(classrooms::get_by_code).delete(classrooms::delete),
        )
        .route("/api/classrooms/:code/members", get(classrooms::members))
        // Task routes
        .route(
            "/api/classrooms/:code/tasks",
            get(tasks::list).post(tasks::create),
        )
        .route("/api/tasks/:id", put(tasks::update).delete(tasks::delete))
        // Message log
        .route("/api/classrooms/:code/messages", get(messages::list))
        // Admin analytics
        .route("/api/admin/analytics", get(admin::analytics))
        // Real-time chat
        .route("/ws", get(ws::ws_handler))
        .fallback(not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Route not found" })))
}
