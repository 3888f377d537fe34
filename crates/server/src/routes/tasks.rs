use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{Task, TaskPatch, TaskWithCreator, ROLE_TEACHER},
    error::AppError,
    extract::AuthUser,
    state::AppState,
    validate::validate,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
    pub completed: Option<bool>,
}

/// The task creator's display fields attached to API responses.
#[derive(Debug, Serialize)]
pub struct TaskCreator {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub created_by: TaskCreator,
}

impl From<TaskWithCreator> for TaskView {
    fn from(t: TaskWithCreator) -> Self {
        Self {
            id: t.id,
            classroom_id: t.classroom_id,
            name: t.name,
            description: t.description,
            subject: t.subject,
            date_assigned: t.date_assigned,
            due_date: t.due_date,
            completed: t.completed,
            created_by: TaskCreator {
                id: t.created_by,
                name: t.creator_name,
                nickname: t.creator_nickname,
                email: t.creator_email,
            },
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Vec<TaskView>>, AppError> {
    let tasks = state.db.tasks_for_classroom(&code).await?;
    Ok(Json(tasks.into_iter().map(TaskView::from).collect()))
}

/// Any authenticated caller may create a task under any classroom code;
/// membership is not checked.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<TaskView>, AppError> {
    validate(&req)?;

    let task = Task {
        id: Uuid::new_v4().to_string(),
        classroom_id: code,
        name: req.name,
        description: req.description,
        subject: req.subject,
        date_assigned: req.date_assigned,
        due_date: req.due_date,
        completed: false,
        created_by: auth.user_id,
    };
    state.db.create_task(&task).await?;

    let created = state
        .db
        .get_task_with_creator(&task.id)
        .await?
        .ok_or_else(|| AppError::Internal("Task vanished after insert".to_string()))?;
    Ok(Json(created.into()))
}

/// Arbitrary field patch, including the completion flag. No ownership
/// check; only delete is restricted.
pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskView>, AppError> {
    validate(&req)?;

    let patch = TaskPatch {
        name: req.name,
        description: req.description,
        subject: req.subject,
        date_assigned: req.date_assigned,
        due_date: req.due_date,
        completed: req.completed,
    };
    let rows = state.db.update_task(&id, &patch).await?;
    if rows == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    let updated = state
        .db
        .get_task_with_creator(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;
    Ok(Json(updated.into()))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let task = state
        .db
        .get_task(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

    // Only the creator or a teacher-role caller may delete
    if task.created_by != auth.user_id && auth.role != ROLE_TEACHER {
        return Err(AppError::Forbidden(
            "Not authorized to delete this task".to_string(),
        ));
    }

    state.db.delete_task(&id).await?;
    Ok(Json(json!({ "success": true })))
}
