use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::Classroom,
    error::AppError,
    extract::AuthUser,
    routes::auth::UserView,
    state::AppState,
    validate::validate,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassroomRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinClassroomRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// A classroom as exposed over the API, with its member id set attached.
/// The password rides along in clear text, exactly as stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomView {
    pub id: String,
    pub code: String,
    pub name: String,
    pub password: String,
    pub created_by: String,
    pub members: Vec<String>,
    pub created_at: Option<String>,
}

async fn view(state: &AppState, classroom: Classroom) -> Result<ClassroomView, AppError> {
    let members = state.db.member_ids(&classroom.id).await?;
    Ok(ClassroomView {
        id: classroom.id,
        code: classroom.code,
        name: classroom.name,
        password: classroom.password,
        created_by: classroom.created_by,
        members,
        created_at: classroom.created_at,
    })
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateClassroomRequest>,
) -> Result<Json<ClassroomView>, AppError> {
    validate(&req)?;

    if state.db.get_classroom_by_code(&req.code).await?.is_some() {
        return Err(AppError::BadRequest(
            "Classroom code already exists".to_string(),
        ));
    }

    let classroom = Classroom {
        id: Uuid::new_v4().to_string(),
        code: req.code,
        name: req.name,
        password: req.password,
        created_by: auth.user_id,
        created_at: None,
    };
    state.db.create_classroom(&classroom).await?;
    tracing::info!("Classroom {} created by {}", classroom.code, classroom.created_by);

    Ok(Json(view(&state, classroom).await?))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ClassroomView>>, AppError> {
    let classrooms = state.db.classrooms_for_user(&auth.user_id).await?;
    let mut views = Vec::with_capacity(classrooms.len());
    for classroom in classrooms {
        views.push(view(&state, classroom).await?);
    }
    Ok(Json(views))
}

pub async fn join(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<JoinClassroomRequest>,
) -> Result<Json<ClassroomView>, AppError> {
    validate(&req)?;

    let classroom = state
        .db
        .get_classroom_by_code(&req.code)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

    // Plaintext comparison, as stored
    if classroom.password != req.password {
        return Err(AppError::BadRequest("Incorrect password".to_string()));
    }

    if state.db.is_member(&classroom.id, &auth.user_id).await? {
        return Err(AppError::BadRequest(
            "Already a member of this classroom".to_string(),
        ));
    }

    state.db.add_member(&classroom.id, &auth.user_id).await?;
    tracing::info!("User {} joined classroom {}", auth.user_id, classroom.code);

    Ok(Json(view(&state, classroom).await?))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let classroom = state
        .db
        .get_classroom_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

    if !state.db.is_member(&classroom.id, &auth.user_id).await? {
        return Err(AppError::BadRequest(
            "Not a member of this classroom".to_string(),
        ));
    }

    if classroom.created_by == auth.user_id {
        return Err(AppError::BadRequest(
            "Creator cannot leave classroom. Delete it instead.".to_string(),
        ));
    }

    state.db.remove_member(&classroom.id, &auth.user_id).await?;
    tracing::info!("User {} left classroom {}", auth.user_id, classroom.code);

    Ok(Json(
        json!({ "success": true, "message": "Successfully left classroom" }),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let classroom = state
        .db
        .get_classroom_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

    if classroom.created_by != auth.user_id {
        return Err(AppError::Forbidden(
            "Only the creator can delete this classroom".to_string(),
        ));
    }

    state.db.delete_classroom(&classroom).await?;
    tracing::info!("Classroom {} deleted by its creator", classroom.code);

    Ok(Json(
        json!({ "success": true, "message": "Classroom deleted successfully" }),
    ))
}

/// Lookup by code. Deliberately unauthenticated, matching the observed
/// surface.
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ClassroomView>, AppError> {
    let classroom = state
        .db
        .get_classroom_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;
    Ok(Json(view(&state, classroom).await?))
}

pub async fn members(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let classroom = state
        .db
        .get_classroom_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

    let members = state.db.get_members(&classroom.id).await?;
    Ok(Json(members.into_iter().map(UserView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::auth::{register, RegisterRequest};
    use crate::state::test_state;
    use axum::http::StatusCode;

    async fn register_user(state: &AppState, email: &str, role: &str) -> AuthUser {
        let (status, Json(response)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                name: "Test User".to_string(),
                nickname: "tester".to_string(),
                email: email.to_string(),
                password: "hunter22".to_string(),
                role: Some(role.to_string()),
            }),
        )
        .await
        .expect("registration should succeed");
        assert_eq!(status, StatusCode::CREATED);
        AuthUser {
            user_id: response.user.id,
            email: response.user.email,
            role: response.user.role,
        }
    }

    fn create_request(code: &str) -> CreateClassroomRequest {
        CreateClassroomRequest {
            code: code.to_string(),
            name: "Algebra".to_string(),
            password: "pw1".to_string(),
        }
    }

    fn join_request(code: &str, password: &str) -> JoinClassroomRequest {
        JoinClassroomRequest {
            code: code.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_code_rejected() {
        let state = test_state().await;
        let teacher = register_user(&state, "t@example.com", "teacher").await;

        create(State(state.clone()), teacher.clone(), Json(create_request("ABC123")))
            .await
            .expect("first create should succeed");

        let second = create(State(state), teacher, Json(create_request("ABC123"))).await;
        assert!(matches!(second, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_join_rules() {
        let state = test_state().await;
        let teacher = register_user(&state, "t@example.com", "teacher").await;
        let student = register_user(&state, "s@example.com", "student").await;

        create(State(state.clone()), teacher, Json(create_request("ABC123")))
            .await
            .unwrap();

        let wrong_password = join(
            State(state.clone()),
            student.clone(),
            Json(join_request("ABC123", "nope")),
        )
        .await;
        assert!(matches!(wrong_password, Err(AppError::BadRequest(_))));

        let unknown_code = join(
            State(state.clone()),
            student.clone(),
            Json(join_request("NOPE99", "pw1")),
        )
        .await;
        assert!(matches!(unknown_code, Err(AppError::NotFound(_))));

        let Json(joined) = join(
            State(state.clone()),
            student.clone(),
            Json(join_request("ABC123", "pw1")),
        )
        .await
        .expect("join with the right password should succeed");
        assert!(joined.members.contains(&student.user_id));

        let again = join(
            State(state),
            student,
            Json(join_request("ABC123", "pw1")),
        )
        .await;
        assert!(matches!(again, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_creator_cannot_leave_but_member_can() {
        let state = test_state().await;
        let teacher = register_user(&state, "t@example.com", "teacher").await;
        let student = register_user(&state, "s@example.com", "student").await;

        create(State(state.clone()), teacher.clone(), Json(create_request("ABC123")))
            .await
            .unwrap();
        join(
            State(state.clone()),
            student.clone(),
            Json(join_request("ABC123", "pw1")),
        )
        .await
        .unwrap();

        let creator_leave = leave(
            State(state.clone()),
            teacher.clone(),
            Path("ABC123".to_string()),
        )
        .await;
        assert!(matches!(creator_leave, Err(AppError::BadRequest(_))));

        leave(
            State(state.clone()),
            student.clone(),
            Path("ABC123".to_string()),
        )
        .await
        .expect("a non-creator member can leave");

        // Gone from the member list and from the student's classroom list
        let Json(member_views) = members(
            State(state.clone()),
            teacher.clone(),
            Path("ABC123".to_string()),
        )
        .await
        .unwrap();
        assert!(member_views.iter().all(|m| m.id != student.user_id));

        let Json(visible) = list(State(state.clone()), student.clone()).await.unwrap();
        assert!(visible.is_empty());

        // Leaving twice fails
        let again = leave(State(state), student, Path("ABC123".to_string())).await;
        assert!(matches!(again, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_is_creator_only() {
        let state = test_state().await;
        let teacher = register_user(&state, "t@example.com", "teacher").await;
        let student = register_user(&state, "s@example.com", "student").await;

        create(State(state.clone()), teacher.clone(), Json(create_request("ABC123")))
            .await
            .unwrap();
        join(
            State(state.clone()),
            student.clone(),
            Json(join_request("ABC123", "pw1")),
        )
        .await
        .unwrap();

        let not_creator = delete(
            State(state.clone()),
            student,
            Path("ABC123".to_string()),
        )
        .await;
        assert!(matches!(not_creator, Err(AppError::Forbidden(_))));

        delete(State(state.clone()), teacher.clone(), Path("ABC123".to_string()))
            .await
            .expect("the creator can delete");

        let gone = get_by_code(State(state), Path("ABC123".to_string())).await;
        assert!(matches!(gone, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_union_of_created_and_joined() {
        let state = test_state().await;
        let teacher = register_user(&state, "t@example.com", "teacher").await;
        let student = register_user(&state, "s@example.com", "student").await;

        create(State(state.clone()), teacher.clone(), Json(create_request("ABC123")))
            .await
            .unwrap();
        create(State(state.clone()), student.clone(), Json(create_request("XY99")))
            .await
            .unwrap();
        join(
            State(state.clone()),
            student.clone(),
            Json(join_request("ABC123", "pw1")),
        )
        .await
        .unwrap();

        let Json(visible) = list(State(state), student).await.unwrap();
        let mut codes: Vec<_> = visible.iter().map(|c| c.code.as_str()).collect();
        codes.sort();
        assert_eq!(codes, vec!["ABC123", "XY99"]);
    }
}
