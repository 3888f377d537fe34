use sqlx::FromRow;

/// Avatar assigned at registration. Clients may replace it via the profile
/// endpoint; the server never generates randomized avatars.
pub const DEFAULT_AVATAR: &str = "emoji:😀";

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub avatar: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Classroom {
    pub id: String,
    /// Short human-typed unique identifier, distinct from the internal id.
    pub code: String,
    pub name: String,
    /// Stored in clear text and compared directly on join.
    pub password: String,
    pub created_by: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub id: String,
    /// The classroom *code*, not its internal id. Nothing stops a task from
    /// referencing a code that no longer exists.
    pub classroom_id: String,
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub created_by: String,
}

/// A task joined with its creator's display fields, for API responses.
#[derive(Debug, Clone, FromRow)]
pub struct TaskWithCreator {
    pub id: String,
    pub classroom_id: String,
    pub name: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub created_by: String,
    pub creator_name: String,
    pub creator_nickname: String,
    pub creator_email: String,
}

/// Partial task update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub date_assigned: Option<String>,
    pub due_date: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    /// The classroom code, mirroring `Task::classroom_id`.
    pub classroom_id: String,
    /// Display string chosen by the sender, not a user reference.
    pub author: String,
    pub content: String,
    pub timestamp: String,
}

impl From<Message> for shared::ChatMessage {
    fn from(m: Message) -> Self {
        shared::ChatMessage {
            id: m.id,
            classroom_id: m.classroom_id,
            author: m.author,
            content: m.content,
            timestamp: m.timestamp,
        }
    }
}
