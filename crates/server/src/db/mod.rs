use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

mod models;

pub use models::*;

/// Per-entity totals for the analytics endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Counts {
    pub users: i64,
    pub classrooms: i64,
    pub tasks: i64,
    pub messages: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection, so every query
    /// sees the same instance.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                nickname TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student',
                avatar TEXT NOT NULL DEFAULT 'emoji:😀',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS classrooms (
                id TEXT PRIMARY KEY,
                code TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                password TEXT NOT NULL,
                created_by TEXT NOT NULL REFERENCES users(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS classroom_members (
                classroom_id TEXT NOT NULL REFERENCES classrooms(id),
                user_id TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (classroom_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // classroom_id holds the classroom *code*; no FK on purpose
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                classroom_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                subject TEXT,
                date_assigned TEXT,
                due_date TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                created_by TEXT NOT NULL REFERENCES users(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                classroom_id TEXT NOT NULL,
                author TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, name, nickname, email, password_hash, role, avatar) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.avatar)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, nickname, email, password_hash, role, avatar, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, nickname, email, password_hash, role, avatar, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Update display fields; avatar keeps its stored value when `None`.
    pub async fn update_user_profile(
        &self,
        id: &str,
        name: &str,
        nickname: &str,
        avatar: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET name = ?, nickname = ?, avatar = COALESCE(?, avatar) WHERE id = ?",
        )
        .bind(name)
        .bind(nickname)
        .bind(avatar)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_user_email(&self, id: &str, email: &str) -> Result<()> {
        sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Classroom operations

    /// Insert the classroom and its creator's membership in one transaction.
    pub async fn create_classroom(&self, classroom: &Classroom) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO classrooms (id, code, name, password, created_by) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&classroom.id)
        .bind(&classroom.code)
        .bind(&classroom.name)
        .bind(&classroom.password)
        .bind(&classroom.created_by)
        .execute(&mut *tx)
        .await?;
        sqlx::query("INSERT INTO classroom_members (classroom_id, user_id) VALUES (?, ?)")
            .bind(&classroom.id)
            .bind(&classroom.created_by)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_classroom_by_code(&self, code: &str) -> Result<Option<Classroom>> {
        let classroom = sqlx::query_as::<_, Classroom>(
            "SELECT id, code, name, password, created_by, created_at FROM classrooms WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(classroom)
    }

    /// Classrooms the user created or joined -- a union, not exclusive
    /// categories (the creator also has a member row).
    pub async fn classrooms_for_user(&self, user_id: &str) -> Result<Vec<Classroom>> {
        let classrooms = sqlx::query_as::<_, Classroom>(
            r#"
            SELECT DISTINCT c.id, c.code, c.name, c.password, c.created_by, c.created_at
            FROM classrooms c
            LEFT JOIN classroom_members m ON m.classroom_id = c.id
            WHERE c.created_by = ? OR m.user_id = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(classrooms)
    }

    pub async fn member_ids(&self, classroom_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM classroom_members WHERE classroom_id = ?",
        )
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn is_member(&self, classroom_id: &str, user_id: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM classroom_members WHERE classroom_id = ? AND user_id = ?",
        )
        .bind(classroom_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn add_member(&self, classroom_id: &str, user_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO classroom_members (classroom_id, user_id) VALUES (?, ?)")
            .bind(classroom_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_member(&self, classroom_id: &str, user_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM classroom_members WHERE classroom_id = ? AND user_id = ?")
            .bind(classroom_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_members(&self, classroom_id: &str) -> Result<Vec<User>> {
        let members = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.nickname, u.email, u.password_hash, u.role, u.avatar, u.created_at
            FROM users u
            JOIN classroom_members m ON m.user_id = u.id
            WHERE m.classroom_id = ?
            "#,
        )
        .bind(classroom_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Delete a classroom and everything scoped to it: tasks and messages
    /// keyed by its code, member rows, then the classroom record itself.
    pub async fn delete_classroom(&self, classroom: &Classroom) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tasks WHERE classroom_id = ?")
            .bind(&classroom.code)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE classroom_id = ?")
            .bind(&classroom.code)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM classroom_members WHERE classroom_id = ?")
            .bind(&classroom.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM classrooms WHERE id = ?")
            .bind(&classroom.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // Task operations
    pub async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, classroom_id, name, description, subject, date_assigned, due_date, completed, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.id)
        .bind(&task.classroom_id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.subject)
        .bind(&task.date_assigned)
        .bind(&task.due_date)
        .bind(task.completed)
        .bind(&task.created_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            "SELECT id, classroom_id, name, description, subject, date_assigned, due_date, completed, created_by FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn get_task_with_creator(&self, id: &str) -> Result<Option<TaskWithCreator>> {
        let task = sqlx::query_as::<_, TaskWithCreator>(
            r#"
            SELECT t.id, t.classroom_id, t.name, t.description, t.subject,
                   t.date_assigned, t.due_date, t.completed, t.created_by,
                   u.name AS creator_name, u.nickname AS creator_nickname, u.email AS creator_email
            FROM tasks t
            JOIN users u ON u.id = t.created_by
            WHERE t.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn tasks_for_classroom(&self, code: &str) -> Result<Vec<TaskWithCreator>> {
        let tasks = sqlx::query_as::<_, TaskWithCreator>(
            r#"
            SELECT t.id, t.classroom_id, t.name, t.description, t.subject,
                   t.date_assigned, t.due_date, t.completed, t.created_by,
                   u.name AS creator_name, u.nickname AS creator_nickname, u.email AS creator_email
            FROM tasks t
            JOIN users u ON u.id = t.created_by
            WHERE t.classroom_id = ?
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    /// Apply a partial update; returns the number of rows touched so the
    /// caller can distinguish an unknown id.
    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                subject = COALESCE(?, subject),
                date_assigned = COALESCE(?, date_assigned),
                due_date = COALESCE(?, due_date),
                completed = COALESCE(?, completed)
            WHERE id = ?
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.subject)
        .bind(&patch.date_assigned)
        .bind(&patch.due_date)
        .bind(patch.completed)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Message operations
    pub async fn insert_message(&self, message: &Message) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (id, classroom_id, author, content, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.classroom_id)
        .bind(&message.author)
        .bind(&message.content)
        .bind(&message.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn messages_for_classroom(&self, code: &str) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, classroom_id, author, content, timestamp FROM messages WHERE classroom_id = ? ORDER BY timestamp ASC",
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    // Analytics
    pub async fn counts(&self) -> Result<Counts> {
        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let classrooms = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM classrooms")
            .fetch_one(&self.pool)
            .await?;
        let tasks = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        let messages = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(Counts {
            users,
            classrooms,
            tasks,
            messages,
        })
    }
}
