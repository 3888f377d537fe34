use crate::{config::Config, db::Database, rooms::RoomRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            rooms: Arc::new(RoomRegistry::new()),
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    let db = Database::in_memory()
        .await
        .expect("in-memory database should open");
    AppState::new(db, Config::default())
}
