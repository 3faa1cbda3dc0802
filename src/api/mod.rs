// API layer module (HTTP adapter in front of the coordinator)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::agents::Coordinator;

pub mod errors;
pub mod handlers;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Build the application router without transport layers
pub fn router(state: AppState) -> Router {
    use handlers::{chat, quiz, tasks};

    Router::new()
        // Health check
        .route("/health", get(tasks::health_check))
        // Task routes
        .route("/api/tasks", post(tasks::submit_task))
        .route("/api/tasks/batch", post(tasks::submit_batch))
        // Convenience routes
        .route("/api/chat", post(chat::ask))
        .route("/api/quiz/grade", post(quiz::grade))
        // Shared state
        .with_state(state)
}
