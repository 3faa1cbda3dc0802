use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::types::OutcomeStatus;
use crate::agents::{AgentOutput, ChatTurn, Task, TaskKind};
use crate::api::errors::ApiError;
use crate::api::AppState;

/// Request body for a tutor question
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    pub context: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Answer plus the caller's history extended with this exchange
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub history: Vec<ChatTurn>,
}

/// Ask the tutor a question about a document
///
/// POST /api/chat
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let task = Task::from_json(
        TaskKind::AnswerQuery,
        json!({
            "question": req.question,
            "context": req.context,
            "history": req.history,
        }),
    );

    let outcome = state.coordinator.process_task(task).await;
    match outcome.status {
        OutcomeStatus::Succeeded {
            output: AgentOutput::Chat(reply),
        } => {
            let mut history = req.history;
            history.push(ChatTurn::user(req.question));
            history.push(ChatTurn::assistant(reply.answer.clone()));
            Ok(Json(ChatResponse {
                answer: reply.answer,
                history,
            }))
        }
        OutcomeStatus::Succeeded { .. } => Err(ApiError::internal_server_error(
            "Chat agent returned an unexpected output",
        )),
        OutcomeStatus::Failed { cause, message } => Err(ApiError::from_failure(cause, message)),
    }
}
