use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::GenerationError;

/// Errors that can occur in the agent system
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("External service error: {0}")]
    ExternalService(#[from] GenerationError),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("No agent registered for task kind: {0}")]
    UnknownAgentKind(String),

    #[error("Batch deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Task aborted: {0}")]
    TaskAborted(String),
}

impl AgentError {
    pub fn missing_field(field: &str) -> Self {
        AgentError::InvalidPayload(format!("missing required field '{field}'"))
    }

    pub fn invalid_field(field: &str, reason: impl std::fmt::Display) -> Self {
        AgentError::InvalidPayload(format!("field '{field}' {reason}"))
    }

    /// Folds the error into the caller-facing failure taxonomy
    pub fn cause(&self) -> FailureCause {
        match self {
            AgentError::InvalidPayload(_) => FailureCause::InvalidPayload,
            AgentError::UnknownAgentKind(_) => FailureCause::UnknownAgentKind,
            AgentError::ExternalService(_)
            | AgentError::MalformedResponse(_)
            | AgentError::DeadlineExceeded(_)
            | AgentError::TaskAborted(_) => FailureCause::ExternalService,
        }
    }

    /// Whether resubmitting the same task might succeed
    pub fn is_retryable(&self) -> bool {
        self.cause() == FailureCause::ExternalService
    }
}

/// Category of a task failure, as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    InvalidPayload,
    ExternalService,
    UnknownAgentKind,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCause::InvalidPayload => write!(f, "invalid_payload"),
            FailureCause::ExternalService => write!(f, "external_service"),
            FailureCause::UnknownAgentKind => write!(f, "unknown_agent_kind"),
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
