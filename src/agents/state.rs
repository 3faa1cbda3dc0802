// Task and batch lifecycle tracking
//
// The coordinator records every task's state so a batch can only settle
// once each of its tasks has reached a terminal state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::{AgentError, AgentResult};
use super::types::{TaskId, TaskKind};

/// Lifecycle of one task
///
/// # Status Transitions
/// ```text
/// Pending -> Running -> Succeeded
///                 └---> Failed
/// Pending ----------> Failed      (rejected before dispatch)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Checks if a transition from current state to next state is valid
    ///
    /// # Example
    /// ```
    /// use quickstudy_api::agents::state::TaskState;
    ///
    /// assert!(TaskState::Pending.can_transition_to(TaskState::Running));
    /// assert!(!TaskState::Succeeded.can_transition_to(TaskState::Running));
    /// ```
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Succeeded) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Running => write!(f, "running"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Open,
    Settled,
}

/// Per-batch ledger of task states
#[derive(Debug, Default)]
pub struct BatchTracker {
    tasks: HashMap<TaskId, (TaskKind, TaskState)>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task as pending. Returns false if the id is already tracked.
    pub fn admit(&mut self, id: TaskId, kind: TaskKind) -> bool {
        if self.tasks.contains_key(&id) {
            return false;
        }
        self.tasks.insert(id, (kind, TaskState::Pending));
        true
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|(_, state)| *state)
    }

    pub fn transition(&mut self, id: TaskId, next: TaskState) -> AgentResult<()> {
        let (_, state) = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| AgentError::TaskAborted(format!("task {id} is not part of this batch")))?;

        if !state.can_transition_to(next) {
            return Err(AgentError::TaskAborted(format!(
                "invalid state transition for task {id} from {state} to {next}"
            )));
        }
        *state = next;
        Ok(())
    }

    /// Tasks that have not reached a terminal state
    pub fn unsettled(&self) -> Vec<(TaskId, TaskKind)> {
        self.tasks
            .iter()
            .filter(|(_, (_, state))| !state.is_terminal())
            .map(|(id, (kind, _))| (*id, *kind))
            .collect()
    }

    pub fn batch_state(&self) -> BatchState {
        if self.tasks.values().all(|(_, state)| state.is_terminal()) {
            BatchState::Settled
        } else {
            BatchState::Open
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
