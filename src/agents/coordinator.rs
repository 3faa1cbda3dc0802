use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;

use super::base::Agent;
use super::errors::AgentError;
use super::registry::AgentSet;
use super::state::{BatchState, BatchTracker, TaskState};
use super::types::{BatchResult, Task, TaskId, TaskKind, TaskOutcome, TaskRequest};
use crate::llm::TextGenerator;

/// Dispatches tasks to their agents and gathers the outcomes.
///
/// The coordinator holds no per-request state: every batch gets its own
/// task group and tracker, and everything it produces is returned to the
/// caller.
#[derive(Debug, Clone)]
pub struct Coordinator {
    agents: AgentSet,
    deadline: Option<Duration>,
}

impl Coordinator {
    pub fn new(agents: AgentSet) -> Self {
        Self {
            agents,
            deadline: None,
        }
    }

    /// Coordinator with every built-in agent on one backend
    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(AgentSet::standard(generator))
    }

    /// Fail tasks still running `deadline` after their batch started
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    fn deadline_from_now(&self) -> Option<(Instant, Duration)> {
        self.deadline.map(|budget| (Instant::now() + budget, budget))
    }

    /// Run a single task to completion.
    ///
    /// The agent runs on its own tokio task, so a panic inside it becomes
    /// a failed outcome instead of unwinding into the caller.
    pub async fn process_task(&self, task: Task) -> TaskOutcome {
        let started = Instant::now();
        let (id, kind) = (task.id, task.kind);
        let agent = self.agents.resolve(kind);

        match tokio::spawn(run_task(agent, task, self.deadline_from_now())).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(task_id = %id, "agent task did not complete: {}", err);
                aborted(id, kind, started.elapsed().as_millis() as u64)
            }
        }
    }

    /// Resolve a wire request and run it
    pub async fn process_request(&self, request: TaskRequest) -> TaskOutcome {
        match request.into_task() {
            Ok(task) => self.process_task(task).await,
            Err((id, err)) => {
                tracing::warn!(task_id = %id, "rejected task: {}", err);
                TaskOutcome::failed(id, None, &err, 0)
            }
        }
    }

    /// Run every task of a batch concurrently and wait for all of them.
    ///
    /// A failing task only fails its own slot. The result always holds
    /// exactly one outcome per submitted task; a repeated task id is
    /// replaced with a fresh one.
    pub async fn process_multiple_tasks(&self, batch: Vec<Task>) -> BatchResult {
        if batch.is_empty() {
            return BatchResult::new(HashMap::new());
        }

        let started = Instant::now();
        let deadline = self.deadline_from_now();
        let total = batch.len();
        let mut tracker = BatchTracker::new();
        let mut outcomes = HashMap::with_capacity(total);
        let mut group = JoinSet::new();

        for mut task in batch {
            if !tracker.admit(task.id, task.kind) {
                let fresh = TaskId::new();
                tracing::warn!(duplicate = %task.id, task_id = %fresh, "duplicate task id in batch, re-keyed");
                task.id = fresh;
                tracker.admit(task.id, task.kind);
            }

            match self.agents.resolve(task.kind) {
                Some(agent) => {
                    mark(&mut tracker, task.id, TaskState::Running);
                    group.spawn(run_task(Some(agent), task, deadline));
                }
                None => {
                    let outcome = run_task(None, task, deadline).await;
                    mark(&mut tracker, outcome.task_id, TaskState::Failed);
                    outcomes.insert(outcome.task_id, outcome);
                }
            }
        }

        while let Some(joined) = group.join_next().await {
            match joined {
                Ok(outcome) => {
                    let next = if outcome.is_success() {
                        TaskState::Succeeded
                    } else {
                        TaskState::Failed
                    };
                    mark(&mut tracker, outcome.task_id, next);
                    outcomes.insert(outcome.task_id, outcome);
                }
                Err(err) => tracing::error!("agent task did not complete: {}", err),
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        for (id, kind) in tracker.unsettled() {
            mark(&mut tracker, id, TaskState::Failed);
            outcomes.insert(id, aborted(id, kind, elapsed_ms));
        }

        debug_assert_eq!(tracker.batch_state(), BatchState::Settled);
        let result = BatchResult::new(outcomes);
        tracing::info!(
            tasks = total,
            succeeded = result.succeeded_count(),
            failed = result.failed_count(),
            elapsed_ms,
            "batch settled"
        );
        result
    }

    /// Resolve and run a batch of wire requests.
    ///
    /// Requests naming an unknown kind fail in their own slot; the rest
    /// run as a normal batch.
    pub async fn process_requests(&self, requests: Vec<TaskRequest>) -> BatchResult {
        let mut tasks = Vec::with_capacity(requests.len());
        let mut rejected = Vec::new();

        for request in requests {
            match request.into_task() {
                Ok(task) => tasks.push(task),
                Err(rejection) => rejected.push(rejection),
            }
        }

        let mut result = self.process_multiple_tasks(tasks).await;
        for (mut id, err) in rejected {
            if result.outcomes.contains_key(&id) {
                id = TaskId::new();
            }
            tracing::warn!(task_id = %id, "rejected task: {}", err);
            result.outcomes.insert(id, TaskOutcome::failed(id, None, &err, 0));
        }
        result
    }
}

fn aborted(id: TaskId, kind: TaskKind, elapsed_ms: u64) -> TaskOutcome {
    let err = AgentError::TaskAborted("agent task panicked or was cancelled".to_string());
    TaskOutcome::failed(id, Some(kind), &err, elapsed_ms)
}

fn mark(tracker: &mut BatchTracker, id: TaskId, next: TaskState) {
    if let Err(err) = tracker.transition(id, next) {
        tracing::error!("{}", err);
    }
}

async fn run_task(
    agent: Option<Arc<dyn Agent>>,
    task: Task,
    deadline: Option<(Instant, Duration)>,
) -> TaskOutcome {
    let started = Instant::now();
    let Some(agent) = agent else {
        let err = AgentError::UnknownAgentKind(task.kind.to_string());
        tracing::warn!(task_id = %task.id, kind = %task.kind, "no agent registered");
        return TaskOutcome::failed(task.id, Some(task.kind), &err, 0);
    };

    let work = agent.process(&task.payload);
    let result = match deadline {
        Some((at, budget)) => tokio::time::timeout_at(at, work)
            .await
            .unwrap_or_else(|_| Err(AgentError::DeadlineExceeded(budget))),
        None => work.await,
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(output) => {
            tracing::info!(
                task_id = %task.id,
                agent = task.kind.agent_name(),
                elapsed_ms,
                "agent completed task"
            );
            TaskOutcome::succeeded(task.id, task.kind, output, elapsed_ms)
        }
        Err(err) => {
            tracing::warn!(
                task_id = %task.id,
                agent = task.kind.agent_name(),
                cause = %err.cause(),
                "agent failed: {}",
                err
            );
            TaskOutcome::failed(task.id, Some(task.kind), &err, elapsed_ms)
        }
    }
}
