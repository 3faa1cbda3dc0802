use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{AgentError, FailureCause};

/// Named inputs of a task
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identity of a task inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// The closed set of task kinds, one per agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    GenerateOutline,
    GenerateContent,
    AnswerQuery,
    CreateQuiz,
    GenerateDiagram,
    SelectImage,
    EvaluateAnswer,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::GenerateOutline,
        TaskKind::GenerateContent,
        TaskKind::AnswerQuery,
        TaskKind::CreateQuiz,
        TaskKind::GenerateDiagram,
        TaskKind::SelectImage,
        TaskKind::EvaluateAnswer,
    ];

    /// Wire name of the task kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GenerateOutline => "generate_outline",
            TaskKind::GenerateContent => "generate_content",
            TaskKind::AnswerQuery => "answer_query",
            TaskKind::CreateQuiz => "create_quiz",
            TaskKind::GenerateDiagram => "generate_diagram",
            TaskKind::SelectImage => "select_image",
            TaskKind::EvaluateAnswer => "evaluate_answer",
        }
    }

    /// Name of the agent that handles this kind
    pub fn agent_name(&self) -> &'static str {
        match self {
            TaskKind::GenerateOutline => "outline_generator",
            TaskKind::GenerateContent => "content_generator",
            TaskKind::AnswerQuery => "chat_assistant",
            TaskKind::CreateQuiz => "quiz_creator",
            TaskKind::GenerateDiagram => "diagram_generator",
            TaskKind::SelectImage => "image_selector",
            TaskKind::EvaluateAnswer => "answer_evaluator",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = AgentError;

    /// Accepts either the task name or the agent name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted || kind.agent_name() == wanted)
            .ok_or_else(|| AgentError::UnknownAgentKind(s.to_string()))
    }
}

/// One unit of work for a single agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub payload: Payload,
}

impl Task {
    pub fn new(kind: TaskKind, payload: Payload) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            payload,
        }
    }

    /// Build a task from a JSON object literal; non-objects give an empty payload
    pub fn from_json(kind: TaskKind, payload: serde_json::Value) -> Self {
        let payload = match payload {
            serde_json::Value::Object(map) => map,
            _ => Payload::new(),
        };
        Self::new(kind, payload)
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }
}

/// Wire form of a task, before its kind has been resolved
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub id: Option<TaskId>,
    pub kind: String,
    #[serde(default)]
    pub payload: Payload,
}

impl TaskRequest {
    /// Resolve the kind name; the id is kept so a rejection can be reported
    pub fn into_task(self) -> Result<Task, (TaskId, AgentError)> {
        let id = self.id.unwrap_or_default();
        match self.kind.parse::<TaskKind>() {
            Ok(kind) => Ok(Task {
                id,
                kind,
                payload: self.payload,
            }),
            Err(err) => Err((id, err)),
        }
    }
}

/// How the caller wants material pitched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    QuickOverview,
    Standard,
    Advanced,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "Beginner"),
            Difficulty::QuickOverview => write!(f, "Quick Overview"),
            Difficulty::Standard => write!(f, "Standard"),
            Difficulty::Advanced => write!(f, "Advanced"),
        }
    }
}

/// One entry of a document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub title: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    pub content: String,
    pub key_points: Vec<String>,
    /// Outline section the slide was written for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Search phrase for an illustrating image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDeck {
    pub difficulty: Difficulty,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    MultiSelect,
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    /// Option texts that are correct; for short answers, the ideal answer
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

/// Visualization requested from the diagram agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    Mermaid,
    Flowchart,
    ConceptMap,
    Timeline,
    Comparison,
    Image,
}

impl FromStr for DiagramKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mermaid" => Ok(DiagramKind::Mermaid),
            "flowchart" | "mermaid_flowchart" | "process_flow" => Ok(DiagramKind::Flowchart),
            "concept_map" => Ok(DiagramKind::ConceptMap),
            "timeline" => Ok(DiagramKind::Timeline),
            "comparison" => Ok(DiagramKind::Comparison),
            "image" | "raster" => Ok(DiagramKind::Image),
            other => Err(AgentError::invalid_field(
                "type",
                format!("has unsupported visualization kind '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DiagramArtifact {
    Markup { language: String, source: String },
    /// Base64-encoded image bytes
    Raster { mime_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    pub kind: DiagramKind,
    pub topic: String,
    pub artifact: DiagramArtifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSelection {
    pub selected: Vec<ImageCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub score: u8,
    pub feedback: String,
}

/// Success value of an agent, one variant per kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentOutput {
    Outline(Outline),
    Slides(SlideDeck),
    Chat(ChatReply),
    Quiz(Quiz),
    Diagram(Diagram),
    Images(ImageSelection),
    Evaluation(AnswerEvaluation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded { output: AgentOutput },
    Failed { cause: FailureCause, message: String },
}

/// Settled result of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    /// Absent when the requested kind could not be resolved
    pub kind: Option<TaskKind>,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl TaskOutcome {
    pub fn succeeded(task_id: TaskId, kind: TaskKind, output: AgentOutput, elapsed_ms: u64) -> Self {
        Self {
            task_id,
            kind: Some(kind),
            elapsed_ms,
            status: OutcomeStatus::Succeeded { output },
        }
    }

    pub fn failed(task_id: TaskId, kind: Option<TaskKind>, error: &AgentError, elapsed_ms: u64) -> Self {
        Self {
            task_id,
            kind,
            elapsed_ms,
            status: OutcomeStatus::Failed {
                cause: error.cause(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    pub fn output(&self) -> Option<&AgentOutput> {
        match &self.status {
            OutcomeStatus::Succeeded { output } => Some(output),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    pub fn failure_cause(&self) -> Option<FailureCause> {
        match &self.status {
            OutcomeStatus::Succeeded { .. } => None,
            OutcomeStatus::Failed { cause, .. } => Some(*cause),
        }
    }
}

/// Outcomes of a settled batch, keyed by task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub outcomes: HashMap<TaskId, TaskOutcome>,
    pub settled_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn new(outcomes: HashMap<TaskId, TaskOutcome>) -> Self {
        Self {
            outcomes,
            settled_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskOutcome> {
        self.outcomes.get(id)
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.succeeded_count()
    }
}
