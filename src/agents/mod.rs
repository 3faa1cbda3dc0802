// Agent system modules
//
// Prompt agents, the closed kind-to-agent mapping and the coordinator
// that runs batches of tasks against them.

pub mod base;
pub mod chat;
pub mod content;
pub mod coordinator;
pub mod diagram;
pub mod errors;
pub mod evaluator;
pub mod image;
pub mod outline;
pub mod payload;
pub mod prompts;
pub mod quiz;
pub mod registry;
pub mod state;
pub mod text;
pub mod types;

// Re-export main types
pub use base::Agent;
pub use chat::{ChatAssistant, ChatTurn};
pub use content::ContentGenerator;
pub use coordinator::Coordinator;
pub use diagram::DiagramGenerator;
pub use errors::{AgentError, AgentResult, FailureCause};
pub use evaluator::AnswerEvaluator;
pub use image::ImageSelector;
pub use outline::OutlineGenerator;
pub use quiz::{grade_choice, QuizCreator};
pub use registry::AgentSet;
pub use types::{AgentOutput, BatchResult, Payload, Task, TaskId, TaskKind, TaskOutcome, TaskRequest};
