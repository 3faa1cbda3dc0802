use std::sync::Arc;

use async_trait::async_trait;

use super::base::Agent;
use super::errors::{AgentError, AgentResult};
use super::payload::{optional, optional_str, required_str};
use super::prompts::library;
use super::text::truncate_chars;
use super::types::{AgentOutput, ChatReply, Payload, TaskKind};
use crate::llm::{GenerationRequest, Message, Role, TextGenerator};

/// One turn of a tutoring conversation, owned by the caller
pub type ChatTurn = Message;

pub const MAX_CONTEXT_CHARS: usize = 3000;
pub const MAX_HISTORY_TURNS: usize = 10;

/// Answers a student's question against the document context
pub struct ChatAssistant {
    generator: Arc<dyn TextGenerator>,
}

impl ChatAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Agent for ChatAssistant {
    fn kind(&self) -> TaskKind {
        TaskKind::AnswerQuery
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let question = match optional_str(payload, "query")? {
            Some(query) if !payload.contains_key("question") => query,
            _ => required_str(payload, "question")?,
        };
        let context = optional_str(payload, "context")?.unwrap_or("No document context provided.");
        let history: Vec<ChatTurn> = optional(payload, "history")?.unwrap_or_default();

        if history.iter().any(|turn| turn.role == Role::System) {
            return Err(AgentError::invalid_field(
                "history",
                "may only contain user and assistant turns",
            ));
        }

        let template = library::tutor_answer();
        let prompt = template.render_with(&[
            ("context", truncate_chars(context, MAX_CONTEXT_CHARS)),
            ("question", question),
        ]);

        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
        let mut messages: Vec<Message> = history.into_iter().skip(skip).collect();
        messages.push(Message::user(prompt));

        let request = GenerationRequest {
            system: Some(template.system.to_string()),
            messages,
            ..GenerationRequest::default()
        }
        .with_temperature(0.5);

        let answer = self.generator.generate(request).await?.into_text()?;

        Ok(AgentOutput::Chat(ChatReply {
            answer: answer.trim().to_string(),
        }))
    }
}
