//! The uniform agent contract and the helper every agent uses to reach
//! the model.

use async_trait::async_trait;

use super::errors::AgentResult;
use super::prompts::PromptTemplate;
use super::types::{AgentOutput, Payload, TaskKind};
use crate::llm::{GenerationRequest, TextGenerator};

/// A stateless handler for one category of generation task
#[async_trait]
pub trait Agent: Send + Sync {
    /// The task kind this agent serves
    fn kind(&self) -> TaskKind;

    /// Turn a payload into an output. Must not keep state between calls.
    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput>;
}

/// Send a rendered template to the model and return its text reply
pub(crate) async fn ask_text(
    generator: &dyn TextGenerator,
    template: &PromptTemplate,
    prompt: String,
    temperature: f32,
) -> AgentResult<String> {
    let mut request = GenerationRequest::prompt(prompt).with_temperature(temperature);
    if !template.system.is_empty() {
        request = request.with_system(template.system);
    }

    tracing::debug!(
        template = template.name,
        version = template.version,
        "requesting generation"
    );

    let text = generator.generate(request).await?.into_text()?;
    Ok(text)
}
