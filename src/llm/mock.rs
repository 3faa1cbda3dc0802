use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Generation, GenerationError, GenerationRequest, GenerationResult, TextGenerator};

/// Scripted reply returned by [`StubGenerator`]
#[derive(Debug, Clone)]
pub enum StubReply {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
    Fail(GenerationError),
}

impl StubReply {
    fn resolve(&self) -> GenerationResult<Generation> {
        match self {
            StubReply::Text(text) => Ok(Generation::Text(text.clone())),
            StubReply::Image { mime_type, bytes } => Ok(Generation::Image {
                mime_type: mime_type.clone(),
                bytes: bytes.clone(),
            }),
            StubReply::Fail(err) => Err(err.clone()),
        }
    }
}

/// Deterministic generator for tests.
///
/// Replies are chosen by the first rule whose needle appears anywhere in
/// the request (system prompt or messages); otherwise the fallback is used.
/// Every request is recorded.
pub struct StubGenerator {
    rules: Vec<(String, StubReply)>,
    fallback: StubReply,
    delay: Option<Duration>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl StubGenerator {
    pub fn new(fallback: StubReply) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(StubReply::Text(text.into()))
    }

    /// Always fail with the given error
    pub fn failing(err: GenerationError) -> Self {
        Self::new(StubReply::Fail(err))
    }

    pub fn when_prompt_contains(mut self, needle: impl Into<String>, reply: StubReply) -> Self {
        self.rules.push((needle.into(), reply));
        self
    }

    /// Sleep before every reply, to make concurrent calls overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Rendered user prompts, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|r| r.last_user_message().map(str::to_string))
            .collect()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn pick(&self, request: &GenerationRequest) -> &StubReply {
        self.rules
            .iter()
            .find(|(needle, _)| {
                request.system.as_deref().is_some_and(|s| s.contains(needle.as_str()))
                    || request.messages.iter().any(|m| m.content.contains(needle.as_str()))
            })
            .map(|(_, reply)| reply)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult<Generation> {
        let reply = self.pick(&request).clone();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        reply.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rules_take_precedence_over_fallback() {
        let stub = StubGenerator::replying("default")
            .when_prompt_contains("quiz", StubReply::Text("[]".to_string()));

        let quiz = stub.generate(GenerationRequest::prompt("make a quiz")).await;
        let other = stub.generate(GenerationRequest::prompt("summarize")).await;

        assert_eq!(quiz, Ok(Generation::Text("[]".to_string())));
        assert_eq!(other, Ok(Generation::Text("default".to_string())));
        assert_eq!(stub.call_count(), 2);
        assert_eq!(stub.prompts(), vec!["make a quiz", "summarize"]);
    }

    #[tokio::test]
    async fn failing_stub_returns_error() {
        let stub = StubGenerator::failing(GenerationError::Timeout(Duration::from_secs(1)));
        let result = stub.generate(GenerationRequest::prompt("anything")).await;
        assert_eq!(result, Err(GenerationError::Timeout(Duration::from_secs(1))));
    }
}
