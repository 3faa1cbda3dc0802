use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional, required_str};
use super::prompts::library;
use super::text::extract_json;
use super::types::{AgentOutput, ImageCandidate, ImageSelection, Payload, TaskKind};
use crate::llm::TextGenerator;

pub const MAX_CANDIDATES: usize = 20;

/// Candidates may arrive as bare URLs or as full records
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateInput {
    Url(String),
    Full(ImageCandidate),
}

impl From<CandidateInput> for ImageCandidate {
    fn from(input: CandidateInput) -> Self {
        match input {
            CandidateInput::Url(url) => ImageCandidate {
                url,
                title: None,
                source: None,
            },
            CandidateInput::Full(candidate) => candidate,
        }
    }
}

/// Filters and ranks image search results for a topic.
///
/// The model only ever picks by number, so the selection is always a
/// subset of the candidates it was shown.
pub struct ImageSelector {
    generator: Arc<dyn TextGenerator>,
}

impl ImageSelector {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Agent for ImageSelector {
    fn kind(&self) -> TaskKind {
        TaskKind::SelectImage
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let topic = required_str(payload, "topic")?;
        let inputs: Vec<CandidateInput> = match optional(payload, "candidates")? {
            Some(inputs) => inputs,
            None => optional(payload, "images")?.ok_or_else(|| AgentError::missing_field("candidates"))?,
        };

        let mut candidates: Vec<ImageCandidate> = inputs.into_iter().map(Into::into).collect();
        if candidates.iter().any(|c| c.url.trim().is_empty()) {
            return Err(AgentError::invalid_field("candidates", "contains an empty url"));
        }
        if candidates.is_empty() {
            return Ok(AgentOutput::Images(ImageSelection { selected: Vec::new() }));
        }
        if candidates.len() > MAX_CANDIDATES {
            tracing::debug!(
                dropped = candidates.len() - MAX_CANDIDATES,
                "too many image candidates, keeping the first ones"
            );
            candidates.truncate(MAX_CANDIDATES);
        }

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| match &c.title {
                Some(title) => format!("{}. {} ({})", i + 1, title, c.url),
                None => format!("{}. {}", i + 1, c.url),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let template = library::image_selection();
        let prompt = template.render_with(&[("topic", topic), ("candidates", listing.as_str())]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.2).await?;

        let picks = parse_selection(&reply, candidates.len())?;
        let selected = picks.into_iter().map(|i| candidates[i].clone()).collect();

        Ok(AgentOutput::Images(ImageSelection { selected }))
    }
}

/// Zero-based candidate indices from a reply of one-based numbers.
/// Out-of-range and repeated numbers are dropped.
pub fn parse_selection(reply: &str, candidate_count: usize) -> AgentResult<Vec<usize>> {
    let body = extract_json(reply).ok_or_else(|| {
        AgentError::MalformedResponse("image selection reply contained no JSON".to_string())
    })?;
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AgentError::MalformedResponse(format!("image selection JSON is invalid: {e}")))?;

    let Value::Array(items) = value else {
        return Err(AgentError::MalformedResponse(
            "image selection must be a JSON array".to_string(),
        ));
    };

    let mut picks = Vec::new();
    for number in items.iter().filter_map(Value::as_u64) {
        let Some(idx) = (number as usize).checked_sub(1) else {
            continue;
        };
        if idx < candidate_count && !picks.contains(&idx) {
            picks.push(idx);
        }
    }
    Ok(picks)
}
