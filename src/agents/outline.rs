use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional_u64, required_str};
use super::prompts::library;
use super::text::{extract_json, truncate_chars};
use super::types::{AgentOutput, Outline, OutlineSection, Payload, TaskKind};
use crate::llm::TextGenerator;

const MAX_SOURCE_CHARS: usize = 8000;
const DEFAULT_MAX_SECTIONS: u64 = 8;
const SECTION_LIMIT: u64 = 20;

/// Builds a table of contents that drives section-by-section slides
pub struct OutlineGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl OutlineGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Agent for OutlineGenerator {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateOutline
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let text = required_str(payload, "text")?;
        let max_sections = optional_u64(payload, "max_sections")?.unwrap_or(DEFAULT_MAX_SECTIONS);
        if !(1..=SECTION_LIMIT).contains(&max_sections) {
            return Err(AgentError::invalid_field(
                "max_sections",
                format!("must be between 1 and {SECTION_LIMIT}"),
            ));
        }

        let template = library::document_outline();
        let prompt = template.render_with(&[
            ("max_sections", max_sections.to_string().as_str()),
            ("text", truncate_chars(text, MAX_SOURCE_CHARS)),
        ]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let mut outline = parse_outline(&reply)?;
        outline.sections.truncate(max_sections as usize);
        tracing::debug!(sections = outline.sections.len(), "outline generated");
        Ok(AgentOutput::Outline(outline))
    }
}

/// Title of an outline entry given as a string or an object
fn entry_title(entry: &Value) -> Option<String> {
    let title = match entry {
        Value::String(s) => s.as_str(),
        Value::Object(map) => ["title", "name", "heading", "section"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))?,
        _ => return None,
    };
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Parse a model reply into outline sections, dropping untitled entries
pub fn parse_outline(reply: &str) -> AgentResult<Outline> {
    let body = extract_json(reply)
        .ok_or_else(|| AgentError::MalformedResponse("outline reply contained no JSON".to_string()))?;
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AgentError::MalformedResponse(format!("outline JSON is invalid: {e}")))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => ["sections", "toc", "outline"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let sections: Vec<OutlineSection> = entries
        .iter()
        .filter_map(|entry| {
            let title = entry_title(entry)?;
            let subtopics = entry
                .get("subtopics")
                .and_then(Value::as_array)
                .map(|subs| subs.iter().filter_map(entry_title).collect())
                .unwrap_or_default();
            Some(OutlineSection { title, subtopics })
        })
        .collect();

    if sections.is_empty() {
        return Err(AgentError::MalformedResponse(
            "outline reply contained no sections".to_string(),
        ));
    }

    Ok(Outline { sections })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubGenerator;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    const TOC_REPLY: &str = r#"```json
[
  {"title": "Cell Structure", "pages": "1-3", "subtopics": ["Membrane", {"title": "Nucleus", "subtopics": []}]},
  {"title": "Cell Division", "subtopics": []},
  {"pages": "9"}
]
```"#;

    #[test]
    fn outline_accepts_nested_subtopics() {
        let outline = parse_outline(TOC_REPLY).unwrap();

        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[0].title, "Cell Structure");
        assert_eq!(outline.sections[0].subtopics, vec!["Membrane", "Nucleus"]);
        assert!(outline.sections[1].subtopics.is_empty());
    }

    #[test]
    fn outline_object_and_plain_titles() {
        let reply = r#"{"sections": ["Introduction", {"name": "Methods"}]}"#;
        let outline = parse_outline(reply).unwrap();

        let titles: Vec<_> = outline.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "Methods"]);
    }

    #[test]
    fn reply_without_sections_is_malformed() {
        assert!(matches!(
            parse_outline("[]"),
            Err(AgentError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_outline("I could not find any headings."),
            Err(AgentError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn outline_is_capped_at_max_sections() {
        let stub = Arc::new(StubGenerator::replying(TOC_REPLY));
        let agent = OutlineGenerator::new(stub.clone());

        let output = agent
            .process(&payload(json!({"text": "Cells...", "max_sections": 1})))
            .await
            .unwrap();

        let AgentOutput::Outline(outline) = output else {
            panic!("expected outline");
        };
        assert_eq!(outline.sections.len(), 1);
        assert!(stub.prompts()[0].contains("at most 1 top-level sections"));
    }

    #[tokio::test]
    async fn section_limit_is_validated() {
        let stub = Arc::new(StubGenerator::replying(TOC_REPLY));
        let agent = OutlineGenerator::new(stub.clone());

        let result = agent
            .process(&payload(json!({"text": "t", "max_sections": 0})))
            .await;

        assert!(matches!(result, Err(AgentError::InvalidPayload(_))));
        assert_eq!(stub.call_count(), 0);
    }
}
