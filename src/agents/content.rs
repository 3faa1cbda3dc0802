use std::sync::Arc;

use async_trait::async_trait;

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional, optional_str, required_str};
use super::prompts::library;
use super::text::{chunk_text, dropped_chars, section_text, truncate_chars, without_fenced_blocks};
use super::types::{AgentOutput, Difficulty, OutlineSection, Payload, Slide, SlideDeck, TaskKind};
use crate::llm::TextGenerator;

pub const DEFAULT_CHUNK_CHARS: usize = 2000;
pub const DEFAULT_MAX_CHUNKS: usize = 4;
pub const MAX_SECTIONS: usize = 12;

/// One unit of source text to turn into a slide
struct SlideSource {
    section: Option<String>,
    /// How the slide's scope is described to the model
    focus: String,
    text: String,
    fallback_title: String,
}

/// Turns extracted document text into study slides, one per outline
/// section when an outline is given, otherwise one per chunk
pub struct ContentGenerator {
    generator: Arc<dyn TextGenerator>,
    chunk_chars: usize,
    max_chunks: usize,
}

impl ContentGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }

    pub fn with_chunking(mut self, chunk_chars: usize, max_chunks: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self.max_chunks = max_chunks.max(1);
        self
    }
}

#[async_trait]
impl Agent for ContentGenerator {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateContent
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let text = required_str(payload, "text")?;
        let instructions = optional_str(payload, "instructions")?;
        let sections: Vec<OutlineSection> = optional(payload, "sections")?.unwrap_or_default();
        let difficulty = detect_difficulty(instructions.unwrap_or_default());

        let sources = if sections.is_empty() {
            self.chunk_sources(text)
        } else {
            self.section_sources(text, &sections)
        };
        tracing::debug!(slides = sources.len(), %difficulty, "generating slides");

        let template = library::slide_content();
        let difficulty_label = difficulty.to_string();
        let mut slides = Vec::with_capacity(sources.len());

        for source in &sources {
            let prompt = template.render_with(&[
                ("section", source.focus.as_str()),
                ("difficulty", difficulty_label.as_str()),
                ("instructions", instructions.unwrap_or("none given")),
                ("text", source.text.as_str()),
            ]);
            let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.5).await?;
            let mut slide = parse_slide(&reply, &source.fallback_title)?;
            slide.section_title = source.section.clone();
            slides.push(slide);
        }

        Ok(AgentOutput::Slides(SlideDeck { difficulty, slides }))
    }
}

impl ContentGenerator {
    fn chunk_sources(&self, text: &str) -> Vec<SlideSource> {
        let chunks = chunk_text(text, self.chunk_chars, self.max_chunks);
        let dropped = dropped_chars(text, &chunks);
        if dropped > 0 {
            tracing::warn!(
                dropped_chars = dropped,
                max_chunks = self.max_chunks,
                chunk_chars = self.chunk_chars,
                "document longer than the slide budget, trailing text ignored"
            );
        }

        chunks
            .into_iter()
            .enumerate()
            .map(|(idx, chunk)| SlideSource {
                section: None,
                focus: "whole document".to_string(),
                text: chunk,
                fallback_title: format!("Slide {}", idx + 1),
            })
            .collect()
    }

    fn section_sources(&self, text: &str, sections: &[OutlineSection]) -> Vec<SlideSource> {
        if sections.len() > MAX_SECTIONS {
            tracing::warn!(
                sections = sections.len(),
                kept = MAX_SECTIONS,
                "outline has more sections than slides allowed, extra sections ignored"
            );
        }
        let sections = &sections[..sections.len().min(MAX_SECTIONS)];

        sections
            .iter()
            .enumerate()
            .map(|(idx, section)| {
                let next = sections.get(idx + 1).map(|s| s.title.as_str());
                let body = section_text(text, &section.title, next, self.chunk_chars)
                    .unwrap_or_else(|| {
                        tracing::debug!(section = %section.title, "heading not found, using document start");
                        truncate_chars(text, self.chunk_chars).to_string()
                    });
                let focus = if section.subtopics.is_empty() {
                    section.title.clone()
                } else {
                    format!("{} (covering: {})", section.title, section.subtopics.join(", "))
                };

                SlideSource {
                    section: Some(section.title.clone()),
                    focus,
                    text: body,
                    fallback_title: section.title.clone(),
                }
            })
            .collect()
    }
}

/// Infer the audience level from the learner's own instructions
pub fn detect_difficulty(instructions: &str) -> Difficulty {
    let lower = instructions.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if mentions(&["simple", "easy", "basic", "beginner"]) {
        Difficulty::Beginner
    } else if mentions(&["quick", "fast", "overview"]) {
        Difficulty::QuickOverview
    } else if mentions(&["detailed", "comprehensive", "advanced"]) {
        Difficulty::Advanced
    } else {
        Difficulty::Standard
    }
}

fn bullet_body(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "• "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map(str::trim)
}

/// Search phrase from an `Image: ...` line
fn image_line(line: &str) -> Option<String> {
    let line = line.trim_start_matches(|c: char| c == '*' || c == '_');
    ["image prompt:", "image:"].iter().find_map(|prefix| {
        let head = line.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix).then(|| {
            line[prefix.len()..]
                .trim_matches(|c: char| c.is_whitespace() || "*_\"'".contains(c))
                .to_string()
        })
    })
}

/// Parse a Markdown-ish slide reply into a [`Slide`]
pub fn parse_slide(reply: &str, fallback_title: &str) -> AgentResult<Slide> {
    let prose = without_fenced_blocks(reply);
    let mut title: Option<String> = None;
    let mut image_prompt: Option<String> = None;
    let mut paragraphs: Vec<&str> = Vec::new();
    let mut key_points = Vec::new();

    for line in prose.lines() {
        let trimmed = line.trim();

        if let Some(phrase) = image_line(trimmed) {
            image_prompt = Some(phrase).filter(|p| !p.is_empty());
            continue;
        }

        if title.is_none() && !trimmed.is_empty() {
            if let Some(heading) = trimmed.strip_prefix('#') {
                title = Some(heading.trim_start_matches('#').trim().replace("**", ""));
                continue;
            }
            if bullet_body(trimmed).is_none() && trimmed.chars().count() <= 80 {
                title = Some(trimmed.trim_matches('*').trim().to_string());
                continue;
            }
            title = Some(fallback_title.to_string());
        }

        match bullet_body(trimmed) {
            Some(point) if !point.is_empty() => key_points.push(point.to_string()),
            Some(_) => {}
            None => paragraphs.push(trimmed),
        }
    }

    let content = paragraphs
        .split(|line| line.is_empty())
        .filter(|block| !block.is_empty())
        .map(|block| block.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n");

    let title = title.unwrap_or_else(|| fallback_title.to_string());
    if content.is_empty() && key_points.is_empty() {
        return Err(AgentError::MalformedResponse(
            "slide reply had no explanatory content".to_string(),
        ));
    }

    Ok(Slide {
        title,
        content,
        key_points,
        section_title: None,
        image_prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationError, StubGenerator};
    use serde_json::json;

    const SLIDE_REPLY: &str = "# Photosynthesis\n\
        Plants turn light energy into chemical energy stored in glucose.\n\
        This happens inside chloroplasts.\n\n\
        Oxygen is released as a by-product.\n\
        - Chlorophyll absorbs mostly red and blue light.\n\
        - The Calvin cycle fixes carbon dioxide.\n\
        Image: chloroplast cross-section diagram";

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn difficulty_follows_instructions() {
        assert_eq!(detect_difficulty("Make it simple please"), Difficulty::Beginner);
        assert_eq!(detect_difficulty("a quick study session"), Difficulty::QuickOverview);
        assert_eq!(detect_difficulty("Comprehensive exam prep"), Difficulty::Advanced);
        assert_eq!(detect_difficulty(""), Difficulty::Standard);
    }

    #[test]
    fn slide_reply_is_structured() {
        let slide = parse_slide(SLIDE_REPLY, "Slide 1").unwrap();

        assert_eq!(slide.title, "Photosynthesis");
        assert_eq!(
            slide.content,
            "Plants turn light energy into chemical energy stored in glucose. \
             This happens inside chloroplasts.\n\nOxygen is released as a by-product."
        );
        assert_eq!(slide.key_points.len(), 2);
        assert!(slide.key_points[1].starts_with("The Calvin cycle"));
        assert_eq!(slide.image_prompt.as_deref(), Some("chloroplast cross-section diagram"));
        assert_eq!(slide.section_title, None);
    }

    #[test]
    fn image_line_variants() {
        assert_eq!(image_line("**Image prompt:** \"red blood cells\"").as_deref(), Some("red blood cells"));
        assert_eq!(image_line("IMAGE: volcano"), Some("volcano".to_string()));
        assert_eq!(image_line("Imagery matters in poems"), None);
    }

    #[test]
    fn long_first_line_gets_fallback_title() {
        let reply = "This opening sentence is far too long to be a heading because it keeps explaining things at length.";
        let slide = parse_slide(reply, "Slide 3").unwrap();

        assert_eq!(slide.title, "Slide 3");
        assert!(slide.content.starts_with("This opening sentence"));
    }

    #[test]
    fn fenced_blocks_do_not_leak_into_slides() {
        let reply = "# Cells\nCells are the unit of life.\n```json\n[{\"q\": 1}]\n```";
        let slide = parse_slide(reply, "Slide 1").unwrap();
        assert_eq!(slide.content, "Cells are the unit of life.");
    }

    #[test]
    fn title_only_reply_is_malformed() {
        let result = parse_slide("# Just a title", "Slide 1");
        assert!(matches!(result, Err(AgentError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn one_slide_per_chunk() {
        let stub = Arc::new(StubGenerator::replying(SLIDE_REPLY));
        let agent = ContentGenerator::new(stub.clone()).with_chunking(21, 4);

        let output = agent
            .process(&payload(json!({
                "text": "first paragraph here\nsecond paragraph here",
                "instructions": "keep it basic"
            })))
            .await
            .unwrap();

        let AgentOutput::Slides(deck) = output else {
            panic!("expected slides");
        };
        assert_eq!(deck.difficulty, Difficulty::Beginner);
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(stub.call_count(), 2);
        assert!(stub.prompts()[0].contains("Audience level: Beginner"));
        assert!(stub.prompts()[1].contains("second paragraph here"));
    }

    #[tokio::test]
    async fn one_slide_per_outline_section() {
        let stub = Arc::new(StubGenerator::replying("Cells divide to grow.\n- Mitosis makes two cells."));
        let agent = ContentGenerator::new(stub.clone());
        let document = "Preface\n## Cell Structure\nMembranes enclose cells.\n## Cell Division\nMitosis copies cells.";

        let output = agent
            .process(&payload(json!({
                "text": document,
                "sections": [
                    {"title": "Cell Structure", "subtopics": ["Membrane"]},
                    {"title": "Cell Division"}
                ]
            })))
            .await
            .unwrap();

        let AgentOutput::Slides(deck) = output else {
            panic!("expected slides");
        };
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[0].section_title.as_deref(), Some("Cell Structure"));
        assert_eq!(deck.slides[1].section_title.as_deref(), Some("Cell Division"));

        let prompts = stub.prompts();
        assert!(prompts[0].contains("Section: Cell Structure (covering: Membrane)"));
        assert!(prompts[0].contains("Membranes enclose cells."));
        assert!(!prompts[0].contains("Mitosis copies cells."));
        assert!(prompts[1].contains("Mitosis copies cells."));
    }

    #[tokio::test]
    async fn unmatched_section_uses_document_start() {
        let stub = Arc::new(StubGenerator::replying(SLIDE_REPLY));
        let agent = ContentGenerator::new(stub.clone()).with_chunking(12, 4);

        agent
            .process(&payload(json!({
                "text": "Opening text of the notes",
                "sections": [{"title": "Nonexistent Heading"}]
            })))
            .await
            .unwrap();

        assert!(stub.prompts()[0].contains("Text:\nOpening text"));
        assert!(!stub.prompts()[0].contains("of the notes"));
    }

    #[tokio::test]
    async fn missing_text_is_invalid_payload() {
        let stub = Arc::new(StubGenerator::replying(SLIDE_REPLY));
        let agent = ContentGenerator::new(stub.clone());

        let result = agent.process(&payload(json!({"instructions": "x"}))).await;

        assert!(matches!(result, Err(AgentError::InvalidPayload(_))));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn service_failure_is_external() {
        let stub = Arc::new(StubGenerator::failing(GenerationError::Status {
            status: 429,
            body: "rate limited".to_string(),
        }));
        let agent = ContentGenerator::new(stub);

        let result = agent.process(&payload(json!({"text": "Some notes"}))).await;
        assert!(matches!(result, Err(AgentError::ExternalService(_))));
    }
}
