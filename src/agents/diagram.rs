use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional_str, required_str};
use super::prompts::library;
use super::text::{strip_code_fences, truncate_chars};
use super::types::{AgentOutput, Diagram, DiagramArtifact, DiagramKind, Payload, TaskKind};
use crate::llm::{Generation, GenerationRequest, Modality, TextGenerator};

const MAX_CONTENT_CHARS: usize = 2000;
const MAX_STEPS: usize = 8;
const MAX_CONCEPTS: usize = 6;
const MAX_LABEL_CHARS: usize = 50;
const MAX_COMPARED_ITEMS: usize = 4;
const MAX_ASPECTS: usize = 6;

const MERMAID_HEADERS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "mindmap",
    "timeline",
];

/// Produces Mermaid source or a raster illustration for a topic
pub struct DiagramGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl DiagramGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    async fn mermaid(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::mermaid_diagram();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.2).await?;

        let source = strip_code_fences(&reply);
        if !is_mermaid(source) {
            return Err(AgentError::MalformedResponse(
                "diagram reply is not Mermaid source".to_string(),
            ));
        }

        Ok(markup(source.to_string()))
    }

    async fn flowchart(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::diagram_steps();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let steps = extract_steps(&reply);
        if steps.is_empty() {
            return Err(AgentError::MalformedResponse(
                "no steps found in diagram reply".to_string(),
            ));
        }

        Ok(markup(mermaid_flowchart(&steps)))
    }

    async fn concept_map(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::diagram_concepts();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let concepts = extract_concepts(&reply);
        if concepts.is_empty() {
            return Err(AgentError::MalformedResponse(
                "no concepts found in diagram reply".to_string(),
            ));
        }

        Ok(markup(mermaid_concept_map(topic, &concepts)))
    }

    async fn timeline(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::diagram_timeline();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let events = extract_events(&reply);
        if events.is_empty() {
            return Err(AgentError::MalformedResponse(
                "no dated events found in diagram reply".to_string(),
            ));
        }

        Ok(markup(mermaid_timeline(topic, &events)))
    }

    async fn comparison(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::diagram_comparison();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let table = parse_comparison(&reply).ok_or_else(|| {
            AgentError::MalformedResponse("diagram reply held no comparison table".to_string())
        })?;

        Ok(markup(mermaid_comparison(topic, &table)))
    }

    async fn raster(&self, topic: &str, content: &str) -> AgentResult<DiagramArtifact> {
        let template = library::diagram_image();
        let prompt = template.render_with(&[("topic", topic), ("content", content)]);
        let request = GenerationRequest::prompt(prompt).with_modality(Modality::Image);

        match self.generator.generate(request).await? {
            Generation::Image { mime_type, bytes } if !bytes.is_empty() => {
                Ok(DiagramArtifact::Raster {
                    mime_type,
                    data: STANDARD.encode(bytes),
                })
            }
            Generation::Image { .. } => Err(AgentError::MalformedResponse(
                "image reply was empty".to_string(),
            )),
            Generation::Text(_) => Err(AgentError::MalformedResponse(
                "expected an image, received text".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Agent for DiagramGenerator {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateDiagram
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let topic = required_str(payload, "topic")?;
        let content = truncate_chars(
            optional_str(payload, "content")?.unwrap_or("(none)"),
            MAX_CONTENT_CHARS,
        );
        let kind = match optional_str(payload, "type")? {
            Some(raw) => raw.parse::<DiagramKind>()?,
            None => DiagramKind::Mermaid,
        };

        let artifact = match kind {
            DiagramKind::Mermaid => self.mermaid(topic, content).await?,
            DiagramKind::Flowchart => self.flowchart(topic, content).await?,
            DiagramKind::ConceptMap => self.concept_map(topic, content).await?,
            DiagramKind::Timeline => self.timeline(topic, content).await?,
            DiagramKind::Comparison => self.comparison(topic, content).await?,
            DiagramKind::Image => self.raster(topic, content).await?,
        };

        tracing::info!(topic, ?kind, "diagram generated");

        Ok(AgentOutput::Diagram(Diagram {
            kind,
            topic: topic.to_string(),
            artifact,
        }))
    }
}

fn markup(source: String) -> DiagramArtifact {
    DiagramArtifact::Markup {
        language: "mermaid".to_string(),
        source,
    }
}

/// Whether `source` starts with a recognised Mermaid diagram header
pub fn is_mermaid(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
        .and_then(|line| line.split_whitespace().next())
        .is_some_and(|header| MERMAID_HEADERS.contains(&header))
}

fn clean_label(raw: &str) -> String {
    let label: String = raw
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '[' | '{' => '(',
            ']' | '}' => ')',
            c => c,
        })
        .collect();
    truncate_chars(label.trim(), MAX_LABEL_CHARS).trim().to_string()
}

/// Numbered or bulleted lines, with their markers removed
pub fn extract_steps(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '•' || c == '*')
        })
        .map(|line| line.trim_start_matches(|c: char| c.is_ascii_digit() || ".-•*) ".contains(c)))
        .map(clean_label)
        .filter(|step| !step.is_empty())
        .take(MAX_STEPS)
        .collect()
}

/// Bulleted terms, or failing that, capitalised words longer than three letters
pub fn extract_concepts(text: &str) -> Vec<String> {
    let bulleted = extract_steps(text);
    if !bulleted.is_empty() {
        return bulleted.into_iter().take(MAX_CONCEPTS).collect();
    }

    let mut concepts: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| ".,!?;:()\"'".contains(c));
        if word.chars().count() > 3 && word.chars().next().is_some_and(char::is_uppercase) {
            let word = clean_label(word);
            if !concepts.contains(&word) {
                concepts.push(word);
            }
            if concepts.len() >= MAX_CONCEPTS {
                break;
            }
        }
    }
    concepts
}

/// Top-down chain of steps
pub fn mermaid_flowchart(steps: &[String]) -> String {
    let mut code = String::from("graph TD\n");
    for (i, step) in steps.iter().enumerate() {
        code.push_str(&format!("    A{i}[\"{}\"]\n", clean_label(step)));
        if i > 0 {
            code.push_str(&format!("    A{} --> A{i}\n", i - 1));
        }
    }
    code
}

/// Star of concepts around a central topic
pub fn mermaid_concept_map(central: &str, concepts: &[String]) -> String {
    let mut code = String::from("graph LR\n");
    code.push_str(&format!("    A[\"{}\"]\n", clean_label(central)));
    for (i, concept) in concepts.iter().enumerate() {
        code.push_str(&format!("    B{i}[\"{}\"]\n", clean_label(concept)));
        code.push_str(&format!("    A --> B{i}\n"));
    }
    code
}

/// `period: event` pairs from a bulleted or numbered list
pub fn extract_events(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let line = ["- ", "* ", "• "]
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
                .unwrap_or(line);
            let (period, event) = line.split_once(':')?;
            let period = clean_label(period.trim_matches('*'));
            let event = clean_label(&event.replace(':', " -"));
            (!period.is_empty() && !event.is_empty()).then_some((period, event))
        })
        .take(MAX_STEPS)
        .collect()
}

/// Mermaid `timeline` with one period per line
pub fn mermaid_timeline(topic: &str, events: &[(String, String)]) -> String {
    let mut code = format!("timeline\n    title {}\n", clean_label(topic).replace(':', " -"));
    for (period, event) in events {
        code.push_str(&format!("    {period} : {event}\n"));
    }
    code
}

/// Items compared across named aspects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonTable {
    pub items: Vec<String>,
    /// Aspect name with one value per item
    pub rows: Vec<(String, Vec<String>)>,
}

fn table_cells(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if !line.contains('|') {
        return None;
    }
    Some(
        line.trim_matches('|')
            .split('|')
            .map(|cell| clean_label(cell.trim().trim_matches('*')))
            .collect(),
    )
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|cell| !cell.is_empty() && cell.chars().all(|c| c == '-' || c == ':' || c == ' '))
}

/// Parse a Markdown pipe table whose first column names the aspect.
/// Needs at least two items and one aspect row.
pub fn parse_comparison(text: &str) -> Option<ComparisonTable> {
    let mut rows = text
        .lines()
        .filter_map(table_cells)
        .filter(|cells| !is_separator_row(cells));

    let header = rows.next()?;
    let items: Vec<String> = header
        .into_iter()
        .skip(1)
        .filter(|item| !item.is_empty())
        .take(MAX_COMPARED_ITEMS)
        .collect();
    if items.len() < 2 {
        return None;
    }

    let rows: Vec<(String, Vec<String>)> = rows
        .filter_map(|cells| {
            let mut cells = cells.into_iter();
            let aspect = cells.next().filter(|a| !a.is_empty())?;
            let mut values: Vec<String> = cells.take(items.len()).collect();
            values.resize(items.len(), String::new());
            Some((aspect, values))
        })
        .take(MAX_ASPECTS)
        .collect();
    if rows.is_empty() {
        return None;
    }

    Some(ComparisonTable { items, rows })
}

/// Topic node pointing at one subgraph per compared item
pub fn mermaid_comparison(topic: &str, table: &ComparisonTable) -> String {
    let mut code = String::from("graph TB\n");
    code.push_str(&format!("    T[\"{}\"]\n", clean_label(topic)));
    for (i, item) in table.items.iter().enumerate() {
        code.push_str(&format!("    subgraph S{i}[\"{}\"]\n", clean_label(item)));
        for (j, (aspect, values)) in table.rows.iter().enumerate() {
            let value = values.get(i).map(String::as_str).unwrap_or_default();
            let label = if value.is_empty() { "n/a" } else { value };
            code.push_str(&format!("        S{i}R{j}[\"{aspect}: {label}\"]\n"));
        }
        code.push_str("    end\n");
        code.push_str(&format!("    T --> S{i}\n"));
    }
    code
}
