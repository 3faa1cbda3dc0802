use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional_str, optional_u64, required_str};
use super::prompts::library;
use super::text::{extract_json, truncate_chars};
use super::types::{AgentOutput, Payload, QuestionType, Quiz, QuizQuestion, TaskKind};
use crate::llm::TextGenerator;

pub const DEFAULT_QUESTION_COUNT: u64 = 5;
pub const MAX_QUESTION_COUNT: u64 = 10;
const MAX_SOURCE_CHARS: usize = 4000;

/// Writes quiz questions about a piece of document text
pub struct QuizCreator {
    generator: Arc<dyn TextGenerator>,
}

impl QuizCreator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Agent for QuizCreator {
    fn kind(&self) -> TaskKind {
        TaskKind::CreateQuiz
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let text = match optional_str(payload, "content")? {
            Some(content) if !payload.contains_key("text") => content,
            _ => required_str(payload, "text")?,
        };
        let count = optional_u64(payload, "count")?.unwrap_or(DEFAULT_QUESTION_COUNT);
        if !(1..=MAX_QUESTION_COUNT).contains(&count) {
            return Err(AgentError::invalid_field(
                "count",
                format!("must be between 1 and {MAX_QUESTION_COUNT}"),
            ));
        }

        let template = library::quiz_creation();
        let prompt = template.render_with(&[
            ("count", count.to_string().as_str()),
            ("text", truncate_chars(text, MAX_SOURCE_CHARS)),
        ]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.3).await?;

        let mut quiz = parse_quiz(&reply)?;
        quiz.questions.truncate(count as usize);
        Ok(AgentOutput::Quiz(quiz))
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(alias = "prompt", alias = "text")]
    question: Option<String>,
    #[serde(rename = "type", alias = "question_type")]
    kind: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(alias = "correct_answer", alias = "correct_answers", alias = "ideal_answer")]
    answer: Option<Value>,
    explanation: Option<String>,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Option at a 1-based position, as numbered in the prompt
fn option_number(number: u64, options: &[String]) -> Option<String> {
    let idx = usize::try_from(number.checked_sub(1)?).ok()?;
    options.get(idx).cloned()
}

/// Map an answer given as option text, letter, or 1-based number onto an option
fn resolve_option(answer: &Value, options: &[String]) -> Option<String> {
    match answer {
        Value::Number(n) => n.as_u64().and_then(|number| option_number(number, options)),
        Value::String(s) => {
            let wanted = normalize(s);
            if let Some(found) = options.iter().find(|o| normalize(o) == wanted) {
                return Some(found.clone());
            }
            if let Ok(number) = wanted.parse::<u64>() {
                return option_number(number, options);
            }
            let letter = wanted.trim_end_matches(&[')', '.', ':'][..]);
            let mut chars = letter.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() => {
                    options.get((c as u8 - b'a') as usize).cloned()
                }
                _ => options
                    .iter()
                    .find(|o| normalize(o).starts_with(&format!("{letter})")))
                    .cloned(),
            }
        }
        _ => None,
    }
}

fn convert(raw: RawQuestion) -> Option<QuizQuestion> {
    let question = raw.question.map(|q| q.trim().to_string()).filter(|q| !q.is_empty())?;
    let answer = raw.answer?;
    let options: Vec<String> = raw
        .options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    let question_type = match raw.kind.as_deref().map(normalize).as_deref() {
        Some("multiple_choice") => QuestionType::MultipleChoice,
        Some("multi_select") => QuestionType::MultiSelect,
        Some("short_answer") => QuestionType::ShortAnswer,
        _ if options.is_empty() => QuestionType::ShortAnswer,
        _ if matches!(&answer, Value::Array(items) if items.len() > 1) => QuestionType::MultiSelect,
        _ => QuestionType::MultipleChoice,
    };

    let correct_answers = match question_type {
        QuestionType::ShortAnswer => match &answer {
            Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => return None,
        },
        _ => {
            let answers: Vec<String> = match &answer {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|a| resolve_option(a, &options))
                    .collect(),
                other => resolve_option(other, &options).into_iter().collect(),
            };
            if options.len() < 2 || answers.is_empty() {
                return None;
            }
            if question_type == QuestionType::MultipleChoice && answers.len() != 1 {
                return None;
            }
            answers
        }
    };

    Some(QuizQuestion {
        question,
        question_type,
        options,
        correct_answers,
        explanation: raw.explanation.filter(|e| !e.trim().is_empty()),
    })
}

/// Parse a model reply into quiz questions, dropping unusable entries
pub fn parse_quiz(reply: &str) -> AgentResult<Quiz> {
    let body = extract_json(reply)
        .ok_or_else(|| AgentError::MalformedResponse("quiz reply contained no JSON".to_string()))?;
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AgentError::MalformedResponse(format!("quiz JSON is invalid: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let questions: Vec<QuizQuestion> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawQuestion>(item).ok())
        .filter_map(convert)
        .collect();

    if questions.len() < total {
        tracing::debug!(dropped = total - questions.len(), "skipped unusable quiz questions");
    }
    if questions.is_empty() {
        return Err(AgentError::MalformedResponse(
            "quiz reply contained no usable questions".to_string(),
        ));
    }

    Ok(Quiz { questions })
}

/// Check a choice answer locally. Short answers need the evaluator agent.
pub fn grade_choice(question: &QuizQuestion, selected: &[String]) -> Option<bool> {
    let mut chosen: Vec<String> = selected.iter().map(|s| normalize(s)).collect();
    let mut expected: Vec<String> = question.correct_answers.iter().map(|s| normalize(s)).collect();
    chosen.sort();
    chosen.dedup();
    expected.sort();
    expected.dedup();

    match question.question_type {
        QuestionType::MultipleChoice => Some(chosen.len() == 1 && chosen == expected),
        QuestionType::MultiSelect => Some(chosen == expected),
        QuestionType::ShortAnswer => None,
    }
}
