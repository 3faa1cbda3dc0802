use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::base::{ask_text, Agent};
use super::errors::{AgentError, AgentResult};
use super::payload::{optional_str, required_str};
use super::prompts::library;
use super::text::extract_json;
use super::types::{AgentOutput, AnswerEvaluation, Payload, TaskKind};
use crate::llm::TextGenerator;

pub const MAX_SCORE: u8 = 10;

/// Scores free-text quiz answers against an ideal answer
pub struct AnswerEvaluator {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerEvaluator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Agent for AnswerEvaluator {
    fn kind(&self) -> TaskKind {
        TaskKind::EvaluateAnswer
    }

    async fn process(&self, payload: &Payload) -> AgentResult<AgentOutput> {
        let question = required_str(payload, "question")?;
        let answer = required_str(payload, "answer")?;
        let ideal = optional_str(payload, "ideal_answer")?.unwrap_or("not provided");

        let template = library::answer_evaluation();
        let prompt = template.render_with(&[
            ("question", question),
            ("ideal_answer", ideal),
            ("answer", answer),
        ]);
        let reply = ask_text(self.generator.as_ref(), &template, prompt, 0.2).await?;

        Ok(AgentOutput::Evaluation(parse_evaluation(&reply)?))
    }
}

pub fn parse_evaluation(reply: &str) -> AgentResult<AnswerEvaluation> {
    let malformed = |msg: &str| AgentError::MalformedResponse(format!("evaluation {msg}"));

    let body = extract_json(reply).ok_or_else(|| malformed("reply contained no JSON"))?;
    let value: Value = serde_json::from_str(body).map_err(|_| malformed("JSON is invalid"))?;

    let score = match &value["score"] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("/10").trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| malformed("is missing a numeric score"))?;

    let feedback = value["feedback"]
        .as_str()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| malformed("is missing feedback"))?;

    Ok(AnswerEvaluation {
        score: score.round().clamp(0.0, f64::from(MAX_SCORE)) as u8,
        feedback: feedback.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubGenerator;
    use serde_json::json;

    #[test]
    fn scores_are_rounded_and_clamped() {
        let eval = parse_evaluation(r#"{"score": 7.6, "feedback": "Good coverage."}"#).unwrap();
        assert_eq!(eval.score, 8);

        let eval = parse_evaluation(r#"{"score": 14, "feedback": "Generous."}"#).unwrap();
        assert_eq!(eval.score, MAX_SCORE);

        let eval = parse_evaluation(r#"{"score": "6/10", "feedback": "Partial."}"#).unwrap();
        assert_eq!(eval.score, 6);
    }

    #[test]
    fn missing_parts_are_malformed() {
        assert!(parse_evaluation(r#"{"feedback": "no score"}"#).is_err());
        assert!(parse_evaluation(r#"{"score": 5}"#).is_err());
        assert!(parse_evaluation("You did great!").is_err());
    }

    #[tokio::test]
    async fn evaluates_short_answer() {
        let stub = Arc::new(StubGenerator::replying(
            "```json\n{\"score\": 9, \"feedback\": \"Accurate and complete.\"}\n```",
        ));
        let agent = AnswerEvaluator::new(stub.clone());
        let payload = json!({
            "question": "What is osmosis?",
            "answer": "Water moving across a membrane",
            "ideal_answer": "Diffusion of water through a semi-permeable membrane"
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        let output = agent.process(&payload).await.unwrap();

        assert_eq!(
            output,
            AgentOutput::Evaluation(AnswerEvaluation {
                score: 9,
                feedback: "Accurate and complete.".to_string()
            })
        );
        assert!(stub.prompts()[0].contains("Student answer: Water moving across a membrane"));
    }
}
