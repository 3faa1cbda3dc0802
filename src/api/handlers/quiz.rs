use axum::Json;
use serde::{Deserialize, Serialize};

use crate::agents::grade_choice;
use crate::agents::types::QuizQuestion;
use crate::api::errors::ApiError;

/// Request body for grading one answered question
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub question: QuizQuestion,
    #[serde(default)]
    pub selected: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub correct: bool,
    pub correct_answers: Vec<String>,
}

/// Grade a choice question locally
///
/// POST /api/quiz/grade
pub async fn grade(Json(req): Json<GradeRequest>) -> Result<Json<GradeResponse>, ApiError> {
    let correct = grade_choice(&req.question, &req.selected).ok_or_else(|| {
        ApiError::bad_request("Short answer questions are graded with an evaluate_answer task")
    })?;

    Ok(Json(GradeResponse {
        correct,
        correct_answers: req.question.correct_answers,
    }))
}
