//! QuickStudy API Library
//!
//! Prompt agents that turn a study document into slides, quizzes,
//! diagrams, image picks and tutor answers, plus the coordinator that
//! runs them concurrently and the HTTP layer in front of it.

pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
