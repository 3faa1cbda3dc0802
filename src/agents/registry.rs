use std::sync::Arc;

use super::base::Agent;
use super::chat::ChatAssistant;
use super::content::ContentGenerator;
use super::diagram::DiagramGenerator;
use super::evaluator::AnswerEvaluator;
use super::image::ImageSelector;
use super::outline::OutlineGenerator;
use super::quiz::QuizCreator;
use super::types::TaskKind;
use crate::llm::TextGenerator;

/// Closed mapping from task kind to the agent that serves it.
///
/// Every lookup is an exhaustive `match` on [`TaskKind`], so a new kind
/// cannot be added without deciding where its agent lives. A slot left
/// empty makes tasks of that kind fail with `UnknownAgentKind`.
#[derive(Clone, Default)]
pub struct AgentSet {
    outline: Option<Arc<dyn Agent>>,
    content: Option<Arc<dyn Agent>>,
    chat: Option<Arc<dyn Agent>>,
    quiz: Option<Arc<dyn Agent>>,
    diagram: Option<Arc<dyn Agent>>,
    images: Option<Arc<dyn Agent>>,
    evaluator: Option<Arc<dyn Agent>>,
}

impl AgentSet {
    /// No agents registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// All built-in agents sharing one generation backend
    pub fn standard(generator: Arc<dyn TextGenerator>) -> Self {
        Self::empty()
            .with(Arc::new(OutlineGenerator::new(generator.clone())))
            .with(Arc::new(ContentGenerator::new(generator.clone())))
            .with(Arc::new(ChatAssistant::new(generator.clone())))
            .with(Arc::new(QuizCreator::new(generator.clone())))
            .with(Arc::new(DiagramGenerator::new(generator.clone())))
            .with(Arc::new(ImageSelector::new(generator.clone())))
            .with(Arc::new(AnswerEvaluator::new(generator)))
    }

    /// Register `agent` in the slot for the kind it reports
    pub fn with(mut self, agent: Arc<dyn Agent>) -> Self {
        let kind = agent.kind();
        *self.slot_mut(kind) = Some(agent);
        self
    }

    pub fn without(mut self, kind: TaskKind) -> Self {
        *self.slot_mut(kind) = None;
        self
    }

    pub fn resolve(&self, kind: TaskKind) -> Option<Arc<dyn Agent>> {
        let slot = match kind {
            TaskKind::GenerateOutline => &self.outline,
            TaskKind::GenerateContent => &self.content,
            TaskKind::AnswerQuery => &self.chat,
            TaskKind::CreateQuiz => &self.quiz,
            TaskKind::GenerateDiagram => &self.diagram,
            TaskKind::SelectImage => &self.images,
            TaskKind::EvaluateAnswer => &self.evaluator,
        };
        slot.clone()
    }

    /// Kinds that currently have an agent
    pub fn registered(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.resolve(*kind).is_some())
            .collect()
    }

    fn slot_mut(&mut self, kind: TaskKind) -> &mut Option<Arc<dyn Agent>> {
        match kind {
            TaskKind::GenerateOutline => &mut self.outline,
            TaskKind::GenerateContent => &mut self.content,
            TaskKind::AnswerQuery => &mut self.chat,
            TaskKind::CreateQuiz => &mut self.quiz,
            TaskKind::GenerateDiagram => &mut self.diagram,
            TaskKind::SelectImage => &mut self.images,
            TaskKind::EvaluateAnswer => &mut self.evaluator,
        }
    }
}

impl std::fmt::Debug for AgentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSet")
            .field("registered", &self.registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubGenerator;

    #[test]
    fn standard_set_covers_every_kind() {
        let agents = AgentSet::standard(Arc::new(StubGenerator::replying("x")));

        assert_eq!(agents.registered(), TaskKind::ALL.to_vec());
        for kind in TaskKind::ALL {
            let agent = agents.resolve(kind).unwrap();
            assert_eq!(agent.kind(), kind);
        }
    }

    #[test]
    fn removed_slot_resolves_to_none() {
        let agents = AgentSet::standard(Arc::new(StubGenerator::replying("x")))
            .without(TaskKind::SelectImage);

        assert!(agents.resolve(TaskKind::SelectImage).is_none());
        assert!(agents.resolve(TaskKind::CreateQuiz).is_some());
        assert_eq!(agents.registered().len(), TaskKind::ALL.len() - 1);
    }

    #[test]
    fn empty_set_has_nothing() {
        assert!(AgentSet::empty().registered().is_empty());
    }
}
