//! The content generator collaborator and an offline template implementation.

use async_trait::async_trait;
use prep_core::model::{
    ExamId, GeneratedFlashcard, GeneratedQuestion, Objective, ObjectiveId, QuestionStyle,
};
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;

/// What to generate next: decided by the engine, fulfilled by a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub exam_id: ExamId,
    pub objective: Objective,
    pub style: QuestionStyle,
    pub options_per_question: u8,
}

impl ContentRequest {
    #[must_use]
    pub fn objective_id(&self) -> &ObjectiveId {
        &self.objective.id
    }

    /// Objective title, or its id when untitled.
    #[must_use]
    pub fn topic(&self) -> &str {
        if self.objective.title.trim().is_empty() {
            self.objective.id.as_str()
        } else {
            &self.objective.title
        }
    }
}

/// Produces finished questions and flashcards for an objective.
///
/// `previous` holds earlier question texts or card fronts for the same
/// objective so implementations can avoid repeats.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GeneratorError` if no question can be produced.
    async fn generate_question(
        &self,
        request: &ContentRequest,
        previous: &[String],
    ) -> Result<GeneratedQuestion, GeneratorError>;

    /// # Errors
    ///
    /// Returns `GeneratorError` if no flashcard can be produced.
    async fn generate_flashcard(
        &self,
        request: &ContentRequest,
        previous: &[String],
    ) -> Result<GeneratedFlashcard, GeneratorError>;
}

/// Deterministic generator that fills fixed templates with the objective
/// title. Used offline and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    fn question_text(request: &ContentRequest, round: usize) -> String {
        let topic = request.topic();
        match request.style {
            QuestionStyle::Direct => {
                format!("Question {round}: which statement about {topic} is accurate?")
            }
            QuestionStyle::Scenario => format!(
                "Question {round}. A small platform team is reworking a service that depends on {topic}. \
                 They have a fixed budget and must ship before the end of the quarter. \
                 Which approach applies {topic} best here?"
            ),
            QuestionStyle::CaseStudy => format!(
                "Case {round}. A regional retailer runs its ordering system from a single data centre \
                 and has grown quickly over the last two years. Peak traffic during seasonal sales now \
                 exceeds what the current design handles, and two outages last year cost a measurable \
                 share of revenue. The leadership group wants a plan that relies on {topic} while keeping \
                 operating costs predictable and staying within existing compliance obligations. The \
                 engineering team is small, has limited experience with managed services, and cannot \
                 take on a long migration. Budget approval for the first phase is expected next month. \
                 Considering all of these constraints together, which plan \
                 should the architects recommend first?"
            ),
        }
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate_question(
        &self,
        request: &ContentRequest,
        previous: &[String],
    ) -> Result<GeneratedQuestion, GeneratorError> {
        let round = previous.len() + 1;
        let option_count = usize::from(request.options_per_question.max(2));
        let options = (1..=option_count)
            .map(|i| format!("Option {i} for {}", request.topic()))
            .collect();
        let question = GeneratedQuestion {
            objective_id: request.objective.id.clone(),
            style: request.style,
            text: Self::question_text(request, round),
            options,
            correct_index: previous.len() % option_count,
            explanation: format!("Review the key properties of {}.", request.topic()),
        };
        question.check()?;
        Ok(question)
    }

    async fn generate_flashcard(
        &self,
        request: &ContentRequest,
        previous: &[String],
    ) -> Result<GeneratedFlashcard, GeneratorError> {
        let topic = request.topic();
        Ok(GeneratedFlashcard {
            objective_id: request.objective.id.clone(),
            front: format!("Card {}: summarise {topic}", previous.len() + 1),
            back: format!("The main ideas and trade-offs of {topic}."),
            tags: vec![request.objective.level.as_str().to_owned()],
        })
    }
}
