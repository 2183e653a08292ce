use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::distribution::QuestionStyle;
use crate::model::ids::ObjectiveId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentError {
    #[error("question needs at least two options, got {0}")]
    TooFewOptions(usize),
    #[error("correct index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
    #[error("selected option {index} is out of range for {len} options")]
    SelectionOutOfRange { index: usize, len: usize },
    #[error("no question is being shown")]
    NotAnswerable,
}

/// Multiple-choice question produced by the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub objective_id: ObjectiveId,
    pub style: QuestionStyle,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
}

impl GeneratedQuestion {
    /// Check the structural shape the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` when options are missing or the answer index is out of range.
    pub fn check(&self) -> Result<(), ContentError> {
        if self.options.len() < 2 {
            return Err(ContentError::TooFewOptions(self.options.len()));
        }
        if self.correct_index >= self.options.len() {
            return Err(ContentError::CorrectIndexOutOfRange {
                index: self.correct_index,
                len: self.options.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFlashcard {
    pub objective_id: ObjectiveId,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A finished item from the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StudyItem {
    Question(GeneratedQuestion),
    Flashcard(GeneratedFlashcard),
}

impl StudyItem {
    #[must_use]
    pub fn objective_id(&self) -> &ObjectiveId {
        match self {
            Self::Question(q) => &q.objective_id,
            Self::Flashcard(c) => &c.objective_id,
        }
    }
}

/// What the presentation layer is currently showing for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContentState {
    Loading,
    /// Generator output received so far.
    Streaming { partial: String },
    Question { item: StudyItem },
    Result {
        question: GeneratedQuestion,
        selected_index: usize,
        correct: bool,
    },
}

impl ContentState {
    /// Grade a selection against the shown question and move to `Result`.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::NotAnswerable` unless a question is shown, and
    /// `SelectionOutOfRange` for an index past the option list.
    pub fn answer(self, selected_index: usize) -> Result<Self, ContentError> {
        let Self::Question {
            item: StudyItem::Question(question),
        } = self
        else {
            return Err(ContentError::NotAnswerable);
        };
        if selected_index >= question.options.len() {
            return Err(ContentError::SelectionOutOfRange {
                index: selected_index,
                len: question.options.len(),
            });
        }
        let correct = selected_index == question.correct_index;
        Ok(Self::Result {
            question,
            selected_index,
            correct,
        })
    }

    /// Append a streamed chunk; any other state starts a fresh stream.
    #[must_use]
    pub fn push_chunk(self, chunk: &str) -> Self {
        match self {
            Self::Streaming { mut partial } => {
                partial.push_str(chunk);
                Self::Streaming { partial }
            }
            _ => Self::Streaming {
                partial: chunk.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> GeneratedQuestion {
        GeneratedQuestion {
            objective_id: ObjectiveId::new("1"),
            style: QuestionStyle::Direct,
            text: "Which port does HTTPS use?".into(),
            options: vec!["80".into(), "443".into(), "22".into(), "25".into()],
            correct_index: 1,
            explanation: String::new(),
        }
    }

    #[test]
    fn answering_a_question_produces_result() {
        let state = ContentState::Question {
            item: StudyItem::Question(question()),
        };
        let ContentState::Result { correct, selected_index, .. } = state.answer(1).unwrap() else {
            panic!("expected result state");
        };
        assert!(correct);
        assert_eq!(selected_index, 1);
    }

    #[test]
    fn answering_while_loading_fails() {
        assert_eq!(ContentState::Loading.answer(0), Err(ContentError::NotAnswerable));
    }

    #[test]
    fn out_of_range_selection_fails() {
        let state = ContentState::Question {
            item: StudyItem::Question(question()),
        };
        assert!(matches!(
            state.answer(9),
            Err(ContentError::SelectionOutOfRange { index: 9, len: 4 })
        ));
    }

    #[test]
    fn chunks_accumulate() {
        let state = ContentState::Loading.push_chunk("Which ").push_chunk("port?");
        assert_eq!(
            state,
            ContentState::Streaming {
                partial: "Which port?".into()
            }
        );
    }

    #[test]
    fn check_rejects_bad_index() {
        let mut q = question();
        q.correct_index = 4;
        assert!(q.check().is_err());
        q.options.truncate(1);
        assert_eq!(q.check(), Err(ContentError::TooFewOptions(1)));
    }
}
