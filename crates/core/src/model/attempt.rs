use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::distribution::QuestionStyle;
use crate::model::exam::Difficulty;
use crate::model::ids::ObjectiveId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("invalid flashcard rating value: {0}")]
    InvalidRating(u8),
}

//
// ─── FLASHCARD RATING ─────────────────────────────────────────────────────────
//

/// Four-level self assessment given after flipping a flashcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashcardRating {
    /// Could not recall the back of the card.
    Again,
    /// Recalled with significant effort.
    Hard,
    /// Recalled correctly.
    Good,
    /// Recalled instantly.
    Easy,
}

impl FlashcardRating {
    /// Converts the 1-4 numeric scale to a rating.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidRating` if the value is not in 1-4.
    pub fn from_score(value: u8) -> Result<Self, AttemptError> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            _ => Err(AttemptError::InvalidRating(value)),
        }
    }

    /// Maps the rating onto the 1-4 mastery scale.
    #[must_use]
    pub fn score(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// `Good` and `Easy` count as a mastered card.
    #[must_use]
    pub fn is_mastered(self) -> bool {
        matches!(self, Self::Good | Self::Easy)
    }
}

//
// ─── INCOMING ATTEMPTS ────────────────────────────────────────────────────────
//

/// A finished multiple-choice answer handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAttempt {
    pub objective_id: ObjectiveId,
    pub correct: bool,
    pub time_spent_secs: u32,
    pub difficulty: Option<Difficulty>,
    pub style: Option<QuestionStyle>,
    pub answered_at: DateTime<Utc>,
}

impl QuestionAttempt {
    #[must_use]
    pub fn new(
        objective_id: ObjectiveId,
        correct: bool,
        time_spent_secs: u32,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            objective_id,
            correct,
            time_spent_secs,
            difficulty: None,
            style: None,
            answered_at,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: QuestionStyle) -> Self {
        self.style = Some(style);
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

/// A flashcard flip rated by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardAttempt {
    pub objective_id: ObjectiveId,
    pub rating: FlashcardRating,
    pub time_spent_secs: u32,
    pub answered_at: DateTime<Utc>,
}

impl FlashcardAttempt {
    #[must_use]
    pub fn new(
        objective_id: ObjectiveId,
        rating: FlashcardRating,
        time_spent_secs: u32,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            objective_id,
            rating,
            time_spent_secs,
            answered_at,
        }
    }
}

//
// ─── ATTEMPT LOG ──────────────────────────────────────────────────────────────
//

/// One logged question answer. `ordinal` counts questions within the
/// objective, `sequence` counts answers across the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub ordinal: u32,
    pub sequence: u32,
    pub correct: bool,
    pub time_spent_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<QuestionStyle>,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardRecord {
    pub ordinal: u32,
    pub rating: FlashcardRating,
    pub time_spent_secs: u32,
    pub answered_at: DateTime<Utc>,
}

/// Entry in an objective's ordered attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptRecord {
    Question(QuestionRecord),
    Flashcard(FlashcardRecord),
}

impl AttemptRecord {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        match self {
            Self::Question(q) => q.correct,
            Self::Flashcard(f) => f.rating.is_mastered(),
        }
    }

    #[must_use]
    pub fn as_question(&self) -> Option<&QuestionRecord> {
        match self {
            Self::Question(q) => Some(q),
            Self::Flashcard(_) => None,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
