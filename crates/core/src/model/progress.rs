use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::attempt::{
    AttemptRecord, FlashcardAttempt, FlashcardRecord, QuestionAttempt, QuestionRecord,
};
use crate::model::ids::ObjectiveId;

/// Fewer attempts than this (questions and flashcards combined) keep a
/// learner at `Novice` regardless of score.
pub const MIN_ATTEMPTS_FOR_MASTERY: u32 = 3;

const DEVELOPING_FLOOR: f64 = 60.0;
const PROFICIENT_FLOOR: f64 = 75.0;
const MASTERY_FLOOR: f64 = 90.0;

//
// ─── MASTERY LEVEL ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    Novice,
    Developing,
    Proficient,
    Mastery,
}

impl MasteryLevel {
    /// Classify a blended 0-100 score backed by `total_attempts` answers.
    #[must_use]
    pub fn classify(blended_score: f64, total_attempts: u32) -> Self {
        if total_attempts < MIN_ATTEMPTS_FOR_MASTERY || blended_score < DEVELOPING_FLOOR {
            Self::Novice
        } else if blended_score < PROFICIENT_FLOOR {
            Self::Developing
        } else if blended_score < MASTERY_FLOOR {
            Self::Proficient
        } else {
            Self::Mastery
        }
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Novice => "novice",
            Self::Developing => "developing",
            Self::Proficient => "proficient",
            Self::Mastery => "mastery",
        };
        f.write_str(label)
    }
}

//
// ─── OBJECTIVE PROGRESS ────────────────────────────────────────────────────────
//

/// Everything a session knows about one objective.
///
/// Counters are authoritative; `average_score`, `flashcard_mastery_score` and
/// `mastery_level` are derived and recomputed on every recorded attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    pub objective_id: ObjectiveId,
    pub questions_attempted: u32,
    pub questions_correct: u32,
    pub flashcards_attempted: u32,
    pub flashcards_mastered: u32,
    pub time_spent_secs: u64,
    /// Question accuracy on a 0-100 scale.
    pub average_score: f64,
    /// Mean flashcard rating on the 1-4 scale; 0 before the first card.
    pub flashcard_mastery_score: f64,
    pub mastery_level: MasteryLevel,
    pub last_studied: Option<DateTime<Utc>>,
    pub attempts: Vec<AttemptRecord>,
    #[serde(default)]
    flashcard_rating_sum: u32,
}

impl ObjectiveProgress {
    #[must_use]
    pub fn new(objective_id: ObjectiveId) -> Self {
        Self {
            objective_id,
            questions_attempted: 0,
            questions_correct: 0,
            flashcards_attempted: 0,
            flashcards_mastered: 0,
            time_spent_secs: 0,
            average_score: 0.0,
            flashcard_mastery_score: 0.0,
            mastery_level: MasteryLevel::Novice,
            last_studied: None,
            attempts: Vec::new(),
            flashcard_rating_sum: 0,
        }
    }

    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.questions_attempted + self.flashcards_attempted
    }

    /// Question records in the order they were answered.
    pub fn question_records(&self) -> impl Iterator<Item = &QuestionRecord> {
        self.attempts.iter().filter_map(AttemptRecord::as_question)
    }

    /// Flashcard mastery translated to 0-100 (`again` = 0, `easy` = 100).
    #[must_use]
    pub fn flashcard_percent(&self) -> f64 {
        if self.flashcards_attempted == 0 {
            return 0.0;
        }
        ((self.flashcard_mastery_score - 1.0) / 3.0 * 100.0).clamp(0.0, 100.0)
    }

    /// Question and flashcard scores weighted by how many of each were answered.
    #[must_use]
    pub fn blended_score(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            return 0.0;
        }
        let questions = f64::from(self.questions_attempted) * self.average_score;
        let cards = f64::from(self.flashcards_attempted) * self.flashcard_percent();
        (questions + cards) / f64::from(total)
    }

    pub(crate) fn push_question(&mut self, attempt: &QuestionAttempt, sequence: u32) {
        self.questions_attempted += 1;
        if attempt.correct {
            self.questions_correct += 1;
        }
        self.time_spent_secs += u64::from(attempt.time_spent_secs);
        self.last_studied = Some(attempt.answered_at);
        self.attempts.push(AttemptRecord::Question(QuestionRecord {
            ordinal: self.questions_attempted,
            sequence,
            correct: attempt.correct,
            time_spent_secs: attempt.time_spent_secs,
            difficulty: attempt.difficulty,
            style: attempt.style,
            answered_at: attempt.answered_at,
        }));
        self.recompute();
    }

    pub(crate) fn push_flashcard(&mut self, attempt: &FlashcardAttempt) {
        self.flashcards_attempted += 1;
        if attempt.rating.is_mastered() {
            self.flashcards_mastered += 1;
        }
        self.flashcard_rating_sum += u32::from(attempt.rating.score());
        self.time_spent_secs += u64::from(attempt.time_spent_secs);
        self.last_studied = Some(attempt.answered_at);
        self.attempts.push(AttemptRecord::Flashcard(FlashcardRecord {
            ordinal: self.flashcards_attempted,
            rating: attempt.rating,
            time_spent_secs: attempt.time_spent_secs,
            answered_at: attempt.answered_at,
        }));
        self.recompute();
    }

    fn recompute(&mut self) {
        self.average_score = if self.questions_attempted == 0 {
            0.0
        } else {
            f64::from(self.questions_correct) / f64::from(self.questions_attempted) * 100.0
        };
        self.flashcard_mastery_score = if self.flashcards_attempted == 0 {
            0.0
        } else {
            f64::from(self.flashcard_rating_sum) / f64::from(self.flashcards_attempted)
        };
        self.mastery_level = MasteryLevel::classify(self.blended_score(), self.total_attempts());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attempt::FlashcardRating;
    use crate::time::fixed_now;

    fn question(correct: bool) -> QuestionAttempt {
        QuestionAttempt::new(ObjectiveId::new("a"), correct, 30, fixed_now())
    }

    fn card(rating: FlashcardRating) -> FlashcardAttempt {
        FlashcardAttempt::new(ObjectiveId::new("a"), rating, 10, fixed_now())
    }

    #[test]
    fn classify_thresholds() {
        assert_eq!(MasteryLevel::classify(100.0, 2), MasteryLevel::Novice);
        assert_eq!(MasteryLevel::classify(59.9, 10), MasteryLevel::Novice);
        assert_eq!(MasteryLevel::classify(60.0, 3), MasteryLevel::Developing);
        assert_eq!(MasteryLevel::classify(75.0, 3), MasteryLevel::Proficient);
        assert_eq!(MasteryLevel::classify(90.0, 3), MasteryLevel::Mastery);
    }

    #[test]
    fn three_of_five_is_developing() {
        let mut progress = ObjectiveProgress::new(ObjectiveId::new("a"));
        for correct in [true, true, true, false, false] {
            progress.push_question(&question(correct), 0);
        }
        assert!((progress.average_score - 60.0).abs() < 1e-9);
        assert_eq!(progress.mastery_level, MasteryLevel::Developing);
        assert_eq!(progress.time_spent_secs, 150);
    }

    #[test]
    fn flashcards_average_on_one_to_four_scale() {
        let mut progress = ObjectiveProgress::new(ObjectiveId::new("a"));
        progress.push_flashcard(&card(FlashcardRating::Good));
        progress.push_flashcard(&card(FlashcardRating::Easy));
        assert!((progress.flashcard_mastery_score - 3.5).abs() < 1e-9);
        assert_eq!(progress.flashcards_mastered, 2);
        assert_eq!(progress.mastery_level, MasteryLevel::Novice);
    }

    #[test]
    fn blended_score_weights_by_channel_counts() {
        let mut progress = ObjectiveProgress::new(ObjectiveId::new("a"));
        progress.push_question(&question(true), 1);
        progress.push_flashcard(&card(FlashcardRating::Again));
        progress.push_flashcard(&card(FlashcardRating::Again));
        // (1 * 100 + 2 * 0) / 3
        assert!((progress.blended_score() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(progress.mastery_level, MasteryLevel::Novice);
    }

    #[test]
    fn ordinals_count_per_channel() {
        let mut progress = ObjectiveProgress::new(ObjectiveId::new("a"));
        progress.push_question(&question(true), 4);
        progress.push_flashcard(&card(FlashcardRating::Hard));
        progress.push_question(&question(false), 9);
        let ordinals: Vec<_> = progress.question_records().map(|q| (q.ordinal, q.sequence)).collect();
        assert_eq!(ordinals, vec![(1, 4), (2, 9)]);
    }
}
