mod attempt;
mod distribution;
mod exam;
mod ids;
mod item;
mod progress;
mod session;

pub use ids::{ExamId, ObjectiveId, ParseIdError, SessionId};

pub use attempt::{
    AttemptError, AttemptRecord, FlashcardAttempt, FlashcardRating, FlashcardRecord,
    QuestionAttempt, QuestionRecord,
};
pub use distribution::{QuestionStyle, StyleCounts, StyleDistributionState};
pub use exam::{
    CognitiveLevel, Difficulty, ExamProfile, ExamProfileDraft, ExamProfileError, Objective,
    StudySettings,
};
pub use item::{ContentError, ContentState, GeneratedFlashcard, GeneratedQuestion, StudyItem};
pub use progress::{MIN_ATTEMPTS_FOR_MASTERY, MasteryLevel, ObjectiveProgress};
pub use session::{ExamTimer, StudyMode, StudySession, StudySessionConfig};
