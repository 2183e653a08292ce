//! Single-writer state machine over `StudySession`.

use tracing::{debug, info, warn};

use crate::error::ConfigurationError;
use crate::model::{
    ExamProfile, ExamTimer, FlashcardAttempt, MasteryLevel, ObjectiveId, ObjectiveProgress,
    QuestionAttempt, SessionId, StudyMode, StudySession, StudySessionConfig,
};
use crate::sampling::{CompletedCounts, efficient_question_count};
use crate::settings::EngineSettings;
use crate::time::Clock;

/// Demonstrated mastery may end an objective early, but never before this
/// many questions.
const EARLY_ADVANCE_MIN_ATTEMPTS: u32 = 5;

/// What happened to a recorded attempt.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum RecordOutcome {
    Recorded {
        objective_id: ObjectiveId,
        mastery_level: MasteryLevel,
        average_score: f64,
    },
    /// The objective is not part of this session; nothing changed.
    UnknownObjective(ObjectiveId),
}

impl RecordOutcome {
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}

/// Creates sessions and applies attempts to them.
///
/// Holds no session state itself; callers own each `StudySession` and must
/// route all mutations for one session through a single writer.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    clock: Clock,
    settings: EngineSettings,
}

impl SessionTracker {
    #[must_use]
    pub fn new(clock: Clock, settings: EngineSettings) -> Self {
        Self { clock, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start a session for `profile`.
    ///
    /// # Errors
    ///
    /// - `UnknownObjective` if the focus list names an objective the profile lacks
    /// - `DuplicateObjective` if the focus list repeats an id
    /// - `EmptyObjectives` if the focus list is empty
    /// - `InvalidTotalQuestions` for an explicit efficient target of zero
    pub fn create_session(
        &self,
        config: &StudySessionConfig,
        profile: &ExamProfile,
    ) -> Result<StudySession, ConfigurationError> {
        let objectives = match &config.focus_objectives {
            Some(focus) => {
                if let Some(unknown) = focus.iter().find(|id| profile.objective(id).is_none()) {
                    return Err(ConfigurationError::UnknownObjective(unknown.clone()));
                }
                for (i, id) in focus.iter().enumerate() {
                    if focus[..i].contains(id) {
                        return Err(ConfigurationError::DuplicateObjective(id.clone()));
                    }
                }
                profile
                    .objectives()
                    .iter()
                    .filter(|o| focus.contains(&o.id))
                    .collect::<Vec<_>>()
            }
            None => profile.objectives().iter().collect(),
        };
        if objectives.is_empty() {
            return Err(ConfigurationError::EmptyObjectives);
        }
        if config.mode == StudyMode::Efficient && config.target_questions == Some(0) {
            return Err(ConfigurationError::InvalidTotalQuestions);
        }

        let question_limit = match config.mode {
            StudyMode::Prep => None,
            StudyMode::Efficient => Some(
                config
                    .target_questions
                    .unwrap_or_else(|| efficient_question_count(profile.total_questions())),
            ),
            StudyMode::Mock => Some(profile.total_questions()),
        };
        let timer = build_timer(config.mode, question_limit, profile);

        let now = self.clock.now();
        let session = StudySession {
            id: SessionId::generate(),
            exam_id: profile.id().clone(),
            config: config.clone(),
            objectives: objectives
                .iter()
                .map(|o| ObjectiveProgress::new(o.id.clone()))
                .collect(),
            total_questions_answered: 0,
            correct_answers: 0,
            flashcards_studied: 0,
            question_time_secs: 0,
            session_score: 0.0,
            question_limit,
            timer,
            started_at: now,
            updated_at: now,
            completed_at: None,
        };
        info!(
            session = %session.id,
            exam = %session.exam_id,
            mode = %config.mode,
            objectives = session.objectives.len(),
            ?question_limit,
            "study session created"
        );
        Ok(session)
    }

    /// Append a question answer to its objective and refresh derived scores.
    ///
    /// An attempt for an objective outside the session is logged and ignored.
    pub fn record_question_attempt(
        &self,
        session: &mut StudySession,
        attempt: &QuestionAttempt,
    ) -> RecordOutcome {
        let sequence = session.total_questions_answered + 1;
        let Some(progress) = session.progress_for_mut(&attempt.objective_id) else {
            warn!(
                session = %session.id,
                objective = %attempt.objective_id,
                "question attempt for unknown objective ignored"
            );
            return RecordOutcome::UnknownObjective(attempt.objective_id.clone());
        };

        progress.push_question(attempt, sequence);
        let outcome = RecordOutcome::Recorded {
            objective_id: progress.objective_id.clone(),
            mastery_level: progress.mastery_level,
            average_score: progress.average_score,
        };

        session.total_questions_answered = sequence;
        if attempt.correct {
            session.correct_answers += 1;
        }
        session.question_time_secs += u64::from(attempt.time_spent_secs);
        session.session_score = session.accuracy() * 100.0;
        session.updated_at = self.clock.now();

        debug!(
            session = %session.id,
            objective = %attempt.objective_id,
            correct = attempt.correct,
            answered = session.total_questions_answered,
            "question attempt recorded"
        );
        outcome
    }

    /// Append a flashcard rating to its objective and refresh derived scores.
    pub fn record_flashcard_attempt(
        &self,
        session: &mut StudySession,
        attempt: &FlashcardAttempt,
    ) -> RecordOutcome {
        let Some(progress) = session.progress_for_mut(&attempt.objective_id) else {
            warn!(
                session = %session.id,
                objective = %attempt.objective_id,
                "flashcard attempt for unknown objective ignored"
            );
            return RecordOutcome::UnknownObjective(attempt.objective_id.clone());
        };

        progress.push_flashcard(attempt);
        let outcome = RecordOutcome::Recorded {
            objective_id: progress.objective_id.clone(),
            mastery_level: progress.mastery_level,
            average_score: progress.average_score,
        };

        session.flashcards_studied += 1;
        session.updated_at = self.clock.now();
        outcome
    }

    /// Questions one objective gets per sitting: objective override, then the
    /// profile's study settings, then the engine default.
    #[must_use]
    pub fn questions_per_objective(&self, profile: &ExamProfile, objective_id: &ObjectiveId) -> u32 {
        profile
            .objective(objective_id)
            .and_then(|o| o.questions_per_session)
            .or_else(|| profile.study_settings().map(|s| s.questions_per_objective))
            .unwrap_or_else(|| self.settings.default_questions_per_objective())
    }

    #[must_use]
    pub fn mastery_threshold(&self, profile: &ExamProfile) -> f64 {
        profile
            .study_settings()
            .map_or(self.settings.default_mastery_threshold(), |s| s.mastery_threshold)
    }

    /// True once the objective's per-sitting quota is used up, or once its
    /// average reaches the mastery threshold after enough questions.
    #[must_use]
    pub fn should_advance_objective(
        &self,
        session: &StudySession,
        profile: &ExamProfile,
        objective_id: &ObjectiveId,
    ) -> bool {
        let Some(progress) = session.progress_for(objective_id) else {
            return false;
        };
        let quota = self.questions_per_objective(profile, objective_id);
        let attempts = progress.questions_attempted;
        if attempts >= quota {
            return true;
        }
        attempts >= EARLY_ADVANCE_MIN_ATTEMPTS.min(quota)
            && progress.average_score >= self.mastery_threshold(profile)
    }

    /// Questions answered per objective, for the sampling strategy.
    #[must_use]
    pub fn completed_counts(session: &StudySession) -> CompletedCounts {
        session
            .objectives
            .iter()
            .map(|p| (p.objective_id.clone(), p.questions_attempted))
            .collect()
    }

    /// Advance the countdown of a timed session by `secs`.
    pub fn tick(&self, session: &mut StudySession, secs: u64) {
        if let Some(timer) = session.timer.as_mut() {
            timer.tick(secs);
            session.updated_at = self.clock.now();
        }
    }

    /// Stamp the session as finished. Idempotent.
    pub fn complete(&self, session: &mut StudySession) {
        if session.completed_at.is_none() {
            let now = self.clock.now();
            session.completed_at = Some(now);
            session.updated_at = now;
            info!(
                session = %session.id,
                answered = session.total_questions_answered,
                score = session.session_score,
                "study session completed"
            );
        }
    }
}

fn build_timer(
    mode: StudyMode,
    question_limit: Option<u32>,
    profile: &ExamProfile,
) -> Option<ExamTimer> {
    let pace = profile.target_pace_secs()?;
    let questions = question_limit?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_secs = (pace * f64::from(questions)).round() as u64;
    match mode {
        StudyMode::Prep => None,
        StudyMode::Efficient => Some(ExamTimer::new(total_secs, None, 0)),
        StudyMode::Mock => Some(ExamTimer::new(
            total_secs,
            Some(questions / 2),
            u64::from(profile.break_minutes()) * 60,
        )),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
