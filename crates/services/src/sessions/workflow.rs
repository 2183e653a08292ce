use std::sync::Arc;

use prep_core::model::{
    ContentState, ExamProfile, FlashcardAttempt, FlashcardRating, ObjectiveId, QuestionAttempt,
    SessionId, StudyItem, StudyMode, StudySessionConfig,
};
use prep_core::prediction::{ScorePrediction, ScorePredictor};
use prep_core::sampling::SamplingStrategy;
use prep_core::settings::EngineSettings;
use prep_core::style::{StyleSelector, validate_style};
use prep_core::tracker::{RecordOutcome, SessionTracker};
use serde::{Deserialize, Serialize};
use storage::repository::SessionRepository;
use tracing::{debug, info, warn};

use super::active::{ActiveStudy, PendingItem};
use super::progress::{ObjectiveCompletion, SessionProgress};
use crate::Clock;
use crate::content::{ContentGenerator, ContentRequest};
use crate::error::{GeneratorError, StudyServiceError};
use crate::style_tracker::{DistributionHealth, StyleDistributionTracker, StyleStateStore};

/// Which kind of item to ask the generator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Question,
    Flashcard,
}

/// Result of answering the shown item.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub outcome: RecordOutcome,
    /// For flashcards: whether the rating counts as mastered.
    pub correct: bool,
    /// `Result` for questions; `None` for flashcards.
    pub state: Option<ContentState>,
    pub prediction: ScorePrediction,
    pub advance_objective: bool,
    pub break_started: bool,
    pub is_complete: bool,
}

/// Orchestrates objective and style choice, generation, answering and
/// persistence for study sessions.
pub struct StudyLoopService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    generator: Arc<dyn ContentGenerator>,
    tracker: SessionTracker,
    styles: StyleDistributionTracker,
    predictor: ScorePredictor,
}

impl StudyLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        sessions: Arc<dyn SessionRepository>,
        generator: Arc<dyn ContentGenerator>,
        selector: Arc<StyleSelector>,
        style_store: StyleStateStore,
    ) -> Self {
        Self {
            clock,
            sessions,
            generator,
            tracker: SessionTracker::new(clock, settings.clone()),
            styles: StyleDistributionTracker::new(style_store, selector, &settings, clock),
            predictor: ScorePredictor::new(settings),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn styles(&self) -> &StyleDistributionTracker {
        &self.styles
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Create, persist and return a new session.
    ///
    /// # Errors
    ///
    /// Returns `StudyServiceError::Configuration` for an invalid config or
    /// profile weights, or `Storage` if the session cannot be saved.
    pub async fn start(
        &self,
        profile: Arc<ExamProfile>,
        config: StudySessionConfig,
    ) -> Result<ActiveStudy, StudyServiceError> {
        let strategy = SamplingStrategy::build(
            &profile,
            config.mode,
            config.target_questions,
            config.focus_objectives.as_deref(),
        )?;
        let session = self.tracker.create_session(&config, &profile)?;
        self.sessions.save_session(&session).await?;

        let target = session
            .question_limit
            .unwrap_or_else(|| profile.total_questions());
        let prediction = self.predictor.predict(&session, &profile, target);
        info!(session = %session.id, exam = %profile.id(), "study started");
        Ok(ActiveStudy::new(session, profile, strategy, prediction))
    }

    /// Reload a persisted session.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` for an unknown id, `ExamMismatch` if the
    /// session was started for another profile, or `Configuration` if the
    /// stored config no longer fits the profile.
    pub async fn resume(
        &self,
        id: SessionId,
        profile: Arc<ExamProfile>,
    ) -> Result<ActiveStudy, StudyServiceError> {
        let session = self.sessions.load_session(id).await?;
        if &session.exam_id != profile.id() {
            return Err(StudyServiceError::ExamMismatch {
                session: session.exam_id.clone(),
                profile: profile.id().clone(),
            });
        }
        let strategy = SamplingStrategy::build(
            &profile,
            session.config.mode,
            session.config.target_questions,
            session.config.focus_objectives.as_deref(),
        )?;
        let target = session
            .question_limit
            .unwrap_or_else(|| profile.total_questions());
        let prediction = self.predictor.predict(&session, &profile, target);
        info!(session = %id, answered = session.total_questions_answered, "study resumed");
        Ok(ActiveStudy::new(session, profile, strategy, prediction))
    }

    /// Delete a stored session and its style counters.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the session does not exist.
    pub async fn discard(&self, id: SessionId) -> Result<(), StudyServiceError> {
        self.styles.reset(id);
        self.sessions.delete_session(id).await?;
        info!(session = %id, "study discarded");
        Ok(())
    }

    /// Mark the session finished and persist it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the session cannot be saved.
    pub async fn finish(&self, active: &mut ActiveStudy) -> Result<(), StudyServiceError> {
        self.tracker.complete(&mut active.session);
        active.pending = None;
        self.sessions.save_session(&active.session).await?;
        Ok(())
    }

    //
    // ─── NEXT ITEM ─────────────────────────────────────────────────────────────
    //

    /// True once the plan is met, the timer ran out, or the session was
    /// finished explicitly.
    #[must_use]
    pub fn is_finished(&self, active: &ActiveStudy) -> bool {
        if active.session.is_complete() {
            return true;
        }
        if active.session.timer.as_ref().is_some_and(|t| t.is_expired()) {
            return true;
        }
        let completed = SessionTracker::completed_counts(&active.session);
        active.strategy.should_end_session(&completed)
    }

    /// Decide the objective and style of the next item, or `None` when the
    /// session is over.
    pub fn next_request(&self, active: &mut ActiveStudy) -> Option<ContentRequest> {
        if self.is_finished(active) {
            return None;
        }
        let objective_id = self.pick_objective(active)?;
        let objective = active.profile.objective(&objective_id)?.clone();
        let style = self
            .styles
            .next_style(active.session.id, active.profile.id(), &objective);

        debug!(
            session = %active.session.id,
            objective = %objective_id,
            %style,
            "next item requested"
        );
        active.current_objective = Some(objective_id);
        Some(ContentRequest {
            exam_id: active.profile.id().clone(),
            objective,
            style,
            options_per_question: active.profile.options_per_question(),
        })
    }

    fn pick_objective(&self, active: &ActiveStudy) -> Option<ObjectiveId> {
        let completed = SessionTracker::completed_counts(&active.session);
        let adaptive_prep =
            active.session.mode() == StudyMode::Prep && active.session.config.adaptive;
        if !adaptive_prep {
            return active.strategy.next_objective(&completed).cloned();
        }

        let advanced = |id: &ObjectiveId| {
            self.tracker
                .should_advance_objective(&active.session, &active.profile, id)
        };
        if let Some(current) = &active.current_objective
            && !advanced(current)
        {
            return Some(current.clone());
        }
        active
            .strategy
            .next_objective_where(&completed, |id| {
                Some(id) != active.current_objective.as_ref() && !advanced(id)
            })
            .or_else(|| active.strategy.next_objective(&completed))
            .cloned()
    }

    /// Ask the generator for an item and put it on screen.
    ///
    /// Question text that does not match the requested style is logged and
    /// still shown.
    ///
    /// # Errors
    ///
    /// Returns `Completed` for a finished session, or `Generator` if the
    /// generator fails or answers for another objective.
    pub async fn generate(
        &self,
        active: &mut ActiveStudy,
        request: &ContentRequest,
        kind: ItemKind,
    ) -> Result<ContentState, StudyServiceError> {
        if active.session.is_complete() {
            return Err(StudyServiceError::Completed);
        }
        active.pending = Some(PendingItem {
            request: request.clone(),
            state: ContentState::Loading,
        });

        let previous = active.previous_items(request.objective_id());
        let (item, seen) = match kind {
            ItemKind::Question => {
                let question = self.generator.generate_question(request, previous).await?;
                question.check().map_err(GeneratorError::Malformed)?;
                if !validate_style(&question.text, request.style) {
                    warn!(
                        objective = %request.objective_id(),
                        style = %request.style,
                        "generated question does not match requested style"
                    );
                }
                let seen = question.text.clone();
                (StudyItem::Question(question), seen)
            }
            ItemKind::Flashcard => {
                let card = self.generator.generate_flashcard(request, previous).await?;
                let seen = card.front.clone();
                (StudyItem::Flashcard(card), seen)
            }
        };

        if item.objective_id() != request.objective_id() {
            active.pending = None;
            return Err(GeneratorError::WrongObjective {
                requested: request.objective_id().clone(),
                got: item.objective_id().clone(),
            }
            .into());
        }

        active
            .history
            .entry(request.objective_id().clone())
            .or_default()
            .push(seen);
        let state = ContentState::Question { item };
        active.pending = Some(PendingItem {
            request: request.clone(),
            state: state.clone(),
        });
        Ok(state)
    }

    //
    // ─── ANSWERS ───────────────────────────────────────────────────────────────
    //

    /// Grade the shown question, record it and persist the session.
    ///
    /// # Errors
    ///
    /// Returns `Completed` for a finished session, `Content` if no question
    /// is shown or the selection is out of range, or `Storage` on save
    /// failure.
    pub async fn answer_question(
        &self,
        active: &mut ActiveStudy,
        selected_index: usize,
        time_spent_secs: u32,
    ) -> Result<AnswerResult, StudyServiceError> {
        if active.session.is_complete() {
            return Err(StudyServiceError::Completed);
        }
        let Some(pending) = active.pending.clone() else {
            return Err(prep_core::model::ContentError::NotAnswerable.into());
        };
        let result = pending.state.answer(selected_index)?;
        let ContentState::Result { question, correct, .. } = &result else {
            return Err(prep_core::model::ContentError::NotAnswerable.into());
        };
        let correct = *correct;

        let objective = &pending.request.objective;
        let mut attempt =
            QuestionAttempt::new(objective.id.clone(), correct, time_spent_secs, self.clock.now())
                .with_style(question.style);
        if let Some(difficulty) = objective.difficulty {
            attempt = attempt.with_difficulty(difficulty);
        }

        let outcome = self.tracker.record_question_attempt(&mut active.session, &attempt);
        if !outcome.is_recorded() {
            return Ok(self.ignored_answer(active, outcome, correct, Some(result)));
        }
        self.tracker.tick(&mut active.session, u64::from(time_spent_secs));
        self.styles.record(
            active.session.id,
            &active.session.exam_id,
            &objective.id,
            question.style,
        );
        active.pending = Some(PendingItem {
            request: pending.request.clone(),
            state: result.clone(),
        });

        let break_started = self.maybe_start_break(active);
        self.finish_answer(active, outcome, correct, Some(result), break_started)
            .await
    }

    /// Record a flashcard rating for the shown card and persist the session.
    ///
    /// # Errors
    ///
    /// Returns `Completed` for a finished session, `Content` if no flashcard
    /// is shown, or `Storage` on save failure.
    pub async fn answer_flashcard(
        &self,
        active: &mut ActiveStudy,
        rating: FlashcardRating,
        time_spent_secs: u32,
    ) -> Result<AnswerResult, StudyServiceError> {
        if active.session.is_complete() {
            return Err(StudyServiceError::Completed);
        }
        let objective_id = match &active.pending {
            Some(PendingItem {
                state: ContentState::Question {
                    item: StudyItem::Flashcard(card),
                },
                ..
            }) => card.objective_id.clone(),
            _ => return Err(prep_core::model::ContentError::NotAnswerable.into()),
        };

        let attempt = FlashcardAttempt::new(objective_id, rating, time_spent_secs, self.clock.now());
        let outcome = self.tracker.record_flashcard_attempt(&mut active.session, &attempt);
        if !outcome.is_recorded() {
            return Ok(self.ignored_answer(active, outcome, rating.is_mastered(), None));
        }
        self.tracker.tick(&mut active.session, u64::from(time_spent_secs));
        active.pending = None;

        self.finish_answer(active, outcome, rating.is_mastered(), None, false)
            .await
    }

    /// Answer for an objective outside the session: no time is charged and
    /// the item stays on screen.
    fn ignored_answer(
        &self,
        active: &ActiveStudy,
        outcome: RecordOutcome,
        correct: bool,
        state: Option<ContentState>,
    ) -> AnswerResult {
        AnswerResult {
            outcome,
            correct,
            state,
            prediction: active.prediction.clone(),
            advance_objective: false,
            break_started: false,
            is_complete: self.is_finished(active),
        }
    }

    fn maybe_start_break(&self, active: &mut ActiveStudy) -> bool {
        let answered = active.session.total_questions_answered;
        let Some(timer) = active.session.timer.as_mut() else {
            return false;
        };
        if timer.is_break_due(answered) && timer.start_break() {
            info!(session = %active.session.id, answered, "scheduled break started");
            return true;
        }
        false
    }

    async fn finish_answer(
        &self,
        active: &mut ActiveStudy,
        outcome: RecordOutcome,
        correct: bool,
        state: Option<ContentState>,
        break_started: bool,
    ) -> Result<AnswerResult, StudyServiceError> {
        active.prediction =
            self.predictor
                .update_real_time(&active.prediction, &active.session, &active.profile);

        let advance_objective = active.current_objective.as_ref().is_some_and(|id| {
            self.tracker
                .should_advance_objective(&active.session, &active.profile, id)
        });

        let is_complete = self.is_finished(active);
        if is_complete {
            self.tracker.complete(&mut active.session);
        }
        self.sessions.save_session(&active.session).await?;

        Ok(AnswerResult {
            outcome,
            correct,
            state,
            prediction: active.prediction.clone(),
            advance_objective,
            break_started,
            is_complete,
        })
    }

    //
    // ─── TIMER ─────────────────────────────────────────────────────────────────
    //

    /// Advance the session countdown outside of answers (idle time).
    pub fn tick(&self, active: &mut ActiveStudy, secs: u64) {
        self.tracker.tick(&mut active.session, secs);
    }

    pub fn end_break(&self, active: &mut ActiveStudy) {
        if let Some(timer) = active.session.timer.as_mut() {
            timer.end_break();
        }
    }

    //
    // ─── VIEWS ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn progress(&self, active: &ActiveStudy) -> SessionProgress {
        let session = &active.session;
        let objectives = session
            .objectives
            .iter()
            .map(|p| {
                let planned = active
                    .strategy
                    .allocation(&p.objective_id)
                    .filter(|_| session.question_limit.is_some())
                    .map_or_else(
                        || {
                            self.tracker
                                .questions_per_objective(&active.profile, &p.objective_id)
                        },
                        |a| u32::try_from(a.target_count).unwrap_or(0),
                    );
                ObjectiveCompletion {
                    objective_id: p.objective_id.clone(),
                    answered: p.questions_attempted,
                    planned,
                    completion: ObjectiveCompletion::fraction(p.questions_attempted, planned),
                    average_score: p.average_score,
                    mastery_level: p.mastery_level,
                }
            })
            .collect();

        SessionProgress {
            answered: session.total_questions_answered,
            correct: session.correct_answers,
            flashcards: session.flashcards_studied,
            target: session.question_limit,
            remaining: session
                .question_limit
                .map(|limit| limit.saturating_sub(session.total_questions_answered)),
            accuracy_percent: session.accuracy() * 100.0,
            remaining_secs: session.timer.as_ref().map(|t| t.remaining_secs),
            on_break: session.timer.as_ref().is_some_and(|t| t.on_break()),
            is_complete: session.is_complete(),
            objectives,
        }
    }

    /// Full recomputation of the prediction, bypassing damping.
    #[must_use]
    pub fn prediction(&self, active: &ActiveStudy) -> ScorePrediction {
        self.predictor
            .predict(&active.session, &active.profile, active.target_questions())
    }

    #[must_use]
    pub fn style_health(&self, active: &ActiveStudy) -> DistributionHealth {
        self.styles.health(active.session.id, active.profile.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::TemplateGenerator;
    use prep_core::model::{CognitiveLevel, ExamProfileDraft, Objective};
    use prep_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service() -> StudyLoopService {
        StudyLoopService::new(
            fixed_clock(),
            EngineSettings::default(),
            Arc::new(InMemoryRepository::new()),
            Arc::new(TemplateGenerator),
            Arc::new(StyleSelector::new()),
            StyleStateStore::new(),
        )
    }

    fn profile() -> Arc<ExamProfile> {
        let draft = ExamProfileDraft::new(
            "wf-1",
            "Workflow",
            vec![
                Objective::new("a", 70.0, CognitiveLevel::Knowledge),
                Objective::new("b", 30.0, CognitiveLevel::Application),
            ],
            10,
            0,
        );
        Arc::new(draft.validate().unwrap())
    }

    #[test]
    fn item_kind_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&ItemKind::Flashcard).unwrap(),
            "\"flashcard\""
        );
    }

    #[tokio::test]
    async fn untimed_exam_has_no_timer_and_no_break() {
        let svc = service();
        let mut active = svc
            .start(profile(), StudySessionConfig::new(StudyMode::Mock))
            .await
            .unwrap();
        assert!(active.session().timer.is_none());

        let request = svc.next_request(&mut active).unwrap();
        assert_eq!(request.objective_id().as_str(), "a");
        let state = svc
            .generate(&mut active, &request, ItemKind::Question)
            .await
            .unwrap();
        assert_eq!(active.content_state(), state);

        let result = svc.answer_question(&mut active, 0, 20).await.unwrap();
        assert!(!result.break_started);
        assert!(matches!(result.state, Some(ContentState::Result { .. })));
        assert_eq!(svc.progress(&active).remaining_secs, None);
    }

    #[tokio::test]
    async fn non_adaptive_prep_follows_the_plain_rotation() {
        let svc = service();
        let mut config = StudySessionConfig::new(StudyMode::Prep);
        config.adaptive = false;
        let mut active = svc.start(profile(), config).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let request = svc.next_request(&mut active).unwrap();
            seen.push(request.objective_id().as_str().to_owned());
            svc.generate(&mut active, &request, ItemKind::Question)
                .await
                .unwrap();
            svc.answer_question(&mut active, 0, 20).await.unwrap();
        }
        assert!(seen.contains(&"b".to_owned()));
    }

    #[tokio::test]
    async fn answer_outside_focus_costs_no_time() {
        let svc = service();
        let timed = ExamProfileDraft::new(
            "wf-2",
            "Timed",
            vec![
                Objective::new("a", 50.0, CognitiveLevel::Knowledge),
                Objective::new("b", 50.0, CognitiveLevel::Knowledge),
            ],
            10,
            20,
        );
        let timed = Arc::new(timed.validate().unwrap());
        let config = StudySessionConfig::new(StudyMode::Efficient)
            .with_target_questions(4)
            .with_focus(vec![ObjectiveId::new("a")]);
        let mut active = svc.start(Arc::clone(&timed), config).await.unwrap();
        let before = active.session().timer.clone().unwrap().remaining_secs;

        let request = ContentRequest {
            exam_id: timed.id().clone(),
            objective: timed.objective(&ObjectiveId::new("b")).unwrap().clone(),
            style: prep_core::model::QuestionStyle::Direct,
            options_per_question: timed.options_per_question(),
        };
        let shown = svc
            .generate(&mut active, &request, ItemKind::Question)
            .await
            .unwrap();

        let result = svc.answer_question(&mut active, 0, 90).await.unwrap();
        assert_eq!(
            result.outcome,
            RecordOutcome::UnknownObjective(ObjectiveId::new("b"))
        );
        assert_eq!(active.session().timer.as_ref().unwrap().remaining_secs, before);
        assert_eq!(active.session().total_questions_answered, 0);
        assert_eq!(active.content_state(), shown);
        assert!(svc.styles().snapshot(active.session().id).is_none());
    }

    #[tokio::test]
    async fn invalid_focus_is_rejected_before_saving() {
        let svc = service();
        let config = StudySessionConfig::new(StudyMode::Efficient)
            .with_focus(vec![ObjectiveId::new("zz")]);
        let err = svc.start(profile(), config).await.unwrap_err();
        assert!(matches!(err, StudyServiceError::Configuration(_)));
    }
}
