use std::collections::HashMap;
use std::sync::Arc;

use prep_core::model::{ContentState, ExamProfile, ObjectiveId, StudySession};
use prep_core::prediction::ScorePrediction;
use prep_core::sampling::SamplingStrategy;

use crate::content::ContentRequest;

//
// ─── ACTIVE STUDY ──────────────────────────────────────────────────────────────
//

/// One running session and everything derived from it.
///
/// Owned by a single caller; all mutation goes through `StudyLoopService`.
#[derive(Debug, Clone)]
pub struct ActiveStudy {
    pub(crate) session: StudySession,
    pub(crate) profile: Arc<ExamProfile>,
    pub(crate) strategy: SamplingStrategy,
    pub(crate) prediction: ScorePrediction,
    pub(crate) current_objective: Option<ObjectiveId>,
    pub(crate) pending: Option<PendingItem>,
    pub(crate) history: HashMap<ObjectiveId, Vec<String>>,
}

/// The item currently shown, with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingItem {
    pub(crate) request: ContentRequest,
    pub(crate) state: ContentState,
}

impl ActiveStudy {
    pub(crate) fn new(
        session: StudySession,
        profile: Arc<ExamProfile>,
        strategy: SamplingStrategy,
        prediction: ScorePrediction,
    ) -> Self {
        Self {
            session,
            profile,
            strategy,
            prediction,
            current_objective: None,
            pending: None,
            history: HashMap::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &StudySession {
        &self.session
    }

    #[must_use]
    pub fn profile(&self) -> &ExamProfile {
        &self.profile
    }

    #[must_use]
    pub fn strategy(&self) -> &SamplingStrategy {
        &self.strategy
    }

    /// Latest prediction, refreshed after every answer.
    #[must_use]
    pub fn prediction(&self) -> &ScorePrediction {
        &self.prediction
    }

    #[must_use]
    pub fn current_objective(&self) -> Option<&ObjectiveId> {
        self.current_objective.as_ref()
    }

    /// What the presentation layer should be showing right now.
    #[must_use]
    pub fn content_state(&self) -> ContentState {
        self.pending
            .as_ref()
            .map_or(ContentState::Loading, |p| p.state.clone())
    }

    /// Question count the prediction extrapolates to.
    #[must_use]
    pub fn target_questions(&self) -> u32 {
        self.session
            .question_limit
            .unwrap_or_else(|| self.profile.total_questions())
    }

    pub(crate) fn previous_items(&self, objective_id: &ObjectiveId) -> &[String] {
        self.history.get(objective_id).map(Vec::as_slice).unwrap_or_default()
    }
}
