//! Full-exam score prediction from partial practice data.
//!
//! The point estimate starts from overall accuracy and is adjusted in a fixed
//! order: pacing, difficulty, cross-objective consistency, then recent trend.
//! The interval is a t-based 95% interval over the cross-objective variance,
//! widened for extrapolation from the sample to the target question count.

mod objective;
mod recommend;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use objective::{ObjectivePrediction, Trend, detect_trend, shrink_toward_baseline};
pub use recommend::{Priority, Recommendation, RecommendationKind};

use crate::model::{ExamProfile, StudySession};
use crate::settings::EngineSettings;
use crate::stats;

/// Seconds per question assumed when the exam has no time limit.
const DEFAULT_TARGET_PACE_SECS: f64 = 90.0;

/// Answers below half the target pace count as rushed.
const RUSHED_PACE_RATIO: f64 = 0.5;
/// Answers beyond twice the target pace would not finish the exam.
const SLOW_PACE_RATIO: f64 = 2.0;
const RUSHED_ACCURACY_FLOOR: f64 = 0.7;
const RUSHED_PENALTY: f64 = -3.0;
const CONFIDENT_BONUS: f64 = 2.0;
const SLOW_PENALTY: f64 = -5.0;

/// Neutral until per-question difficulty weighting exists.
const DIFFICULTY_FACTOR: f64 = 1.0;

const INCONSISTENT_STD_DEV: f64 = 0.3;
const CONSISTENT_STD_DEV: f64 = 0.1;
const INCONSISTENT_FACTOR: f64 = 0.95;
const CONSISTENT_FACTOR: f64 = 1.02;

const TREND_WINDOW: usize = 5;
const TREND_WEIGHT: f64 = 0.5;
const TREND_CAP: f64 = 5.0;

const LOW_FRACTION: f64 = 0.3;
const MEDIUM_FRACTION: f64 = 0.7;
const LOW_VARIANCE_CEILING: f64 = 0.4;
const MEDIUM_VARIANCE_CEILING: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reliability {
    Low,
    Medium,
    High,
}

impl Reliability {
    /// Tier from the sampled fraction of the target and the
    /// cross-objective variance (0-1 scale).
    #[must_use]
    pub fn classify(sampled_fraction: f64, variance: f64) -> Self {
        if sampled_fraction < LOW_FRACTION || variance > LOW_VARIANCE_CEILING {
            Self::Low
        } else if sampled_fraction < MEDIUM_FRACTION || variance > MEDIUM_VARIANCE_CEILING {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Computed on demand; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePrediction {
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub reliability: Reliability,
    pub sample_size: u32,
    pub target_questions: u32,
    pub objectives: Vec<ObjectivePrediction>,
    pub recommendations: Vec<Recommendation>,
}

impl ScorePrediction {
    #[must_use]
    pub fn margin(&self) -> f64 {
        (self.upper_bound - self.lower_bound) / 2.0
    }

    /// Whether the point estimate clears the profile's passing score.
    #[must_use]
    pub fn is_passing(&self, profile: &ExamProfile) -> bool {
        self.point_estimate >= profile.passing_score()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScorePredictor {
    settings: EngineSettings,
}

impl ScorePredictor {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Predict the full-exam score for `session`.
    ///
    /// `target_questions` of zero falls back to the profile's question count.
    #[must_use]
    pub fn predict(
        &self,
        session: &StudySession,
        profile: &ExamProfile,
        target_questions: u32,
    ) -> ScorePrediction {
        let target = effective_target(target_questions, profile);
        let objectives: Vec<ObjectivePrediction> = session
            .objectives
            .iter()
            .map(|p| objective::predict_objective(p, profile.objective(&p.objective_id)))
            .collect();
        let answered = session.total_questions_answered;

        if answered == 0 {
            return ScorePrediction {
                point_estimate: 0.0,
                lower_bound: 0.0,
                upper_bound: 100.0,
                reliability: Reliability::Low,
                sample_size: 0,
                target_questions: target,
                recommendations: recommend::recommend(0.0, Reliability::Low, &objectives, 0),
                objectives,
            };
        }

        let accuracy = session.accuracy();
        let scores = objective_accuracies(session);

        let mut estimate = accuracy * 100.0;
        estimate += pacing_adjustment(session, profile, accuracy);
        estimate *= DIFFICULTY_FACTOR;
        estimate *= consistency_factor(&scores);
        estimate += trend_adjustment(&session.answer_history(), accuracy);
        let point = estimate.clamp(0.0, 100.0);

        let variance = stats::variance(&scores);
        let n = f64::from(answered);
        let df = answered.saturating_sub(1).max(1);
        let scaled_variance = variance * (f64::from(target) / n).sqrt();
        let margin = stats::t_critical_95(df) * (scaled_variance / n).sqrt() * 100.0;

        let reliability = Reliability::classify(stats::ratio(n, f64::from(target)), variance);
        let recommendations = recommend::recommend(point, reliability, &objectives, answered);

        debug!(
            session = %session.id,
            answered,
            point,
            margin,
            ?reliability,
            "score prediction computed"
        );

        ScorePrediction {
            point_estimate: point,
            lower_bound: (point - margin).clamp(0.0, point),
            upper_bound: (point + margin).clamp(point, 100.0),
            reliability,
            sample_size: answered,
            target_questions: target,
            objectives,
            recommendations,
        }
    }

    /// Cheap refresh after each answer.
    ///
    /// Every `prediction_refresh_interval`-th answer recomputes fully. Between
    /// those, the previous estimate moves a damped step toward the raw
    /// accuracy and the interval shifts with it.
    #[must_use]
    pub fn update_real_time(
        &self,
        previous: &ScorePrediction,
        session: &StudySession,
        profile: &ExamProfile,
    ) -> ScorePrediction {
        let answered = session.total_questions_answered;
        let interval = self.settings.prediction_refresh_interval().max(1);
        if answered == 0 || answered % interval == 0 || previous.sample_size == 0 {
            return self.predict(session, profile, previous.target_questions);
        }

        let raw = session.accuracy() * 100.0;
        let delta = self.settings.prediction_damping() * (raw - previous.point_estimate);
        let point = (previous.point_estimate + delta).clamp(0.0, 100.0);

        let mut next = previous.clone();
        next.point_estimate = point;
        next.lower_bound = (previous.lower_bound + delta).clamp(0.0, point);
        next.upper_bound = (previous.upper_bound + delta).clamp(point, 100.0);
        next.sample_size = answered;
        next
    }
}

fn effective_target(target_questions: u32, profile: &ExamProfile) -> u32 {
    if target_questions == 0 {
        profile.total_questions()
    } else {
        target_questions
    }
}

/// Per-objective accuracy on the 0-1 scale, for objectives with answers.
fn objective_accuracies(session: &StudySession) -> Vec<f64> {
    session
        .objectives
        .iter()
        .filter(|p| p.questions_attempted > 0)
        .map(|p| p.average_score / 100.0)
        .collect()
}

fn pacing_adjustment(session: &StudySession, profile: &ExamProfile, accuracy: f64) -> f64 {
    let average = stats::ratio(
        session.question_time_secs as f64,
        f64::from(session.total_questions_answered),
    );
    let target = profile.target_pace_secs().unwrap_or(DEFAULT_TARGET_PACE_SECS);
    let pace = stats::ratio(average, target);
    if pace > SLOW_PACE_RATIO {
        SLOW_PENALTY
    } else if pace < RUSHED_PACE_RATIO {
        if accuracy < RUSHED_ACCURACY_FLOOR {
            RUSHED_PENALTY
        } else {
            CONFIDENT_BONUS
        }
    } else {
        0.0
    }
}

fn consistency_factor(scores: &[f64]) -> f64 {
    let spread = stats::std_dev(scores);
    if spread > INCONSISTENT_STD_DEV {
        INCONSISTENT_FACTOR
    } else if spread < CONSISTENT_STD_DEV && scores.len() >= 2 {
        CONSISTENT_FACTOR
    } else {
        1.0
    }
}

/// Points added for recent answers beating the overall rate, capped both ways.
fn trend_adjustment(history: &[bool], accuracy: f64) -> f64 {
    if history.len() < TREND_WINDOW {
        return 0.0;
    }
    let recent = &history[history.len() - TREND_WINDOW..];
    let recent_accuracy = recent.iter().filter(|c| **c).count() as f64 / TREND_WINDOW as f64;
    ((recent_accuracy - accuracy) * 100.0 * TREND_WEIGHT).clamp(-TREND_CAP, TREND_CAP)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CognitiveLevel, ExamProfileDraft, Objective, ObjectiveId, QuestionAttempt, StudyMode,
        StudySessionConfig,
    };
    use crate::time::{fixed_clock, fixed_now};
    use crate::tracker::SessionTracker;
    use proptest::prelude::*;

    fn profile() -> ExamProfile {
        ExamProfileDraft::new(
            "exam",
            "Exam",
            vec![
                Objective::new("A", 50.0, CognitiveLevel::Application),
                Objective::new("B", 50.0, CognitiveLevel::Knowledge),
            ],
            50,
            100,
        )
        .validate()
        .unwrap()
    }

    fn session_with(answers: &[(&str, bool, u32)]) -> StudySession {
        let tracker = SessionTracker::new(fixed_clock(), EngineSettings::default());
        let mut session = tracker
            .create_session(&StudySessionConfig::new(StudyMode::Prep), &profile())
            .unwrap();
        for (id, correct, secs) in answers {
            let attempt = QuestionAttempt::new(ObjectiveId::new(*id), *correct, *secs, fixed_now());
            let _ = tracker.record_question_attempt(&mut session, &attempt);
        }
        session
    }

    fn kinds(p: &ScorePrediction) -> Vec<RecommendationKind> {
        p.recommendations.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn empty_session_is_maximally_uncertain() {
        let p = ScorePredictor::default().predict(&session_with(&[]), &profile(), 50);
        assert_eq!(p.point_estimate, 0.0);
        assert_eq!((p.lower_bound, p.upper_bound), (0.0, 100.0));
        assert_eq!(p.margin(), 50.0);
        assert_eq!(p.reliability, Reliability::Low);
        assert_eq!(kinds(&p), vec![RecommendationKind::NeedMoreData]);
        assert_eq!(p.objectives.len(), 2);
    }

    #[test]
    fn consistent_fast_accurate_learner_is_ready() {
        // 40 of 50 answered, all correct, 45 s against a 120 s pace.
        let answers: Vec<(&str, bool, u32)> = (0..40)
            .map(|i| (if i % 2 == 0 { "A" } else { "B" }, true, 45))
            .collect();
        let p = ScorePredictor::default().predict(&session_with(&answers), &profile(), 50);
        assert_eq!(p.point_estimate, 100.0);
        assert_eq!(p.reliability, Reliability::High);
        assert_eq!(p.recommendations[0].kind, RecommendationKind::ReadyForMock);
        assert!(p.is_passing(&profile()));
    }

    #[test]
    fn slow_answers_cost_five_points() {
        // 300 s per question is past twice the 120 s pace.
        let answers: Vec<(&str, bool, u32)> = (0..10)
            .map(|i| ("A", i % 2 == 0, 300))
            .collect();
        let p = ScorePredictor::default().predict(&session_with(&answers), &profile(), 50);
        // 50% accuracy, one objective so no consistency change, and the last
        // five answers at 40% cost the capped five trend points.
        assert!((p.point_estimate - 40.0).abs() < 1e-9);
        assert_eq!(p.reliability, Reliability::Low);
        assert!(kinds(&p).contains(&RecommendationKind::FocusStudy));
        assert!(kinds(&p).contains(&RecommendationKind::NeedMoreData));
    }

    #[test]
    fn rushed_guessing_is_penalized() {
        assert_eq!(
            pacing_adjustment(&session_with(&[("A", false, 10), ("A", true, 10)]), &profile(), 0.5),
            RUSHED_PENALTY
        );
        assert_eq!(
            pacing_adjustment(&session_with(&[("A", true, 100)]), &profile(), 1.0),
            0.0
        );
    }

    #[test]
    fn uneven_objectives_widen_the_interval() {
        let mut answers = Vec::new();
        for _ in 0..10 {
            answers.push(("A", true, 60));
            answers.push(("B", false, 60));
        }
        let p = ScorePredictor::default().predict(&session_with(&answers), &profile(), 50);
        assert!(p.lower_bound < p.point_estimate);
        assert!(p.upper_bound > p.point_estimate);
        assert!(p.margin() > 0.0);
        // Variance 0.5 on the 0-1 scale is past the low-reliability ceiling.
        assert_eq!(p.reliability, Reliability::Low);
    }

    #[test]
    fn recent_trend_is_capped() {
        let history = [false, false, false, false, false, true, true, true, true, true];
        assert_eq!(trend_adjustment(&history, 0.5), 5.0);
        assert_eq!(trend_adjustment(&history[..4], 0.0), 0.0);
    }

    #[test]
    fn reliability_tiers() {
        assert_eq!(Reliability::classify(0.2, 0.0), Reliability::Low);
        assert_eq!(Reliability::classify(0.9, 0.5), Reliability::Low);
        assert_eq!(Reliability::classify(0.5, 0.0), Reliability::Medium);
        assert_eq!(Reliability::classify(0.9, 0.3), Reliability::Medium);
        assert_eq!(Reliability::classify(0.9, 0.1), Reliability::High);
    }

    #[test]
    fn real_time_update_damps_between_refreshes() {
        let predictor = ScorePredictor::default();
        let answers = [("A", true, 60), ("B", false, 60), ("A", true, 60), ("B", true, 60)];
        let session = session_with(&answers);
        let mut previous = predictor.predict(&session, &profile(), 50);
        previous.point_estimate = 50.0;
        previous.lower_bound = 40.0;
        previous.upper_bound = 60.0;

        // 4 answers: not a refresh point, raw accuracy is 75%.
        let next = predictor.update_real_time(&previous, &session, &profile());
        assert!((next.point_estimate - 52.5).abs() < 1e-9);
        assert!((next.lower_bound - 42.5).abs() < 1e-9);
        assert!((next.upper_bound - 62.5).abs() < 1e-9);

        let mut answers = answers.to_vec();
        answers.push(("A", true, 60));
        let session = session_with(&answers);
        let refreshed = predictor.update_real_time(&previous, &session, &profile());
        assert_eq!(refreshed, predictor.predict(&session, &profile(), 50));
    }

    proptest! {
        #[test]
        fn interval_contains_point_and_stays_in_range(
            answers in prop::collection::vec((any::<bool>(), any::<bool>(), 1_u32..400), 0..80),
            target in 0_u32..200,
        ) {
            let answers: Vec<(&str, bool, u32)> = answers
                .into_iter()
                .map(|(a, correct, secs)| (if a { "A" } else { "B" }, correct, secs))
                .collect();
            let p = ScorePredictor::default().predict(&session_with(&answers), &profile(), target);
            prop_assert!(p.lower_bound <= p.point_estimate);
            prop_assert!(p.point_estimate <= p.upper_bound);
            prop_assert!(p.lower_bound >= 0.0);
            prop_assert!(p.upper_bound <= 100.0);
        }
    }
}
