use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, Objective, ObjectiveId, ObjectiveProgress};

/// Question attempts needed before a per-objective trend is reported.
const TREND_MIN_ATTEMPTS: usize = 6;
const TREND_WINDOW: usize = 3;
const TREND_THRESHOLD: f64 = 0.1;
const TREND_NUDGE: f64 = 0.05;

/// Samples at which an objective's confidence saturates.
const FULL_CONFIDENCE_SAMPLES: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectivePrediction {
    pub objective_id: ObjectiveId,
    /// Raw observed average, 0-100.
    pub current_score: f64,
    /// Average after shrinkage toward the difficulty baseline and trend nudge.
    pub predicted_score: f64,
    /// 0-1, grows linearly with sample size.
    pub confidence: f64,
    pub sample_size: u32,
    pub trend: Trend,
}

/// Blend a raw average with the expected score for the objective's
/// difficulty. Small samples lean on the baseline.
#[must_use]
pub fn shrink_toward_baseline(raw: f64, samples: u32, baseline: f64) -> f64 {
    match samples {
        0 => baseline,
        1..5 => raw * 0.6 + baseline * 0.4,
        5..10 => raw * 0.8 + baseline * 0.2,
        _ => raw,
    }
}

/// Compare the last three question outcomes with the three before them.
#[must_use]
pub fn detect_trend(progress: &ObjectiveProgress) -> Trend {
    let outcomes: Vec<bool> = progress.question_records().map(|r| r.correct).collect();
    if outcomes.len() < TREND_MIN_ATTEMPTS {
        return Trend::Stable;
    }
    let recent = &outcomes[outcomes.len() - TREND_WINDOW..];
    let older = &outcomes[outcomes.len() - 2 * TREND_WINDOW..outcomes.len() - TREND_WINDOW];
    let slope = window_accuracy(recent) - window_accuracy(older);
    if slope > TREND_THRESHOLD {
        Trend::Improving
    } else if slope < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

fn window_accuracy(window: &[bool]) -> f64 {
    let correct = window.iter().filter(|c| **c).count();
    correct as f64 / window.len() as f64
}

pub(crate) fn predict_objective(
    progress: &ObjectiveProgress,
    objective: Option<&Objective>,
) -> ObjectivePrediction {
    let baseline = objective
        .and_then(|o| o.difficulty)
        .unwrap_or(Difficulty::Intermediate)
        .expected_score();
    let samples = progress.questions_attempted;
    let trend = detect_trend(progress);

    let shrunk = shrink_toward_baseline(progress.average_score, samples, baseline);
    let predicted = match trend {
        Trend::Improving => shrunk * (1.0 + TREND_NUDGE),
        Trend::Declining => shrunk * (1.0 - TREND_NUDGE),
        Trend::Stable => shrunk,
    };

    ObjectivePrediction {
        objective_id: progress.objective_id.clone(),
        current_score: progress.average_score,
        predicted_score: predicted.clamp(0.0, 100.0),
        confidence: (f64::from(samples) / FULL_CONFIDENCE_SAMPLES).min(1.0),
        sample_size: samples,
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CognitiveLevel, QuestionAttempt};
    use crate::time::fixed_now;

    fn progress_with(outcomes: &[bool]) -> ObjectiveProgress {
        let mut p = ObjectiveProgress::new(ObjectiveId::new("o"));
        for (i, correct) in outcomes.iter().enumerate() {
            let attempt = QuestionAttempt::new(ObjectiveId::new("o"), *correct, 30, fixed_now());
            p.push_question(&attempt, i as u32 + 1);
        }
        p
    }

    #[test]
    fn two_samples_shrink_heavily_toward_intermediate() {
        let predicted = shrink_toward_baseline(40.0, 2, Difficulty::Intermediate.expected_score());
        assert!((predicted - 50.0).abs() < 1e-9);
    }

    #[test]
    fn shrinkage_relaxes_with_samples() {
        assert!((shrink_toward_baseline(40.0, 0, 65.0) - 65.0).abs() < 1e-9);
        assert!((shrink_toward_baseline(40.0, 7, 65.0) - 45.0).abs() < 1e-9);
        assert!((shrink_toward_baseline(40.0, 12, 65.0) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn trend_needs_six_attempts() {
        assert_eq!(detect_trend(&progress_with(&[false, false, true, true, true])), Trend::Stable);
        assert_eq!(
            detect_trend(&progress_with(&[false, false, false, true, true, true])),
            Trend::Improving
        );
        assert_eq!(
            detect_trend(&progress_with(&[true, true, true, false, true, false])),
            Trend::Declining
        );
        assert_eq!(
            detect_trend(&progress_with(&[true, false, true, false, true, true])),
            Trend::Stable
        );
    }

    #[test]
    fn improving_objective_gets_nudged_up() {
        let progress = progress_with(&[false, false, false, true, true, true]);
        let objective = Objective::new("o", 100.0, CognitiveLevel::Knowledge)
            .with_difficulty(Difficulty::Beginner);
        let p = predict_objective(&progress, Some(&objective));
        // 50 raw, 6 samples: 0.8 * 50 + 0.2 * 75 = 55, then +5%
        assert!((p.predicted_score - 57.75).abs() < 1e-9);
        assert_eq!(p.trend, Trend::Improving);
        assert!((p.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn unseen_objective_predicts_its_baseline() {
        let progress = ObjectiveProgress::new(ObjectiveId::new("o"));
        let p = predict_objective(&progress, None);
        assert!((p.predicted_score - 65.0).abs() < 1e-9);
        assert_eq!(p.confidence, 0.0);
        assert_eq!(p.sample_size, 0);
    }
}
