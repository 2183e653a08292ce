use serde::{Deserialize, Serialize};

use super::{ObjectivePrediction, Reliability};
use crate::model::ObjectiveId;

const READY_SCORE: f64 = 80.0;
const REVIEW_FLOOR: f64 = 60.0;
const REVIEW_CEILING: f64 = 70.0;
const WEAK_OBJECTIVE_MIN_SAMPLES: u32 = 3;
const MAX_WEAK_OBJECTIVES: usize = 3;
const MIN_ANSWERS_FOR_CONFIDENCE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ReadyForMock,
    ReviewWeakAreas,
    FocusStudy,
    ContinuePractice,
    StrengthenObjective,
    NeedMoreData,
}

/// Declared most urgent first so ascending order ranks recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<ObjectiveId>,
    pub message: String,
}

impl Recommendation {
    fn overall(kind: RecommendationKind, priority: Priority, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            objective_id: None,
            message: message.into(),
        }
    }
}

pub(crate) fn recommend(
    point_estimate: f64,
    reliability: Reliability,
    objectives: &[ObjectivePrediction],
    answered: u32,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if answered > 0 {
        out.push(readiness(point_estimate, reliability));
    }

    let mut weakest: Vec<&ObjectivePrediction> = objectives
        .iter()
        .filter(|o| o.sample_size >= WEAK_OBJECTIVE_MIN_SAMPLES && o.predicted_score < READY_SCORE)
        .collect();
    weakest.sort_by(|a, b| a.predicted_score.total_cmp(&b.predicted_score));
    for objective in weakest.into_iter().take(MAX_WEAK_OBJECTIVES) {
        let priority = if objective.predicted_score < REVIEW_FLOOR {
            Priority::High
        } else {
            Priority::Medium
        };
        out.push(Recommendation {
            kind: RecommendationKind::StrengthenObjective,
            priority,
            objective_id: Some(objective.objective_id.clone()),
            message: format!(
                "Strengthen objective {} (predicted {:.0}% over {} questions)",
                objective.objective_id, objective.predicted_score, objective.sample_size
            ),
        });
    }

    if answered < MIN_ANSWERS_FOR_CONFIDENCE {
        out.push(Recommendation::overall(
            RecommendationKind::NeedMoreData,
            Priority::Medium,
            format!(
                "Answer at least {} more questions for a reliable prediction",
                MIN_ANSWERS_FOR_CONFIDENCE - answered
            ),
        ));
    }

    // Stable: equal priorities keep insertion order.
    out.sort_by_key(|r| r.priority);
    out
}

fn readiness(point_estimate: f64, reliability: Reliability) -> Recommendation {
    use RecommendationKind::*;
    if point_estimate >= READY_SCORE && reliability == Reliability::High {
        Recommendation::overall(
            ReadyForMock,
            Priority::Medium,
            "Scores are consistently strong. Take a full mock exam.",
        )
    } else if point_estimate < REVIEW_FLOOR {
        Recommendation::overall(
            FocusStudy,
            Priority::High,
            "Predicted score is below 60%. Return to focused study before more practice exams.",
        )
    } else if point_estimate < REVIEW_CEILING {
        Recommendation::overall(
            ReviewWeakAreas,
            Priority::High,
            "Close to passing. Review the weakest objectives.",
        )
    } else {
        Recommendation::overall(
            ContinuePractice,
            Priority::Low,
            "Keep practicing to confirm the trend.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::Trend;

    fn objective(id: &str, predicted: f64, samples: u32) -> ObjectivePrediction {
        ObjectivePrediction {
            objective_id: ObjectiveId::new(id),
            current_score: predicted,
            predicted_score: predicted,
            confidence: 0.5,
            sample_size: samples,
            trend: Trend::Stable,
        }
    }

    fn kinds(recs: &[Recommendation]) -> Vec<RecommendationKind> {
        recs.iter().map(|r| r.kind).collect()
    }

    #[test]
    fn strong_reliable_scores_suggest_a_mock() {
        let recs = recommend(85.0, Reliability::High, &[], 40);
        assert_eq!(kinds(&recs), vec![RecommendationKind::ReadyForMock]);
    }

    #[test]
    fn strong_but_unreliable_scores_keep_practicing() {
        let recs = recommend(85.0, Reliability::Medium, &[], 40);
        assert_eq!(kinds(&recs), vec![RecommendationKind::ContinuePractice]);
    }

    #[test]
    fn readiness_bands() {
        assert_eq!(recommend(65.0, Reliability::High, &[], 30)[0].kind, RecommendationKind::ReviewWeakAreas);
        assert_eq!(recommend(59.9, Reliability::High, &[], 30)[0].kind, RecommendationKind::FocusStudy);
    }

    #[test]
    fn at_most_three_weakest_objectives_with_enough_samples() {
        let objectives = vec![
            objective("a", 90.0, 5),
            objective("b", 40.0, 5),
            objective("c", 10.0, 2),
            objective("d", 70.0, 4),
            objective("e", 55.0, 3),
        ];
        let recs = recommend(72.0, Reliability::Medium, &objectives, 30);
        let weak: Vec<&str> = recs
            .iter()
            .filter_map(|r| r.objective_id.as_ref().map(ObjectiveId::as_str))
            .collect();
        assert_eq!(weak, vec!["b", "e", "d"]);
        // High-priority objective advice ranks ahead of low-priority readiness.
        assert_eq!(recs[0].objective_id.as_ref().map(ObjectiveId::as_str), Some("b"));
        assert_eq!(recs.last().map(|r| r.kind), Some(RecommendationKind::ContinuePractice));
    }

    #[test]
    fn few_answers_ask_for_more_data() {
        let recs = recommend(0.0, Reliability::Low, &[], 0);
        assert_eq!(kinds(&recs), vec![RecommendationKind::NeedMoreData]);
        assert!(recs[0].message.contains("20"));
    }
}
