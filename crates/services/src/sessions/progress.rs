use prep_core::model::{MasteryLevel, ObjectiveId};
use serde::Serialize;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionProgress {
    pub answered: u32,
    pub correct: u32,
    pub flashcards: u32,
    /// `None` for open-ended prep sessions.
    pub target: Option<u32>,
    pub remaining: Option<u32>,
    pub accuracy_percent: f64,
    pub remaining_secs: Option<u64>,
    pub on_break: bool,
    pub is_complete: bool,
    pub objectives: Vec<ObjectiveCompletion>,
}

/// Per-objective share of the planned questions already answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectiveCompletion {
    pub objective_id: ObjectiveId,
    pub answered: u32,
    pub planned: u32,
    /// 0-1.
    pub completion: f64,
    pub average_score: f64,
    pub mastery_level: MasteryLevel,
}

impl ObjectiveCompletion {
    pub(crate) fn fraction(answered: u32, planned: u32) -> f64 {
        if planned == 0 {
            return 1.0;
        }
        (f64::from(answered) / f64::from(planned)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_caps_at_one() {
        assert!((ObjectiveCompletion::fraction(3, 4) - 0.75).abs() < 1e-12);
        assert!((ObjectiveCompletion::fraction(9, 4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn nothing_planned_counts_as_done() {
        assert!((ObjectiveCompletion::fraction(0, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn open_ended_progress_serializes_nulls() {
        let progress = SessionProgress {
            answered: 2,
            correct: 1,
            flashcards: 0,
            target: None,
            remaining: None,
            accuracy_percent: 50.0,
            remaining_secs: None,
            on_break: false,
            is_complete: false,
            objectives: vec![ObjectiveCompletion {
                objective_id: ObjectiveId::new("1.1"),
                answered: 2,
                planned: 10,
                completion: 0.2,
                average_score: 50.0,
                mastery_level: MasteryLevel::Novice,
            }],
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert!(json["target"].is_null());
        assert_eq!(json["objectives"][0]["objective_id"], "1.1");
    }
}
