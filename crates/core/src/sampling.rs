//! Which objective to study next, per sampling mode.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::ConfigurationError;
use crate::model::{ExamProfile, ObjectiveId, StudyMode};
use crate::weighting::{Allocation, QuestionBudget, distribute};

/// Share of the real exam an `efficient` session covers.
pub const EFFICIENT_FRACTION: f64 = 0.30;

/// Completed question counts keyed by objective.
pub type CompletedCounts = HashMap<ObjectiveId, u32>;

/// Immutable plan of how many questions each objective should receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingStrategy {
    mode: StudyMode,
    budget: QuestionBudget,
    distribution: Vec<Allocation>,
}

/// Question count of an efficient session for an exam of `total_questions`.
#[must_use]
pub fn efficient_question_count(total_questions: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (f64::from(total_questions) * EFFICIENT_FRACTION).round() as u32;
    scaled.max(1)
}

impl SamplingStrategy {
    /// Build the distribution for `mode` over the profile (or a focus subset).
    ///
    /// # Errors
    ///
    /// - `UnknownObjective` if a focus id is not part of the profile
    /// - `InvalidTotalQuestions` for an explicit target of zero
    /// - any weighting error (`ZeroTotalWeight`, `EmptyObjectives`)
    pub fn build(
        profile: &ExamProfile,
        mode: StudyMode,
        target_questions: Option<u32>,
        focus: Option<&[ObjectiveId]>,
    ) -> Result<Self, ConfigurationError> {
        let budget = match mode {
            StudyMode::Prep => QuestionBudget::Unbounded,
            StudyMode::Efficient => match target_questions {
                Some(0) => return Err(ConfigurationError::InvalidTotalQuestions),
                Some(n) => QuestionBudget::Fixed(n),
                None => QuestionBudget::Fixed(efficient_question_count(profile.total_questions())),
            },
            StudyMode::Mock => QuestionBudget::Fixed(profile.total_questions()),
        };

        let weights = select_weights(profile, focus)?;
        let distribution = distribute(&weights, budget)?;
        debug!(exam = %profile.id(), %mode, ?budget, objectives = distribution.len(), "built sampling strategy");

        Ok(Self {
            mode,
            budget,
            distribution,
        })
    }

    #[must_use]
    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    #[must_use]
    pub fn budget(&self) -> QuestionBudget {
        self.budget
    }

    #[must_use]
    pub fn distribution(&self) -> &[Allocation] {
        &self.distribution
    }

    #[must_use]
    pub fn allocation(&self, objective_id: &ObjectiveId) -> Option<&Allocation> {
        self.distribution.iter().find(|a| &a.objective_id == objective_id)
    }

    /// True iff fixed budgets sum exactly, no objective is starved outside
    /// prep, and weight percentages sum to 100 ± 1.
    #[must_use]
    pub fn validate(&self) -> bool {
        if let Some(total) = self.budget.fixed() {
            let sum: i64 = self.distribution.iter().map(|a| a.target_count).sum();
            if sum != i64::from(total) {
                return false;
            }
        }
        if self.mode != StudyMode::Prep && self.distribution.iter().any(|a| a.target_count < 1) {
            return false;
        }
        let percent: f64 = self.distribution.iter().map(|a| a.weight_percent).sum();
        (percent - 100.0).abs() <= 1.0
    }

    /// Next objective to study, or `None` once every target is met.
    ///
    /// Prep never finishes: it picks the objective with the lowest
    /// `completed / max(weight%, 1)` ratio. Other modes walk profile order and
    /// pick the first objective still under its target.
    #[must_use]
    pub fn next_objective(&self, completed: &CompletedCounts) -> Option<&ObjectiveId> {
        self.next_objective_where(completed, |_| true)
    }

    /// Like `next_objective`, considering only objectives `eligible` accepts.
    #[must_use]
    pub fn next_objective_where<F>(&self, completed: &CompletedCounts, eligible: F) -> Option<&ObjectiveId>
    where
        F: Fn(&ObjectiveId) -> bool,
    {
        let done = |id: &ObjectiveId| completed.get(id).copied().unwrap_or(0);
        let mut candidates = self
            .distribution
            .iter()
            .filter(|a| eligible(&a.objective_id));

        let picked = if self.mode == StudyMode::Prep {
            let mut best: Option<(&Allocation, f64)> = None;
            for allocation in candidates {
                let ratio =
                    f64::from(done(&allocation.objective_id)) / allocation.weight_percent.max(1.0);
                if best.is_none_or(|(_, r)| ratio < r) {
                    best = Some((allocation, ratio));
                }
            }
            best.map(|(a, _)| &a.objective_id)
        } else {
            candidates
                .find(|a| i64::from(done(&a.objective_id)) < a.target_count)
                .map(|a| &a.objective_id)
        };

        if let Some(id) = picked {
            debug!(objective = %id, mode = %self.mode, "next objective");
        }
        picked
    }

    /// Always false for prep; otherwise true once every target is met.
    #[must_use]
    pub fn should_end_session(&self, completed: &CompletedCounts) -> bool {
        if self.mode == StudyMode::Prep {
            return false;
        }
        self.distribution.iter().all(|a| {
            i64::from(completed.get(&a.objective_id).copied().unwrap_or(0)) >= a.target_count
        })
    }
}

fn select_weights(
    profile: &ExamProfile,
    focus: Option<&[ObjectiveId]>,
) -> Result<Vec<(ObjectiveId, f64)>, ConfigurationError> {
    let Some(focus) = focus else {
        return Ok(profile
            .objectives()
            .iter()
            .map(|o| (o.id.clone(), o.weight))
            .collect());
    };

    if let Some(unknown) = focus.iter().find(|id| profile.objective(id).is_none()) {
        return Err(ConfigurationError::UnknownObjective(unknown.clone()));
    }
    // Keep profile order so ties and remainders behave the same as a full session.
    Ok(profile
        .objectives()
        .iter()
        .filter(|o| focus.contains(&o.id))
        .map(|o| (o.id.clone(), o.weight))
        .collect())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CognitiveLevel, ExamProfileDraft, Objective};
    use proptest::prelude::*;

    fn profile(weights: &[(&str, f64)], total_questions: u32) -> ExamProfile {
        let objectives = weights
            .iter()
            .map(|(id, w)| Objective::new(*id, *w, CognitiveLevel::Application))
            .collect();
        ExamProfileDraft::new("exam", "Exam", objectives, total_questions, 90)
            .validate()
            .unwrap()
    }

    fn counts(pairs: &[(&str, u32)]) -> CompletedCounts {
        pairs.iter().map(|(id, n)| (ObjectiveId::new(*id), *n)).collect()
    }

    #[test]
    fn mock_uses_full_exam() {
        let p = profile(&[("A", 70.0), ("B", 30.0)], 10);
        let s = SamplingStrategy::build(&p, StudyMode::Mock, None, None).unwrap();
        assert_eq!(s.budget(), QuestionBudget::Fixed(10));
        assert_eq!(s.distribution()[0].target_count, 7);
        assert_eq!(s.distribution()[1].target_count, 3);
        assert!(s.validate());
    }

    #[test]
    fn efficient_defaults_to_thirty_percent() {
        let p = profile(&[("A", 50.0), ("B", 50.0)], 65);
        let s = SamplingStrategy::build(&p, StudyMode::Efficient, None, None).unwrap();
        assert_eq!(s.budget(), QuestionBudget::Fixed(20));
        let s = SamplingStrategy::build(&p, StudyMode::Efficient, Some(8), None).unwrap();
        assert_eq!(s.budget(), QuestionBudget::Fixed(8));
    }

    #[test]
    fn efficient_rejects_zero_target() {
        let p = profile(&[("A", 1.0)], 10);
        assert_eq!(
            SamplingStrategy::build(&p, StudyMode::Efficient, Some(0), None),
            Err(ConfigurationError::InvalidTotalQuestions)
        );
    }

    #[test]
    fn focus_filters_and_rejects_unknown() {
        let p = profile(&[("A", 50.0), ("B", 30.0), ("C", 20.0)], 10);
        let focus = [ObjectiveId::new("C"), ObjectiveId::new("A")];
        let s = SamplingStrategy::build(&p, StudyMode::Mock, None, Some(&focus)).unwrap();
        let ids: Vec<_> = s.distribution().iter().map(|a| a.objective_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);

        let bad = [ObjectiveId::new("Z")];
        assert_eq!(
            SamplingStrategy::build(&p, StudyMode::Mock, None, Some(&bad)),
            Err(ConfigurationError::UnknownObjective(ObjectiveId::new("Z")))
        );
    }

    #[test]
    fn zero_weight_profile_fails() {
        let p = profile(&[("A", 0.0), ("B", 0.0)], 10);
        assert_eq!(
            SamplingStrategy::build(&p, StudyMode::Mock, None, None),
            Err(ConfigurationError::ZeroTotalWeight)
        );
    }

    #[test]
    fn fixed_modes_walk_profile_order() {
        let p = profile(&[("A", 70.0), ("B", 30.0)], 10);
        let s = SamplingStrategy::build(&p, StudyMode::Mock, None, None).unwrap();
        assert_eq!(s.next_objective(&counts(&[])).unwrap().as_str(), "A");
        assert_eq!(s.next_objective(&counts(&[("A", 7)])).unwrap().as_str(), "B");
        assert!(s.next_objective(&counts(&[("A", 7), ("B", 3)])).is_none());
        assert!(s.should_end_session(&counts(&[("A", 8), ("B", 3)])));
        assert!(!s.should_end_session(&counts(&[("A", 7)])));
    }

    #[test]
    fn prep_picks_most_under_studied() {
        let p = profile(&[("A", 60.0), ("B", 40.0)], 10);
        let s = SamplingStrategy::build(&p, StudyMode::Prep, None, None).unwrap();
        // tie at zero goes to profile order
        assert_eq!(s.next_objective(&counts(&[])).unwrap().as_str(), "A");
        // A: 3/60 = 0.05, B: 1/40 = 0.025
        assert_eq!(s.next_objective(&counts(&[("A", 3), ("B", 1)])).unwrap().as_str(), "B");
        assert!(!s.should_end_session(&counts(&[("A", 1_000), ("B", 1_000)])));
    }

    #[test]
    fn filtered_pick_skips_ineligible_objectives() {
        let p = profile(&[("A", 60.0), ("B", 40.0)], 10);
        let s = SamplingStrategy::build(&p, StudyMode::Prep, None, None).unwrap();
        let not_a = |id: &ObjectiveId| id.as_str() != "A";
        assert_eq!(s.next_objective_where(&counts(&[]), not_a).unwrap().as_str(), "B");
        assert!(s.next_objective_where(&counts(&[]), |_| false).is_none());
    }

    #[test]
    fn prep_is_valid_with_zero_count_objectives() {
        let p = profile(&[("A", 99.6), ("B", 0.4)], 10);
        let s = SamplingStrategy::build(&p, StudyMode::Prep, None, None).unwrap();
        assert_eq!(s.distribution()[1].target_count, 0);
        assert!(s.validate());
    }

    #[test]
    fn negative_remainder_fails_validation() {
        let p = profile(&[("A", 1.0), ("B", 1.0), ("C", 1.0), ("D", 97.0)], 2);
        let s = SamplingStrategy::build(&p, StudyMode::Mock, None, None).unwrap();
        let targets: Vec<i64> = s.distribution().iter().map(|a| a.target_count).collect();
        assert_eq!(targets, vec![1, 1, 1, -1]);
        assert!(!s.validate());
        // starved objective counts as met
        assert!(s.should_end_session(&counts(&[("A", 1), ("B", 1), ("C", 1)])));
    }

    #[test]
    fn mismatched_fixed_sum_fails_validation() {
        let allocation = |id: &str, count: i64, percent: f64| Allocation {
            objective_id: ObjectiveId::new(id),
            target_count: count,
            weight_percent: percent,
        };
        let s = SamplingStrategy {
            mode: StudyMode::Mock,
            budget: QuestionBudget::Fixed(10),
            distribution: vec![allocation("A", 6, 60.0), allocation("B", 3, 40.0)],
        };
        assert!(!s.validate());

        let prep = SamplingStrategy {
            mode: StudyMode::Prep,
            budget: QuestionBudget::Unbounded,
            distribution: vec![allocation("A", 60, 60.0), allocation("B", 0, 40.0)],
        };
        assert!(prep.validate());
    }

    proptest! {
        #[test]
        fn built_fixed_strategies_validate(
            weights in prop::collection::vec(20.0_f64..100.0, 1..5),
            total_questions in 100_u32..200,
        ) {
            let objectives = weights
                .iter()
                .enumerate()
                .map(|(i, w)| Objective::new(i.to_string(), *w, CognitiveLevel::Knowledge))
                .collect();
            let p = ExamProfileDraft::new("e", "E", objectives, total_questions, 60)
                .validate()
                .unwrap();
            for mode in [StudyMode::Efficient, StudyMode::Mock] {
                let s = SamplingStrategy::build(&p, mode, None, None).unwrap();
                prop_assert!(s.validate());
            }
        }
    }
}
