//! Question style policy: which stylistic pattern to request next, and
//! whether generated text actually follows the requested pattern.

mod validate;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::model::{CognitiveLevel, Difficulty, ExamId, Objective, QuestionStyle, StyleCounts};

pub use validate::{sentence_count, validate_style, word_count};

/// Exam-level mix used when no exam-specific override exists.
pub const DEFAULT_EXAM_MIX: StyleMix = StyleMix::new(0.6, 0.3, 0.1);

//
// ─── MIX ───────────────────────────────────────────────────────────────────────
//

/// Target share of each style, as fractions that sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleMix {
    pub direct: f64,
    pub scenario: f64,
    pub case_study: f64,
}

impl StyleMix {
    #[must_use]
    pub const fn new(direct: f64, scenario: f64, case_study: f64) -> Self {
        Self {
            direct,
            scenario,
            case_study,
        }
    }

    /// Built-in mix for an objective's cognitive level.
    #[must_use]
    pub fn for_level(level: CognitiveLevel) -> Self {
        match level {
            CognitiveLevel::Knowledge => Self::new(0.7, 0.25, 0.05),
            CognitiveLevel::Application => Self::new(0.4, 0.4, 0.2),
            CognitiveLevel::Synthesis => Self::new(0.2, 0.4, 0.4),
        }
    }

    #[must_use]
    pub fn get(&self, style: QuestionStyle) -> f64 {
        match style {
            QuestionStyle::Direct => self.direct,
            QuestionStyle::Scenario => self.scenario,
            QuestionStyle::CaseStudy => self.case_study,
        }
    }

    /// Rescale so the shares sum to 1. A mix of all zeros stays zero.
    #[must_use]
    pub fn normalized(self) -> Self {
        let sum = self.direct.max(0.0) + self.scenario.max(0.0) + self.case_study.max(0.0);
        if sum <= 0.0 {
            return Self::new(0.0, 0.0, 0.0);
        }
        Self::new(
            self.direct.max(0.0) / sum,
            self.scenario.max(0.0) / sum,
            self.case_study.max(0.0) / sum,
        )
    }
}

/// Exam-specific preferences; a level entry beats the exam-wide mix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamStyleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix: Option<StyleMix>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub levels: HashMap<CognitiveLevel, StyleMix>,
}

//
// ─── ELIGIBILITY ───────────────────────────────────────────────────────────────
//

/// Which objectives a style may be used for. `None` means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConstraint {
    #[serde(default)]
    pub allowed_levels: Option<Vec<CognitiveLevel>>,
    #[serde(default)]
    pub min_difficulty: Option<Difficulty>,
    #[serde(default)]
    pub max_difficulty: Option<Difficulty>,
}

impl StyleConstraint {
    /// Objectives without a difficulty tag are judged as intermediate.
    #[must_use]
    pub fn allows(&self, objective: &Objective) -> bool {
        if let Some(levels) = &self.allowed_levels {
            if !levels.contains(&objective.level) {
                return false;
            }
        }
        let difficulty = objective.difficulty.unwrap_or(Difficulty::Intermediate);
        if self.min_difficulty.is_some_and(|min| difficulty < min) {
            return false;
        }
        if self.max_difficulty.is_some_and(|max| difficulty > max) {
            return false;
        }
        true
    }
}

//
// ─── SELECTOR ──────────────────────────────────────────────────────────────────
//

/// Picks the most under-represented eligible style for an objective.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSelector {
    overrides: HashMap<ExamId, ExamStyleOverride>,
    constraints: HashMap<QuestionStyle, StyleConstraint>,
}

impl Default for StyleSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleSelector {
    /// Selector with no exam overrides and the stock constraints: case studies
    /// need an application or synthesis objective of at least intermediate
    /// difficulty; direct and scenario questions are always allowed.
    #[must_use]
    pub fn new() -> Self {
        let mut constraints = HashMap::new();
        constraints.insert(
            QuestionStyle::CaseStudy,
            StyleConstraint {
                allowed_levels: Some(vec![CognitiveLevel::Application, CognitiveLevel::Synthesis]),
                min_difficulty: Some(Difficulty::Intermediate),
                max_difficulty: None,
            },
        );
        Self {
            overrides: HashMap::new(),
            constraints,
        }
    }

    #[must_use]
    pub fn with_exam_override(mut self, exam_id: ExamId, preferences: ExamStyleOverride) -> Self {
        self.overrides.insert(exam_id, preferences);
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, style: QuestionStyle, constraint: StyleConstraint) -> Self {
        self.constraints.insert(style, constraint);
        self
    }

    /// Exam-wide target mix, used for session-level health checks.
    #[must_use]
    pub fn exam_mix(&self, exam_id: &ExamId) -> StyleMix {
        self.overrides
            .get(exam_id)
            .and_then(|o| o.mix)
            .unwrap_or(DEFAULT_EXAM_MIX)
            .normalized()
    }

    /// Target mix for one objective: exam level override, then exam mix,
    /// then the built-in level default.
    #[must_use]
    pub fn target_mix(&self, exam_id: &ExamId, level: CognitiveLevel) -> StyleMix {
        let exam = self.overrides.get(exam_id);
        exam.and_then(|o| o.levels.get(&level).copied())
            .or_else(|| exam.and_then(|o| o.mix))
            .unwrap_or_else(|| StyleMix::for_level(level))
            .normalized()
    }

    #[must_use]
    pub fn is_eligible(&self, style: QuestionStyle, objective: &Objective) -> bool {
        self.constraints
            .get(&style)
            .is_none_or(|constraint| constraint.allows(objective))
    }

    /// Style with the largest `target - current` share that the objective is
    /// eligible for. Falls back to `Direct` if nothing is eligible.
    #[must_use]
    pub fn select(
        &self,
        exam_id: &ExamId,
        objective: &Objective,
        counts: &StyleCounts,
        total_for_objective: u32,
    ) -> QuestionStyle {
        let target = self.target_mix(exam_id, objective.level);
        let denominator = f64::from(total_for_objective.max(1));

        let mut ranked: Vec<(QuestionStyle, f64)> = QuestionStyle::ALL
            .iter()
            .map(|&style| {
                let current = f64::from(counts.get(style)) / denominator;
                (style, target.get(style) - current)
            })
            .collect();
        // Stable sort keeps declaration order on equal deficits.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let chosen = ranked
            .iter()
            .map(|(style, _)| *style)
            .find(|style| self.is_eligible(*style, objective))
            .unwrap_or(QuestionStyle::Direct);

        debug!(exam = %exam_id, objective = %objective.id, style = %chosen, "selected question style");
        chosen
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn exam() -> ExamId {
        ExamId::new("exam")
    }

    fn counts(direct: u32, scenario: u32, case_study: u32) -> StyleCounts {
        StyleCounts {
            direct,
            scenario,
            case_study,
        }
    }

    #[test]
    fn fresh_knowledge_objective_starts_direct() {
        let selector = StyleSelector::new();
        let objective = Objective::new("1", 10.0, CognitiveLevel::Knowledge);
        assert_eq!(
            selector.select(&exam(), &objective, &StyleCounts::default(), 0),
            QuestionStyle::Direct
        );
    }

    #[test]
    fn default_exam_preferences_start_direct() {
        let selector = StyleSelector::new().with_exam_override(
            exam(),
            ExamStyleOverride {
                mix: Some(DEFAULT_EXAM_MIX),
                levels: HashMap::new(),
            },
        );
        let objective = Objective::new("1", 10.0, CognitiveLevel::Knowledge);
        assert_eq!(
            selector.select(&exam(), &objective, &StyleCounts::default(), 0),
            QuestionStyle::Direct
        );
    }

    #[test]
    fn picks_largest_deficit() {
        let selector = StyleSelector::new();
        let objective = Objective::new("1", 10.0, CognitiveLevel::Application)
            .with_difficulty(Difficulty::Advanced);
        // target 0.4/0.4/0.2; current 0.8/0.0/0.2
        let style = selector.select(&exam(), &objective, &counts(4, 0, 1), 5);
        assert_eq!(style, QuestionStyle::Scenario);
    }

    #[test]
    fn ineligible_style_is_skipped() {
        let selector = StyleSelector::new();
        let objective = Objective::new("1", 10.0, CognitiveLevel::Synthesis)
            .with_difficulty(Difficulty::Beginner);
        // case study has the largest deficit but requires intermediate+
        let style = selector.select(&exam(), &objective, &counts(2, 1, 0), 3);
        assert_eq!(style, QuestionStyle::Scenario);
    }

    #[test]
    fn nothing_eligible_falls_back_to_direct() {
        let blocked = StyleConstraint {
            allowed_levels: Some(Vec::new()),
            ..StyleConstraint::default()
        };
        let selector = StyleSelector::new()
            .with_constraint(QuestionStyle::Direct, blocked.clone())
            .with_constraint(QuestionStyle::Scenario, blocked.clone())
            .with_constraint(QuestionStyle::CaseStudy, blocked);
        let objective = Objective::new("1", 10.0, CognitiveLevel::Synthesis);
        assert_eq!(
            selector.select(&exam(), &objective, &counts(0, 5, 5), 10),
            QuestionStyle::Direct
        );
    }

    #[test]
    fn level_override_beats_exam_override() {
        let mut levels = HashMap::new();
        levels.insert(CognitiveLevel::Knowledge, StyleMix::new(0.0, 1.0, 0.0));
        let selector = StyleSelector::new().with_exam_override(
            exam(),
            ExamStyleOverride {
                mix: Some(StyleMix::new(1.0, 0.0, 0.0)),
                levels,
            },
        );
        assert_eq!(
            selector.target_mix(&exam(), CognitiveLevel::Knowledge),
            StyleMix::new(0.0, 1.0, 0.0)
        );
        assert_eq!(
            selector.target_mix(&exam(), CognitiveLevel::Synthesis),
            StyleMix::new(1.0, 0.0, 0.0)
        );
        assert_eq!(
            selector.target_mix(&ExamId::new("other"), CognitiveLevel::Synthesis),
            StyleMix::for_level(CognitiveLevel::Synthesis)
        );
    }

    #[test]
    fn normalized_rescales_weights() {
        let mix = StyleMix::new(3.0, 1.0, 0.0).normalized();
        assert!((mix.direct - 0.75).abs() < 1e-12);
        assert!((mix.scenario - 0.25).abs() < 1e-12);
        assert_eq!(StyleMix::new(0.0, 0.0, 0.0).normalized().direct, 0.0);
    }

    #[test]
    fn constraint_treats_missing_difficulty_as_intermediate() {
        let constraint = StyleConstraint {
            allowed_levels: None,
            min_difficulty: Some(Difficulty::Intermediate),
            max_difficulty: Some(Difficulty::Intermediate),
        };
        let plain = Objective::new("1", 1.0, CognitiveLevel::Knowledge);
        assert!(constraint.allows(&plain));
        assert!(!constraint.allows(&plain.clone().with_difficulty(Difficulty::Advanced)));
    }
}
