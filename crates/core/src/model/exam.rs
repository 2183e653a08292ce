use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExamId, ObjectiveId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamProfileError {
    #[error("exam name cannot be empty")]
    EmptyName,

    #[error("exam profile has no objectives")]
    NoObjectives,

    #[error("duplicate objective id: {0}")]
    DuplicateObjective(ObjectiveId),

    #[error("objective {0} has a negative or non-finite weight")]
    InvalidWeight(ObjectiveId),

    #[error("total questions must be > 0")]
    InvalidTotalQuestions,

    #[error("a question needs at least two options")]
    InvalidOptionCount,

    #[error("passing score must be between 0 and 100")]
    InvalidPassingScore,

    #[error("mastery threshold must be between 0 and 100")]
    InvalidMasteryThreshold,

    #[error("questions per objective must be > 0")]
    InvalidQuestionsPerObjective,

    #[error("unknown {kind}: {raw}")]
    UnknownTag { kind: &'static str, raw: String },
}

//
// ─── TAGS ──────────────────────────────────────────────────────────────────────
//

/// Cognitive complexity of an objective, from recall to multi-step reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveLevel {
    Knowledge,
    Application,
    Synthesis,
}

impl CognitiveLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Application => "application",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for CognitiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CognitiveLevel {
    type Err = ExamProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knowledge" => Ok(Self::Knowledge),
            "application" => Ok(Self::Application),
            "synthesis" => Ok(Self::Synthesis),
            _ => Err(ExamProfileError::UnknownTag {
                kind: "cognitive level",
                raw: s.to_owned(),
            }),
        }
    }
}

/// Declared difficulty of an objective or a question. Ordered easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Score a learner of average preparation is expected to reach, used as the
    /// shrinkage target for small samples.
    #[must_use]
    pub fn expected_score(self) -> f64 {
        match self {
            Self::Beginner => 75.0,
            Self::Intermediate => 65.0,
            Self::Advanced => 55.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ExamProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ExamProfileError::UnknownTag {
                kind: "difficulty",
                raw: s.to_owned(),
            }),
        }
    }
}

//
// ─── OBJECTIVE ─────────────────────────────────────────────────────────────────
//

/// One weighted learning objective of an exam.
///
/// Weights are percentage points; they are normalised when distributing
/// questions, so a profile whose weights sum to 98 or 103 is still usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: ObjectiveId,
    #[serde(default)]
    pub title: String,
    pub weight: f64,
    pub level: CognitiveLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_per_session: Option<u32>,
}

impl Objective {
    #[must_use]
    pub fn new(id: impl Into<String>, weight: f64, level: CognitiveLevel) -> Self {
        Self {
            id: ObjectiveId::new(id),
            title: String::new(),
            weight,
            level,
            difficulty: None,
            questions_per_session: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    #[must_use]
    pub fn with_questions_per_session(mut self, count: u32) -> Self {
        self.questions_per_session = Some(count);
        self
    }
}

//
// ─── STUDY SETTINGS ────────────────────────────────────────────────────────────
//

/// Optional per-exam overrides for study sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySettings {
    /// Average score (0-100) that lets a learner move past an objective early.
    pub mastery_threshold: f64,
    /// Default number of questions asked per objective in one sitting.
    pub questions_per_objective: u32,
}

//
// ─── EXAM PROFILE ──────────────────────────────────────────────────────────────
//

const DEFAULT_OPTIONS_PER_QUESTION: u8 = 4;
const DEFAULT_PASSING_SCORE: f64 = 70.0;
const DEFAULT_BREAK_MINUTES: u32 = 10;

/// Unvalidated exam profile, as read from a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamProfileDraft {
    pub id: ExamId,
    pub name: String,
    #[serde(default)]
    pub provider: String,
    pub objectives: Vec<Objective>,
    #[serde(default = "default_options_per_question")]
    pub options_per_question: u8,
    pub total_questions: u32,
    pub time_limit_minutes: u32,
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_settings: Option<StudySettings>,
}

fn default_options_per_question() -> u8 {
    DEFAULT_OPTIONS_PER_QUESTION
}

fn default_passing_score() -> f64 {
    DEFAULT_PASSING_SCORE
}

fn default_break_minutes() -> u32 {
    DEFAULT_BREAK_MINUTES
}

impl ExamProfileDraft {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        objectives: Vec<Objective>,
        total_questions: u32,
        time_limit_minutes: u32,
    ) -> Self {
        Self {
            id: ExamId::new(id),
            name: name.into(),
            provider: String::new(),
            objectives,
            options_per_question: DEFAULT_OPTIONS_PER_QUESTION,
            total_questions,
            time_limit_minutes,
            passing_score: DEFAULT_PASSING_SCORE,
            break_minutes: DEFAULT_BREAK_MINUTES,
            study_settings: None,
        }
    }

    /// Validate the draft into an immutable profile.
    ///
    /// # Errors
    ///
    /// Returns `ExamProfileError` for empty names, missing or duplicate
    /// objectives, invalid weights, and out-of-range totals or thresholds.
    pub fn validate(self) -> Result<ExamProfile, ExamProfileError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(ExamProfileError::EmptyName);
        }
        if self.objectives.is_empty() {
            return Err(ExamProfileError::NoObjectives);
        }
        let mut seen = HashSet::with_capacity(self.objectives.len());
        for objective in &self.objectives {
            if !seen.insert(&objective.id) {
                return Err(ExamProfileError::DuplicateObjective(objective.id.clone()));
            }
            if !objective.weight.is_finite() || objective.weight < 0.0 {
                return Err(ExamProfileError::InvalidWeight(objective.id.clone()));
            }
            if objective.questions_per_session == Some(0) {
                return Err(ExamProfileError::InvalidQuestionsPerObjective);
            }
        }
        if self.total_questions == 0 {
            return Err(ExamProfileError::InvalidTotalQuestions);
        }
        if self.options_per_question < 2 {
            return Err(ExamProfileError::InvalidOptionCount);
        }
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(ExamProfileError::InvalidPassingScore);
        }
        if let Some(settings) = &self.study_settings {
            if !(0.0..=100.0).contains(&settings.mastery_threshold) {
                return Err(ExamProfileError::InvalidMasteryThreshold);
            }
            if settings.questions_per_objective == 0 {
                return Err(ExamProfileError::InvalidQuestionsPerObjective);
            }
        }

        Ok(ExamProfile {
            id: self.id,
            name,
            provider: self.provider.trim().to_owned(),
            objectives: self.objectives,
            options_per_question: self.options_per_question,
            total_questions: self.total_questions,
            time_limit_minutes: self.time_limit_minutes,
            passing_score: self.passing_score,
            break_minutes: self.break_minutes,
            study_settings: self.study_settings,
        })
    }
}

/// Immutable certification profile: a weighted list of objectives plus the
/// real exam's question and time constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExamProfileDraft", into = "ExamProfileDraft")]
pub struct ExamProfile {
    id: ExamId,
    name: String,
    provider: String,
    objectives: Vec<Objective>,
    options_per_question: u8,
    total_questions: u32,
    time_limit_minutes: u32,
    passing_score: f64,
    break_minutes: u32,
    study_settings: Option<StudySettings>,
}

impl TryFrom<ExamProfileDraft> for ExamProfile {
    type Error = ExamProfileError;

    fn try_from(draft: ExamProfileDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<ExamProfile> for ExamProfileDraft {
    fn from(profile: ExamProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            provider: profile.provider,
            objectives: profile.objectives,
            options_per_question: profile.options_per_question,
            total_questions: profile.total_questions,
            time_limit_minutes: profile.time_limit_minutes,
            passing_score: profile.passing_score,
            break_minutes: profile.break_minutes,
            study_settings: profile.study_settings,
        }
    }
}

impl ExamProfile {
    #[must_use]
    pub fn id(&self) -> &ExamId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Objectives in profile order. Profile order breaks every tie in the engine.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    #[must_use]
    pub fn objective(&self, id: &ObjectiveId) -> Option<&Objective> {
        self.objectives.iter().find(|o| &o.id == id)
    }

    #[must_use]
    pub fn options_per_question(&self) -> u8 {
        self.options_per_question
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u64 {
        u64::from(self.time_limit_minutes) * 60
    }

    #[must_use]
    pub fn passing_score(&self) -> f64 {
        self.passing_score
    }

    #[must_use]
    pub fn break_minutes(&self) -> u32 {
        self.break_minutes
    }

    #[must_use]
    pub fn study_settings(&self) -> Option<&StudySettings> {
        self.study_settings.as_ref()
    }

    /// Seconds per question the real exam allows, or `None` for untimed exams.
    #[must_use]
    pub fn target_pace_secs(&self) -> Option<f64> {
        if self.time_limit_minutes == 0 {
            return None;
        }
        Some(self.time_limit_secs() as f64 / f64::from(self.total_questions))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ExamProfileDraft {
        ExamProfileDraft::new(
            "saa",
            "Solutions Architect",
            vec![
                Objective::new("1", 70.0, CognitiveLevel::Application),
                Objective::new("2", 30.0, CognitiveLevel::Knowledge),
            ],
            65,
            130,
        )
    }

    #[test]
    fn valid_draft_produces_profile() {
        let profile = draft().validate().unwrap();
        assert_eq!(profile.objectives().len(), 2);
        assert_eq!(profile.options_per_question(), 4);
        assert_eq!(profile.time_limit_secs(), 7_800);
        assert!(profile.objective(&ObjectiveId::new("2")).is_some());
    }

    #[test]
    fn duplicate_objectives_are_rejected() {
        let mut d = draft();
        d.objectives.push(Objective::new("1", 5.0, CognitiveLevel::Synthesis));
        assert!(matches!(
            d.validate(),
            Err(ExamProfileError::DuplicateObjective(id)) if id.as_str() == "1"
        ));
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut d = draft();
        d.objectives[0].weight = -1.0;
        assert!(matches!(d.validate(), Err(ExamProfileError::InvalidWeight(_))));
    }

    #[test]
    fn zero_questions_is_rejected() {
        let mut d = draft();
        d.total_questions = 0;
        assert_eq!(d.validate(), Err(ExamProfileError::InvalidTotalQuestions));
    }

    #[test]
    fn target_pace_divides_time_by_questions() {
        let profile = draft().validate().unwrap();
        assert!((profile.target_pace_secs().unwrap() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn untimed_exam_has_no_pace() {
        let mut d = draft();
        d.time_limit_minutes = 0;
        assert!(d.validate().unwrap().target_pace_secs().is_none());
    }

    #[test]
    fn tags_parse_case_insensitively() {
        assert_eq!("Synthesis".parse::<CognitiveLevel>().unwrap(), CognitiveLevel::Synthesis);
        assert_eq!(" ADVANCED".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn deserializing_runs_validation() {
        let json = r#"{
            "id": "x", "name": " ", "objectives": [],
            "total_questions": 10, "time_limit_minutes": 20
        }"#;
        assert!(serde_json::from_str::<ExamProfile>(json).is_err());
    }

    #[test]
    fn difficulty_orders_easiest_first() {
        assert!(Difficulty::Beginner < Difficulty::Intermediate);
        assert!(Difficulty::Intermediate < Difficulty::Advanced);
    }
}
