use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;
use crate::model::ids::{ExamId, ObjectiveId, SessionId};
use crate::model::progress::ObjectiveProgress;

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// How a session samples objectives and whether it runs against the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    /// Open-ended, untimed practice weighted toward under-studied objectives.
    Prep,
    /// A shortened exam: 30% of the real question count and time.
    Efficient,
    /// The full exam under real constraints, with a break at the halfway point.
    Mock,
}

impl StudyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prep => "prep",
            Self::Efficient => "efficient",
            Self::Mock => "mock",
        }
    }

    #[must_use]
    pub fn is_timed(self) -> bool {
        !matches!(self, Self::Prep)
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prep" => Ok(Self::Prep),
            "efficient" => Ok(Self::Efficient),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigurationError::UnknownMode(other.to_owned())),
        }
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Learner choices made when starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySessionConfig {
    pub mode: StudyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_objectives: Option<Vec<ObjectiveId>>,
    #[serde(default = "enabled")]
    pub adaptive: bool,
    #[serde(default)]
    pub spaced_repetition: bool,
}

fn enabled() -> bool {
    true
}

impl StudySessionConfig {
    #[must_use]
    pub fn new(mode: StudyMode) -> Self {
        Self {
            mode,
            target_questions: None,
            focus_objectives: None,
            adaptive: true,
            spaced_repetition: false,
        }
    }

    #[must_use]
    pub fn with_target_questions(mut self, count: u32) -> Self {
        self.target_questions = Some(count);
        self
    }

    #[must_use]
    pub fn with_focus(mut self, objectives: Vec<ObjectiveId>) -> Self {
        self.focus_objectives = Some(objectives);
        self
    }
}

//
// ─── EXAM TIMER ────────────────────────────────────────────────────────────────
//

/// Countdown state for timed modes. The caller's clock drives it via `tick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamTimer {
    pub total_secs: u64,
    pub remaining_secs: u64,
    pub paused: bool,
    /// Question count after which a break is offered.
    pub break_after_question: Option<u32>,
    pub break_secs: u64,
    /// Seconds left in the running break, if one is running.
    pub break_remaining_secs: Option<u64>,
    pub break_taken: bool,
}

impl ExamTimer {
    #[must_use]
    pub fn new(total_secs: u64, break_after_question: Option<u32>, break_secs: u64) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
            paused: false,
            break_after_question,
            break_secs,
            break_remaining_secs: None,
            break_taken: false,
        }
    }

    /// Consume `secs` of wall time. Paused time is free; break time drains the
    /// break window first and an overrun ends the break and eats exam time.
    pub fn tick(&mut self, secs: u64) {
        if self.paused {
            return;
        }
        let mut secs = secs;
        if let Some(left) = self.break_remaining_secs {
            if secs < left {
                self.break_remaining_secs = Some(left - secs);
                return;
            }
            secs -= left;
            self.break_remaining_secs = None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(secs);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn on_break(&self) -> bool {
        self.break_remaining_secs.is_some()
    }

    #[must_use]
    pub fn is_break_due(&self, answered: u32) -> bool {
        !self.break_taken
            && !self.on_break()
            && self.break_after_question.is_some_and(|q| answered >= q)
    }

    /// Start the one scheduled break. Returns false when there is none left.
    pub fn start_break(&mut self) -> bool {
        if self.break_taken || self.break_after_question.is_none() {
            return false;
        }
        self.break_taken = true;
        self.break_remaining_secs = Some(self.break_secs);
        true
    }

    pub fn end_break(&mut self) {
        self.break_remaining_secs = None;
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_secs == 0
    }
}

//
// ─── STUDY SESSION ─────────────────────────────────────────────────────────────
//

/// Aggregate root of one study sitting. Mutated only through `SessionTracker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub config: StudySessionConfig,
    pub objectives: Vec<ObjectiveProgress>,
    pub total_questions_answered: u32,
    pub correct_answers: u32,
    pub flashcards_studied: u32,
    /// Question time only; flashcards do not count toward exam pacing.
    pub question_time_secs: u64,
    /// Session accuracy on a 0-100 scale.
    pub session_score: f64,
    /// Question ceiling for the chosen mode; `None` for open-ended prep.
    pub question_limit: Option<u32>,
    pub timer: Option<ExamTimer>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StudySession {
    #[must_use]
    pub fn mode(&self) -> StudyMode {
        self.config.mode
    }

    #[must_use]
    pub fn progress_for(&self, objective_id: &ObjectiveId) -> Option<&ObjectiveProgress> {
        self.objectives.iter().find(|p| &p.objective_id == objective_id)
    }

    pub(crate) fn progress_for_mut(
        &mut self,
        objective_id: &ObjectiveId,
    ) -> Option<&mut ObjectiveProgress> {
        self.objectives.iter_mut().find(|p| &p.objective_id == objective_id)
    }

    /// Overall question accuracy in 0..=1.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_questions_answered == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers) / f64::from(self.total_questions_answered)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Correctness of every question answered this session, oldest first.
    #[must_use]
    pub fn answer_history(&self) -> Vec<bool> {
        let mut records: Vec<_> = self
            .objectives
            .iter()
            .flat_map(ObjectiveProgress::question_records)
            .collect();
        records.sort_by_key(|r| r.sequence);
        records.into_iter().map(|r| r.correct).collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_rejects_unknown() {
        assert_eq!("MOCK".parse::<StudyMode>().unwrap(), StudyMode::Mock);
        assert_eq!(
            "cram".parse::<StudyMode>(),
            Err(ConfigurationError::UnknownMode("cram".into()))
        );
    }

    #[test]
    fn timer_ignores_ticks_while_paused() {
        let mut timer = ExamTimer::new(600, None, 0);
        timer.pause();
        timer.tick(100);
        assert_eq!(timer.remaining_secs, 600);
        timer.resume();
        timer.tick(100);
        assert_eq!(timer.remaining_secs, 500);
    }

    #[test]
    fn break_consumes_break_window_then_exam_time() {
        let mut timer = ExamTimer::new(1_000, Some(5), 60);
        assert!(!timer.is_break_due(4));
        assert!(timer.is_break_due(5));
        assert!(timer.start_break());
        timer.tick(50);
        assert_eq!(timer.remaining_secs, 1_000);
        assert!(timer.on_break());
        timer.tick(30);
        assert!(!timer.on_break());
        assert_eq!(timer.remaining_secs, 980);
        assert!(!timer.start_break());
        assert!(!timer.is_break_due(10));
    }

    #[test]
    fn timer_expires_at_zero() {
        let mut timer = ExamTimer::new(10, None, 0);
        timer.tick(25);
        assert!(timer.is_expired());
        assert_eq!(timer.remaining_secs, 0);
    }

    #[test]
    fn config_defaults_when_deserialized() {
        let config: StudySessionConfig = serde_json::from_str(r#"{"mode":"efficient"}"#).unwrap();
        assert!(config.adaptive);
        assert!(!config.spaced_repetition);
        assert_eq!(config.target_questions, None);
    }
}
