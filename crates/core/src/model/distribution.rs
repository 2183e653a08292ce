use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::model::exam::ExamProfileError;
use crate::model::ids::{ExamId, ObjectiveId};

/// Stylistic pattern of a generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStyle {
    /// Short, fact-oriented question.
    Direct,
    /// Question framed inside a brief situation.
    Scenario,
    /// Multi-paragraph business case.
    CaseStudy,
}

impl QuestionStyle {
    /// All styles in declaration order; also the fallback order when deficits tie.
    pub const ALL: [QuestionStyle; 3] = [Self::Direct, Self::Scenario, Self::CaseStudy];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Scenario => "scenario",
            Self::CaseStudy => "case_study",
        }
    }
}

impl fmt::Display for QuestionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionStyle {
    type Err = ExamProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "scenario" => Ok(Self::Scenario),
            "case_study" | "case-study" => Ok(Self::CaseStudy),
            _ => Err(ExamProfileError::UnknownTag {
                kind: "question style",
                raw: s.to_owned(),
            }),
        }
    }
}

/// Question counts per style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleCounts {
    pub direct: u32,
    pub scenario: u32,
    pub case_study: u32,
}

impl StyleCounts {
    #[must_use]
    pub fn get(&self, style: QuestionStyle) -> u32 {
        match style {
            QuestionStyle::Direct => self.direct,
            QuestionStyle::Scenario => self.scenario,
            QuestionStyle::CaseStudy => self.case_study,
        }
    }

    pub fn increment(&mut self, style: QuestionStyle) {
        let slot = match style {
            QuestionStyle::Direct => &mut self.direct,
            QuestionStyle::Scenario => &mut self.scenario,
            QuestionStyle::CaseStudy => &mut self.case_study,
        };
        *slot = slot.saturating_add(1);
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.direct + self.scenario + self.case_study
    }

    /// Share of `style` in 0..=1; zero when nothing has been counted.
    #[must_use]
    pub fn share(&self, style: QuestionStyle) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.get(style)) / f64::from(total)
    }
}

/// Per-session record of which question styles have been generated.
///
/// `total` always equals `overall.total()`; counters only grow until the
/// state is reset or expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDistributionState {
    pub exam_id: ExamId,
    pub total: u32,
    pub overall: StyleCounts,
    pub by_objective: BTreeMap<ObjectiveId, StyleCounts>,
    pub last_updated: DateTime<Utc>,
}

impl StyleDistributionState {
    #[must_use]
    pub fn new(exam_id: ExamId, now: DateTime<Utc>) -> Self {
        Self {
            exam_id,
            total: 0,
            overall: StyleCounts::default(),
            by_objective: BTreeMap::new(),
            last_updated: now,
        }
    }

    pub fn record(&mut self, objective_id: &ObjectiveId, style: QuestionStyle, now: DateTime<Utc>) {
        self.total = self.total.saturating_add(1);
        self.overall.increment(style);
        self.by_objective
            .entry(objective_id.clone())
            .or_default()
            .increment(style);
        self.last_updated = now;
    }

    #[must_use]
    pub fn objective_counts(&self, objective_id: &ObjectiveId) -> StyleCounts {
        self.by_objective.get(objective_id).copied().unwrap_or_default()
    }

    /// True once `ttl_secs` have passed since the last recorded question.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        let idle = now.signed_duration_since(self.last_updated).num_seconds();
        u64::try_from(idle).is_ok_and(|idle| idle >= ttl_secs)
    }
}
