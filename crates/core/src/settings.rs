use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("style state TTL must be > 0 seconds")]
    InvalidStyleStateTtl,

    #[error("health deviation threshold must be in (0, 100]")]
    InvalidDeviationThreshold,

    #[error("prediction refresh interval must be > 0")]
    InvalidRefreshInterval,

    #[error("prediction damping must be in (0, 1]")]
    InvalidDamping,

    #[error("default mastery threshold must be between 0 and 100")]
    InvalidMasteryThreshold,

    #[error("default questions per objective must be > 0")]
    InvalidQuestionsPerObjective,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Engine tunables shared by every session a host runs.
///
/// Defaults:
/// - style state expires after 2 hours without a recorded question
/// - a style drifting more than 15 points from its target earns a recommendation
/// - the score prediction is fully recomputed every 5th answer, otherwise
///   nudged 10% toward the raw accuracy
/// - early advance at 80% average, 10 questions per objective per sitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EngineSettingsDraft", into = "EngineSettingsDraft")]
pub struct EngineSettings {
    style_state_ttl_secs: u64,
    health_deviation_threshold: f64,
    prediction_refresh_interval: u32,
    prediction_damping: f64,
    default_mastery_threshold: f64,
    default_questions_per_objective: u32,
}

/// Serde-facing shape of `EngineSettings`; missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettingsDraft {
    pub style_state_ttl_secs: u64,
    pub health_deviation_threshold: f64,
    pub prediction_refresh_interval: u32,
    pub prediction_damping: f64,
    pub default_mastery_threshold: f64,
    pub default_questions_per_objective: u32,
}

impl Default for EngineSettingsDraft {
    fn default() -> Self {
        Self {
            style_state_ttl_secs: 2 * 60 * 60,
            health_deviation_threshold: 15.0,
            prediction_refresh_interval: 5,
            prediction_damping: 0.1,
            default_mastery_threshold: 80.0,
            default_questions_per_objective: 10,
        }
    }
}

impl EngineSettingsDraft {
    /// # Errors
    ///
    /// Returns `SettingsError` for any out-of-range value.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        if self.style_state_ttl_secs == 0 {
            return Err(SettingsError::InvalidStyleStateTtl);
        }
        if !self.health_deviation_threshold.is_finite()
            || self.health_deviation_threshold <= 0.0
            || self.health_deviation_threshold > 100.0
        {
            return Err(SettingsError::InvalidDeviationThreshold);
        }
        if self.prediction_refresh_interval == 0 {
            return Err(SettingsError::InvalidRefreshInterval);
        }
        if !self.prediction_damping.is_finite()
            || self.prediction_damping <= 0.0
            || self.prediction_damping > 1.0
        {
            return Err(SettingsError::InvalidDamping);
        }
        if !(0.0..=100.0).contains(&self.default_mastery_threshold) {
            return Err(SettingsError::InvalidMasteryThreshold);
        }
        if self.default_questions_per_objective == 0 {
            return Err(SettingsError::InvalidQuestionsPerObjective);
        }
        Ok(EngineSettings {
            style_state_ttl_secs: self.style_state_ttl_secs,
            health_deviation_threshold: self.health_deviation_threshold,
            prediction_refresh_interval: self.prediction_refresh_interval,
            prediction_damping: self.prediction_damping,
            default_mastery_threshold: self.default_mastery_threshold,
            default_questions_per_objective: self.default_questions_per_objective,
        })
    }
}

impl TryFrom<EngineSettingsDraft> for EngineSettings {
    type Error = SettingsError;

    fn try_from(draft: EngineSettingsDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<EngineSettings> for EngineSettingsDraft {
    fn from(s: EngineSettings) -> Self {
        Self {
            style_state_ttl_secs: s.style_state_ttl_secs,
            health_deviation_threshold: s.health_deviation_threshold,
            prediction_refresh_interval: s.prediction_refresh_interval,
            prediction_damping: s.prediction_damping,
            default_mastery_threshold: s.default_mastery_threshold,
            default_questions_per_objective: s.default_questions_per_objective,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let d = EngineSettingsDraft::default();
        Self {
            style_state_ttl_secs: d.style_state_ttl_secs,
            health_deviation_threshold: d.health_deviation_threshold,
            prediction_refresh_interval: d.prediction_refresh_interval,
            prediction_damping: d.prediction_damping,
            default_mastery_threshold: d.default_mastery_threshold,
            default_questions_per_objective: d.default_questions_per_objective,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn style_state_ttl_secs(&self) -> u64 {
        self.style_state_ttl_secs
    }

    /// Allowed style drift, in percentage points.
    #[must_use]
    pub fn health_deviation_threshold(&self) -> f64 {
        self.health_deviation_threshold
    }

    #[must_use]
    pub fn prediction_refresh_interval(&self) -> u32 {
        self.prediction_refresh_interval
    }

    #[must_use]
    pub fn prediction_damping(&self) -> f64 {
        self.prediction_damping
    }

    #[must_use]
    pub fn default_mastery_threshold(&self) -> f64 {
        self.default_mastery_threshold
    }

    #[must_use]
    pub fn default_questions_per_objective(&self) -> u32 {
        self.default_questions_per_objective
    }
}
