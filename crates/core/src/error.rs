use thiserror::Error;

use crate::model::ObjectiveId;

/// Unrecoverable problems detected while turning configuration into a strategy
/// or a session. These are surfaced to the caller, never defaulted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("objective weights sum to zero")]
    ZeroTotalWeight,

    #[error("objective {0} has a negative or non-finite weight")]
    InvalidWeight(ObjectiveId),

    #[error("no objectives to distribute questions over")]
    EmptyObjectives,

    #[error("objective {0} is listed more than once")]
    DuplicateObjective(ObjectiveId),

    #[error("unknown objective id: {0}")]
    UnknownObjective(ObjectiveId),

    #[error("unknown sampling mode: {0}")]
    UnknownMode(String),

    #[error("target question count must be > 0")]
    InvalidTotalQuestions,
}
