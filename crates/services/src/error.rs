//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use prep_core::ConfigurationError;
use prep_core::model::{ContentError, ExamId, ExamProfileError, ObjectiveId};
use prep_core::settings::SettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading a profile catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("exam {exam}: {source}")]
    Profile {
        exam: ExamId,
        #[source]
        source: ExamProfileError,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("exam {0} is defined more than once")]
    DuplicateExam(ExamId),
    #[error("unknown exam: {0}")]
    UnknownExam(ExamId),
}

/// Errors reported by a `ContentGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeneratorError {
    #[error("content generator unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Malformed(#[from] ContentError),
    #[error("generated item is for objective {got}, requested {requested}")]
    WrongObjective {
        requested: ObjectiveId,
        got: ObjectiveId,
    },
}

/// Errors emitted by `StudyLoopService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyServiceError {
    #[error("session already completed")]
    Completed,
    #[error("session belongs to exam {session}, not {profile}")]
    ExamMismatch { session: ExamId, profile: ExamId },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping the study host.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HostError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
