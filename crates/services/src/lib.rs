#![forbid(unsafe_code)]

pub mod catalog;
pub mod content;
pub mod error;
pub mod host;
pub mod sessions;
pub mod style_tracker;

pub use prep_core::Clock;

pub use catalog::Catalog;
pub use content::{ContentGenerator, ContentRequest, TemplateGenerator};
pub use error::{CatalogError, GeneratorError, HostError, StudyServiceError};
pub use host::StudyHost;
pub use sessions::{
    ActiveStudy, AnswerResult, ItemKind, ObjectiveCompletion, SessionProgress, StudyLoopService,
};
pub use style_tracker::{
    DistributionHealth, StyleDeviation, StyleDistributionTracker, StyleStateStore,
};
