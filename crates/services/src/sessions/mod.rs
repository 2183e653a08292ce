mod active;
mod progress;
mod workflow;

// Public API of the study-session subsystem.
pub use crate::error::StudyServiceError;
pub use active::ActiveStudy;
pub use progress::{ObjectiveCompletion, SessionProgress};
pub use workflow::{AnswerResult, ItemKind, StudyLoopService};
