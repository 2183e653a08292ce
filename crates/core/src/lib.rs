#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod prediction;
pub mod sampling;
pub mod settings;
pub mod stats;
pub mod style;
pub mod time;
pub mod tracker;
pub mod weighting;

pub use error::ConfigurationError;
pub use time::Clock;
