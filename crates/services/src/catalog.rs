//! Exam profiles, style preferences and engine tunables loaded from TOML.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use prep_core::model::{ExamId, ExamProfile, ExamProfileDraft};
use prep_core::settings::{EngineSettings, EngineSettingsDraft};
use prep_core::style::{ExamStyleOverride, StyleSelector};
use serde::Deserialize;
use tracing::info;

use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    engine: EngineSettingsDraft,
    #[serde(default)]
    exams: Vec<ExamEntry>,
}

#[derive(Debug, Deserialize)]
struct ExamEntry {
    #[serde(flatten)]
    profile: ExamProfileDraft,
    #[serde(default)]
    styles: Option<ExamStyleOverride>,
}

/// Validated catalog. Profiles keep file order.
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: Vec<Arc<ExamProfile>>,
    index: HashMap<ExamId, usize>,
    styles: HashMap<ExamId, ExamStyleOverride>,
    settings: EngineSettings,
}

impl Catalog {
    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed TOML, invalid profiles or
    /// settings, and duplicate exam ids.
    pub fn load_from_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        let settings = file.engine.validate()?;

        let mut profiles = Vec::with_capacity(file.exams.len());
        let mut index = HashMap::with_capacity(file.exams.len());
        let mut styles = HashMap::new();
        for entry in file.exams {
            let exam = entry.profile.id.clone();
            if index.contains_key(&exam) {
                return Err(CatalogError::DuplicateExam(exam));
            }
            let profile = entry
                .profile
                .validate()
                .map_err(|source| CatalogError::Profile {
                    exam: exam.clone(),
                    source,
                })?;
            if let Some(style) = entry.styles {
                styles.insert(exam.clone(), style);
            }
            index.insert(exam, profiles.len());
            profiles.push(Arc::new(profile));
        }

        info!(exams = profiles.len(), "catalog loaded");
        Ok(Self {
            profiles,
            index,
            styles,
            settings,
        })
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the file cannot be read, or any error
    /// from `load_from_str`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&raw)
    }

    /// Catalog holding a single profile and default settings.
    #[must_use]
    pub fn single(profile: ExamProfile) -> Self {
        let mut index = HashMap::new();
        index.insert(profile.id().clone(), 0);
        Self {
            profiles: vec![Arc::new(profile)],
            index,
            styles: HashMap::new(),
            settings: EngineSettings::default(),
        }
    }

    #[must_use]
    pub fn profiles(&self) -> &[Arc<ExamProfile>] {
        &self.profiles
    }

    /// Look up a profile by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownExam` if no profile has that id.
    pub fn profile(&self, id: &ExamId) -> Result<Arc<ExamProfile>, CatalogError> {
        self.index
            .get(id)
            .map(|i| Arc::clone(&self.profiles[*i]))
            .ok_or_else(|| CatalogError::UnknownExam(id.clone()))
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Stock selector with every exam's style overrides applied.
    #[must_use]
    pub fn style_selector(&self) -> StyleSelector {
        self.styles
            .iter()
            .fold(StyleSelector::new(), |selector, (exam, prefs)| {
                selector.with_exam_override(exam.clone(), prefs.clone())
            })
    }
}
