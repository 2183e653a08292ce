use std::sync::Arc;

use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::catalog::Catalog;
use crate::content::ContentGenerator;
use crate::error::HostError;
use crate::sessions::StudyLoopService;
use crate::style_tracker::StyleStateStore;

/// Wires a catalog, a session store and a generator into the study loop.
#[derive(Clone)]
pub struct StudyHost {
    catalog: Arc<Catalog>,
    styles: StyleStateStore,
    study: Arc<StudyLoopService>,
}

impl StudyHost {
    /// Build a host backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Sqlite` if the database cannot be opened or
    /// migrated.
    pub async fn new_sqlite(
        db_url: &str,
        catalog: Catalog,
        clock: Clock,
        generator: Arc<dyn ContentGenerator>,
    ) -> Result<Self, HostError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::assemble(storage, catalog, clock, generator))
    }

    /// Build a host whose sessions live only for the process lifetime.
    #[must_use]
    pub fn in_memory(catalog: Catalog, clock: Clock, generator: Arc<dyn ContentGenerator>) -> Self {
        Self::assemble(Storage::in_memory(), catalog, clock, generator)
    }

    fn assemble(
        storage: Storage,
        catalog: Catalog,
        clock: Clock,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let styles = StyleStateStore::new();
        let study = Arc::new(StudyLoopService::new(
            clock,
            catalog.settings().clone(),
            Arc::clone(&storage.sessions),
            generator,
            Arc::new(catalog.style_selector()),
            styles.clone(),
        ));
        info!(exams = catalog.profiles().len(), "study host ready");
        Self {
            catalog: Arc::new(catalog),
            styles,
            study,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn study(&self) -> Arc<StudyLoopService> {
        Arc::clone(&self.study)
    }

    /// Drop idle style counters; meant to be called periodically.
    pub fn sweep_styles(&self) -> usize {
        self.study.styles().sweep_expired()
    }

    /// Number of sessions with live style counters.
    #[must_use]
    pub fn tracked_sessions(&self) -> usize {
        self.styles.len()
    }
}
