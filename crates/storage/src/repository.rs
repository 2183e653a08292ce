use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{ExamId, SessionId, StudyMode, StudySession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A save carried an older `updated_at` than the stored copy.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Persisted shape of a study session.
///
/// The full session travels as a JSON payload; the remaining columns are
/// copies used for lookup and listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payload: String,
}

impl SessionRecord {
    /// Serialize a session for storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the session cannot be encoded.
    pub fn from_session(session: &StudySession) -> Result<Self, StorageError> {
        Ok(Self {
            id: session.id,
            exam_id: session.exam_id.clone(),
            mode: session.mode(),
            started_at: session.started_at,
            updated_at: session.updated_at,
            completed_at: session.completed_at,
            payload: serde_json::to_string(session).map_err(ser)?,
        })
    }

    /// Decode the payload back into a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the payload is malformed or
    /// belongs to a different session id.
    pub fn into_session(self) -> Result<StudySession, StorageError> {
        let session: StudySession = serde_json::from_str(&self.payload).map_err(ser)?;
        if session.id != self.id {
            return Err(StorageError::Serialization(format!(
                "payload id {} does not match record id {}",
                session.id, self.id
            )));
        }
        Ok(session)
    }

    #[must_use]
    pub fn header(&self) -> SessionHeader {
        SessionHeader {
            id: self.id,
            exam_id: self.exam_id.clone(),
            mode: self.mode,
            started_at: self.started_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        }
    }
}

/// Listing row for a stored session, without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    pub id: SessionId,
    pub exam_id: ExamId,
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionHeader {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Repository contract for study sessions, keyed by session id.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or replace a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored copy is newer than
    /// `session.updated_at`, or other storage errors.
    async fn save_session(&self, session: &StudySession) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn load_session(&self, id: SessionId) -> Result<StudySession, StorageError>;

    /// Remove a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;

    /// Sessions for one exam, most recently started first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sessions cannot be read.
    async fn list_sessions(&self, exam_id: &ExamId) -> Result<Vec<SessionHeader>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn save_session(&self, session: &StudySession) -> Result<(), StorageError> {
        let record = SessionRecord::from_session(session)?;
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(existing) = guard.get(&record.id)
            && existing.updated_at > record.updated_at
        {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.id, record);
        Ok(())
    }

    async fn load_session(&self, id: SessionId) -> Result<StudySession, StorageError> {
        let record = {
            let guard = self
                .sessions
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.get(&id).cloned().ok_or(StorageError::NotFound)?
        };
        record.into_session()
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }

    async fn list_sessions(&self, exam_id: &ExamId) -> Result<Vec<SessionHeader>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut headers: Vec<SessionHeader> = guard
            .values()
            .filter(|r| &r.exam_id == exam_id)
            .map(SessionRecord::header)
            .collect();
        headers.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        Ok(headers)
    }
}

/// Aggregate storage handle for services.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn SessionRepository> = Arc::new(InMemoryRepository::new());
        Self { sessions }
    }
}
