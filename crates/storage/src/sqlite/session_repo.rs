use prep_core::model::{ExamId, SessionId, StudyMode, StudySession};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use crate::repository::{SessionHeader, SessionRecord, SessionRepository, StorageError, ser};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn session_id_from_text(raw: &str) -> Result<SessionId, StorageError> {
    raw.parse()
        .map_err(|_| StorageError::Serialization(format!("invalid session id: {raw}")))
}

fn map_header_row(row: &SqliteRow) -> Result<SessionHeader, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let exam_id: String = row.try_get("exam_id").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    Ok(SessionHeader {
        id: session_id_from_text(&id)?,
        exam_id: ExamId::new(exam_id),
        mode: mode.parse::<StudyMode>().map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn save_session(&self, session: &StudySession) -> Result<(), StorageError> {
        let record = SessionRecord::from_session(session)?;

        // The update only applies when the incoming copy is not older.
        let res = sqlx::query(
            r"
            INSERT INTO study_sessions (id, exam_id, mode, started_at, updated_at, completed_at, payload)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                exam_id = excluded.exam_id,
                mode = excluded.mode,
                started_at = excluded.started_at,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at,
                payload = excluded.payload
            WHERE excluded.updated_at >= study_sessions.updated_at
            ",
        )
        .bind(record.id.to_string())
        .bind(record.exam_id.as_str())
        .bind(record.mode.as_str())
        .bind(record.started_at)
        .bind(record.updated_at)
        .bind(record.completed_at)
        .bind(record.payload.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn load_session(&self, id: SessionId) -> Result<StudySession, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, exam_id, mode, started_at, updated_at, completed_at, payload
            FROM study_sessions
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let header = map_header_row(&row)?;
        let record = SessionRecord {
            id: header.id,
            exam_id: header.exam_id,
            mode: header.mode,
            started_at: header.started_at,
            updated_at: header.updated_at,
            completed_at: header.completed_at,
            payload: row.try_get("payload").map_err(ser)?,
        };
        record.into_session()
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM study_sessions WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_sessions(&self, exam_id: &ExamId) -> Result<Vec<SessionHeader>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, exam_id, mode, started_at, updated_at, completed_at
            FROM study_sessions
            WHERE exam_id = ?1
            ORDER BY started_at DESC, id ASC
            ",
        )
        .bind(exam_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_header_row).collect()
    }
}
