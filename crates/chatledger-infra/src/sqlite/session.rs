//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `chatledger-core` using sqlx
//! with split read/write pools: raw queries, a private Row struct,
//! UNIQUE violations mapped to `RepositoryError::Conflict`, and the
//! optimistic version check expressed directly in the UPDATE.

use chatledger_core::session::repository::SessionRepository;
use chatledger_types::error::RepositoryError;
use chatledger_types::session::Session;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `SessionRepository`.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to the domain Session.
struct SessionRow {
    id: String,
    owner_id: String,
    title: String,
    favorite: i64,
    deleted: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            title: row.try_get("title")?,
            favorite: row.try_get("favorite")?,
            deleted: row.try_get("deleted")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;
        Ok(Session {
            id,
            owner_id: self.owner_id,
            title: self.title,
            favorite: self.favorite != 0,
            deleted: self.deleted != 0,
            version: self.version,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn rows_into_sessions(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Session>, RepositoryError> {
    let mut sessions = Vec::with_capacity(rows.len());
    for row in rows {
        let session_row =
            SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        sessions.push(session_row.into_session()?);
    }
    Ok(sessions)
}

impl SessionRepository for SqliteSessionRepository {
    async fn insert(&self, session: &Session) -> Result<Session, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO sessions (id, owner_id, title, favorite, deleted, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.owner_id)
        .bind(&session.title)
        .bind(session.favorite as i64)
        .bind(session.deleted as i64)
        .bind(session.version)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(session.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "session already exists for owner '{}' and title '{}'",
                    session.owner_id, session.title
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn find_active_by_owner_and_title(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let row =
            sqlx::query("SELECT * FROM sessions WHERE owner_id = ? AND title = ? AND deleted = 0")
                .bind(owner_id)
                .bind(title)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = SessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn exists_by_owner(&self, owner_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM sessions WHERE owner_id = ?) AS present")
            .bind(owner_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let present: i64 = row
            .try_get("present")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(present != 0)
    }

    async fn update_with_version(&self, session: &Session) -> Result<Session, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions
               SET title = ?, favorite = ?, deleted = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(&session.title)
        .bind(session.favorite as i64)
        .bind(session.deleted as i64)
        .bind(format_datetime(&session.updated_at))
        .bind(session.id.to_string())
        .bind(session.version)
        .execute(&self.pool.writer)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                return Err(RepositoryError::Conflict(format!(
                    "session already exists for owner '{}' and title '{}'",
                    session.owner_id, session.title
                )));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        };

        if result.rows_affected() == 0 {
            // Distinguish a stale version from a missing row.
            return match self.get_by_id(&session.id).await? {
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "stale version {} for session {} (current {})",
                    session.version, session.id, current.version
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }

        let mut updated = session.clone();
        updated.version += 1;
        Ok(updated)
    }

    async fn list_active_by_owner(&self, owner_id: &str) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE owner_id = ? AND deleted = 0 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_into_sessions(&rows)
    }

    async fn list_favorites_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM sessions WHERE owner_id = ? AND favorite = 1 AND deleted = 0 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_into_sessions(&rows)
    }
}
