//! SQLite message repository implementation.
//!
//! Implements `MessageRepository` from `chatledger-core`. Sequence
//! numbers are assigned inside the insert transaction, and every
//! multi-step mutation (edit plus cascade, paired delete) runs in one
//! transaction on the single-connection writer pool.

use chatledger_core::message::repository::MessageRepository;
use chatledger_types::error::RepositoryError;
use chatledger_types::message::{Message, Sender};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `MessageRepository`.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to the domain Message.
struct MessageRow {
    id: String,
    session_id: String,
    sender: String,
    content: String,
    fingerprint: String,
    context: Option<String>,
    seq: i64,
    deleted: i64,
    created_at: String,
    updated_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            sender: row.try_get("sender")?,
            content: row.try_get("content")?,
            fingerprint: row.try_get("fingerprint")?,
            context: row.try_get("context")?,
            seq: row.try_get("seq")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let sender: Sender = self
            .sender
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Message {
            id,
            session_id,
            sender,
            content: self.content,
            fingerprint: self.fingerprint,
            context: self.context,
            seq: self.seq,
            deleted: self.deleted != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> Result<Message, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Sequence assignment and insert are one atomic unit; the
        // single-connection writer pool serializes concurrent turns.
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) + 1 AS next FROM messages WHERE session_id = ?")
            .bind(message.session_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let seq: i64 = row
            .try_get("next")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"INSERT INTO messages (id, session_id, sender, content, fingerprint, context, seq, deleted, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.session_id.to_string())
        .bind(message.sender.to_string())
        .bind(&message.content)
        .bind(&message.fingerprint)
        .bind(&message.context)
        .bind(seq)
        .bind(message.deleted as i64)
        .bind(format_datetime(&message.created_at))
        .bind(format_datetime(&message.updated_at))
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                return Err(RepositoryError::Conflict(format!(
                    "duplicate user message fingerprint in session {}",
                    message.session_id
                )));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut inserted = message.clone();
        inserted.seq = seq;
        Ok(inserted)
    }

    async fn get_in_session(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ? AND session_id = ?")
            .bind(message_id.to_string())
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let msg_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn find_active_user_by_fingerprint(
        &self,
        session_id: &Uuid,
        fingerprint: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM messages WHERE session_id = ? AND sender = 'user' AND fingerprint = ? AND deleted = 0",
        )
        .bind(session_id.to_string())
        .bind(fingerprint)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let msg_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn list_ordered(
        &self,
        session_id: &Uuid,
        active_only: bool,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM messages WHERE session_id = ?");
        if active_only {
            sql.push_str(" AND deleted = 0");
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let rows = sqlx::query(&sql)
            .bind(session_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }

    async fn apply_user_edit(&self, updated: &Message) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE messages SET content = ?, fingerprint = ?, updated_at = ?
               WHERE id = ? AND session_id = ?"#,
        )
        .bind(&updated.content)
        .bind(&updated.fingerprint)
        .bind(format_datetime(&updated.updated_at))
        .bind(updated.id.to_string())
        .bind(updated.session_id.to_string())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => return Err(RepositoryError::NotFound),
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                return Err(RepositoryError::Conflict(format!(
                    "duplicate user message fingerprint in session {}",
                    updated.session_id
                )));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        }

        // Boundary scan on the open transaction: a reply committed by
        // a concurrent turn after the caller's read is still visible
        // here and gets swept.
        let rows = sqlx::query(
            "SELECT id, sender FROM messages WHERE session_id = ? AND seq > ? AND deleted = 0 ORDER BY seq ASC",
        )
        .bind(updated.session_id.to_string())
        .bind(updated.seq)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut stale: Vec<String> = Vec::new();
        for row in &rows {
            let sender: String = row
                .try_get("sender")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            match sender.parse::<Sender>().map_err(RepositoryError::Query)? {
                Sender::User | Sender::System => break,
                Sender::Assistant => stale.push(
                    row.try_get("id")
                        .map_err(|e| RepositoryError::Query(e.to_string()))?,
                ),
            }
        }

        let now = format_datetime(&Utc::now());
        for id in &stale {
            sqlx::query("UPDATE messages SET deleted = 1, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(stale.len() as u64)
    }

    async fn soft_delete_paired(
        &self,
        session_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = sqlx::query(
            "SELECT sender, seq, deleted FROM messages WHERE id = ? AND session_id = ?",
        )
        .bind(message_id.to_string())
        .bind(session_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let row = match row {
            Some(row) => row,
            None => return Err(RepositoryError::NotFound),
        };

        let already_deleted: i64 = row
            .try_get("deleted")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        if already_deleted != 0 {
            return Ok(false);
        }

        let sender: String = row
            .try_get("sender")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let sender: Sender = sender.parse().map_err(RepositoryError::Query)?;
        let seq: i64 = row
            .try_get("seq")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let now = format_datetime(&Utc::now());
        sqlx::query("UPDATE messages SET deleted = 1, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(message_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Pair selection on the open transaction, for the same reason
        // as the edit cascade.
        let mut paired = false;
        if sender == Sender::User {
            let next = sqlx::query(
                "SELECT id, sender FROM messages WHERE session_id = ? AND seq > ? AND deleted = 0 ORDER BY seq ASC LIMIT 1",
            )
            .bind(session_id.to_string())
            .bind(seq)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

            if let Some(next) = next {
                let next_sender: String = next
                    .try_get("sender")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                if next_sender.parse::<Sender>().map_err(RepositoryError::Query)?
                    == Sender::Assistant
                {
                    let next_id: String = next
                        .try_get("id")
                        .map_err(|e| RepositoryError::Query(e.to_string()))?;
                    sqlx::query("UPDATE messages SET deleted = 1, updated_at = ? WHERE id = ?")
                        .bind(&now)
                        .bind(next_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| RepositoryError::Query(e.to_string()))?;
                    paired = true;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(paired)
    }

    async fn soft_delete_all_in_session(
        &self,
        session_id: &Uuid,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE messages SET deleted = 1, updated_at = ? WHERE session_id = ? AND deleted = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(session_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
