use crate::models::{ConversationRow, UserRow};
use crate::Database;
use anyhow::Result;
use parlor_core::store::DuplicateConversation;
use rusqlite::{Connection, Row, ffi};
use thiserror::Error;

/// Returned by [`Database::create_user`] when the email is already registered.
#[derive(Debug, Error)]
#[error("email {0} is already registered")]
pub struct EmailTaken(pub String);

const USER_COLUMNS: &str = "id, email, name, img_url, password, created_at";
const CONVERSATION_COLUMNS: &str =
    "id, user1_id, user2_id, is_blocked, blocker_id, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        name: &str,
        img_url: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO users (id, email, name, img_url, password) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, name, img_url, password_hash),
            );

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(EmailTaken(email.to_string()).into()),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Batch-fetch users for a set of ids. Unknown ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM users WHERE id IN ({})",
                USER_COLUMNS,
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Conversations --

    pub fn get_conversation_by_id(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
            let row = conn.query_row(&sql, [id], conversation_row).optional()?;
            Ok(row)
        })
    }

    /// Conversation between `a` and `b`, regardless of who opened it.
    pub fn get_conversation_by_pair(&self, a: &str, b: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations
                 WHERE (user1_id = ?1 AND user2_id = ?2) OR (user1_id = ?2 AND user2_id = ?1)",
                CONVERSATION_COLUMNS
            );
            let row = conn.query_row(&sql, [a, b], conversation_row).optional()?;
            Ok(row)
        })
    }

    /// Conversations involving `user_id` with `updated_at` strictly after
    /// `after`. Timestamps must use the same fixed-width format as stored.
    pub fn get_conversations_updated_after(
        &self,
        user_id: &str,
        after: &str,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversations
                 WHERE (user1_id = ?1 OR user2_id = ?1) AND updated_at > ?2
                 ORDER BY updated_at DESC",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id, after], conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a conversation, or update the block state of an existing one.
    /// Participants and `created_at` never change after the first insert.
    pub fn upsert_conversation(&self, row: &ConversationRow) -> Result<()> {
        self.with_conn(|conn| {
            let result = conn.execute(
                "INSERT INTO conversations
                     (id, user1_id, user2_id, is_blocked, blocker_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     is_blocked = excluded.is_blocked,
                     blocker_id = excluded.blocker_id,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    row.id,
                    row.user1_id,
                    row.user2_id,
                    row.is_blocked,
                    row.blocker_id,
                    row.created_at,
                    row.updated_at,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(DuplicateConversation(row.user1_id.clone(), row.user2_id.clone()).into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], user_row).optional()?;
    Ok(row)
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        img_url: row.get(3)?,
        password: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn conversation_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        is_blocked: row.get(3)?,
        blocker_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
