use anyhow::Result;
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use parlor_core::store::{ConversationStore, UserStore};
use parlor_types::models::{Conversation, User};

use crate::Database;
use crate::models::{ConversationRow, UserRow};

impl UserStore for Database {
    fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.get_user_by_email(email)?.map(user_from_row))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.get_user_by_id(id)?.map(user_from_row))
    }

    fn find_all_by_id(&self, ids: &[String]) -> Result<Vec<User>> {
        Ok(self.get_users_by_ids(ids)?.into_iter().map(user_from_row).collect())
    }
}

impl ConversationStore for Database {
    fn find_by_pair(&self, a: &str, b: &str) -> Result<Option<Conversation>> {
        Ok(self.get_conversation_by_pair(a, b)?.map(conversation_from_row))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.get_conversation_by_id(id)?.map(conversation_from_row))
    }

    fn find_all_by_participant_updated_after(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Conversation>> {
        let rows = self.get_conversations_updated_after(user_id, &format_timestamp(after))?;
        Ok(rows.into_iter().map(conversation_from_row).collect())
    }

    fn save(&self, mut conversation: Conversation) -> Result<Conversation> {
        if conversation.id.is_empty() {
            conversation.id = Uuid::new_v4().to_string();
        }

        self.upsert_conversation(&ConversationRow {
            id: conversation.id.clone(),
            user1_id: conversation.user1.clone(),
            user2_id: conversation.user2.clone(),
            is_blocked: conversation.is_blocked,
            blocker_id: conversation.blocker_id.clone(),
            created_at: format_timestamp(conversation.created_at),
            updated_at: format_timestamp(conversation.updated_at),
        })?;

        Ok(conversation)
    }
}

const MIN_TIMESTAMP: &str = "0000-01-01T00:00:00.000000000Z";
const MAX_TIMESTAMP: &str = "9999-12-31T23:59:59.999999999Z";

/// Fixed-width RFC 3339 so that SQLite's text comparison matches time order.
/// Years outside 0..=9999 would gain a sign and break the ordering, so they
/// are clamped to the representable range.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    match at.year() {
        year if year > 9999 => MAX_TIMESTAMP.to_string(),
        year if year < 0 => MIN_TIMESTAMP.to_string(),
        _ => at.to_rfc3339_opts(SecondsFormat::Nanos, true),
    }
}

fn parse_timestamp(raw: &str, conversation_id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on conversation '{}': {}", raw, conversation_id, e);
            DateTime::default()
        })
}

fn user_from_row(row: UserRow) -> User {
    User {
        id: row.id,
        email: row.email,
        name: row.name,
        img_url: row.img_url,
    }
}

fn conversation_from_row(row: ConversationRow) -> Conversation {
    Conversation {
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
        id: row.id,
        user1: row.user1_id,
        user2: row.user2_id,
        is_blocked: row.is_blocked,
        blocker_id: row.blocker_id,
    }
}
