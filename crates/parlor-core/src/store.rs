use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parlor_types::events::GatewayEvent;
use parlor_types::models::{Conversation, User};

pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    /// Unknown ids are skipped, so the result may be shorter than `ids`.
    fn find_all_by_id(&self, ids: &[String]) -> Result<Vec<User>>;
}

pub trait ConversationStore: Send + Sync {
    /// Order-independent: `(a, b)` and `(b, a)` find the same conversation.
    fn find_by_pair(&self, a: &str, b: &str) -> Result<Option<Conversation>>;
    fn find_by_id(&self, id: &str) -> Result<Option<Conversation>>;
    fn find_all_by_participant_updated_after(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Conversation>>;
    /// Insert or update. Assigns an id when `conversation.id` is empty.
    /// Fails with [`DuplicateConversation`] if another conversation already
    /// pairs the same two users.
    fn save(&self, conversation: Conversation) -> Result<Conversation>;
}

/// Fire-and-forget delivery of an event to one user.
pub trait NotificationChannel: Send + Sync {
    fn publish(&self, user_id: &str, event: GatewayEvent);
}

#[derive(Debug, Error)]
#[error("a conversation between {0} and {1} already exists")]
pub struct DuplicateConversation(pub String, pub String);
