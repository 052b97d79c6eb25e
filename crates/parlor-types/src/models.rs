use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub img_url: String,
}

/// A one-to-one conversation between two users.
///
/// `blocker_id` is empty while the conversation is not blocked. An empty `id`
/// marks a conversation that has not been saved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user1: String,
    pub user2: String,
    pub is_blocked: bool,
    pub blocker_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Unsaved, unblocked conversation between `user1` and `user2`.
    pub fn open(user1: &str, user2: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            user1: user1.to_string(),
            user2: user2.to_string(),
            is_blocked: false,
            blocker_id: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user1 == user_id || self.user2 == user_id
    }

    /// The participant that is not `user_id`.
    /// Only meaningful when `user_id` is a participant.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user1 == user_id {
            &self.user2
        } else {
            &self.user1
        }
    }

    pub fn blocked_by(&self, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            is_blocked: true,
            blocker_id: user_id.to_string(),
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn unblocked(&self, now: DateTime<Utc>) -> Self {
        Self {
            is_blocked: false,
            blocker_id: String::new(),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// A conversation as seen by one of its participants: the block state plus
/// the identity of the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub img_url: String,
    pub is_blocked: bool,
    pub blocker_id: String,
}

impl FriendProfile {
    pub fn of(conversation: &Conversation, friend: &User) -> Self {
        Self {
            id: conversation.id.clone(),
            email: friend.email.clone(),
            name: friend.name.clone(),
            img_url: friend.img_url.clone(),
            is_blocked: conversation.is_blocked,
            blocker_id: conversation.blocker_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_and_unblock_keep_identity_fields() {
        let created = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_700_000_100, 0).unwrap();

        let mut conv = Conversation::open("a", "b", created);
        conv.id = "c1".into();

        let blocked = conv.blocked_by("b", later);
        assert!(blocked.is_blocked);
        assert_eq!(blocked.blocker_id, "b");
        assert_eq!(blocked.created_at, created);
        assert_eq!(blocked.updated_at, later);
        assert_eq!(blocked.id, "c1");

        let unblocked = blocked.unblocked(later);
        assert!(!unblocked.is_blocked);
        assert_eq!(unblocked.blocker_id, "");
    }

    #[test]
    fn other_participant_is_symmetric() {
        let conv = Conversation::open("a", "b", Utc::now());
        assert_eq!(conv.other_participant("a"), "b");
        assert_eq!(conv.other_participant("b"), "a");
        assert!(conv.has_participant("a"));
        assert!(!conv.has_participant("c"));
    }
}
