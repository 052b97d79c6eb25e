use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use parlor_types::api::Claims;
use parlor_types::events::GatewayEvent;
use parlor_types::models::{Conversation, FriendProfile, User};

use crate::error::{Result, ServiceError};
use crate::store::{ConversationStore, DuplicateConversation, NotificationChannel, UserStore};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
    pub img_url: String,
}

impl Principal {
    /// How the caller appears to the other participant of `conversation`.
    fn profile_in(&self, conversation: &Conversation) -> FriendProfile {
        FriendProfile {
            id: conversation.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            img_url: self.img_url.clone(),
            is_blocked: conversation.is_blocked,
            blocker_id: conversation.blocker_id.clone(),
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            img_url: claims.img_url,
        }
    }
}

pub struct ConversationService {
    users: Arc<dyn UserStore>,
    conversations: Arc<dyn ConversationStore>,
    notifications: Arc<dyn NotificationChannel>,
}

impl ConversationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        conversations: Arc<dyn ConversationStore>,
        notifications: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self {
            users,
            conversations,
            notifications,
        }
    }

    /// Start a conversation between the caller and the user registered under
    /// `email`. The target is notified with the caller's profile.
    pub fn new_conversation(&self, caller: &Principal, email: &str) -> Result<FriendProfile> {
        let friend = self
            .users
            .find_by_email(email)?
            .ok_or_else(|| ServiceError::not_found("User", "email", email))?;

        if friend.id == caller.id {
            return Err(ServiceError::bad_request(
                "Cannot start a conversation with yourself",
            ));
        }

        if self.conversations.find_by_pair(&caller.id, &friend.id)?.is_some() {
            warn!("{} tried to re-open conversation with {}", caller.id, friend.id);
            return Err(already_exists(email));
        }

        let saved = self
            .conversations
            .save(Conversation::open(&caller.id, &friend.id, Utc::now()))
            .map_err(|e| {
                // Lost a concurrent create for the same pair
                if e.is::<DuplicateConversation>() {
                    already_exists(email)
                } else {
                    ServiceError::Store(e)
                }
            })?;

        info!("Conversation {} opened between {} and {}", saved.id, caller.id, friend.id);

        self.notifications.publish(
            &friend.id,
            GatewayEvent::ConversationAdded(caller.profile_in(&saved)),
        );

        Ok(FriendProfile::of(&saved, &friend))
    }

    /// Every conversation of `user_id` updated strictly after `since`, as
    /// profiles of the other participants. Order is unspecified.
    pub fn get_conversations(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<FriendProfile>> {
        let mut friends: HashMap<String, Conversation> = HashMap::new();
        for conversation in self
            .conversations
            .find_all_by_participant_updated_after(user_id, since)?
        {
            let friend_id = conversation.other_participant(user_id).to_string();
            friends.insert(friend_id, conversation);
        }

        let ids: Vec<String> = friends.keys().cloned().collect();
        let users = self.users.find_all_by_id(&ids)?;

        debug!(
            "{} has {} conversations updated after {} ({} users resolved)",
            user_id,
            friends.len(),
            since,
            users.len()
        );

        Ok(users
            .iter()
            .filter_map(|user| friends.get(&user.id).map(|conv| FriendProfile::of(conv, user)))
            .collect())
    }

    /// Block a conversation. Only a participant may block, and only while
    /// nobody has blocked it yet.
    pub fn block_conversation(&self, id: &str, caller: &Principal) -> Result<FriendProfile> {
        let conversation = self.find_conversation(id)?;

        if !conversation.has_participant(&caller.id) || !conversation.blocker_id.is_empty() {
            warn!("{} was refused blocking conversation {}", caller.id, id);
            return Err(ServiceError::bad_request("Sorry, you cannot block this conversation"));
        }

        let saved = self
            .conversations
            .save(conversation.blocked_by(&caller.id, Utc::now()))?;
        info!("Conversation {} blocked by {}", saved.id, caller.id);

        self.notify_updated(&saved, caller)
    }

    /// Lift a block. Only the participant who placed it may lift it.
    pub fn unblock_conversation(&self, id: &str, caller: &Principal) -> Result<FriendProfile> {
        let conversation = self.find_conversation(id)?;

        if !conversation.has_participant(&caller.id) || conversation.blocker_id != caller.id {
            warn!("{} was refused unblocking conversation {}", caller.id, id);
            return Err(ServiceError::bad_request("Sorry, you cannot unblock this conversation"));
        }

        let saved = self.conversations.save(conversation.unblocked(Utc::now()))?;
        info!("Conversation {} unblocked by {}", saved.id, caller.id);

        self.notify_updated(&saved, caller)
    }

    /// Not implemented yet: always empty.
    pub fn blocked_conversations(&self) -> Vec<Conversation> {
        debug!("blocked_conversations is not implemented, returning nothing");
        Vec::new()
    }

    fn find_conversation(&self, id: &str) -> Result<Conversation> {
        self.conversations
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found("Conversation", "id", id))
    }

    fn find_user(&self, id: &str) -> Result<User> {
        self.users
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::not_found("User", "id", id))
    }

    /// Tell the other participant about a block state change and return
    /// their profile to the caller.
    fn notify_updated(&self, saved: &Conversation, caller: &Principal) -> Result<FriendProfile> {
        let friend = self.find_user(saved.other_participant(&caller.id))?;

        self.notifications.publish(
            &friend.id,
            GatewayEvent::ConversationUpdated(caller.profile_in(saved)),
        );

        Ok(FriendProfile::of(saved, &friend))
    }
}

fn already_exists(email: &str) -> ServiceError {
    ServiceError::bad_request(format!("Conversation with {} already exists", email))
}
