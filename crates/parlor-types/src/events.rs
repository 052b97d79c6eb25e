use serde::{Deserialize, Serialize};

use crate::models::FriendProfile;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: String, name: String },

    /// Someone started a conversation with the receiving user
    ConversationAdded(FriendProfile),

    /// A conversation the receiving user is part of was blocked or unblocked
    ConversationUpdated(FriendProfile),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}
