use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use parlor_core::store::NotificationChannel;
use parlor_types::events::GatewayEvent;

/// Routes targeted events to connected users.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-user targeted send channels: user_id -> (conn_id, sender).
    /// Held only for map access, never across an await.
    user_channels: RwLock<HashMap<String, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    /// A newer connection of the same user replaces the older one.
    pub fn register_user_channel(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.user_channels.write() {
            Ok(mut channels) => {
                channels.insert(user_id.to_string(), (conn_id, tx));
            }
            Err(e) => warn!("user channel lock poisoned, {} not registered: {}", user_id, e),
        }
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub fn unregister_user_channel(&self, user_id: &str, conn_id: Uuid) {
        let Ok(mut channels) = self.inner.user_channels.write() else {
            return;
        };
        if let Some((stored_conn_id, _)) = channels.get(user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(user_id);
            }
        }
    }

    /// Send a targeted event to a specific user.
    /// Returns false if the user has no live connection.
    pub fn send_to_user(&self, user_id: &str, event: GatewayEvent) -> bool {
        let Ok(channels) = self.inner.user_channels.read() else {
            return false;
        };
        match channels.get(user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn online_count(&self) -> usize {
        self.inner
            .user_channels
            .read()
            .map(|channels| channels.len())
            .unwrap_or(0)
    }
}

impl NotificationChannel for Dispatcher {
    fn publish(&self, user_id: &str, event: GatewayEvent) {
        if !self.send_to_user(user_id, event) {
            debug!("{} is offline, notification dropped", user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use parlor_types::models::FriendProfile;

    use super::*;

    fn added(id: &str) -> GatewayEvent {
        GatewayEvent::ConversationAdded(FriendProfile {
            id: id.into(),
            email: "u1@x.com".into(),
            name: "U1".into(),
            img_url: String::new(),
            is_blocked: false,
            blocker_id: String::new(),
        })
    }

    #[tokio::test]
    async fn publish_reaches_only_the_addressed_user() {
        let dispatcher = Dispatcher::new();
        let (_, mut rx1) = dispatcher.register_user_channel("user-1");
        let (_, mut rx2) = dispatcher.register_user_channel("user-2");

        dispatcher.publish("user-2", added("c1"));

        assert_eq!(rx2.recv().await, Some(added("c1")));
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn publish_to_offline_user_is_dropped() {
        let dispatcher = Dispatcher::new();
        dispatcher.publish("user-9", added("c1"));
        assert!(!dispatcher.send_to_user("user-9", added("c1")));
    }

    #[test]
    fn stale_unregister_keeps_newer_connection() {
        let dispatcher = Dispatcher::new();
        let (old_conn, _old_rx) = dispatcher.register_user_channel("user-1");
        let (new_conn, mut new_rx) = dispatcher.register_user_channel("user-1");
        assert_eq!(dispatcher.online_count(), 1);

        dispatcher.unregister_user_channel("user-1", old_conn);
        assert!(dispatcher.send_to_user("user-1", added("c1")));
        assert_eq!(new_rx.try_recv().ok(), Some(added("c1")));

        dispatcher.unregister_user_channel("user-1", new_conn);
        assert_eq!(dispatcher.online_count(), 0);
    }
}
