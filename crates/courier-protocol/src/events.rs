//! Realtime events exchanged over the WebSocket channel.
//!
//! Events are adjacently tagged JSON: `{"event": "...", "data": {...}}`.
//! Client events are relayed point-to-point and never persisted; server
//! events are pushed best-effort, at most once.

use crate::{MessageRecord, MessageStatus, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Typing indicator, relayed only to the receiver's channel.
    #[serde(rename_all = "camelCase")]
    Typing { receiver_id: UserId, is_typing: bool },

    /// Optimistic read receipt, relayed only to the sender's channel.
    ///
    /// This path is additional to the REST acknowledgement: it updates the
    /// sender's UI immediately and persists nothing.
    #[serde(rename_all = "camelCase")]
    MessageRead { sender_id: UserId, message_id: Uuid },
}

/// Events the server pushes to client channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A message addressed to this channel's user, pushed at send time.
    NewMessage(MessageRecord),

    /// A message of this channel's user has been read by its receiver.
    #[serde(rename_all = "camelCase")]
    MessageRead {
        message_id: Uuid,
        status: MessageStatus,
    },

    /// The peer is (or stopped) typing.
    #[serde(rename_all = "camelCase")]
    UserTyping { sender_id: UserId, is_typing: bool },

    /// Full snapshot of online user ids, broadcast on every presence change.
    GetOnlineUsers(Vec<UserId>),
}

impl ServerEvent {
    /// Read receipt for a message, as pushed to its sender.
    #[must_use]
    pub fn read_receipt(message_id: Uuid) -> Self {
        ServerEvent::MessageRead {
            message_id,
            status: MessageStatus::Read,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "typing",
            "data": { "receiverId": Uuid::new_v4(), "isTyping": true }
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::Typing { is_typing: true, .. }));

        let event: ClientEvent = serde_json::from_value(json!({
            "event": "messageRead",
            "data": { "senderId": Uuid::new_v4(), "messageId": Uuid::new_v4() }
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::MessageRead { .. }));
    }

    #[test]
    fn test_server_event_wire_names() {
        let snapshot = ServerEvent::GetOnlineUsers(vec![Uuid::new_v4()]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["event"], "getOnlineUsers");
        assert!(json["data"].is_array());

        let receipt = ServerEvent::read_receipt(Uuid::new_v4());
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["event"], "messageRead");
        assert_eq!(json["data"]["status"], "read");

        let typing = ServerEvent::UserTyping {
            sender_id: Uuid::new_v4(),
            is_typing: false,
        };
        let json = serde_json::to_value(&typing).unwrap();
        assert_eq!(json["event"], "userTyping");
        assert_eq!(json["data"]["isTyping"], false);
    }

    #[test]
    fn test_new_message_carries_full_record() {
        let record = MessageRecord {
            id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            text: Some("hello".to_string()),
            image_url: None,
            status: MessageStatus::Delivered,
            is_read: false,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(ServerEvent::NewMessage(record.clone())).unwrap();
        assert_eq!(json["event"], "newMessage");
        assert_eq!(json["data"]["text"], "hello");
        assert_eq!(json["data"]["status"], "delivered");

        let back: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ServerEvent::NewMessage(record));
    }
}
