//! Notification records.
//!
//! Notifications are a best-effort side channel: produced when something
//! happens to a user (a connection request, an accepted connection, a new
//! message, a rating), listed newest-first on poll, and mutated only by
//! their owner. The payload is a tagged union keyed by the notification
//! kind, so each kind carries exactly the fields its renderer needs.

use crate::{UserId, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ConnectionRequest,
    Message,
    Rating,
    ConnectionAccepted,
}

impl NotificationKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::ConnectionRequest => "connection_request",
            NotificationKind::Message => "message",
            NotificationKind::Rating => "rating",
            NotificationKind::ConnectionAccepted => "connection_accepted",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection_request" => Ok(NotificationKind::ConnectionRequest),
            "message" => Ok(NotificationKind::Message),
            "rating" => Ok(NotificationKind::Rating),
            "connection_accepted" => Ok(NotificationKind::ConnectionAccepted),
            _ => Err("invalid notification kind"),
        }
    }
}

/// Typed payload, one variant per notification kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    #[serde(rename_all = "camelCase")]
    ConnectionRequest { connection_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Message { message_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Rating {
        rating: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        review: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionAccepted { connection_id: Uuid },
}

impl NotificationPayload {
    /// The kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationPayload::ConnectionRequest { .. } => NotificationKind::ConnectionRequest,
            NotificationPayload::Message { .. } => NotificationKind::Message,
            NotificationPayload::Rating { .. } => NotificationKind::Rating,
            NotificationPayload::ConnectionAccepted { .. } => NotificationKind::ConnectionAccepted,
        }
    }
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<UserId>,
    pub body: String,
    pub payload: NotificationPayload,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification as listed to its owner, with the source user's public
/// profile resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: NotificationRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user: Option<UserProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind_agreement() {
        let payloads = [
            NotificationPayload::ConnectionRequest {
                connection_id: Uuid::new_v4(),
            },
            NotificationPayload::Message {
                message_id: Uuid::new_v4(),
            },
            NotificationPayload::Rating {
                rating: 5,
                review: Some("great mentor".to_string()),
            },
            NotificationPayload::ConnectionAccepted {
                connection_id: Uuid::new_v4(),
            },
        ];

        let kinds = [
            NotificationKind::ConnectionRequest,
            NotificationKind::Message,
            NotificationKind::Rating,
            NotificationKind::ConnectionAccepted,
        ];

        for (payload, kind) in payloads.iter().zip(kinds) {
            assert_eq!(payload.kind(), kind);
        }
    }

    #[test]
    fn test_payload_tagged_by_kind() {
        let payload = NotificationPayload::Rating {
            rating: 4,
            review: None,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "rating");
        assert_eq!(json["rating"], 4);
        assert!(json.get("review").is_none());

        let back: NotificationPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            NotificationKind::ConnectionRequest,
            NotificationKind::Message,
            NotificationKind::Rating,
            NotificationKind::ConnectionAccepted,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
        }
    }
}
