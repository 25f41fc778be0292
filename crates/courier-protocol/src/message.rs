//! Message records and the delivery status machine.
//!
//! A message moves `sent` -> `delivered` -> `read`, strictly forward. The
//! `delivered` hop only happens when the receiver is online at send time;
//! an offline receiver's messages skip it and advance straight to `read`
//! the next time the receiver fetches the transcript or acknowledges.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Persisted, receiver was offline at send time.
    Sent,
    /// Pushed to the receiver's live channel.
    Delivered,
    /// Acknowledged by the receiver. Terminal.
    Read,
}

impl MessageStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }

    /// Whether a transition to `next` is a forward move.
    ///
    /// Status never regresses; a repeated transition to the current state
    /// is not a forward move either (callers treat it as a no-op).
    #[must_use]
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        rank(next) > rank(self)
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == MessageStatus::Read
    }
}

fn rank(status: MessageStatus) -> u8 {
    match status {
        MessageStatus::Sent => 0,
        MessageStatus::Delivered => 1,
        MessageStatus::Read => 2,
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            _ => Err("invalid message status"),
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted message.
///
/// `is_read` mirrors `status == Read`; both are kept because clients key
/// off the boolean for unread badges and off the status for receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    /// The accepted connection that authorized this message at write time.
    pub connection_id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: MessageStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
