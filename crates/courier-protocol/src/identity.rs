//! Identity and relationship types.
//!
//! User profiles and connections are owned by external collaborators (the
//! profile service and the relationship service). Courier reads them to
//! authorize message exchange and to render conversation and notification
//! lists.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user in the mentoring relationship.
///
/// The role only affects who may create a connection; message authorization
/// is symmetric and ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Mentee,
}

impl Role {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Mentor => "mentor",
            Role::Mentee => "mentee",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentor" => Ok(Role::Mentor),
            "mentee" => Ok(Role::Mentee),
            _ => Err("invalid role"),
        }
    }
}

/// Lifecycle status of a connection.
///
/// Only `Accepted` connections authorize message exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            "rejected" => Ok(ConnectionStatus::Rejected),
            _ => Err("invalid connection status"),
        }
    }
}

/// A mentor/mentee relationship record.
///
/// Unique per unordered {mentor, mentee} pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: Uuid,
    pub mentor_id: UserId,
    pub mentee_id: UserId,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Check whether the given pair matches this connection's endpoints,
    /// in either order.
    #[must_use]
    pub fn links(&self, a: UserId, b: UserId) -> bool {
        (self.mentor_id == a && self.mentee_id == b)
            || (self.mentor_id == b && self.mentee_id == a)
    }

    /// The endpoint that is not `user`, if `user` is an endpoint at all.
    #[must_use]
    pub fn peer_of(&self, user: UserId) -> Option<UserId> {
        if self.mentor_id == user {
            Some(self.mentee_id)
        } else if self.mentee_id == user {
            Some(self.mentor_id)
        } else {
            None
        }
    }
}

/// Public profile of a user, as rendered in conversation lists and
/// notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub role: Role,
}
