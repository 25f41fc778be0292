//! Connection gate and collaborator-owned directory records.
//!
//! Users and connections are created elsewhere (profile and relationship
//! services); this module gives them write entry points and gives Courier
//! the reads it needs: the symmetric accepted-pair check that gates every
//! message operation, and the peer list behind the conversations endpoint.

use crate::{Store, StoreError};
use chrono::{DateTime, Utc};
use courier_protocol::{Connection, ConnectionStatus, Role, UserId, UserProfile};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(FromRow)]
struct ConnectionRow {
    id: String,
    mentor_id: String,
    mentee_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRow> for Connection {
    type Error = StoreError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(Connection {
            id: parse_uuid(&row.id, "connections.id")?,
            mentor_id: parse_uuid(&row.mentor_id, "connections.mentor_id")?,
            mentee_id: parse_uuid(&row.mentee_id, "connections.mentee_id")?,
            status: row
                .status
                .parse::<ConnectionStatus>()
                .map_err(StoreError::decode)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    avatar_url: Option<String>,
    role: String,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: parse_uuid(&row.id, "users.id")?,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            role: row.role.parse::<Role>().map_err(StoreError::decode)?,
        })
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|_| StoreError::decode(format!("{column}: {value}")))
}

impl Store {
    /// Insert or update a user profile. Called by the profile collaborator.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, display_name, avatar_url, role) VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE
             SET display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url,
                 role = excluded.role",
        )
        .bind(profile.id.to_string())
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(profile.role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a user's public profile.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn user_profile(&self, user: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, avatar_url, role FROM users WHERE id = ?",
        )
        .bind(user.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserProfile::try_from).transpose()
    }

    /// Insert or update a connection record. Called by the relationship
    /// collaborator; Courier itself never changes connection state.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn upsert_connection(&self, connection: &Connection) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO connections (id, mentor_id, mentee_id, status, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET status = excluded.status",
        )
        .bind(connection.id.to_string())
        .bind(connection.mentor_id.to_string())
        .bind(connection.mentee_id.to_string())
        .bind(connection.status.as_str())
        .bind(connection.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The connection gate: succeed iff an accepted connection exists with
    /// endpoints {a, b}, in either order. Caller role is irrelevant.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when no accepted connection links the pair.
    pub async fn authorize(&self, a: UserId, b: UserId) -> Result<Connection, StoreError> {
        let row = sqlx::query_as::<_, ConnectionRow>(
            "SELECT id, mentor_id, mentee_id, status, created_at
             FROM connections
             WHERE status = 'accepted'
               AND ((mentor_id = ? AND mentee_id = ?) OR (mentor_id = ? AND mentee_id = ?))",
        )
        .bind(a.to_string())
        .bind(b.to_string())
        .bind(b.to_string())
        .bind(a.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Connection::try_from(row),
            None => Err(StoreError::PermissionDenied),
        }
    }

    /// Profiles of everyone the user shares an accepted connection with.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn peers(&self, user: UserId) -> Result<Vec<UserProfile>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.display_name, u.avatar_url, u.role
             FROM connections c
             JOIN users u
               ON u.id = CASE WHEN c.mentor_id = ? THEN c.mentee_id ELSE c.mentor_id END
             WHERE c.status = 'accepted' AND (c.mentor_id = ? OR c.mentee_id = ?)",
        )
        .bind(user.to_string())
        .bind(user.to_string())
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }
}
