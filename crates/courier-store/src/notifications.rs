//! Notification fanout.
//!
//! Creation is best-effort by contract: a notification is a side channel
//! for an action that already succeeded, so a storage failure here is
//! logged and swallowed, never propagated to the triggering action. The
//! owner-facing reads and mutations propagate failures normally.

use crate::connections::parse_uuid;
use crate::{Store, StoreError};
use chrono::{DateTime, Utc};
use courier_protocol::{
    NotificationKind, NotificationPayload, NotificationRecord, NotificationView, Role, UserId,
    UserProfile,
};
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    kind: String,
    from_user_id: Option<String>,
    body: String,
    payload: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationRecord {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let payload: NotificationPayload = serde_json::from_str(&row.payload)
            .map_err(|e| StoreError::decode(format!("notifications.payload: {e}")))?;
        Ok(NotificationRecord {
            id: parse_uuid(&row.id, "notifications.id")?,
            user_id: parse_uuid(&row.user_id, "notifications.user_id")?,
            kind: row
                .kind
                .parse::<NotificationKind>()
                .map_err(StoreError::decode)?,
            from_user_id: row
                .from_user_id
                .as_deref()
                .map(|id| parse_uuid(id, "notifications.from_user_id"))
                .transpose()?,
            body: row.body,
            payload,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

/// Notification row joined with the source user's profile columns.
#[derive(FromRow)]
struct NotificationViewRow {
    id: String,
    user_id: String,
    kind: String,
    from_user_id: Option<String>,
    body: String,
    payload: String,
    is_read: bool,
    created_at: DateTime<Utc>,
    from_display_name: Option<String>,
    from_avatar_url: Option<String>,
    from_role: Option<String>,
}

impl TryFrom<NotificationViewRow> for NotificationView {
    type Error = StoreError;

    fn try_from(row: NotificationViewRow) -> Result<Self, Self::Error> {
        let from_user = match (&row.from_user_id, &row.from_display_name, &row.from_role) {
            (Some(id), Some(name), Some(role)) => Some(UserProfile {
                id: parse_uuid(id, "users.id")?,
                display_name: name.clone(),
                avatar_url: row.from_avatar_url.clone(),
                role: role.parse::<Role>().map_err(StoreError::decode)?,
            }),
            _ => None,
        };

        let notification = NotificationRecord::try_from(NotificationRow {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            from_user_id: row.from_user_id,
            body: row.body,
            payload: row.payload,
            is_read: row.is_read,
            created_at: row.created_at,
        })?;

        Ok(NotificationView {
            notification,
            from_user,
        })
    }
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, from_user_id, body, payload, is_read, created_at";

impl Store {
    /// Persist a notification, best-effort.
    ///
    /// Returns the record on success and `None` on failure; the failure is
    /// logged at warn and must never bubble into the triggering action.
    pub async fn notify(
        &self,
        user: UserId,
        from: Option<UserId>,
        body: impl Into<String>,
        payload: NotificationPayload,
    ) -> Option<NotificationRecord> {
        match self.try_notify(user, from, body.into(), payload).await {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(user = %user, error = %error, "Notification write failed, dropping");
                None
            }
        }
    }

    async fn try_notify(
        &self,
        user: UserId,
        from: Option<UserId>,
        body: String,
        payload: NotificationPayload,
    ) -> Result<NotificationRecord, StoreError> {
        let record = NotificationRecord {
            id: Uuid::now_v7(),
            user_id: user,
            kind: payload.kind(),
            from_user_id: from,
            body,
            payload,
            is_read: false,
            created_at: Utc::now(),
        };

        let payload_json = serde_json::to_string(&record.payload)
            .map_err(|e| StoreError::decode(format!("notification payload: {e}")))?;

        sqlx::query(
            "INSERT INTO notifications
             (id, user_id, kind, from_user_id, body, payload, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(record.kind.as_str())
        .bind(record.from_user_id.map(|id| id.to_string()))
        .bind(&record.body)
        .bind(payload_json)
        .bind(record.is_read)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// All of a user's notifications, newest first, with the source user's
    /// profile resolved.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn notifications(&self, user: UserId) -> Result<Vec<NotificationView>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationViewRow>(
            "SELECT n.id, n.user_id, n.kind, n.from_user_id, n.body, n.payload,
                    n.is_read, n.created_at,
                    u.display_name AS from_display_name,
                    u.avatar_url   AS from_avatar_url,
                    u.role         AS from_role
             FROM notifications n
             LEFT JOIN users u ON u.id = n.from_user_id
             WHERE n.user_id = ?
             ORDER BY n.created_at DESC, n.rowid DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(NotificationView::try_from).collect()
    }

    /// Flip one of the owner's notifications to read.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown or owned by someone else.
    pub async fn mark_notification_read(
        &self,
        user: UserId,
        id: Uuid,
    ) -> Result<NotificationRecord, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "UPDATE notifications SET is_read = 1
             WHERE id = ? AND user_id = ?
             RETURNING {NOTIFICATION_COLUMNS}",
        ))
        .bind(id.to_string())
        .bind(user.to_string())
        .fetch_optional(&self.pool)
        .await?;

        NotificationRecord::try_from(row.ok_or(StoreError::NotFound("notification"))?)
    }

    /// Flip all of the user's unread notifications to read.
    ///
    /// Returns the number flipped.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn mark_all_notifications_read(&self, user: UserId) -> Result<u64, StoreError> {
        let flipped =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user.to_string())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(flipped)
    }

    /// Delete one of the owner's notifications.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown or owned by someone else.
    pub async fn delete_notification(&self, user: UserId, id: Uuid) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(StoreError::NotFound("notification"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::connected_store;

    fn accepted(connection_id: Uuid) -> NotificationPayload {
        NotificationPayload::ConnectionAccepted { connection_id }
    }

    #[tokio::test]
    async fn test_notify_and_list_newest_first_with_profile() {
        let (store, mentor, mentee) = connected_store().await;

        store
            .notify(mentor, Some(mentee), "Bram accepted your request", accepted(Uuid::new_v4()))
            .await
            .unwrap();
        store
            .notify(
                mentor,
                Some(mentee),
                "New message from Bram",
                NotificationPayload::Message {
                    message_id: Uuid::new_v4(),
                },
            )
            .await
            .unwrap();

        let listed = store.notifications(mentor).await.unwrap();
        assert_eq!(listed.len(), 2);
        // Newest first.
        assert_eq!(listed[0].notification.kind, NotificationKind::Message);
        assert_eq!(
            listed[1].notification.kind,
            NotificationKind::ConnectionAccepted
        );
        // Source profile resolved.
        let from = listed[0].from_user.as_ref().unwrap();
        assert_eq!(from.id, mentee);
        assert_eq!(from.display_name, "Bram");
    }

    #[tokio::test]
    async fn test_notify_failure_is_swallowed() {
        let (store, mentor, mentee) = connected_store().await;

        // Simulate a broken notification store; the producing action must
        // still succeed, so notify reports nothing worse than None.
        sqlx::raw_sql("DROP TABLE notifications")
            .execute(store.pool())
            .await
            .unwrap();

        let result = store
            .notify(mentor, Some(mentee), "connection accepted", accepted(Uuid::new_v4()))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_is_owner_scoped() {
        let (store, mentor, mentee) = connected_store().await;

        let record = store
            .notify(mentor, Some(mentee), "hello", accepted(Uuid::new_v4()))
            .await
            .unwrap();

        // The non-owner cannot flip it.
        assert!(matches!(
            store.mark_notification_read(mentee, record.id).await,
            Err(StoreError::NotFound("notification"))
        ));

        let read = store.mark_notification_read(mentor, record.id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(read.payload, record.payload);
    }

    #[tokio::test]
    async fn test_mark_all_flips_only_unread() {
        let (store, mentor, mentee) = connected_store().await;

        let first = store
            .notify(mentor, Some(mentee), "a", accepted(Uuid::new_v4()))
            .await
            .unwrap();
        store
            .notify(mentor, Some(mentee), "b", accepted(Uuid::new_v4()))
            .await
            .unwrap();
        store.mark_notification_read(mentor, first.id).await.unwrap();

        assert_eq!(store.mark_all_notifications_read(mentor).await.unwrap(), 1);
        assert_eq!(store.mark_all_notifications_read(mentor).await.unwrap(), 0);

        let listed = store.notifications(mentor).await.unwrap();
        assert!(listed.iter().all(|n| n.notification.is_read));
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let (store, mentor, mentee) = connected_store().await;

        let record = store
            .notify(mentor, Some(mentee), "bye", accepted(Uuid::new_v4()))
            .await
            .unwrap();

        assert!(matches!(
            store.delete_notification(mentee, record.id).await,
            Err(StoreError::NotFound("notification"))
        ));

        store.delete_notification(mentor, record.id).await.unwrap();
        assert!(store.notifications(mentor).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_notification(mentor, record.id).await,
            Err(StoreError::NotFound("notification"))
        ));
    }
}
