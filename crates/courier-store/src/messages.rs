//! Message persistence and the delivery status machine.
//!
//! Every operation here is gated by the connection check in
//! [`crate::connections`]. Status only moves forward; the guarded UPDATEs
//! carry the previous status in their WHERE clause so concurrent
//! transitions on the same row cannot regress it.

use crate::connections::parse_uuid;
use crate::{Store, StoreError};
use chrono::{DateTime, Utc};
use courier_core::Hub;
use courier_protocol::{MessageRecord, MessageStatus, ServerEvent, UserId};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

/// A message draft as accepted by the send operation.
///
/// At least one of `text` and `image_url` must be present and non-empty.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub text: Option<String>,
    pub image_url: Option<String>,
}

impl NewMessage {
    fn normalized(self) -> Result<(Option<String>, Option<String>), StoreError> {
        let text = self.text.filter(|t| !t.trim().is_empty());
        let image_url = self.image_url.filter(|u| !u.trim().is_empty());
        if text.is_none() && image_url.is_none() {
            return Err(StoreError::validation("message requires text or an image"));
        }
        Ok((text, image_url))
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    connection_id: String,
    sender_id: String,
    receiver_id: String,
    text: Option<String>,
    image_url: Option<String>,
    status: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(MessageRecord {
            id: parse_uuid(&row.id, "messages.id")?,
            connection_id: parse_uuid(&row.connection_id, "messages.connection_id")?,
            sender_id: parse_uuid(&row.sender_id, "messages.sender_id")?,
            receiver_id: parse_uuid(&row.receiver_id, "messages.receiver_id")?,
            text: row.text,
            image_url: row.image_url,
            status: row
                .status
                .parse::<MessageStatus>()
                .map_err(StoreError::decode)?,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str =
    "id, connection_id, sender_id, receiver_id, text, image_url, status, is_read, created_at";

impl Store {
    /// Persist and (when the receiver is online) deliver a message.
    ///
    /// The message is inserted as `sent`. If the receiver resolves in the
    /// presence registry it is advanced to `delivered` with a guarded
    /// update and the final record is pushed over the hub; push failure is
    /// silent and does not affect the result.
    ///
    /// # Errors
    ///
    /// `Validation` when the draft is empty, `PermissionDenied` when no
    /// accepted connection links the pair.
    pub async fn send_message(
        &self,
        hub: &Hub,
        sender: UserId,
        receiver: UserId,
        draft: NewMessage,
    ) -> Result<MessageRecord, StoreError> {
        let (text, image_url) = draft.normalized()?;
        let connection = self.authorize(sender, receiver).await?;

        let mut record = MessageRecord {
            id: Uuid::now_v7(),
            connection_id: connection.id,
            sender_id: sender,
            receiver_id: receiver,
            text,
            image_url,
            status: MessageStatus::Sent,
            is_read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO messages
             (id, connection_id, sender_id, receiver_id, text, image_url, status, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.connection_id.to_string())
        .bind(record.sender_id.to_string())
        .bind(record.receiver_id.to_string())
        .bind(&record.text)
        .bind(&record.image_url)
        .bind(record.status.as_str())
        .bind(record.is_read)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        // Delivered only if the receiver is registered right now. Offline
        // receivers are never retried; their copy goes straight to `read`
        // on the next transcript fetch or explicit ack.
        if hub.is_online(receiver) {
            let advanced = sqlx::query(
                "UPDATE messages SET status = 'delivered' WHERE id = ? AND status = 'sent'",
            )
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

            if advanced > 0 {
                record.status = MessageStatus::Delivered;
            }
            hub.send_to_user(receiver, ServerEvent::NewMessage(record.clone()));
            debug!(message = %record.id, receiver = %receiver, "Message delivered");
        }

        Ok(record)
    }

    /// Full conversation between the pair, oldest first, then flip every
    /// unread message addressed to `user` to read.
    ///
    /// The returned transcript is the pre-flip snapshot: the caller sees
    /// the just-arrived unread state, and only subsequent reads observe the
    /// flip.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when no accepted connection links the pair.
    pub async fn transcript(
        &self,
        user: UserId,
        other: UserId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        self.authorize(user, other).await?;

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at ASC, rowid ASC",
        ))
        .bind(user.to_string())
        .bind(other.to_string())
        .bind(other.to_string())
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await?;
        let snapshot: Vec<MessageRecord> = rows
            .into_iter()
            .map(MessageRecord::try_from)
            .collect::<Result<_, _>>()?;

        // Bulk read-flip happens strictly after the snapshot is taken.
        sqlx::query(
            "UPDATE messages SET is_read = 1, status = 'read'
             WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(other.to_string())
        .bind(user.to_string())
        .execute(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// Explicit read acknowledgement for a single message.
    ///
    /// Idempotent: acknowledging an already-read message returns the
    /// unchanged record. If the sender is online, a read receipt is pushed
    /// to their channel.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id is unknown.
    pub async fn mark_message_read(
        &self,
        hub: &Hub,
        message_id: Uuid,
    ) -> Result<MessageRecord, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE messages SET is_read = 1, status = 'read'
             WHERE id = ?
             RETURNING {MESSAGE_COLUMNS}",
        ))
        .bind(message_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let record = MessageRecord::try_from(row.ok_or(StoreError::NotFound("message"))?)?;

        hub.send_to_user(record.sender_id, ServerEvent::read_receipt(record.id));

        Ok(record)
    }

    /// Case-insensitive substring search over the pair's text history, any
    /// direction, oldest first.
    ///
    /// # Errors
    ///
    /// `Validation` when the query is empty, `PermissionDenied` when no
    /// accepted connection links the pair.
    pub async fn search_messages(
        &self,
        user: UserId,
        other: UserId,
        query: &str,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StoreError::validation("search query is required"));
        }
        self.authorize(user, other).await?;

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE ((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))
               AND text IS NOT NULL
               AND instr(lower(text), lower(?)) > 0
             ORDER BY created_at ASC, rowid ASC",
        ))
        .bind(user.to_string())
        .bind(other.to_string())
        .bind(other.to_string())
        .bind(user.to_string())
        .bind(query)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::connected_store;

    fn text(body: &str) -> NewMessage {
        NewMessage {
            text: Some(body.to_string()),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_send_requires_accepted_connection() {
        let (store, mentor, _) = connected_store().await;
        let hub = Hub::new();
        let stranger = Uuid::new_v4();

        assert!(matches!(
            store.send_message(&hub, mentor, stranger, text("hi")).await,
            Err(StoreError::PermissionDenied)
        ));
        assert!(matches!(
            store.transcript(mentor, stranger).await,
            Err(StoreError::PermissionDenied)
        ));
        assert!(matches!(
            store.search_messages(mentor, stranger, "hi").await,
            Err(StoreError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_send_requires_text_or_image() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        let empty = NewMessage {
            text: Some("   ".to_string()),
            image_url: None,
        };
        assert!(matches!(
            store.send_message(&hub, mentor, mentee, empty).await,
            Err(StoreError::Validation(_))
        ));

        let image_only = NewMessage {
            text: None,
            image_url: Some("https://cdn.example/pic.png".to_string()),
        };
        let record = store
            .send_message(&hub, mentor, mentee, image_only)
            .await
            .unwrap();
        assert!(record.text.is_none());
        assert_eq!(record.image_url.as_deref(), Some("https://cdn.example/pic.png"));
    }

    #[tokio::test]
    async fn test_send_to_offline_receiver_stays_sent() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        let record = store
            .send_message(&hub, mentor, mentee, text("hi"))
            .await
            .unwrap();
        assert_eq!(record.status, MessageStatus::Sent);
        assert!(!record.is_read);
    }

    #[tokio::test]
    async fn test_send_to_online_receiver_delivers_and_pushes() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        let (_, mut rx) = hub.connect(Some(mentee));
        while rx.try_recv().is_ok() {} // drain presence snapshot

        let record = store
            .send_message(&hub, mentor, mentee, text("you there?"))
            .await
            .unwrap();
        assert_eq!(record.status, MessageStatus::Delivered);

        match rx.try_recv().unwrap() {
            ServerEvent::NewMessage(pushed) => {
                assert_eq!(pushed.id, record.id);
                assert_eq!(pushed.text.as_deref(), Some("you there?"));
                assert_eq!(pushed.status, MessageStatus::Delivered);
            }
            other => panic!("expected newMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transcript_returns_preflip_snapshot() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        store.send_message(&hub, mentor, mentee, text("one")).await.unwrap();
        store.send_message(&hub, mentor, mentee, text("two")).await.unwrap();
        store.send_message(&hub, mentee, mentor, text("reply")).await.unwrap();

        // First fetch as receiver: the snapshot still shows unread rows.
        let first = store.transcript(mentee, mentor).await.unwrap();
        assert_eq!(
            first.iter().map(|m| m.text.as_deref().unwrap()).collect::<Vec<_>>(),
            vec!["one", "two", "reply"]
        );
        for message in first.iter().filter(|m| m.receiver_id == mentee) {
            assert!(!message.is_read);
            assert_eq!(message.status, MessageStatus::Sent);
        }

        // Second fetch observes the flip, on incoming rows only.
        let second = store.transcript(mentee, mentor).await.unwrap();
        for message in &second {
            if message.receiver_id == mentee {
                assert!(message.is_read);
                assert_eq!(message.status, MessageStatus::Read);
            } else {
                assert!(!message.is_read);
            }
        }
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_pushes_receipt() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        let record = store
            .send_message(&hub, mentor, mentee, text("ack me"))
            .await
            .unwrap();

        let (_, mut sender_rx) = hub.connect(Some(mentor));
        while sender_rx.try_recv().is_ok() {}

        let read = store.mark_message_read(&hub, record.id).await.unwrap();
        assert_eq!(read.status, MessageStatus::Read);
        assert!(read.is_read);
        assert_eq!(
            sender_rx.try_recv().unwrap(),
            ServerEvent::read_receipt(record.id)
        );

        // Re-acknowledging is a no-op returning the unchanged record.
        let again = store.mark_message_read(&hub, record.id).await.unwrap();
        assert_eq!(again, read);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_id_is_not_found() {
        let (store, _, _) = connected_store().await;
        let hub = Hub::new();

        assert!(matches!(
            store.mark_message_read(&hub, Uuid::new_v4()).await,
            Err(StoreError::NotFound("message"))
        ));
    }

    #[tokio::test]
    async fn test_offline_then_online_conversation_flow() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        // Mentee offline: the first message stays `sent`.
        let first = store
            .send_message(&hub, mentor, mentee, text("hi"))
            .await
            .unwrap();
        assert_eq!(first.status, MessageStatus::Sent);

        // Mentee connects; the next message is delivered and pushed.
        let (_, mut rx) = hub.connect(Some(mentee));
        while rx.try_recv().is_ok() {}

        let second = store
            .send_message(&hub, mentor, mentee, text("again"))
            .await
            .unwrap();
        assert_eq!(second.status, MessageStatus::Delivered);
        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::NewMessage(_)));

        // Transcript fetch returns both, then flips them for the mentee.
        let transcript = store.transcript(mentee, mentor).await.unwrap();
        assert_eq!(transcript.len(), 2);

        let after = store.transcript(mentee, mentor).await.unwrap();
        assert!(after.iter().all(|m| m.is_read));
        assert!(after.iter().all(|m| m.status == MessageStatus::Read));
        // The offline message jumps straight from `sent` to `read`.
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_validated() {
        let (store, mentor, mentee) = connected_store().await;
        let hub = Hub::new();

        store
            .send_message(&hub, mentor, mentee, text("Let's review Borrowing"))
            .await
            .unwrap();
        store
            .send_message(&hub, mentee, mentor, text("borrowing it is"))
            .await
            .unwrap();
        store
            .send_message(&hub, mentor, mentee, text("unrelated"))
            .await
            .unwrap();

        let hits = store.search_messages(mentee, mentor, "BORROW").await.unwrap();
        assert_eq!(hits.len(), 2);

        assert!(matches!(
            store.search_messages(mentee, mentor, "   ").await,
            Err(StoreError::Validation(_))
        ));
    }
}
