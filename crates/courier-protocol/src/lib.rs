//! # courier-protocol
//!
//! Wire types for the Courier realtime messaging service.
//!
//! This crate defines everything that crosses a process boundary as JSON:
//! persisted records returned over the REST surface, the message delivery
//! status machine, notification payloads, and the realtime events exchanged
//! over the WebSocket channel.
//!
//! ## Events
//!
//! - `newMessage` - full message record pushed to an online receiver
//! - `messageRead` - read receipt pushed to a message's sender
//! - `userTyping` - typing indicator relayed to a single receiver
//! - `getOnlineUsers` - full presence snapshot broadcast to all channels
//!
//! ## Example
//!
//! ```rust
//! use courier_protocol::MessageStatus;
//!
//! assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Delivered));
//! assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Delivered));
//! ```

pub mod events;
pub mod identity;
pub mod message;
pub mod notification;

pub use events::{ClientEvent, ServerEvent};
pub use identity::{Connection, ConnectionStatus, Role, UserProfile};
pub use message::{MessageRecord, MessageStatus};
pub use notification::{
    NotificationKind, NotificationPayload, NotificationRecord, NotificationView,
};

/// A user identity, assigned by the identity collaborator.
pub type UserId = uuid::Uuid;

/// A realtime channel identity, assigned at WebSocket connect time.
pub type ChannelId = uuid::Uuid;
