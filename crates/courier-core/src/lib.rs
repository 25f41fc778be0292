//! # courier-core
//!
//! In-memory runtime for the Courier messaging service.
//!
//! This crate provides the ephemeral half of the system:
//!
//! - **Presence** - user id to live channel id registry, last write wins
//! - **Hub** - per-channel event senders with targeted send and broadcast
//! - **Media** - the opaque blob-to-URL resolver seam
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  WebSocket  │────▶│     Hub     │────▶│  Channels   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  Presence   │
//!                     └─────────────┘
//! ```
//!
//! Nothing here survives a process restart; durable state lives in
//! `courier-store`.

pub mod hub;
pub mod media;
pub mod presence;

pub use hub::Hub;
pub use media::{MediaResolver, PassthroughResolver};
pub use presence::{LocalPresence, PresenceRegistry};
