//! Unified inbox: item model, SQLite store and owner alerts
//!
//! Every ingested event lands in [`NotificationStore`]. Items flagged
//! `notify` also produce an [`AlertMessage`], rate-shaped by
//! [`AlertThrottle`] and fanned out by [`AlertDispatcher`] to each registered
//! [`AlertChannel`].

pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod item;
pub mod lock;
pub mod store;
pub mod throttle;

pub use channel::{AlertChannel, AlertMessage, SendResult};
pub use dispatcher::AlertDispatcher;
pub use item::{ItemType, NewItem, NotificationItem, MAX_BODY_CHARS, TRUNCATION_MARKER};
pub use lock::StoreLock;
pub use store::{InsertOutcome, NotificationStore, TypeCounts};
pub use throttle::{AlertThrottle, SuppressedDigest, ThrottleDecision};
