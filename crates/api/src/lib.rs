//! Keeper clients for external services.
//!
//! This crate provides HTTP clients for:
//! - Key-value store: persisted equity-per-share between invocations
//! - Notifications: alert delivery to named channels

mod kvstore;
mod notifications;

pub use kvstore::{HttpKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use notifications::{
    HttpNotificationClient, Notification, NotificationChannel, NotificationClient,
    RecordingNotificationClient,
};
