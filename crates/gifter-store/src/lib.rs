//! # gifter-store
//!
//! Persistent storage for the Gifter registry, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users, events,
//! participants, gifts and comments.  The gift status state machine and its
//! visibility rules live in [`gift_content`].

pub mod comments;
pub mod database;
pub mod events;
pub mod gift_content;
pub mod gifts;
pub mod migrations;
pub mod models;
pub mod names;
pub mod participants;
pub mod password;
pub mod since;
pub mod users;

mod error;
mod row;

pub use database::Database;
pub use error::{ErrorKind, Result, StoreError};
pub use gift_content::{GiftContent, GiftStatus, Visibility};
pub use models::*;
pub use names::NameCache;
