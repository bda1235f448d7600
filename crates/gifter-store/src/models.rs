//! Domain model structs persisted in the SQLite database.
//!
//! Every read model derives `Serialize` so it can be handed directly to the
//! HTTP layer as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gift_content::{GiftContent, GiftStatus};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user as exposed to clients.  The credential hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

/// Candidate identity handed over by the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Kind of gathering.  Only one kind exists so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum EventType {
    Christmas = 0,
}

impl From<EventType> for u8 {
    fn from(t: EventType) -> Self {
        t as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = String;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Self::Christmas),
            other => Err(format!("unknown event type {other}")),
        }
    }
}

/// An event row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub event_type: EventType,
}

/// An event as listed for one of its participants.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub creator_name: String,
    pub date: DateTime<Utc>,
    pub event_type: EventType,
    /// Role of the listing user in this event.
    pub role: ParticipantRole,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Role of a user inside an event.  Stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Owner,
    Member,
}

impl ParticipantRole {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Owner => 0,
            Self::Member => 1,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Self::Owner),
            1 => Some(Self::Member),
            _ => None,
        }
    }
}

/// A participant membership row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Participant {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub role: ParticipantRole,
}

/// A participant as listed for an event: the user plus their role.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParticipantView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
    pub role: ParticipantRole,
}

// ---------------------------------------------------------------------------
// Gift
// ---------------------------------------------------------------------------

/// A gift row.  Everything but `content` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gift {
    pub id: Uuid,
    pub event_id: Uuid,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content: GiftContent,
}

/// A gift as seen by one particular participant.
///
/// Built by [`Database::list_gifts`](crate::Database::list_gifts); the buyer
/// fields are already filtered for the viewer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GiftView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub status: GiftStatus,
    pub secret: bool,
    pub creator_id: Uuid,
    pub creator_name: String,
    pub to_id: Uuid,
    pub to_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    /// Someone other than the viewer holds the buyer lock.
    pub status_frozen: bool,
    pub urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment row.  Append-only.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub gift_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// A comment as listed under a gift.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommentView {
    pub id: Uuid,
    pub author: User,
    pub created_at: DateTime<Utc>,
    /// Human-readable age, e.g. `"3 days"`.  Computed at read time.
    pub since: String,
    pub message: String,
}
