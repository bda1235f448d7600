//! Gift content document and its status state machine.
//!
//! All mutable gift state lives in [`GiftContent`], persisted as a single
//! JSON document in `gifts.content`.  Status and buyer are always written
//! together as part of that document.
//!
//! Document shape (kept compatible with existing rows):
//!
//! ```json
//! {"name":"Lego Set","status":1,"to":"<uuid>","from":"<uuid>","urls":[],"secret":false}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Gift status, serialized as its integer code.
///
/// Intended progression is `New -> AboutToBeBought -> Bought`, but any live
/// state may move to any other; only the buyer lock restricts transitions.
/// `MarkedForDeletion` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum GiftStatus {
    New = 0,
    AboutToBeBought = 1,
    Bought = 2,
    /// Tombstone.  Terminal and hidden from listings.
    MarkedForDeletion = 3,
    /// Like `New`, but the gift is a surprise for its recipient.
    Secret = 4,
}

impl GiftStatus {
    /// Statuses that record the acting user as buyer.
    pub fn is_claim(self) -> bool {
        matches!(self, Self::AboutToBeBought | Self::Bought)
    }
}

impl From<GiftStatus> for u8 {
    fn from(s: GiftStatus) -> Self {
        s as u8
    }
}

impl TryFrom<u8> for GiftStatus {
    type Error = String;

    fn try_from(b: u8) -> std::result::Result<Self, Self::Error> {
        match b {
            0 => Ok(Self::New),
            1 => Ok(Self::AboutToBeBought),
            2 => Ok(Self::Bought),
            3 => Ok(Self::MarkedForDeletion),
            4 => Ok(Self::Secret),
            other => Err(format!("unknown gift status {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// The versioned, serialized part of a gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftContent {
    pub name: String,
    pub status: GiftStatus,
    /// Recipient.
    pub to: Uuid,
    /// Buyer.  Only set while the status is a claim.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub from: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub urls: Vec<String>,
    #[serde(default)]
    pub secret: bool,
}

/// What a given viewer is allowed to see of a gift's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub status: GiftStatus,
    /// The buyer's identity may be shown.
    pub show_buyer: bool,
    /// Someone else holds the buyer lock.
    pub status_frozen: bool,
}

impl GiftContent {
    /// Content of a freshly created gift: status `New`, no buyer.
    ///
    /// URLs are trimmed and blank entries dropped.
    pub fn new<S: AsRef<str>>(name: &str, to: Uuid, urls: &[S], secret: bool) -> Self {
        Self {
            name: name.trim().to_string(),
            status: GiftStatus::New,
            to,
            from: None,
            urls: clean_urls(urls),
            secret,
        }
    }

    /// The user holding the buyer lock, if any.
    pub fn buyer_lock(&self) -> Option<Uuid> {
        if self.status.is_claim() {
            self.from
        } else {
            None
        }
    }

    /// Whether the gift is a surprise for its recipient.
    pub fn is_secret(&self) -> bool {
        self.secret || self.status == GiftStatus::Secret
    }

    /// Move the gift to `status` on behalf of `actor`.
    ///
    /// Fails with [`StoreError::BuyerConflict`] when another user holds the
    /// buyer lock.  Claim statuses record `actor` as buyer, every other
    /// status clears the buyer.
    ///
    /// A tombstoned gift is gone: any change fails with
    /// [`StoreError::NotFound`].  The recipient of a secret gift may not
    /// change it at all, and the refusal is the same whether or not the gift
    /// has been claimed.
    pub fn apply_status(&mut self, actor: Uuid, status: GiftStatus) -> Result<()> {
        if self.status == GiftStatus::MarkedForDeletion {
            return Err(StoreError::NotFound);
        }
        if actor == self.to && self.is_secret() {
            return Err(StoreError::Validation(
                "This gift cannot be changed by its recipient".into(),
            ));
        }
        if let Some(buyer) = self.buyer_lock() {
            if buyer != actor {
                return Err(StoreError::BuyerConflict);
            }
        }

        self.from = if status.is_claim() { Some(actor) } else { None };
        self.status = status;
        Ok(())
    }

    /// Compute what `viewer` may see.
    ///
    /// The recipient never learns who the buyer is.  For secret gifts the
    /// recipient sees a plain `New` gift.
    pub fn visibility_for(&self, viewer: Uuid) -> Visibility {
        let frozen = self.buyer_lock().is_some_and(|buyer| buyer != viewer);

        if viewer == self.to {
            if self.is_secret() {
                return Visibility {
                    status: GiftStatus::New,
                    show_buyer: false,
                    status_frozen: false,
                };
            }
            return Visibility {
                status: self.status,
                show_buyer: false,
                status_frozen: frozen,
            };
        }

        Visibility {
            status: self.status,
            show_buyer: self.buyer_lock().is_some(),
            status_frozen: frozen,
        }
    }

    /// Encode for the `gifts.content` column.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a `gifts.content` column.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Trim every URL and drop the blank ones.
pub fn clean_urls<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    urls.iter()
        .map(|u| u.as_ref().trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

// Older rows stored a missing buyer as "".
fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}
