//! Gift ledger: creation, viewer-filtered listing and status updates.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::gift_content::{GiftContent, GiftStatus};
use crate::models::{Gift, GiftView};
use crate::names::NameCache;
use crate::row::{now_micros, timestamp_at, timestamp_to_sql, uuid_at};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a new gift for `to_id` in `event_id`.
    ///
    /// Event access must be checked by the caller.
    pub fn create_gift<S: AsRef<str>>(
        &self,
        creator_id: Uuid,
        event_id: Uuid,
        name: &str,
        to_id: Uuid,
        urls: &[S],
        secret: bool,
    ) -> Result<Gift> {
        if name.trim().is_empty() {
            return Err(StoreError::Validation("Gift name is required".into()));
        }
        match self.user_name(to_id) {
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                return Err(StoreError::Validation("Unknown recipient".into()));
            }
            Err(e) => return Err(e),
        }

        let gift = Gift {
            id: Uuid::new_v4(),
            event_id,
            creator_id,
            created_at: now_micros(),
            content: GiftContent::new(name, to_id, urls, secret),
        };

        self.conn().execute(
            "INSERT INTO gifts (id, creator_id, event_id, created_at, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                gift.id.to_string(),
                gift.creator_id.to_string(),
                gift.event_id.to_string(),
                timestamp_to_sql(&gift.created_at),
                gift.content.to_json()?,
            ],
        )?;

        tracing::info!(gift = %gift.id, event = %event_id, creator = %creator_id, "gift created");
        Ok(gift)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch one gift, scoped to its event.
    pub fn get_gift(&self, event_id: Uuid, gift_id: Uuid) -> Result<Gift> {
        self.conn()
            .query_row(
                "SELECT id, creator_id, event_id, created_at, content
                 FROM gifts WHERE id = ?1 AND event_id = ?2",
                params![gift_id.to_string(), event_id.to_string()],
                row_to_raw_gift,
            )
            .map_err(not_found)?
            .decode()
    }

    /// Whether `gift_id` exists under `event_id`.
    pub fn has_gift(&self, event_id: Uuid, gift_id: Uuid) -> Result<bool> {
        let found: Option<String> = self
            .conn()
            .query_row(
                "SELECT id FROM gifts WHERE id = ?1 AND event_id = ?2",
                params![gift_id.to_string(), event_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// List the live gifts of an event as seen by `viewer`, newest first.
    ///
    /// Tombstoned gifts are left out.  Buyer names are hidden from each
    /// gift's recipient.
    pub fn list_gifts(&self, viewer: Uuid, event_id: Uuid) -> Result<Vec<GiftView>> {
        let gifts = {
            let mut stmt = self.conn().prepare(
                "SELECT id, creator_id, event_id, created_at, content
                 FROM gifts
                 WHERE event_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![event_id.to_string()], row_to_raw_gift)?;

            let mut gifts = Vec::new();
            for row in rows {
                gifts.push(row?.decode()?);
            }
            gifts
        };

        let mut names = NameCache::new(self);
        let mut views = Vec::with_capacity(gifts.len());

        for gift in gifts {
            if gift.content.status == GiftStatus::MarkedForDeletion {
                continue;
            }

            let visibility = gift.content.visibility_for(viewer);
            let from_name = match gift.content.buyer_lock() {
                Some(buyer) if visibility.show_buyer => Some(names.name_of(buyer)?),
                _ => None,
            };

            views.push(GiftView {
                id: gift.id,
                event_id: gift.event_id,
                created_at: gift.created_at,
                creator_id: gift.creator_id,
                creator_name: names.name_of(gift.creator_id)?,
                to_id: gift.content.to,
                to_name: names.name_of(gift.content.to)?,
                from_name,
                status: visibility.status,
                status_frozen: visibility.status_frozen,
                secret: gift.content.secret,
                name: gift.content.name,
                urls: gift.content.urls,
            });
        }

        Ok(views)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move a gift to `status` on behalf of `actor`.
    ///
    /// The read, the buyer-lock check and the write happen inside one
    /// IMMEDIATE transaction, so two concurrent claims cannot both succeed.
    /// Returns the stored content after the update.
    pub fn update_gift_status(
        &mut self,
        actor: Uuid,
        event_id: Uuid,
        gift_id: Uuid,
        status: GiftStatus,
    ) -> Result<GiftContent> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: String = tx
            .query_row(
                "SELECT content FROM gifts WHERE id = ?1 AND event_id = ?2",
                params![gift_id.to_string(), event_id.to_string()],
                |row| row.get(0),
            )
            .map_err(not_found)?;

        let mut content = GiftContent::from_json(&raw)?;
        if let Err(e) = content.apply_status(actor, status) {
            tracing::info!(gift = %gift_id, actor = %actor, "gift status change rejected: {e}");
            return Err(e);
        }

        tx.execute(
            "UPDATE gifts SET content = ?1 WHERE id = ?2",
            params![content.to_json()?, gift_id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(gift = %gift_id, actor = %actor, status = ?status, "gift status updated");
        Ok(content)
    }

    /// Tombstone a gift.  Subject to the same buyer lock as any update.
    pub fn mark_gift_for_deletion(
        &mut self,
        actor: Uuid,
        event_id: Uuid,
        gift_id: Uuid,
    ) -> Result<GiftContent> {
        self.update_gift_status(actor, event_id, gift_id, GiftStatus::MarkedForDeletion)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A gift row whose content column has not been decoded yet.
struct RawGift {
    id: Uuid,
    creator_id: Uuid,
    event_id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    content: String,
}

impl RawGift {
    fn decode(self) -> Result<Gift> {
        Ok(Gift {
            id: self.id,
            event_id: self.event_id,
            creator_id: self.creator_id,
            created_at: self.created_at,
            content: GiftContent::from_json(&self.content)?,
        })
    }
}

fn row_to_raw_gift(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawGift> {
    Ok(RawGift {
        id: uuid_at(row, 0)?,
        creator_id: uuid_at(row, 1)?,
        event_id: uuid_at(row, 2)?,
        created_at: timestamp_at(row, 3)?,
        content: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::database::test_support::{add_event, add_user, open_temp};
    use crate::error::ErrorKind;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        event: Uuid,
        u1: Uuid,
        u2: Uuid,
        u3: Uuid,
    }

    fn fixture() -> Fixture {
        let (dir, mut db) = open_temp();
        let u1 = add_user(&db, "Alice");
        let u2 = add_user(&db, "Bob");
        let u3 = add_user(&db, "Carol");
        let event = add_event(&mut db, u1, "Holiday 2024");
        db.add_participant(event, "bob@example.com").unwrap();
        db.add_participant(event, "carol@example.com").unwrap();
        Fixture {
            _dir: dir,
            db,
            event,
            u1,
            u2,
            u3,
        }
    }

    #[test]
    fn create_then_list() {
        let f = fixture();
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Lego Set", f.u2, &[" https://shop/lego ", ""], false)
            .unwrap();

        let views = f.db.list_gifts(f.u1, f.event).unwrap();
        assert_eq!(views.len(), 1);
        let v = &views[0];
        assert_eq!(v.id, gift.id);
        assert_eq!(v.name, "Lego Set");
        assert_eq!(v.status, GiftStatus::New);
        assert_eq!(v.from_name, None);
        assert!(!v.status_frozen);
        assert_eq!(v.urls, vec!["https://shop/lego".to_string()]);
        assert_eq!(v.creator_name, "Alice");
        assert_eq!(v.to_name, "Bob");
    }

    #[test]
    fn create_validates_input() {
        let f = fixture();
        let no_urls: [&str; 0] = [];
        assert!(matches!(
            f.db.create_gift(f.u1, f.event, " ", f.u2, &no_urls, false),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            f.db.create_gift(f.u1, f.event, "Book", Uuid::new_v4(), &no_urls, false),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn list_is_newest_first() {
        let f = fixture();
        let no_urls: [&str; 0] = [];
        for name in ["first", "second", "third"] {
            f.db.create_gift(f.u1, f.event, name, f.u2, &no_urls, false)
                .unwrap();
        }
        let names: Vec<_> = f
            .db
            .list_gifts(f.u3, f.event)
            .unwrap()
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, ["third", "second", "first"]);
    }

    #[test]
    fn buyer_lock_and_release() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Lego Set", f.u2, &no_urls, false)
            .unwrap();

        let content = f
            .db
            .update_gift_status(f.u1, f.event, gift.id, GiftStatus::Bought)
            .unwrap();
        assert_eq!(content.from, Some(f.u1));

        let err = f
            .db
            .update_gift_status(f.u3, f.event, gift.id, GiftStatus::AboutToBeBought)
            .unwrap_err();
        assert!(matches!(err, StoreError::BuyerConflict));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // The rejected attempt left the stored buyer untouched.
        let stored = f.db.get_gift(f.event, gift.id).unwrap();
        assert_eq!(stored.content.from, Some(f.u1));
        assert_eq!(stored.content.status, GiftStatus::Bought);

        f.db.update_gift_status(f.u1, f.event, gift.id, GiftStatus::New)
            .unwrap();
        let content = f
            .db
            .update_gift_status(f.u3, f.event, gift.id, GiftStatus::AboutToBeBought)
            .unwrap();
        assert_eq!(content.from, Some(f.u3));
    }

    #[test]
    fn recipient_never_sees_buyer() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Lego Set", f.u2, &no_urls, false)
            .unwrap();
        f.db.update_gift_status(f.u3, f.event, gift.id, GiftStatus::Bought)
            .unwrap();

        let for_recipient = &f.db.list_gifts(f.u2, f.event).unwrap()[0];
        assert_eq!(for_recipient.from_name, None);
        assert!(for_recipient.status_frozen);

        let for_other = &f.db.list_gifts(f.u1, f.event).unwrap()[0];
        assert!(for_other.status_frozen);
        assert_eq!(for_other.from_name.as_deref(), Some("Carol"));

        let for_buyer = &f.db.list_gifts(f.u3, f.event).unwrap()[0];
        assert!(!for_buyer.status_frozen);
        assert_eq!(for_buyer.from_name.as_deref(), Some("Carol"));
    }

    #[test]
    fn secret_gift_hides_progress_from_recipient() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Watch", f.u2, &no_urls, true)
            .unwrap();
        f.db.update_gift_status(f.u3, f.event, gift.id, GiftStatus::AboutToBeBought)
            .unwrap();

        let for_recipient = &f.db.list_gifts(f.u2, f.event).unwrap()[0];
        assert_eq!(for_recipient.status, GiftStatus::New);
        assert!(!for_recipient.status_frozen);
        assert_eq!(for_recipient.from_name, None);

        let for_other = &f.db.list_gifts(f.u1, f.event).unwrap()[0];
        assert_eq!(for_other.status, GiftStatus::AboutToBeBought);
    }

    #[test]
    fn deleted_gifts_leave_the_listing() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Socks", f.u2, &no_urls, false)
            .unwrap();

        f.db.update_gift_status(f.u3, f.event, gift.id, GiftStatus::Bought)
            .unwrap();
        assert!(matches!(
            f.db.mark_gift_for_deletion(f.u1, f.event, gift.id),
            Err(StoreError::BuyerConflict)
        ));

        f.db.mark_gift_for_deletion(f.u3, f.event, gift.id).unwrap();
        assert!(f.db.list_gifts(f.u1, f.event).unwrap().is_empty());
        assert!(f.db.has_gift(f.event, gift.id).unwrap());
    }

    #[test]
    fn deleted_gift_cannot_be_revived() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Socks", f.u2, &no_urls, false)
            .unwrap();
        f.db.mark_gift_for_deletion(f.u1, f.event, gift.id).unwrap();

        assert!(matches!(
            f.db.update_gift_status(f.u2, f.event, gift.id, GiftStatus::Bought),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            f.db.mark_gift_for_deletion(f.u3, f.event, gift.id),
            Err(StoreError::NotFound)
        ));
        assert!(f.db.list_gifts(f.u1, f.event).unwrap().is_empty());
        let stored = f.db.get_gift(f.event, gift.id).unwrap();
        assert_eq!(stored.content.status, GiftStatus::MarkedForDeletion);
    }

    #[test]
    fn secret_recipient_cannot_detect_a_buyer() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let claimed = f
            .db
            .create_gift(f.u1, f.event, "Watch", f.u2, &no_urls, true)
            .unwrap();
        let unclaimed = f
            .db
            .create_gift(f.u1, f.event, "Scarf", f.u2, &no_urls, true)
            .unwrap();
        f.db.update_gift_status(f.u3, f.event, claimed.id, GiftStatus::Bought)
            .unwrap();

        let on_claimed = f
            .db
            .update_gift_status(f.u2, f.event, claimed.id, GiftStatus::New)
            .unwrap_err();
        let on_unclaimed = f
            .db
            .update_gift_status(f.u2, f.event, unclaimed.id, GiftStatus::New)
            .unwrap_err();

        assert_eq!(on_claimed.kind(), ErrorKind::Validation);
        assert_eq!(on_claimed.to_string(), on_unclaimed.to_string());
        assert!(!on_claimed.to_string().contains("buyer"));

        // The claim is untouched.
        let stored = f.db.get_gift(f.event, claimed.id).unwrap();
        assert_eq!(stored.content.from, Some(f.u3));
        assert_eq!(stored.content.status, GiftStatus::Bought);
    }

    #[test]
    fn gift_is_scoped_to_its_event() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Socks", f.u2, &no_urls, false)
            .unwrap();
        let other_event = add_event(&mut f.db, f.u1, "Birthday");

        assert!(!f.db.has_gift(other_event, gift.id).unwrap());
        assert!(matches!(
            f.db.update_gift_status(f.u1, other_event, gift.id, GiftStatus::Bought),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            f.db.get_gift(other_event, gift.id),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn concurrent_claims_are_serialized() {
        let mut f = fixture();
        let no_urls: [&str; 0] = [];
        let gift = f
            .db
            .create_gift(f.u1, f.event, "Bike", f.u2, &no_urls, false)
            .unwrap();

        let path = f.db.path().unwrap();
        let mut other = Database::open_at(&path).unwrap();
        f.db.conn().busy_timeout(Duration::ZERO).unwrap();

        // While another connection holds the write lock, a claim cannot
        // slip in between its read and its write.
        {
            let tx = other
                .conn_mut()
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            let err = f
                .db
                .update_gift_status(f.u1, f.event, gift.id, GiftStatus::Bought)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Internal);
            drop(tx);
        }

        other
            .update_gift_status(f.u3, f.event, gift.id, GiftStatus::Bought)
            .unwrap();
        assert!(matches!(
            f.db.update_gift_status(f.u1, f.event, gift.id, GiftStatus::Bought),
            Err(StoreError::BuyerConflict)
        ));
    }

    #[test]
    fn reads_legacy_content_rows() {
        let f = fixture();
        let id = Uuid::new_v4();
        f.db.conn()
            .execute(
                "INSERT INTO gifts (id, creator_id, event_id, created_at, content)
                 VALUES (?1, ?2, ?3, '2023-12-01T10:00:00.000000Z', ?4)",
                params![
                    id.to_string(),
                    f.u1.to_string(),
                    f.event.to_string(),
                    format!(r#"{{"name":"Old","status":0,"to":"{}","from":"","urls":null}}"#, f.u2),
                ],
            )
            .unwrap();

        let views = f.db.list_gifts(f.u1, f.event).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Old");
        assert!(views[0].urls.is_empty());
    }
}
