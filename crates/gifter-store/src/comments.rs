use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, CommentView, User};
use crate::row::{now_micros, timestamp_at, timestamp_to_sql, uuid_at};
use crate::since::since;

impl Database {
    /// Append a comment to a gift.  Comments are never edited or removed.
    pub fn create_comment(&self, author_id: Uuid, gift_id: Uuid, message: &str) -> Result<Comment> {
        if message.trim().is_empty() {
            return Err(StoreError::Validation("Message is required".into()));
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            author_id,
            gift_id,
            created_at: now_micros(),
            message: message.to_string(),
        };

        self.conn().execute(
            "INSERT INTO comments (id, author_id, gift_id, created_at, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment.id.to_string(),
                author_id.to_string(),
                gift_id.to_string(),
                timestamp_to_sql(&comment.created_at),
                comment.message,
            ],
        )?;

        tracing::debug!(comment = %comment.id, gift = %gift_id, author = %author_id, "comment added");
        Ok(comment)
    }

    /// List a gift's comments, oldest first.
    pub fn list_comments(&self, gift_id: Uuid) -> Result<Vec<CommentView>> {
        self.list_comments_at(gift_id, Utc::now())
    }

    /// Same as [`list_comments`](Self::list_comments) with ages computed
    /// relative to `now`.
    pub fn list_comments_at(&self, gift_id: Uuid, now: DateTime<Utc>) -> Result<Vec<CommentView>> {
        let mut stmt = self.conn().prepare(
            "SELECT comments.id, comments.message, comments.created_at,
                    users.id, users.name, users.email, users.picture
             FROM comments
             JOIN users ON comments.author_id = users.id
             WHERE comments.gift_id = ?1
             ORDER BY comments.created_at ASC, comments.rowid ASC",
        )?;

        let rows = stmt.query_map(params![gift_id.to_string()], |row| {
            let created_at = timestamp_at(row, 2)?;
            Ok(CommentView {
                id: uuid_at(row, 0)?,
                message: row.get(1)?,
                created_at,
                since: since(created_at, now),
                author: User {
                    id: uuid_at(row, 3)?,
                    name: row.get(4)?,
                    email: row.get(5)?,
                    picture: row.get(6)?,
                },
            })
        })?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::database::test_support::{add_event, add_user, open_temp};

    #[test]
    fn listed_oldest_first_with_author() {
        let (_dir, mut db) = open_temp();
        let alice = add_user(&db, "Alice");
        let bob = add_user(&db, "Bob");
        let event = add_event(&mut db, alice, "Holiday 2024");
        let no_urls: [&str; 0] = [];
        let gift = db
            .create_gift(alice, event, "Lego Set", bob, &no_urls, false)
            .unwrap();

        for msg in ["one", "two", "three"] {
            db.create_comment(alice, gift.id, msg).unwrap();
        }

        let comments = db.list_comments(gift.id).unwrap();
        let messages: Vec<_> = comments.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, ["one", "two", "three"]);
        assert_eq!(comments[0].author.name, "Alice");
        assert!(comments
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn age_is_computed_at_read_time() {
        let (_dir, mut db) = open_temp();
        let alice = add_user(&db, "Alice");
        let event = add_event(&mut db, alice, "Holiday 2024");
        let no_urls: [&str; 0] = [];
        let gift = db
            .create_gift(alice, event, "Lego Set", alice, &no_urls, false)
            .unwrap();
        let comment = db.create_comment(alice, gift.id, "hello").unwrap();

        let later = comment.created_at + Duration::days(3) + Duration::hours(2);
        assert_eq!(db.list_comments_at(gift.id, later).unwrap()[0].since, "3 days");

        let much_later = comment.created_at + Duration::weeks(3);
        assert_eq!(
            db.list_comments_at(gift.id, much_later).unwrap()[0].since,
            "3 weeks"
        );
    }

    #[test]
    fn empty_message_rejected() {
        let (_dir, db) = open_temp();
        let alice = add_user(&db, "Alice");
        assert!(matches!(
            db.create_comment(alice, Uuid::new_v4(), "   "),
            Err(StoreError::Validation(_))
        ));
    }
}
