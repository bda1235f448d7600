//! User directory: accounts, credentials and name lookup.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{is_unique_violation, not_found, Result, StoreError};
use crate::models::{NewUser, User};
use crate::password::{hash_password, verify_password};
use crate::row::uuid_at;

impl Database {
    /// Look a user up by email, creating the account if absent.
    ///
    /// Used by the OAuth login flow.  An existing account gets its name and
    /// picture refreshed from the provider.
    pub fn find_or_create_user(&self, candidate: &NewUser) -> Result<Uuid> {
        let email = candidate.email.trim();
        if email.is_empty() {
            return Err(StoreError::Validation("Email is required".into()));
        }

        let existing: Option<Uuid> = self
            .conn()
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| uuid_at(row, 0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn().execute(
                "UPDATE users SET name = ?1, picture = ?2 WHERE id = ?3",
                params![candidate.name, candidate.picture, id.to_string()],
            )?;
            tracing::debug!(user = %id, "oauth login for existing user");
            return Ok(id);
        }

        let id = Uuid::new_v4();
        self.conn().execute(
            "INSERT INTO users (id, name, email, picture, password_hash)
             VALUES (?1, ?2, ?3, ?4, '')",
            params![id.to_string(), candidate.name, email, candidate.picture],
        )?;
        tracing::info!(user = %id, "created user from oauth login");
        Ok(id)
    }

    /// Create a password account.
    ///
    /// Fails with [`StoreError::EmailAlreadyUsed`] when the email is taken.
    pub fn signup(&self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        check_signup_fields(name, email, password)?;
        let hash = hash_password(password)?;
        self.create_password_user(name, email, &hash)
    }

    /// Insert a password account from an already computed hash.
    ///
    /// Lets callers run the (slow) hashing without holding the database.
    pub fn create_password_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Uuid> {
        let (name, email) = (name.trim(), email.trim());
        if name.is_empty() || email.is_empty() || password_hash.is_empty() {
            return Err(StoreError::Validation(SIGNUP_FIELDS_REQUIRED.into()));
        }

        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO users (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), name, email, password_hash],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::EmailAlreadyUsed
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::info!(user = %id, "signed up user");
        Ok(id)
    }

    /// Verify a password login.
    ///
    /// Returns `Ok(None)` for an unknown email, an OAuth-only account or a
    /// wrong password.
    pub fn login(&self, email: &str, password: &str) -> Result<Option<Uuid>> {
        let Some((id, hash)) = self.password_credential(email)? else {
            return Ok(None);
        };

        if verify_password(&hash, password) {
            Ok(Some(id))
        } else {
            tracing::debug!(user = %id, "password mismatch");
            Ok(None)
        }
    }

    /// The user id and encoded password hash registered under `email`.
    ///
    /// OAuth-only accounts have no credential.
    pub fn password_credential(&self, email: &str) -> Result<Option<(Uuid, String)>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?1 AND password_hash != ''",
                params![email.trim()],
                |row| Ok((uuid_at(row, 0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Fetch a single user.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, name, email, picture FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Resolve a user id to its display name.
    ///
    /// Batch callers should go through [`NameCache`](crate::NameCache).
    pub fn user_name(&self, id: Uuid) -> Result<String> {
        self.conn()
            .query_row(
                "SELECT name FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(not_found)
    }

    /// Resolve an email to a user id.
    pub fn user_id_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email.trim()],
                |row| uuid_at(row, 0),
            )
            .optional()?)
    }
}

const SIGNUP_FIELDS_REQUIRED: &str = "Name, email and password are required";

/// Reject a signup with a blank name, email or password.
pub fn check_signup_fields(name: &str, email: &str, password: &str) -> Result<()> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(StoreError::Validation(SIGNUP_FIELDS_REQUIRED.into()));
    }
    Ok(())
}

/// Map a row of `(id, name, email, picture)` to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        picture: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_temp;

    #[test]
    fn signup_then_login() {
        let (_dir, db) = open_temp();
        let id = db.signup("Alice", "alice@example.com", "pw").unwrap();

        assert_eq!(db.login("alice@example.com", "pw").unwrap(), Some(id));
        assert_eq!(db.login("alice@example.com", "nope").unwrap(), None);
        assert_eq!(db.login("bob@example.com", "pw").unwrap(), None);

        let user = db.get_user(id).unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(user.picture, None);
    }

    #[test]
    fn duplicate_email_is_distinguished() {
        let (_dir, db) = open_temp();
        db.signup("Alice", "alice@example.com", "pw").unwrap();

        let err = db.signup("Other", "alice@example.com", "pw2").unwrap_err();
        assert!(matches!(err, StoreError::EmailAlreadyUsed));
    }

    #[test]
    fn signup_requires_fields() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.signup("", "a@example.com", "pw"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.signup("A", "a@example.com", ""),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn precomputed_hash_round_trips_through_credential() {
        let (_dir, db) = open_temp();
        check_signup_fields("Dana", "dana@example.com", "pw").unwrap();
        let hash = hash_password("pw").unwrap();
        let id = db
            .create_password_user("Dana", " dana@example.com ", &hash)
            .unwrap();

        let (found, stored) = db.password_credential("dana@example.com").unwrap().unwrap();
        assert_eq!(found, id);
        assert!(verify_password(&stored, "pw"));
        assert_eq!(db.login("dana@example.com", "pw").unwrap(), Some(id));

        assert!(matches!(
            check_signup_fields("Dana", " ", "pw"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.create_password_user("Other", "dana@example.com", &hash),
            Err(StoreError::EmailAlreadyUsed)
        ));
    }

    #[test]
    fn oauth_accounts_cannot_password_login() {
        let (_dir, db) = open_temp();
        let candidate = NewUser {
            name: "Carol".into(),
            email: "carol@example.com".into(),
            picture: Some("https://pics.example/c.png".into()),
        };
        db.find_or_create_user(&candidate).unwrap();

        assert_eq!(db.login("carol@example.com", "").unwrap(), None);
    }

    #[test]
    fn find_or_create_reuses_account_and_refreshes_profile() {
        let (_dir, db) = open_temp();
        let mut candidate = NewUser {
            name: "Carol".into(),
            email: "carol@example.com".into(),
            picture: None,
        };
        let first = db.find_or_create_user(&candidate).unwrap();

        candidate.name = "Carol B.".into();
        candidate.picture = Some("https://pics.example/c.png".into());
        let second = db.find_or_create_user(&candidate).unwrap();

        assert_eq!(first, second);
        let user = db.get_user(first).unwrap();
        assert_eq!(user.name, "Carol B.");
        assert_eq!(user.picture.as_deref(), Some("https://pics.example/c.png"));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (_dir, db) = open_temp();
        assert!(matches!(
            db.get_user(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            db.user_name(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
