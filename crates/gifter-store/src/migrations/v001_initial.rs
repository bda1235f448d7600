//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `events`, `participants`, `gifts`,
//! and `comments`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    picture       TEXT,
    password_hash TEXT NOT NULL DEFAULT ''    -- empty for OAuth-only accounts
);

-- ----------------------------------------------------------------
-- Events
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS events (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    creator_id TEXT NOT NULL,                 -- FK -> users(id)
    name       TEXT NOT NULL,
    date       TEXT NOT NULL,                 -- RFC-3339
    type       INTEGER NOT NULL DEFAULT 0,    -- 0 = christmas

    FOREIGN KEY (creator_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Participants (event membership)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS participants (
    id       TEXT PRIMARY KEY NOT NULL,       -- UUID v4
    user_id  TEXT NOT NULL,                   -- FK -> users(id)
    event_id TEXT NOT NULL,                   -- FK -> events(id)
    role     INTEGER NOT NULL,                -- 0 = owner, 1 = member

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_participants_event_user
    ON participants(event_id, user_id);
CREATE INDEX IF NOT EXISTS idx_participants_user_id ON participants(user_id);

-- ----------------------------------------------------------------
-- Gifts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS gifts (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    creator_id TEXT NOT NULL,                 -- FK -> users(id)
    event_id   TEXT NOT NULL,                 -- FK -> events(id)
    created_at TEXT NOT NULL,                 -- RFC-3339, microseconds
    content    TEXT NOT NULL,                 -- JSON gift document

    FOREIGN KEY (creator_id) REFERENCES users(id),
    FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_gifts_event_created
    ON gifts(event_id, created_at DESC);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    author_id  TEXT NOT NULL,                 -- FK -> users(id)
    gift_id    TEXT NOT NULL,                 -- FK -> gifts(id)
    created_at TEXT NOT NULL,
    message    TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES users(id),
    FOREIGN KEY (gift_id) REFERENCES gifts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_gift_created
    ON comments(gift_id, created_at);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
