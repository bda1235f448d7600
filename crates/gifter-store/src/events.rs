//! Event registry: creation, listing and the access gate.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Event, EventSummary, EventType, ParticipantRole};
use crate::row::{timestamp_at, timestamp_to_sql, uuid_at};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create an event together with its owner membership.
    ///
    /// Both rows are written in one transaction; if either insert fails
    /// nothing is persisted.
    pub fn create_event(
        &mut self,
        creator_id: Uuid,
        name: &str,
        date: DateTime<Utc>,
    ) -> Result<Event> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("Event name is required".into()));
        }

        let event = Event {
            id: Uuid::new_v4(),
            creator_id,
            name: name.to_string(),
            date,
            event_type: EventType::Christmas,
        };

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO events (id, creator_id, name, date, type) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.creator_id.to_string(),
                event.name,
                timestamp_to_sql(&event.date),
                u8::from(event.event_type),
            ],
        )?;
        tx.execute(
            "INSERT INTO participants (id, user_id, event_id, role) VALUES (?1, ?2, ?3, ?4)",
            params![
                Uuid::new_v4().to_string(),
                creator_id.to_string(),
                event.id.to_string(),
                ParticipantRole::Owner.as_i64(),
            ],
        )?;
        tx.commit()?;

        tracing::info!(event = %event.id, creator = %creator_id, "event created");
        Ok(event)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List the events `user_id` participates in, most recent date first.
    pub fn list_events(&self, user_id: Uuid) -> Result<Vec<EventSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT events.id, events.name, events.date, events.type, users.name, participants.role
             FROM events
             JOIN users ON events.creator_id = users.id
             JOIN participants ON events.id = participants.event_id
             WHERE participants.user_id = ?1
             ORDER BY events.date DESC",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], row_to_summary)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    // ------------------------------------------------------------------
    // Access gate
    // ------------------------------------------------------------------

    /// Whether `user_id` participates in `event_id`.
    ///
    /// Walks the user's full event list.
    pub fn has_event_access(&self, user_id: Uuid, event_id: Uuid) -> Result<bool> {
        let events = self.list_events(user_id)?;
        Ok(events.iter().any(|e| e.id == event_id))
    }

    /// Like [`has_event_access`](Self::has_event_access), failing with
    /// [`StoreError::NoAccess`] instead of returning `false`.
    pub fn require_event_access(&self, user_id: Uuid, event_id: Uuid) -> Result<()> {
        if self.has_event_access(user_id, event_id)? {
            Ok(())
        } else {
            tracing::debug!(user = %user_id, event = %event_id, "event access denied");
            Err(StoreError::NoAccess)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventSummary> {
    let type_code: u8 = row.get(3)?;
    let role_code: i64 = row.get(5)?;

    let event_type = EventType::try_from(type_code).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, e.into())
    })?;
    let role = ParticipantRole::from_i64(role_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Integer,
            format!("unknown participant role {role_code}").into(),
        )
    })?;

    Ok(EventSummary {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        date: timestamp_at(row, 2)?,
        event_type,
        creator_name: row.get(4)?,
        role,
    })
}
