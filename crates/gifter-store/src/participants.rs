use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{is_unique_violation, Result, StoreError};
use crate::models::{Participant, ParticipantRole, ParticipantView};
use crate::row::uuid_at;

impl Database {
    /// List the participants of an event, sorted by name.
    pub fn list_participants(&self, event_id: Uuid) -> Result<Vec<ParticipantView>> {
        let mut stmt = self.conn().prepare(
            "SELECT users.id, users.name, users.email, users.picture, participants.role
             FROM users
             JOIN participants ON users.id = participants.user_id
             WHERE participants.event_id = ?1
             ORDER BY users.name ASC",
        )?;

        let rows = stmt.query_map(params![event_id.to_string()], |row| {
            let role_code: i64 = row.get(4)?;
            let role = ParticipantRole::from_i64(role_code).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Integer,
                    format!("unknown participant role {role_code}").into(),
                )
            })?;
            Ok(ParticipantView {
                id: uuid_at(row, 0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                picture: row.get(3)?,
                role,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Invite the user registered under `email` as a member.
    ///
    /// Fails with [`StoreError::UnknownParticipant`] when no account uses
    /// that email.
    pub fn add_participant(&self, event_id: Uuid, email: &str) -> Result<Participant> {
        let email = email.trim();
        let user_id = self
            .user_id_by_email(email)?
            .ok_or_else(|| StoreError::UnknownParticipant(email.to_string()))?;

        let participant = Participant {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            role: ParticipantRole::Member,
        };

        self.conn()
            .execute(
                "INSERT INTO participants (id, user_id, event_id, role) VALUES (?1, ?2, ?3, ?4)",
                params![
                    participant.id.to_string(),
                    user_id.to_string(),
                    event_id.to_string(),
                    participant.role.as_i64(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyParticipant
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::info!(event = %event_id, user = %user_id, "participant added");
        Ok(participant)
    }
}
