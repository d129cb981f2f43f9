use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_uuid_column, timestamp, timestamp_column, uuid_column};

/// How long a session lives after its last write.
pub const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One-shot messages waiting to be shown on the next rendered page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub error: Vec<String>,
}

impl Flash {
    pub fn push(&mut self, kind: FlashKind, message: impl Into<String>) {
        match kind {
            FlashKind::Success => self.success.push(message.into()),
            FlashKind::Error => self.error.push(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.error.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub flash: Flash,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            flash: Flash::default(),
            expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Load a session unless it has expired.
    pub fn find_live(conn: &Connection, id: &Uuid, now: DateTime<Utc>) -> Result<Option<Self>> {
        let record = conn
            .query_row(
                "SELECT id, user_id, flash, expires_at FROM sessions
                 WHERE id = ?1 AND expires_at > ?2",
                params![id.to_string(), timestamp(&now)],
                |row| {
                    let flash: String = row.get(2)?;
                    Ok((
                        uuid_column(row, 0)?,
                        optional_uuid_column(row, 1)?,
                        flash,
                        timestamp_column(row, 3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, user_id, flash, expires_at)) = record else {
            return Ok(None);
        };

        Ok(Some(Self {
            id,
            user_id,
            flash: serde_json::from_str(&flash)?,
            expires_at,
        }))
    }

    /// Upsert the session and push its expiry out by the full TTL.
    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        self.expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
        conn.execute(
            "INSERT INTO sessions (id, user_id, flash, expires_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 user_id = excluded.user_id,
                 flash = excluded.flash,
                 expires_at = excluded.expires_at",
            params![
                self.id.to_string(),
                self.user_id.map(|id| id.to_string()),
                serde_json::to_string(&self.flash)?,
                timestamp(&self.expires_at),
            ],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, id: &Uuid) -> Result<()> {
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    /// Drop every session that expired before `now`. Returns how many went.
    pub fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
        let purged = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![timestamp(&now)],
        )?;
        Ok(purged)
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}
