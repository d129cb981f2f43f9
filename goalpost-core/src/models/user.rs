use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamp, timestamp_column, uuid_column};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build a new user. The caller hashes the password.
    pub fn new(username: &str, email: &str, password_hash: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.id.to_string(),
                self.username,
                self.email,
                self.password_hash,
                timestamp(&self.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &Uuid) -> Result<Option<Self>> {
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<Self>> {
        let user = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at
                 FROM users WHERE username = ?1",
                params![username],
                Self::from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_column(row, 0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: timestamp_column(row, 4)?,
        })
    }
}
