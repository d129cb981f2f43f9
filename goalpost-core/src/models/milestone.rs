use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_uuid_column, timestamp, timestamp_column, uuid_column};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub description: String,
    pub due_date: Option<String>,
    /// Reference to a task. Stored as given; there is no task table.
    pub task_id: Option<Uuid>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneInput {
    pub description: String,
    pub due_date: Option<String>,
}

const SELECT_MILESTONE: &str =
    "SELECT id, goal_id, description, due_date, task_id, position, created_at FROM milestones";

impl Milestone {
    pub fn new(goal_id: Uuid, input: MilestoneInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            description: input.description,
            due_date: input.due_date,
            task_id: None,
            position: 0,
            created_at: Utc::now(),
        }
    }

    /// Insert at the end of the goal's milestone list; `position` is set
    /// from the database.
    pub fn insert(&mut self, conn: &Connection) -> Result<()> {
        self.position = conn.query_row(
            "INSERT INTO milestones (id, goal_id, description, due_date, task_id, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     (SELECT COALESCE(MAX(position), -1) + 1 FROM milestones WHERE goal_id = ?2),
                     ?6)
             RETURNING position",
            params![
                self.id.to_string(),
                self.goal_id.to_string(),
                self.description,
                self.due_date,
                self.task_id.map(|id| id.to_string()),
                timestamp(&self.created_at),
            ],
            |row| row.get(0),
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &Uuid) -> Result<Option<Self>> {
        let milestone = conn
            .query_row(
                &format!("{SELECT_MILESTONE} WHERE id = ?1"),
                params![id.to_string()],
                Self::from_row,
            )
            .optional()?;
        Ok(milestone)
    }

    pub fn list_by_goal(conn: &Connection, goal_id: &Uuid) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare(&format!("{SELECT_MILESTONE} WHERE goal_id = ?1 ORDER BY position"))?;
        let milestones = stmt
            .query_map(params![goal_id.to_string()], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(milestones)
    }

    /// Remove a milestone from its goal and delete it.
    ///
    /// Returns `false` when the milestone does not belong to that goal.
    pub fn delete_from_goal(conn: &Connection, goal_id: &Uuid, id: &Uuid) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM milestones WHERE id = ?1 AND goal_id = ?2",
            params![id.to_string(), goal_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_column(row, 0)?,
            goal_id: uuid_column(row, 1)?,
            description: row.get(2)?,
            due_date: row.get(3)?,
            task_id: optional_uuid_column(row, 4)?,
            position: row.get(5)?,
            created_at: timestamp_column(row, 6)?,
        })
    }
}
