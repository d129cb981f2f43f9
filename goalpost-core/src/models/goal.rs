use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_uuid_column, timestamp, timestamp_column, uuid_column, Milestone};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Free text, rendered as entered.
    pub target_date: String,
    /// Milestone ids in display order.
    pub milestone_ids: Vec<Uuid>,
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user-editable fields of a goal. Updates replace all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalInput {
    pub title: String,
    pub description: String,
    pub target_date: String,
}

/// A goal with its milestone rows loaded in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalWithMilestones {
    #[serde(flatten)]
    pub goal: Goal,
    pub milestones: Vec<Milestone>,
}

const SELECT_GOAL: &str = "SELECT id, title, description, target_date, author_id, created_at, updated_at
     FROM goals";

impl Goal {
    pub fn new(input: GoalInput, author_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            target_date: input.target_date,
            milestone_ids: Vec::new(),
            author_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO goals (id, title, description, target_date, author_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id.to_string(),
                self.title,
                self.description,
                self.target_date,
                self.author_id.map(|id| id.to_string()),
                timestamp(&self.created_at),
                timestamp(&self.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &Uuid) -> Result<Option<Self>> {
        let goal = conn
            .query_row(
                &format!("{SELECT_GOAL} WHERE id = ?1"),
                params![id.to_string()],
                Self::from_row,
            )
            .optional()?;

        match goal {
            Some(mut goal) => {
                goal.milestone_ids = Self::load_milestone_ids(conn, &goal.id)?;
                Ok(Some(goal))
            }
            None => Ok(None),
        }
    }

    /// Load a goal and populate its milestones.
    pub fn find_with_milestones(conn: &Connection, id: &Uuid) -> Result<Option<GoalWithMilestones>> {
        let Some(goal) = Self::find_by_id(conn, id)? else {
            return Ok(None);
        };
        let milestones = Milestone::list_by_goal(conn, &goal.id)?;
        Ok(Some(GoalWithMilestones { goal, milestones }))
    }

    /// All goals, newest first.
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare(&format!("{SELECT_GOAL} ORDER BY created_at DESC, rowid DESC"))?;
        let mut goals = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare("SELECT goal_id, id FROM milestones ORDER BY goal_id, position")?;
        let mut milestone_ids: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for pair in stmt.query_map([], |row| Ok((uuid_column(row, 0)?, uuid_column(row, 1)?)))? {
            let (goal_id, id) = pair?;
            milestone_ids.entry(goal_id).or_default().push(id);
        }

        for goal in &mut goals {
            goal.milestone_ids = milestone_ids.remove(&goal.id).unwrap_or_default();
        }
        Ok(goals)
    }

    /// Replace the editable fields and persist them.
    pub fn update(&mut self, conn: &Connection, input: GoalInput) -> Result<()> {
        self.title = input.title;
        self.description = input.description;
        self.target_date = input.target_date;
        self.updated_at = Utc::now();

        conn.execute(
            "UPDATE goals SET title = ?2, description = ?3, target_date = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.title,
                self.description,
                self.target_date,
                timestamp(&self.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Delete a goal. Its milestones go with it.
    ///
    /// Returns `false` when no such goal existed.
    pub fn delete(conn: &Connection, id: &Uuid) -> Result<bool> {
        let removed = conn.execute("DELETE FROM goals WHERE id = ?1", params![id.to_string()])?;
        if removed > 0 {
            tracing::debug!("Deleted goal {}", id);
        }
        Ok(removed > 0)
    }

    fn load_milestone_ids(conn: &Connection, goal_id: &Uuid) -> Result<Vec<Uuid>> {
        let mut stmt =
            conn.prepare("SELECT id FROM milestones WHERE goal_id = ?1 ORDER BY position")?;
        let ids = stmt
            .query_map(params![goal_id.to_string()], |row| uuid_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_column(row, 0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            target_date: row.get(3)?,
            milestone_ids: Vec::new(),
            author_id: optional_uuid_column(row, 4)?,
            created_at: timestamp_column(row, 5)?,
            updated_at: timestamp_column(row, 6)?,
        })
    }
}
