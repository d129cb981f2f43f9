use axum::{
    extract::{Path, State},
    response::Redirect,
    Form,
};
use serde::Deserialize;

use goalpost_core::models::{Goal, Milestone, MilestoneInput};

use super::{optional, parse_id, required, AppError, AppState, CurrentUser};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MilestoneForm {
    pub description: String,
    pub due_date: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<MilestoneForm>,
) -> Result<Redirect, AppError> {
    let goal_id = parse_id(&id)?;
    let input = MilestoneInput {
        description: required("Milestone", &form.description)?,
        due_date: optional(form.due_date.as_deref()),
    };

    let added = state.db.with_connection(|conn| {
        if Goal::find_by_id(conn, &goal_id)?.is_none() {
            return Ok(false);
        }
        Milestone::new(goal_id, input).insert(conn)?;
        Ok(true)
    })?;
    if !added {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&format!("/goal/{goal_id}")))
}

/// Detach a milestone from its goal and delete it.
pub async fn destroy(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path((id, milestone_id)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    let goal_id = parse_id(&id)?;
    let milestone_id = parse_id(&milestone_id)?;

    let removed = state
        .db
        .with_connection(|conn| Milestone::delete_from_goal(conn, &goal_id, &milestone_id))?;
    if !removed {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&format!("/goal/{goal_id}")))
}
