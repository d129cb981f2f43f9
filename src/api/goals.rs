use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;

use goalpost_core::models::{Goal, GoalInput, User};

use super::{parse_id, required, AppError, AppState, CurrentUser, Session};
use crate::views::{
    render, GoalEditTemplate, GoalIndexTemplate, GoalNewTemplate, GoalShowTemplate, Layout,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoalForm {
    pub title: String,
    pub description: String,
    pub target_date: String,
}

impl GoalForm {
    fn into_input(self) -> Result<GoalInput, AppError> {
        Ok(GoalInput {
            title: required("Title", &self.title)?,
            description: required("Description", &self.description)?,
            target_date: required("Target date", &self.target_date)?,
        })
    }
}

pub async fn index(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let goals = state.db.with_connection(|conn| Goal::list_all(conn))?;
    render(GoalIndexTemplate {
        layout: Layout::new(&session, Some(user)),
        goals,
    })
}

pub async fn new_form(
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    render(GoalNewTemplate {
        layout: Layout::new(&session, Some(user)),
    })
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<GoalForm>,
) -> Result<Redirect, AppError> {
    let goal = Goal::new(form.into_input()?, Some(user.id));
    state.db.with_connection(|conn| goal.insert(conn))?;

    tracing::info!("{} created goal {}", user.username, goal.id);
    Ok(Redirect::to("/goal"))
}

pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = parse_id(&id)?;
    let (goal, author) = state.db.with_connection(|conn| {
        let Some(goal) = Goal::find_with_milestones(conn, &id)? else {
            return Ok((None, None));
        };
        let author = match goal.goal.author_id {
            Some(author_id) => User::find_by_id(conn, &author_id)?,
            None => None,
        };
        Ok((Some(goal), author))
    })?;
    let goal = goal.ok_or(AppError::NotFound)?;

    render(GoalShowTemplate {
        layout: Layout::new(&session, Some(user)),
        goal,
        author,
    })
}

pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = parse_id(&id)?;
    let goal = state
        .db
        .with_connection(|conn| Goal::find_by_id(conn, &id))?
        .ok_or(AppError::NotFound)?;

    render(GoalEditTemplate {
        layout: Layout::new(&session, Some(user)),
        goal,
    })
}

/// Full replace of the editable fields.
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<GoalForm>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    let input = form.into_input()?;

    let found = state.db.with_connection(|conn| {
        let Some(mut goal) = Goal::find_by_id(conn, &id)? else {
            return Ok(false);
        };
        goal.update(conn, input)?;
        Ok(true)
    })?;
    if !found {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&format!("/goal/{id}")))
}

pub async fn destroy(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    if !state.db.with_connection(|conn| Goal::delete(conn, &id))? {
        return Err(AppError::NotFound);
    }

    tracing::info!("{} deleted goal {}", user.username, id);
    Ok(Redirect::to("/goal"))
}
