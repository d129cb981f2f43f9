//! askama templates. Every page embeds a [`Layout`] carrying the flash
//! messages and the current user for the shared header.

use askama::Template;
use axum::response::Html;

use goalpost_core::models::{Goal, GoalWithMilestones, User};

use crate::api::{AppError, Session};

#[derive(Debug, Default)]
pub struct Layout {
    pub success: Vec<String>,
    pub error: Vec<String>,
    pub current_user: Option<User>,
}

impl Layout {
    /// Consumes the session's pending flash messages.
    pub fn new(session: &Session, current_user: Option<User>) -> Self {
        let flash = session.take_flash();
        Self {
            success: flash.success,
            error: flash.error,
            current_user,
        }
    }
}

pub fn render<T: Template>(template: T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub layout: Layout,
    pub status: u16,
    pub message: String,
}

#[derive(Template)]
#[template(path = "goals/index.html")]
pub struct GoalIndexTemplate {
    pub layout: Layout,
    pub goals: Vec<Goal>,
}

#[derive(Template)]
#[template(path = "goals/new.html")]
pub struct GoalNewTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "goals/show.html")]
pub struct GoalShowTemplate {
    pub layout: Layout,
    pub goal: GoalWithMilestones,
    pub author: Option<User>,
}

#[derive(Template)]
#[template(path = "goals/edit.html")]
pub struct GoalEditTemplate {
    pub layout: Layout,
    pub goal: Goal,
}

#[derive(Template)]
#[template(path = "users/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
}
