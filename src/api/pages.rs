use axum::response::Html;

use super::{AppError, OptionalUser, Session};
use crate::views::{render, HomeTemplate, Layout};

pub async fn home(
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Html<String>, AppError> {
    render(HomeTemplate {
        layout: Layout::new(&session, user),
    })
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
