use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::views::{ErrorTemplate, Layout};
use askama::Template;

const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Page not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Template(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the user. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound | AppError::Validation(_) => self.to_string(),
            AppError::Template(_) | AppError::Internal(_) => GENERIC_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}: {}", status, self);
        }

        let page = ErrorTemplate {
            layout: Layout::default(),
            status: status.as_u16(),
            message: self.public_message(),
        };

        match page.render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render error page: {}", e);
                (status, GENERIC_MESSAGE).into_response()
            }
        }
    }
}
