use axum::{
    extract::State,
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use thiserror::Error;

use goalpost_core::models::{FlashKind, User};
use goalpost_core::Database;

use super::{AppError, AppState, OptionalUser, Session};
use crate::password::{hash_password, verify_password};
use crate::views::{render, Layout, LoginTemplate, RegisterTemplate};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Error, Debug)]
enum RegisterError {
    #[error("That username is already taken.")]
    UsernameTaken,

    #[error("Username and password are required.")]
    MissingCredentials,

    #[error("Something went wrong while registering. Please try again.")]
    Internal(#[from] anyhow::Error),
}

pub async fn register_form(
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Html<String>, AppError> {
    render(RegisterTemplate {
        layout: Layout::new(&session, user),
    })
}

pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    match register_user(&state.db, form).await {
        Ok(user) => {
            tracing::info!("Registered user {}", user.username);
            session.flash(FlashKind::Success, "Registration successful!");
            Redirect::to("/login")
        }
        Err(e) => {
            if let RegisterError::Internal(cause) = &e {
                tracing::error!("Registration failed: {:#}", cause);
            }
            session.flash(FlashKind::Error, e.to_string());
            Redirect::to("/register")
        }
    }
}

async fn register_user(db: &Database, form: RegisterForm) -> Result<User, RegisterError> {
    let username = form.username.trim().to_string();
    if username.is_empty() || form.password.is_empty() {
        return Err(RegisterError::MissingCredentials);
    }

    if db
        .with_connection(|conn| User::find_by_username(conn, &username))?
        .is_some()
    {
        return Err(RegisterError::UsernameTaken);
    }

    let password = form.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    let user = User::new(&username, form.email.trim(), &password_hash);
    db.with_connection(|conn| user.insert(conn))?;
    Ok(user)
}

pub async fn login_form(
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Html<String>, AppError> {
    render(LoginTemplate {
        layout: Layout::new(&session, user),
    })
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    let user = state
        .db
        .with_connection(|conn| User::find_by_username(conn, form.username.trim()))?;

    let authenticated = match user {
        Some(user) => {
            let password = form.password;
            let stored_hash = user.password_hash.clone();
            let matches =
                tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
                    .await
                    .map_err(anyhow::Error::from)?;
            matches.then_some(user)
        }
        None => None,
    };

    match authenticated {
        Some(user) => {
            tracing::info!("{} logged in", user.username);
            session.login(user.id);
            session.flash(FlashKind::Success, "Welcome back!");
            Ok(Redirect::to("/goal"))
        }
        None => {
            tracing::debug!("Failed login for {}", form.username);
            session.flash(FlashKind::Error, "Invalid username or password.");
            Ok(Redirect::to("/login"))
        }
    }
}

pub async fn logout(session: Session) -> Redirect {
    session.logout();
    Redirect::to("/login")
}
