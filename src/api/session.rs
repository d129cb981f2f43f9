//! Cookie-keyed sessions persisted in the `sessions` table.
//!
//! [`session_layer`] loads the session before the handler runs and writes it
//! back afterwards if anything changed. Handlers reach it through the
//! [`Session`] extractor; [`CurrentUser`] and [`OptionalUser`] resolve the
//! logged-in user from it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::Utc;
use uuid::Uuid;

use goalpost_core::models::{Flash, FlashKind, SessionRecord, User, SESSION_TTL_HOURS};

use super::{AppError, AppState};

pub const SESSION_COOKIE: &str = "goalpost.sid";

#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

struct SessionState {
    record: SessionRecord,
    persisted: bool,
    dirty: bool,
    destroyed: bool,
    /// Previous id, dropped when the session is regenerated at login.
    stale_id: Option<Uuid>,
}

enum Outcome {
    Unchanged,
    Save { record: SessionRecord, stale_id: Option<Uuid> },
    Destroy(Option<Uuid>),
}

impl Session {
    fn new(existing: Option<SessionRecord>) -> Self {
        let persisted = existing.is_some();
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                record: existing.unwrap_or_default(),
                persisted,
                dirty: false,
                destroyed: false,
                stale_id: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.state().record.user_id
    }

    /// Bind the session to a user under a fresh id.
    pub fn login(&self, user_id: Uuid) {
        let mut state = self.state();
        if state.persisted {
            state.stale_id = Some(state.record.id);
        }
        state.record.id = Uuid::new_v4();
        state.record.user_id = Some(user_id);
        state.dirty = true;
    }

    /// Unbind the user but keep the session, so pending flash messages survive.
    pub fn forget_user(&self) {
        let mut state = self.state();
        if state.record.user_id.take().is_some() {
            state.dirty = true;
        }
    }

    /// Drop the session entirely, including its cookie.
    pub fn logout(&self) {
        self.state().destroyed = true;
    }

    pub fn flash(&self, kind: FlashKind, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(kind = kind.as_str(), "flash: {}", message);

        let mut state = self.state();
        state.record.flash.push(kind, message);
        state.dirty = true;
    }

    /// Take pending flash messages; they will not be shown again.
    pub fn take_flash(&self) -> Flash {
        let mut state = self.state();
        let flash = std::mem::take(&mut state.record.flash);
        if !flash.is_empty() {
            state.dirty = true;
        }
        flash
    }

    fn finish(&self) -> Outcome {
        let mut state = self.state();
        if state.destroyed {
            let stored_id = state.stale_id.or(state.persisted.then_some(state.record.id));
            return Outcome::Destroy(stored_id);
        }
        if !state.dirty {
            return Outcome::Unchanged;
        }
        Outcome::Save {
            record: state.record.clone(),
            stale_id: state.stale_id.take(),
        }
    }
}

/// Middleware that loads the session for the request and persists it after.
pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let jar = SignedCookieJar::from_headers(req.headers(), state.cookie_key.clone());

    let existing = match jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        Some(id) => {
            match state
                .db
                .with_connection(|conn| SessionRecord::find_live(conn, &id, Utc::now()))
            {
                Ok(record) => record,
                Err(e) => return AppError::from(e).into_response(),
            }
        }
        None => None,
    };

    let session = Session::new(existing);
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;

    match session.finish() {
        Outcome::Unchanged => response,
        Outcome::Save { mut record, stale_id } => {
            let saved = state.db.with_connection(|conn| {
                if let Some(stale_id) = stale_id {
                    SessionRecord::delete(conn, &stale_id)?;
                }
                let purged = SessionRecord::purge_expired(conn, Utc::now())?;
                if purged > 0 {
                    tracing::debug!("Purged {} expired sessions", purged);
                }
                record.save(conn)
            });
            if let Err(e) = saved {
                return AppError::from(e).into_response();
            }

            let cookie = Cookie::build((SESSION_COOKIE, record.id.to_string()))
                .path("/")
                .http_only(true)
                .secure(state.secure_cookies)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::hours(SESSION_TTL_HOURS));
            (jar.add(cookie), response).into_response()
        }
        Outcome::Destroy(id) => {
            if let Some(id) = id {
                if let Err(e) = state
                    .db
                    .with_connection(|conn| SessionRecord::delete(conn, &id))
                {
                    return AppError::from(e).into_response();
                }
            }
            (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), response).into_response()
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session layer is not installed")))
    }
}

/// The logged-in user, if there is one.
pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let Some(user_id) = session.user_id() else {
            return Ok(Self(None));
        };

        let user = state
            .db
            .with_connection(|conn| User::find_by_id(conn, &user_id))?;
        if user.is_none() {
            tracing::warn!("Session refers to missing user {}", user_id);
            session.forget_user();
        }
        Ok(Self(user))
    }
}

/// Requires a logged-in user; anyone else is sent to the login page.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalUser(user) = OptionalUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match user {
            Some(user) => Ok(Self(user)),
            None => {
                let session = Session::from_request_parts(parts, state)
                    .await
                    .map_err(IntoResponse::into_response)?;
                session.flash(FlashKind::Error, "Please log in.");
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}
