mod auth;
mod error;
mod goals;
mod milestones;
mod pages;
mod session;

use axum::{
    extract::{Query, Request},
    http::Method,
    middleware,
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use serde::Deserialize;
use tower::Layer;
use tower::util::MapRequestLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use goalpost_core::Database;

pub use error::AppError;
pub use session::{CurrentUser, OptionalUser, Session, SESSION_COOKIE};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub cookie_key: Key,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(db: Database, cookie_key: Key, secure_cookies: bool) -> Self {
        Self {
            db,
            cookie_key,
            secure_cookies,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(pages::home))
        .route("/goal", get(goals::index).post(goals::create))
        .route("/goal/new", get(goals::new_form))
        .route(
            "/goal/{id}",
            get(goals::show).put(goals::update).delete(goals::destroy),
        )
        .route("/goal/{id}/edit", get(goals::edit).put(goals::update))
        .route("/goal/{id}/milestone", post(milestones::create))
        .route(
            "/goal/{id}/milestone/{milestone_id}",
            delete(milestones::destroy),
        )
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ))
        .with_state(state);

    // The override has to run before routing picks a method handler.
    let routes = MapRequestLayer::new(method_override).layer(routes);

    Router::new()
        .fallback_service(routes)
        .layer(TraceLayer::new_for_http())
}

#[derive(Deserialize)]
struct MethodOverride {
    #[serde(rename = "_method")]
    method: Option<String>,
}

/// Turn `POST /path?_method=DELETE` into `DELETE /path`, since HTML forms
/// can only submit GET and POST.
fn method_override(mut req: Request) -> Request {
    if req.method() != Method::POST {
        return req;
    }

    let requested = Query::<MethodOverride>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.method);

    let method = match requested.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("PUT") => Method::PUT,
        Some("PATCH") => Method::PATCH,
        Some("DELETE") => Method::DELETE,
        _ => return req,
    };

    tracing::debug!("Overriding POST {} as {}", req.uri().path(), method);
    *req.method_mut() = method;
    req
}

/// Parse an id from the path. Anything malformed is simply not found.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

/// Trimmed value of a required form field.
fn required(label: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{label} is required")));
    }
    Ok(value.to_string())
}

/// Trimmed value of an optional form field; blank means absent.
fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
