pub mod auth;
pub mod contacts;
pub mod health;
pub mod middleware;
pub mod users;

use crate::auth::AuthError;
use crate::state::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::patch, routing::post, Json, Router};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

/// Log an unexpected failure and answer with a generic 500.
pub(crate) fn internal_error(context: &str, e: &anyhow::Error) -> Response {
    tracing::error!("{}: {:#}", context, e);
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub(crate) fn validation_error(details: Vec<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({"error": "Validation failed", "details": details})),
    )
        .into_response()
}

/// Map an auth failure on a bearer-protected route.
pub(crate) fn auth_error_response(err: AuthError) -> Response {
    match err {
        AuthError::Internal(e) => internal_error("Authentication failed", &e),
        AuthError::UserNotFound => json_error(StatusCode::NOT_FOUND, &err.to_string()),
        other => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(json!({"error": other.to_string()})),
        )
            .into_response(),
    }
}

/// Host names and ports only, so the value is safe to embed in a link.
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}

/// Base URL for links in outgoing email, always ending with '/'.
pub(crate) fn public_base_url(state: &AppState, headers: &HeaderMap) -> String {
    let base = match &state.config.public_url {
        Some(url) => url.clone(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .filter(|host| is_plain_host(host))
                .unwrap_or("localhost");
            format!("http://{}/", host)
        }
    };
    if base.ends_with('/') {
        base
    } else {
        format!("{}/", base)
    }
}

pub fn build_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthchecker", get(health::healthchecker))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/register/admin", post(auth::register_admin))
        .route("/auth/login", post(auth::login))
        .route("/auth/confirmed_email/{token}", get(auth::confirmed_email))
        .route("/auth/request_email", post(auth::request_email))
        .route(
            "/auth/password-reset-request",
            post(auth::password_reset_request),
        )
        .route(
            "/auth/password-reset-verify/{token}",
            get(auth::password_reset_verify),
        )
        .route("/auth/reset_password", post(auth::reset_password))
        // Users
        .route("/users/me", get(users::me))
        .route("/users/avatar", patch(users::update_avatar))
        // Contacts
        .route(
            "/contacts",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/contacts/weekly-birthday", get(contacts::weekly_birthday))
        .route(
            "/contacts/{id}",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .with_state(state)
}
