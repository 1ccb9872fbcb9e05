use crate::auth::AuthError;
use crate::session::resolve_current_user;
use crate::state::AppState;
use crate::web::api::auth_error_response;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::Response,
};
use rolodex_common::models::auth::UserProfile;
use std::sync::Arc;

/// Extractor that validates a Bearer access token and resolves the user,
/// reading through the user cache.
#[derive(Debug)]
pub struct CurrentUser(pub UserProfile);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| auth_error_response(AuthError::InvalidToken))?;

        resolve_current_user(
            &state.pool,
            state.cache.as_ref(),
            &state.config.auth,
            state.user_ttl(),
            token,
        )
        .await
        .map(CurrentUser)
        .map_err(auth_error_response)
    }
}
