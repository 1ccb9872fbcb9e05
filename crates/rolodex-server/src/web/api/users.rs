use crate::cache::user_key;
use crate::state::AppState;
use crate::web::api::middleware::CurrentUser;
use crate::web::api::{internal_error, json_error};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rolodex_common::models::auth::Role;
use rolodex_db::UserRepo;
use std::sync::Arc;

/// GET /api/users/me
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    if !state.me_limiter.check(&user.id.to_string()).await {
        tracing::warn!("Rate limit exceeded on /users/me");
        return json_error(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    }
    Json(user).into_response()
}

/// PATCH /api/users/avatar (multipart, field `file`)
#[tracing::instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if user.role != Role::Admin {
        return json_error(
            StatusCode::FORBIDDEN,
            "Only admin can update the default avatar",
        );
    }

    let avatars = match &state.avatars {
        Some(store) => store.clone(),
        None => return json_error(StatusCode::NOT_FOUND, "Avatar uploads are not configured"),
    };

    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let file_name = field.file_name().unwrap_or("avatar").to_string();
                match field.bytes().await {
                    Ok(data) => upload = Some((file_name, data.to_vec())),
                    Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()),
                }
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()),
        }
    }

    let Some((file_name, data)) = upload else {
        return json_error(StatusCode::UNPROCESSABLE_ENTITY, "Missing 'file' field");
    };
    if data.is_empty() {
        return json_error(StatusCode::UNPROCESSABLE_ENTITY, "Uploaded file is empty");
    }

    let url = match avatars.upload(&user.username, &file_name, data).await {
        Ok(url) => url,
        Err(e) => return internal_error("Failed to upload avatar", &e),
    };

    let row = match UserRepo::update_avatar(&state.pool, user.id, &url).await {
        Ok(Some(row)) => row,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return internal_error("Failed to store avatar URL", &e),
    };

    if let Err(e) = state.cache.remove(&user_key(user.id)).await {
        tracing::warn!("Failed to invalidate cached user {}: {:#}", user.id, e);
    }

    tracing::info!("Updated avatar for '{}'", row.username);
    Json(row.profile()).into_response()
}
