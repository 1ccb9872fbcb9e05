use crate::auth::{create_email_token, email_from_token, hash_password, AuthError};
use crate::avatar::gravatar_url;
use crate::mailer::{send_in_background, EmailKind};
use crate::session::authenticate;
use crate::state::AppState;
use crate::web::api::{
    auth_error_response, internal_error, json_error, public_base_url, validation_error,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use rolodex_common::models::auth::Role;
use rolodex_common::validation::{validate_password, validate_registration};
use rolodex_db::{is_unique_violation, NewUser, UserRepo, UserRow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

fn invalid_email_token() -> Response {
    json_error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid token")
}

/// Mint an email token for `user` and mail the link in the background.
fn send_token_email(
    state: &AppState,
    headers: &HeaderMap,
    user: &UserRow,
    kind: EmailKind,
) -> anyhow::Result<()> {
    let token = create_email_token(&user.email, &state.config.auth)?;
    let base_url = public_base_url(state, headers);
    let message = kind.compose(&user.email, &user.username, &base_url, &token)?;
    send_in_background(state.mailer.clone(), message);
    Ok(())
}

async fn create_user(
    state: &AppState,
    headers: &HeaderMap,
    req: RegisterRequest,
    role: Role,
) -> Response {
    let problems = validate_registration(&req.username, &req.email, &req.password);
    if !problems.is_empty() {
        return validation_error(problems);
    }

    match UserRepo::get_by_email(&state.pool, &req.email).await {
        Ok(Some(_)) => {
            return json_error(StatusCode::CONFLICT, "User with this email already exists")
        }
        Ok(None) => {}
        Err(e) => return internal_error("Failed to look up user by email", &e),
    }
    match UserRepo::get_by_username(&state.pool, &req.username).await {
        Ok(Some(_)) => {
            return json_error(StatusCode::CONFLICT, "User with this username already exists")
        }
        Ok(None) => {}
        Err(e) => return internal_error("Failed to look up user by username", &e),
    }

    let password_hash = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => return internal_error("Failed to hash password", &e),
    };

    let avatar = gravatar_url(&req.email);
    let user = match UserRepo::create(
        &state.pool,
        Uuid::new_v4(),
        &NewUser {
            username: &req.username,
            email: &req.email,
            password_hash: &password_hash,
            role,
            avatar: Some(&avatar),
            confirmed: false,
        },
    )
    .await
    {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            return json_error(StatusCode::CONFLICT, "User already exists")
        }
        Err(e) => return internal_error("Failed to create user", &e),
    };

    tracing::info!("Registered {} '{}'", role, user.username);

    if let Err(e) = send_token_email(state, headers, &user, EmailKind::Confirmation) {
        tracing::error!("Failed to queue confirmation email: {:#}", e);
    }

    (StatusCode::CREATED, Json(user.profile())).into_response()
}

/// POST /api/auth/register
#[tracing::instrument(skip(state, headers, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    create_user(&state, &headers, req, Role::User).await
}

/// POST /api/auth/register/admin
#[tracing::instrument(skip(state, headers, req), fields(username = %req.username))]
pub async fn register_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    create_user(&state, &headers, req, Role::Admin).await
}

/// POST /api/auth/login (form encoded)
#[tracing::instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> impl IntoResponse {
    match authenticate(&state.pool, &state.config.auth, &form.username, &form.password).await {
        Ok(access_token) => Json(TokenResponse {
            access_token,
            token_type: "bearer",
        })
        .into_response(),
        Err(e) => auth_error_response(e),
    }
}

/// GET /api/auth/confirmed_email/{token}
#[tracing::instrument(skip(state, token))]
pub async fn confirmed_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let email = match email_from_token(&token, &state.config.auth) {
        Ok(email) => email,
        Err(_) => return invalid_email_token(),
    };

    let user = match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => return json_error(StatusCode::BAD_REQUEST, "Verification error"),
        Err(e) => return internal_error("Failed to look up user by email", &e),
    };

    if user.confirmed {
        return Json(json!({"message": "Email already confirmed"})).into_response();
    }

    match UserRepo::confirm_email(&state.pool, &email).await {
        Ok(_) => {
            tracing::info!("Confirmed email for '{}'", user.username);
            Json(json!({"message": "Email confirmed"})).into_response()
        }
        Err(e) => internal_error("Failed to confirm email", &e),
    }
}

/// POST /api/auth/request_email
#[tracing::instrument(skip(state, headers, req))]
pub async fn request_email(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let user = match UserRepo::get_by_email(&state.pool, &req.email).await {
        Ok(Some(u)) => u,
        Ok(None) => return json_error(StatusCode::BAD_REQUEST, "Verification error"),
        Err(e) => return internal_error("Failed to look up user by email", &e),
    };

    if user.confirmed {
        return Json(json!({"message": "Email already confirmed"})).into_response();
    }

    if let Err(e) = send_token_email(&state, &headers, &user, EmailKind::Confirmation) {
        return internal_error("Failed to queue confirmation email", &e);
    }
    Json(json!({"message": "Check your email for confirmation"})).into_response()
}

/// POST /api/auth/password-reset-request
#[tracing::instrument(skip(state, headers, req))]
pub async fn password_reset_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EmailRequest>,
) -> impl IntoResponse {
    let user = match UserRepo::get_by_email(&state.pool, &req.email).await {
        Ok(Some(u)) => u,
        Ok(None) => return auth_error_response(AuthError::UserNotFound),
        Err(e) => return internal_error("Failed to look up user by email", &e),
    };

    if let Err(e) = send_token_email(&state, &headers, &user, EmailKind::PasswordReset) {
        return internal_error("Failed to queue password reset email", &e);
    }
    Json(json!({"message": "Check your email for reset password"})).into_response()
}

/// GET /api/auth/password-reset-verify/{token}
#[tracing::instrument(skip(state, token))]
pub async fn password_reset_verify(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match email_from_token(&token, &state.config.auth) {
        Ok(email) => Json(json!({
            "message": "Token is valid",
            "email": email,
            "token": token,
        }))
        .into_response(),
        Err(_) => invalid_email_token(),
    }
}

/// POST /api/auth/reset_password
#[tracing::instrument(skip(state, req))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> impl IntoResponse {
    let email = match email_from_token(&req.token, &state.config.auth) {
        Ok(email) => email,
        Err(_) => return invalid_email_token(),
    };

    let problems = validate_password(&req.new_password);
    if !problems.is_empty() {
        return validation_error(problems);
    }

    let user = match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => return auth_error_response(AuthError::UserNotFound),
        Err(e) => return internal_error("Failed to look up user by email", &e),
    };

    let password_hash = match hash_password(&req.new_password) {
        Ok(h) => h,
        Err(e) => return internal_error("Failed to hash password", &e),
    };

    match UserRepo::update_password(&state.pool, user.user_id, &password_hash).await {
        Ok(true) => {
            tracing::info!("Password reset for '{}'", user.username);
            Json(json!({"message": "Password has been successfully reset"})).into_response()
        }
        Ok(false) => auth_error_response(AuthError::UserNotFound),
        Err(e) => internal_error("Failed to update password", &e),
    }
}
