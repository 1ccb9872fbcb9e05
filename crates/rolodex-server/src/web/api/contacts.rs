use crate::state::AppState;
use crate::web::api::middleware::CurrentUser;
use crate::web::api::{internal_error, json_error, validation_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rolodex_common::birthday::{upcoming_birthdays, BirthdayWindow};
use rolodex_common::models::contact::{Contact, ContactDraft, ContactPatch};
use rolodex_common::validation::{validate_contact, validate_contact_patch};
use rolodex_db::{is_unique_violation, ContactFilter, ContactRepo};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListContactsQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct WeeklyBirthdayQuery {
    /// First day of the window (default: today, UTC)
    pub birthday_date: Option<NaiveDate>,
}

fn parse_contact_id(id: &str) -> Result<Uuid, Response> {
    id.parse::<Uuid>()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "Invalid contact ID"))
}

fn contact_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Contact not found")
}

fn email_taken() -> Response {
    json_error(StatusCode::CONFLICT, "Contact with this email already exists")
}

/// Blank filter strings mean "no filter".
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/contacts
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListContactsQuery>,
) -> impl IntoResponse {
    if query.skip < 0 || query.limit < 0 {
        return validation_error(vec!["skip and limit must not be negative".to_string()]);
    }

    let filter = ContactFilter {
        first_name: non_blank(query.first_name),
        last_name: non_blank(query.last_name),
        email: non_blank(query.email),
    };

    match ContactRepo::list(&state.pool, user.id, &filter, query.limit, query.skip).await {
        Ok(rows) => {
            let contacts: Vec<Contact> = rows.into_iter().map(Contact::from).collect();
            Json(contacts).into_response()
        }
        Err(e) => internal_error("Failed to list contacts", &e),
    }
}

/// GET /api/contacts/weekly-birthday
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn weekly_birthday(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<WeeklyBirthdayQuery>,
) -> impl IntoResponse {
    let today = query
        .birthday_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let window = BirthdayWindow::starting(today);

    let rows = match ContactRepo::list_upcoming_birthdays(&state.pool, user.id, &window).await {
        Ok(rows) => rows,
        Err(e) => return internal_error("Failed to list upcoming birthdays", &e),
    };
    let candidates: Vec<Contact> = rows.into_iter().map(Contact::from).collect();

    tracing::debug!(
        "Birthday window {} .. {} matched {} contact(s)",
        window.start(),
        window.end(),
        candidates.len()
    );
    Json(upcoming_birthdays(&candidates, user.id, today)).into_response()
}

/// GET /api/contacts/{id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let contact_id = match parse_contact_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match ContactRepo::get(&state.pool, user.id, contact_id).await {
        Ok(Some(row)) => Json(Contact::from(row)).into_response(),
        Ok(None) => contact_not_found(),
        Err(e) => internal_error("Failed to get contact", &e),
    }
}

/// POST /api/contacts
#[tracing::instrument(skip(state, user, draft), fields(user_id = %user.id))]
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<ContactDraft>,
) -> impl IntoResponse {
    let problems = validate_contact(&draft);
    if !problems.is_empty() {
        return validation_error(problems);
    }

    match ContactRepo::create(&state.pool, user.id, &draft).await {
        Ok(row) => (StatusCode::CREATED, Json(Contact::from(row))).into_response(),
        Err(e) if is_unique_violation(&e) => email_taken(),
        Err(e) => internal_error("Failed to create contact", &e),
    }
}

/// PATCH /api/contacts/{id}
#[tracing::instrument(skip(state, user, patch), fields(user_id = %user.id))]
pub async fn update_contact(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(patch): Json<ContactPatch>,
) -> impl IntoResponse {
    let contact_id = match parse_contact_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let problems = validate_contact_patch(&patch);
    if !problems.is_empty() {
        return validation_error(problems);
    }

    let current = match ContactRepo::get(&state.pool, user.id, contact_id).await {
        Ok(Some(row)) => Contact::from(row),
        Ok(None) => return contact_not_found(),
        Err(e) => return internal_error("Failed to get contact", &e),
    };
    if patch.is_empty() {
        return Json(current).into_response();
    }

    let merged = patch.apply_to(&ContactDraft::from(&current));
    match ContactRepo::update(&state.pool, user.id, contact_id, &merged).await {
        Ok(Some(row)) => Json(Contact::from(row)).into_response(),
        Ok(None) => contact_not_found(),
        Err(e) if is_unique_violation(&e) => email_taken(),
        Err(e) => internal_error("Failed to update contact", &e),
    }
}

/// DELETE /api/contacts/{id} -- returns the deleted contact
#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_contact(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let contact_id = match parse_contact_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match ContactRepo::delete(&state.pool, user.id, contact_id).await {
        Ok(Some(row)) => {
            tracing::info!("Deleted contact {}", contact_id);
            Json(Contact::from(row)).into_response()
        }
        Ok(None) => contact_not_found(),
        Err(e) => internal_error("Failed to delete contact", &e),
    }
}
