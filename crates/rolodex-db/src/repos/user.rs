use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rolodex_common::models::auth::{Role, UserProfile};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "user_id, username, email, password_hash, avatar, role, confirmed, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// The role column is CHECK-constrained, unknown values read as `User`.
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Fields of a user being registered
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub avatar: Option<&'a str>,
    pub confirmed: bool,
}

pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, user_id: Uuid, user: &NewUser<'_>) -> Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"INSERT INTO "user" (user_id, username, email, password_hash, avatar, role, confirmed)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.avatar)
        .bind(user.role.as_str())
        .bind(user.confirmed)
        .fetch_one(pool)
        .await
        .context("Failed to create user")?;
        Ok(row)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE user_id = $1"#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by id")?;
        Ok(row)
    }

    pub async fn get_by_username(pool: &PgPool, username: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE username = $1"#
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;
        Ok(row)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {USER_COLUMNS} FROM "user" WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
        Ok(row)
    }

    /// Mark the user's email as confirmed. Returns false if no such user.
    pub async fn confirm_email(pool: &PgPool, email: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE "user" SET confirmed = TRUE, updated_at = NOW() WHERE email = $1"#,
        )
        .bind(email)
        .execute(pool)
        .await
        .context("Failed to confirm email")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_avatar(
        pool: &PgPool,
        user_id: Uuid,
        avatar_url: &str,
    ) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"UPDATE "user" SET avatar = $2, updated_at = NOW() WHERE user_id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(avatar_url)
        .fetch_optional(pool)
        .await
        .context("Failed to update avatar")?;
        Ok(row)
    }

    pub async fn update_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE "user" SET password_hash = $2, updated_at = NOW() WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await
        .context("Failed to update password")?;
        Ok(result.rows_affected() > 0)
    }
}
