use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rolodex_common::birthday::BirthdayWindow;
use rolodex_common::models::contact::{Contact, ContactDraft};
use sqlx::PgPool;
use uuid::Uuid;

const CONTACT_COLUMNS: &str = "contact_id, user_id, first_name, last_name, email, phone, \
                               date_of_birth, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub contact_id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.contact_id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            dob: row.date_of_birth,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Case-insensitive substring filters for listing contacts
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

pub struct ContactRepo;

impl ContactRepo {
    pub async fn create(pool: &PgPool, user_id: Uuid, draft: &ContactDraft) -> Result<ContactRow> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "INSERT INTO contact (contact_id, user_id, first_name, last_name, email, phone, date_of_birth)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(draft.dob)
        .fetch_one(pool)
        .await
        .context("Failed to create contact")?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, user_id: Uuid, contact_id: Uuid) -> Result<Option<ContactRow>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contact WHERE contact_id = $1 AND user_id = $2"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get contact")?;
        Ok(row)
    }

    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        filter: &ContactFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ContactRow>> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contact
             WHERE user_id = $1
               AND ($2::text IS NULL OR first_name ILIKE '%' || $2 || '%')
               AND ($3::text IS NULL OR last_name ILIKE '%' || $3 || '%')
               AND ($4::text IS NULL OR email ILIKE '%' || $4 || '%')
             ORDER BY created_at, contact_id
             LIMIT $5 OFFSET $6"
        ))
        .bind(user_id)
        .bind(filter.first_name.as_deref())
        .bind(filter.last_name.as_deref())
        .bind(filter.email.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list contacts")?;
        Ok(rows)
    }

    /// Overwrite every writable column of an owned contact.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        contact_id: Uuid,
        draft: &ContactDraft,
    ) -> Result<Option<ContactRow>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "UPDATE contact
             SET first_name = $3, last_name = $4, email = $5, phone = $6, date_of_birth = $7,
                 updated_at = NOW()
             WHERE contact_id = $1 AND user_id = $2
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(draft.dob)
        .fetch_optional(pool)
        .await
        .context("Failed to update contact")?;
        Ok(row)
    }

    /// Delete an owned contact, returning it if it existed.
    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<ContactRow>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "DELETE FROM contact WHERE contact_id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(contact_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to delete contact")?;
        Ok(row)
    }

    /// Contacts of `user_id` whose birthday (month/day) falls in `window`,
    /// ordered by how soon the birthday comes up.
    pub async fn list_upcoming_birthdays(
        pool: &PgPool,
        user_id: Uuid,
        window: &BirthdayWindow,
    ) -> Result<Vec<ContactRow>> {
        let ranges = window.ranges();
        let first = ranges[0];
        // A single-range window repeats its range in the second slot.
        let second = ranges.get(1).copied().unwrap_or(first);

        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contact
             WHERE user_id = $1
               AND date_of_birth IS NOT NULL
               AND (
                    (EXTRACT(MONTH FROM date_of_birth)::int = $2
                     AND EXTRACT(DAY FROM date_of_birth)::int BETWEEN $3 AND $4)
                 OR (EXTRACT(MONTH FROM date_of_birth)::int = $5
                     AND EXTRACT(DAY FROM date_of_birth)::int BETWEEN $6 AND $7)
               )
             ORDER BY CASE WHEN EXTRACT(MONTH FROM date_of_birth)::int = $2 THEN 0 ELSE 1 END,
                      EXTRACT(DAY FROM date_of_birth),
                      last_name, first_name"
        ))
        .bind(user_id)
        .bind(first.month as i32)
        .bind(first.first_day as i32)
        .bind(first.last_day as i32)
        .bind(second.month as i32)
        .bind(second.first_day as i32)
        .bind(second.last_day as i32)
        .fetch_all(pool)
        .await
        .context("Failed to list upcoming birthdays")?;
        Ok(rows)
    }
}
