use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A contact as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub dob: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable fields of a contact. Body of `POST /api/contacts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

impl From<&Contact> for ContactDraft {
    fn from(contact: &Contact) -> Self {
        Self {
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            dob: contact.dob,
        }
    }
}

/// Partial update. Body of `PATCH /api/contacts/{id}`.
///
/// Absent fields are left untouched. `dob` distinguishes "absent" (`None`)
/// from an explicit `null` (`Some(None)`), which clears the birth date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub dob: Option<Option<NaiveDate>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.dob.is_none()
    }

    /// Merge this patch over `base`, producing a new draft.
    pub fn apply_to(&self, base: &ContactDraft) -> ContactDraft {
        ContactDraft {
            first_name: self
                .first_name
                .clone()
                .unwrap_or_else(|| base.first_name.clone()),
            last_name: self
                .last_name
                .clone()
                .unwrap_or_else(|| base.last_name.clone()),
            email: self.email.clone().unwrap_or_else(|| base.email.clone()),
            phone: self.phone.clone().unwrap_or_else(|| base.phone.clone()),
            dob: match self.dob {
                Some(dob) => dob,
                None => base.dob,
            },
        }
    }
}
