use crate::models::contact::{ContactDraft, ContactPatch};

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 50;
pub const PHONE_MIN_LEN: usize = 10;
pub const PHONE_MAX_LEN: usize = 15;
pub const PASSWORD_MAX_LEN: usize = 50;

/// Validates a new contact and returns the list of problems (empty when valid).
pub fn validate_contact(draft: &ContactDraft) -> Vec<String> {
    let mut errors = Vec::new();
    check_length(&mut errors, "first_name", &draft.first_name, NAME_MIN_LEN, NAME_MAX_LEN);
    check_length(&mut errors, "last_name", &draft.last_name, NAME_MIN_LEN, NAME_MAX_LEN);
    check_email(&mut errors, "email", &draft.email);
    check_length(&mut errors, "phone", &draft.phone, PHONE_MIN_LEN, PHONE_MAX_LEN);
    errors
}

/// Validates only the fields present in a patch.
pub fn validate_contact_patch(patch: &ContactPatch) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(first_name) = &patch.first_name {
        check_length(&mut errors, "first_name", first_name, NAME_MIN_LEN, NAME_MAX_LEN);
    }
    if let Some(last_name) = &patch.last_name {
        check_length(&mut errors, "last_name", last_name, NAME_MIN_LEN, NAME_MAX_LEN);
    }
    if let Some(email) = &patch.email {
        check_email(&mut errors, "email", email);
    }
    if let Some(phone) = &patch.phone {
        check_length(&mut errors, "phone", phone, PHONE_MIN_LEN, PHONE_MAX_LEN);
    }
    errors
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    check_length(&mut errors, "username", username, NAME_MIN_LEN, NAME_MAX_LEN);
    check_email(&mut errors, "email", email);
    errors.extend(validate_password(password));
    errors
}

pub fn validate_password(password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    check_length(&mut errors, "password", password, 1, PASSWORD_MAX_LEN);
    errors
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

fn check_length(errors: &mut Vec<String>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(format!(
            "'{}' must be between {} and {} characters (got {})",
            field, min, max, len
        ));
    }
}

fn check_email(errors: &mut Vec<String>, field: &str, value: &str) {
    if !is_valid_email(value) {
        errors.push(format!("'{}' is not a valid email address", field));
    } else if value.chars().count() > EMAIL_MAX_LEN {
        errors.push(format!(
            "'{}' must be at most {} characters",
            field, EMAIL_MAX_LEN
        ));
    }
}
