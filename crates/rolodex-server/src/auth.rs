use crate::config::AuthConfig;
use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rolodex_common::models::auth::{AccessClaims, EmailClaims, TokenUse};
use std::sync::LazyLock;
use uuid::Uuid;

/// Hash checked when a login names no account, so both failures cost one verify.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("rolodex-no-such-user").ok());

/// Failures of the login, token and current-user flows.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Email not confirmed")]
    EmailNotConfirmed,
    /// Expired, malformed, badly signed or minted for another purpose.
    #[error("Could not validate credentials")]
    InvalidToken,
    #[error("User with this email does not exist")]
    UserNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Hash a password using argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC hash string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Run a verify against a fixed hash and discard the outcome.
pub fn verify_dummy_password(password: &str) {
    if let Some(hash) = DUMMY_PASSWORD_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Only the HMAC family is accepted, the signing key is a shared secret.
fn signing_algorithm(name: &str) -> Result<Algorithm> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => anyhow::bail!("Unsupported JWT algorithm: {}", other),
    }
}

fn encode<T: serde::Serialize>(claims: &T, cfg: &AuthConfig) -> Result<String> {
    let header = Header::new(signing_algorithm(&cfg.jwt_algorithm)?);
    jsonwebtoken::encode(
        &header,
        claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .context("Failed to sign token")
}

fn decode<T: serde::de::DeserializeOwned>(token: &str, cfg: &AuthConfig) -> Option<T> {
    let algorithm = signing_algorithm(&cfg.jwt_algorithm).ok()?;
    let mut validation = Validation::new(algorithm);
    validation.set_required_spec_claims(&["exp", "sub"]);
    jsonwebtoken::decode::<T>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )
    .ok()
    .map(|data| data.claims)
}

/// Create an access token for `username`
pub fn create_access_token(user_id: Uuid, username: &str, cfg: &AuthConfig) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: username.to_string(),
        id: user_id,
        token_use: TokenUse::Access,
        iat: now,
        exp: now + cfg.access_token_ttl_secs,
    };
    encode(&claims, cfg)
}

/// Validate an access token and return its claims
pub fn validate_access_token(token: &str, cfg: &AuthConfig) -> Result<AccessClaims, AuthError> {
    match decode::<AccessClaims>(token, cfg) {
        Some(claims) if claims.token_use == TokenUse::Access => Ok(claims),
        _ => Err(AuthError::InvalidToken),
    }
}

/// Create a token for the email confirmation and password reset links
pub fn create_email_token(email: &str, cfg: &AuthConfig) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = EmailClaims {
        sub: email.to_string(),
        token_use: TokenUse::Email,
        iat: now,
        exp: now + cfg.email_token_ttl_secs,
    };
    encode(&claims, cfg)
}

/// Recover the email address an email token was issued for
pub fn email_from_token(token: &str, cfg: &AuthConfig) -> Result<String, AuthError> {
    match decode::<EmailClaims>(token, cfg) {
        Some(claims) if claims.token_use == TokenUse::Email => Ok(claims.sub),
        _ => Err(AuthError::InvalidToken),
    }
}
