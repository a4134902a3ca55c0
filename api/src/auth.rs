use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AccessToken, User};
use crate::repositories::UserRepository;
use crate::state::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2id hash in PHC string form, with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ApiError::Internal(format!("Failed to build salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// False for a wrong password and for any stored value that is not a PHC hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Opaque bearer token with 244 random bits.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Drop every token that has outlived `lifetime_seconds`.
pub async fn sweep_expired_tokens(
    users: &dyn UserRepository,
    lifetime_seconds: i64,
) -> Result<u64, ApiError> {
    let cutoff = Utc::now() - Duration::seconds(lifetime_seconds);
    let removed = users.delete_tokens_created_before(cutoff).await?;
    if removed > 0 {
        tracing::debug!("Removed {} expired access tokens", removed);
    }
    Ok(removed)
}

pub fn new_access_token(user_id: Uuid) -> AccessToken {
    AccessToken {
        token: generate_token(),
        user_id,
        created_at: Utc::now(),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The active user behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?.to_string();

        let access_token = state
            .users
            .get_token(&token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let lifetime = Duration::seconds(state.settings.token_lifetime_seconds);
        if access_token.created_at + lifetime <= Utc::now() {
            tracing::debug!("Access token for user {} expired", access_token.user_id);
            state.users.delete_token(&token).await?;
            return Err(ApiError::Unauthorized);
        }

        let user = state
            .users
            .get_user(access_token.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser { user, token })
    }
}

/// A [`CurrentUser`] with the superuser flag set.
#[derive(Debug, Clone)]
pub struct Superuser(pub User);

impl FromRequestParts<AppState> for Superuser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_superuser {
            return Err(ApiError::Forbidden);
        }
        Ok(Superuser(current.user))
    }
}
