//! HTTP Basic auth and superuser gating (spec.md §6.3: "Authenticated by
//! HTTP Basic; superuser-only endpoints are marked `*`").

use crate::error::{AppError, ServiceError};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rand::rngs::OsRng;
use sqlx::PgPool;

/// The authenticated principal for one request.
#[derive(Debug, Clone)]
pub struct Principal {
    /// The username supplied in the `Authorization: Basic` header.
    pub username: String,
    /// Whether this user may call superuser-only (`*`) routes.
    pub is_superuser: bool,
}

impl Principal {
    /// Reject the request unless this principal is a superuser. Call at
    /// the top of every handler marked `*` in spec.md §6.3.
    pub fn require_superuser(&self) -> Result<(), ServiceError> {
        if self.is_superuser {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("{} is not a superuser", self.username)).into())
        }
    }
}

/// Create or replace a user's credentials. Used by the `superuser` CLI
/// command and by a seed step at first boot.
pub async fn upsert_user(pool: &PgPool, username: &str, password: &str, is_superuser: bool) -> Result<(), sqlx::Error> {
    let hash = hash_password(password).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO service_users (username, password_hash, is_superuser)
        VALUES ($1, $2, $3)
        ON CONFLICT (username) DO UPDATE SET password_hash = $2, is_superuser = $3
        "#,
    )
    .bind(username)
    .bind(&hash)
    .bind(is_superuser)
    .execute(pool)
    .await?;
    Ok(())
}

/// PHC-string-encoded Argon2id hash, salted with a fresh random salt per call.
fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

fn verify_password(password: &str, phc_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc_hash) else { return false };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[derive(sqlx::FromRow)]
struct StoredUser {
    password_hash: String,
    is_superuser: bool,
}

/// Decode an HTTP Basic `Authorization` header into `(username, password)`.
fn decode_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = nexus_crypto::encoding::decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    PgPool: axum::extract::FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = PgPool::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;
        let (username, password) =
            decode_basic_auth(header).ok_or_else(|| AppError::unauthorized("malformed Basic auth header"))?;

        let stored = sqlx::query_as::<_, StoredUser>(
            "SELECT password_hash, is_superuser FROM service_users WHERE username = $1",
        )
        .bind(&username)
        .fetch_optional(&pool)
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?;

        let Some(stored) = stored else {
            return Err(AppError::unauthorized("unknown user or wrong password").into());
        };
        if !verify_password(&password, &stored.password_hash) {
            return Err(AppError::unauthorized("unknown user or wrong password").into());
        }

        Ok(Principal { username, is_superuser: stored.is_superuser })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn two_hashes_of_the_same_password_differ() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b, "salts must be freshly generated per hash");
    }

    #[test]
    fn garbage_stored_hash_fails_closed() {
        assert!(!verify_password("whatever", "not a phc string"));
    }

    #[test]
    fn decode_basic_auth_splits_user_and_pass() {
        let header = format!("Basic {}", nexus_crypto::encoding::encode(b"alice:s3cret"));
        let (user, pass) = decode_basic_auth(&header).unwrap();
        assert_eq!(user, "alice");
        assert_eq!(pass, "s3cret");
    }

    #[test]
    fn decode_basic_auth_rejects_non_basic_scheme() {
        assert!(decode_basic_auth("Bearer abc123").is_none());
    }
}
