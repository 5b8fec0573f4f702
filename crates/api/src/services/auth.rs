//! Password hashing and JWT issuance.
//!
//! Tokens are HS256-signed bearer tokens carrying the user id and role.
//! Passwords are hashed with Argon2id and per-hash salts; verification never
//! reveals whether the account exists or the password was wrong.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use clementine_core::{UserId, UserRole};

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email/password pair did not match an account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token missing, malformed, expired, or signed with another key.
    #[error("invalid token")]
    InvalidToken,

    /// Password rejected by the strength policy.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Argon2 failure while hashing or parsing a stored hash.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// JWT signing failure.
    #[error("token creation error: {0}")]
    TokenCreation(String),
}

/// JWT claims carried by every issued token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: i32,
    /// Role at issuance time, `admin` or `customer`.
    pub role: String,
    /// Expiry, seconds since epoch.
    pub exp: usize,
    /// Issued-at, seconds since epoch.
    pub iat: usize,
}

/// The identity a verified token resolves to.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl AuthenticatedUser {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        self.role.is_admin()
    }
}

/// Reject passwords the policy considers guessable.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` with a client-facing reason.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one number".to_string(),
        ));
    }
    Ok(())
}

/// Hash a password with Argon2id and a fresh salt.
///
/// # Errors
///
/// Returns `AuthError::Hashing` if the hasher fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch, `AuthError::Hashing`
/// if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Issue a signed token for a user.
///
/// # Errors
///
/// Returns `AuthError::TokenCreation` if signing fails.
pub fn issue_token(
    secret: &SecretString,
    expiry_hours: i64,
    user_id: UserId,
    role: UserRole,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.as_i32(),
        role: role.to_string(),
        exp: usize::try_from((now + Duration::hours(expiry_hours)).timestamp())
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?,
        iat: usize::try_from(now.timestamp())
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

/// Verify a token and resolve the identity it carries.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for anything short of a valid,
/// unexpired, correctly signed token.
pub fn decode_token(secret: &SecretString, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::InvalidToken)?;

    let role = data
        .claims
        .role
        .parse::<UserRole>()
        .map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthenticatedUser {
        user_id: UserId::new(data.claims.sub),
        role,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-signing-key-with-plenty-of-entropy-8Qk2")
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse 7").unwrap();
        assert!(verify_password("correct horse 7", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse 7", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password 1").unwrap();
        let b = hash_password("same password 1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("short1").is_err());
        assert!(validate_password_strength("12345678").is_err());
        assert!(validate_password_strength("onlyletters").is_err());
        assert!(validate_password_strength("letters4nd numbers").is_ok());
    }

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token(&secret(), 24, UserId::new(42), UserRole::Admin).unwrap();
        let identity = decode_token(&secret(), &token).unwrap();
        assert_eq!(identity.user_id, UserId::new(42));
        assert!(identity.is_admin());
    }

    #[test]
    fn test_token_wrong_key_rejected() {
        let token = issue_token(&secret(), 24, UserId::new(1), UserRole::Customer).unwrap();
        let other = SecretString::from("a-completely-different-signing-key-3Zx9");
        assert!(matches!(
            decode_token(&other, &token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(&secret(), -1, UserId::new(1), UserRole::Customer).unwrap();
        assert!(matches!(
            decode_token(&secret(), &token),
            Err(AuthError::InvalidToken)
        ));
    }
}
