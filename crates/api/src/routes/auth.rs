//! Account routes: registration, login, Google OAuth, profile, addresses.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Redirect,
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use clementine_core::{AddressId, Email, UserRole};

use crate::db::users::NewUser;
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::user::{Address, User};
use crate::routes::{ok, ok_message, Envelope};
use crate::services::auth::{
    self, hash_password, validate_password_strength, verify_password, AuthError,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

fn parse_email(raw: &str) -> Result<Email> {
    raw.parse::<Email>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// `POST /api/auth/register`
///
/// Self-registration always creates a `customer`; the role field is not
/// accepted from the client.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<Envelope<SessionResponse>>> {
    let email = parse_email(&body.email)?;
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    validate_password_strength(&body.password)?;
    let password_hash = hash_password(&body.password)?;

    let user = UserRepository::new(state.pool())
        .create(NewUser {
            email: &email,
            name: body.name.trim(),
            password_hash: Some(&password_hash),
            role: UserRole::Customer,
            google_id: None,
        })
        .await?;

    let token = issue_session(&state, &user)?;
    Ok(ok("Account created", SessionResponse { token, user }))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Envelope<SessionResponse>>> {
    let email = parse_email(&body.email)?;
    let repo = UserRepository::new(state.pool());

    // First login against the configured bootstrap admin seeds the account.
    if let Some(admin) = state.config().bootstrap_admin.as_ref()
        && admin.email == email
        && repo.get_by_email(&email).await?.is_none()
        && body.password == admin.password.expose_secret()
    {
        let password_hash = hash_password(&body.password)?;
        let user = repo
            .create(NewUser {
                email: &email,
                name: "Administrator",
                password_hash: Some(&password_hash),
                role: UserRole::Admin,
                google_id: None,
            })
            .await?;
        let token = issue_session(&state, &user)?;
        return Ok(ok("Logged in", SessionResponse { token, user }));
    }

    let (user, stored_hash) = repo
        .get_password_hash(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&body.password, &stored_hash)?;

    let token = issue_session(&state, &user)?;
    Ok(ok("Logged in", SessionResponse { token, user }))
}

fn issue_session(state: &AppState, user: &User) -> Result<String> {
    Ok(auth::issue_token(
        &state.config().jwt_secret,
        state.config().jwt_expiry_hours,
        user.id,
        user.role,
    )?)
}

// -----------------------------------------------------------------------------
// Google OAuth
// -----------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

fn sign_state(state: &AppState, nonce: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(state.config().jwt_secret.expose_secret().as_bytes())
            .map_err(|e| AppError::Internal(e.to_string()))?;
    mac.update(nonce.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `GET /api/auth/google`
///
/// Redirects the browser to Google's consent screen with an HMAC-signed
/// `state` parameter.
pub async fn google_redirect(State(state): State<AppState>) -> Result<Redirect> {
    let google = state
        .config()
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_string()))?;

    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);
    let signature = sign_state(&state, &nonce)?;

    let redirect_uri = format!("{}/api/auth/google/callback", state.config().base_url);
    let mut url = url::Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
        .map_err(|e| AppError::Internal(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("client_id", &google.client_id)
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", &format!("{nonce}.{signature}"));

    Ok(Redirect::temporary(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// `GET /api/auth/google/callback`
///
/// Verifies the signed state, exchanges the code, and signs the user in,
/// creating or linking the account by Google id / email.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Json<Envelope<SessionResponse>>> {
    let google = state
        .config()
        .google
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_string()))?;

    let (nonce, signature) = query
        .state
        .split_once('.')
        .ok_or_else(|| AppError::Unauthorized("Invalid OAuth state".to_string()))?;
    if sign_state(&state, nonce)? != signature {
        return Err(AppError::Unauthorized("Invalid OAuth state".to_string()));
    }

    let redirect_uri = format!("{}/api/auth/google/callback", state.config().base_url);
    let client = reqwest::Client::new();
    let token: GoogleTokenResponse = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("code", query.code.as_str()),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.expose_secret()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .error_for_status()
        .map_err(|_| AppError::Unauthorized("Google sign-in failed".to_string()))?
        .json()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let info: GoogleUserInfo = client
        .get("https://www.googleapis.com/oauth2/v2/userinfo")
        .bearer_auth(&token.access_token)
        .send()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .json()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let email = parse_email(&info.email)?;
    let repo = UserRepository::new(state.pool());

    let user = if let Some(user) = repo.get_by_google_id(&info.id).await? {
        user
    } else if let Some(existing) = repo.get_by_email(&email).await? {
        repo.set_google_id(existing.id, &info.id).await?
    } else {
        repo.create(NewUser {
            email: &email,
            name: info.name.as_deref().unwrap_or("Customer"),
            password_hash: None,
            role: UserRole::Customer,
            google_id: Some(&info.id),
        })
        .await?
    };

    let token = issue_session(&state, &user)?;
    Ok(ok("Logged in with Google", SessionResponse { token, user }))
}

// -----------------------------------------------------------------------------
// Profile and settings
// -----------------------------------------------------------------------------

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<User>>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
    Ok(ok("OK", user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

/// `PUT /api/auth/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Envelope<User>>> {
    let email = parse_email(&body.email)?;
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    let user = UserRepository::new(state.pool())
        .update_profile(identity.user_id, body.name.trim(), &email)
        .await?;
    Ok(ok("Profile updated", user))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `PUT /api/auth/password`
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Envelope<()>>> {
    let repo = UserRepository::new(state.pool());
    let user = repo
        .get_by_id(identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

    let (_, stored_hash) = repo
        .get_password_hash(&user.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&body.current_password, &stored_hash)?;

    validate_password_strength(&body.new_password)?;
    let new_hash = hash_password(&body.new_password)?;
    repo.update_password(identity.user_id, &new_hash).await?;

    Ok(ok_message("Password changed"))
}

/// `DELETE /api/auth/account`
pub async fn delete_account(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<()>>> {
    UserRepository::new(state.pool())
        .delete(identity.user_id)
        .await?;
    Ok(ok_message("Account deleted"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub theme: Option<String>,
    pub locale: Option<String>,
}

/// `PUT /api/auth/settings`
///
/// Omitted fields keep their stored value.
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<Envelope<User>>> {
    const THEMES: &[&str] = &["light", "dark", "system"];
    if let Some(theme) = body.theme.as_deref()
        && !THEMES.contains(&theme)
    {
        return Err(AppError::Validation("Unknown theme".to_string()));
    }
    let user = UserRepository::new(state.pool())
        .update_settings(identity.user_id, body.theme.as_deref(), body.locale.as_deref())
        .await?;
    Ok(ok("Settings updated", user))
}

// -----------------------------------------------------------------------------
// Address book
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl AddressRequest {
    fn validate(&self) -> Result<()> {
        let required = [
            &self.recipient,
            &self.line1,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::Validation(
                "All address fields except line 2 and phone are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// `GET /api/auth/addresses`
pub async fn list_addresses(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Envelope<Vec<Address>>>> {
    let addresses = UserRepository::new(state.pool())
        .list_addresses(identity.user_id)
        .await?;
    Ok(ok("OK", addresses))
}

/// `POST /api/auth/addresses`
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(body): Json<AddressRequest>,
) -> Result<Json<Envelope<Address>>> {
    body.validate()?;
    let address = UserRepository::new(state.pool())
        .create_address(
            identity.user_id,
            body.recipient.trim(),
            body.line1.trim(),
            body.line2.as_deref(),
            body.city.trim(),
            body.state.trim(),
            body.postal_code.trim(),
            body.country.trim(),
            body.phone.as_deref(),
        )
        .await?;
    Ok(ok("Address added", address))
}

/// `PUT /api/auth/addresses/{id}`
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
    Json(body): Json<AddressRequest>,
) -> Result<Json<Envelope<Address>>> {
    body.validate()?;
    let address = UserRepository::new(state.pool())
        .update_address(
            identity.user_id,
            AddressId::new(id),
            body.recipient.trim(),
            body.line1.trim(),
            body.line2.as_deref(),
            body.city.trim(),
            body.state.trim(),
            body.postal_code.trim(),
            body.country.trim(),
            body.phone.as_deref(),
        )
        .await?;
    Ok(ok("Address updated", address))
}

/// `DELETE /api/auth/addresses/{id}`
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    let deleted = UserRepository::new(state.pool())
        .delete_address(identity.user_id, AddressId::new(id))
        .await?;
    if !deleted {
        return Err(AppError::NotFound("Address not found".to_string()));
    }
    Ok(ok_message("Address removed"))
}

/// `PUT /api/auth/addresses/{id}/default`
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Envelope<()>>> {
    UserRepository::new(state.pool())
        .set_default_address(identity.user_id, AddressId::new(id))
        .await?;
    Ok(ok_message("Default address updated"))
}
