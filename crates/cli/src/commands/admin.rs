//! Admin user management commands.
//!
//! ```bash
//! clementine-cli admin create -e admin@example.com -n "Admin Name" -p "a strong password 1"
//! ```
//!
//! When `-p` is omitted a random password is generated and logged once.

use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::SecretString;

use clementine_api::db::users::NewUser;
use clementine_api::db::{self, UserRepository};
use clementine_api::services::auth;
use clementine_core::{Email, UserRole};

/// Create an admin user.
///
/// # Errors
///
/// Returns an error if the environment is incomplete, the email or password
/// is rejected, or the account already exists.
pub async fn create_user(
    email: &str,
    name: &str,
    password: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let email: Email = email.parse()?;
    let generated = password.is_none();
    let password = match password {
        Some(p) => p.to_owned(),
        None => generate_password(),
    };
    auth::validate_password_strength(&password)?;
    let password_hash = auth::hash_password(&password)?;

    let database_url = std::env::var("CLEMENTINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "CLEMENTINE_DATABASE_URL not set")?;
    let pool = db::create_pool(&database_url).await?;

    let user = UserRepository::new(&pool)
        .create(NewUser {
            email: &email,
            name,
            password_hash: Some(&password_hash),
            role: UserRole::Admin,
            google_id: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Admin user created");
    if generated {
        // Shown once; only the hash is stored.
        tracing::info!(password = %password, "Generated admin password");
    }
    Ok(())
}

/// 16 random alphanumerics plus a letter and a digit, so the strength policy
/// always holds.
fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    let mut password: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    password.push(rng.gen_range('a'..='z'));
    password.push(rng.gen_range('0'..='9'));
    password
}
