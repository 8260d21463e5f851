//! Staff account management.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use lumen_admin::db::{RepositoryError, UserRepository};
use lumen_admin::models::NewUser;
use lumen_admin::services::{PasswordHashError, hash_password};
use lumen_core::{Email, EmailError, UserRole, UserStatus};
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use super::{CommandError, database_url};

const GENERATED_PASSWORD_LEN: usize = 20;

/// Errors that can occur while creating a user.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid role: {0}. Valid roles: owner, admin, manager, employee, packer")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Name must not be empty")]
    EmptyName,

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Password(#[from] PasswordHashError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Create an active staff account and return its ID.
///
/// When `password` is `None` a random one is generated and logged once.
pub async fn create_user(
    email: &str,
    name: &str,
    role: &str,
    password: Option<String>,
) -> Result<i32, UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::EmptyName);
    }

    let address = email.to_string();
    let generated = password.is_none();
    let password = password.unwrap_or_else(generate_password);

    let url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = lumen_admin::db::create_pool(&url)
        .await
        .map_err(CommandError::from)?;
    let repo = UserRepository::new(&pool);

    if repo.get_by_email(&email).await?.is_some() {
        return Err(UserError::UserExists(address));
    }

    let user = repo
        .create(&NewUser {
            name: name.to_owned(),
            email,
            phone: None,
            password_hash: hash_password(&password)?,
            role,
            status: UserStatus::Active,
            team: None,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(address.clone()),
            other => other.into(),
        })?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    if generated {
        tracing::info!("Generated password (shown once): {}", password);
    }

    Ok(user.id.as_i32())
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_rejects_unknown_role_before_connecting() {
        let err = create_user("a@b.co", "Asha", "superuser", None)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidRole(_)));
    }

    #[tokio::test]
    async fn test_rejects_blank_name_before_connecting() {
        let err = create_user("a@b.co", "  ", "packer", None)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmptyName));
    }
}
