use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        repo::UserRepo,
        repo_types::User,
    },
    error::{ApiError, StoreError},
    mailer::Mailer,
    notify::templates,
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("User already exists")]
    AlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Password must be at least 8 characters")]
    WeakPassword,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::AlreadyExists => ApiError::Conflict(e.to_string()),
            CredentialError::InvalidCredentials => ApiError::Unauthorized(e.to_string()),
            CredentialError::WeakPassword => ApiError::Validation(e.to_string()),
            CredentialError::Store(inner) => ApiError::Dependency(inner),
            CredentialError::Hashing(msg) => ApiError::Internal(msg),
        }
    }
}

/// Account creation and password checks over a [`UserRepo`].
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepo>,
    mailer: Arc<dyn Mailer>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { users, mailer }
    }

    pub async fn create_user(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        // cheap pre-check so a duplicate signup skips the slow hash
        if self.users.find_by_email(email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(CredentialError::AlreadyExists);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::WeakPassword);
        }

        let password_hash = hash_password_blocking(password)
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        let user = User {
            email: email.to_string(),
            password_hash,
            created_at: OffsetDateTime::now_utc(),
        };

        if !self.users.insert_if_absent(&user).await? {
            warn!(email = %email, "email registered concurrently");
            return Err(CredentialError::AlreadyExists);
        }
        info!(email = %user.email, "user registered");

        if let Err(e) = self.mailer.send(&templates::welcome(&user.email)).await {
            error!(error = %e, email = %user.email, "failed to send welcome email");
        }
        Ok(user)
    }

    pub async fn verify_user(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(CredentialError::InvalidCredentials);
        };

        let ok = match verify_password_blocking(password, &user.password_hash).await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, email = %email, "stored hash unreadable");
                false
            }
        };
        if !ok {
            warn!(email = %email, "login invalid password");
            return Err(CredentialError::InvalidCredentials);
        }
        Ok(user)
    }
}
