use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{auth::repo_types::User, db::bounded, error::StoreResult};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Inserts the user unless the email is taken. Returns `false` when an
    /// account already exists; the existing record is left untouched.
    async fn insert_if_absent(&self, user: &User) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgUserRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT email, password_hash, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn insert_if_absent(&self, user: &User) -> StoreResult<bool> {
        let done = bounded(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO users (email, password_hash, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (email) DO NOTHING
                "#,
            )
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.db),
        )
        .await?;
        Ok(done.rows_affected() == 1)
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct InMemoryUserRepo {
    users: Mutex<HashMap<String, User>>,
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap_or_else(|p| p.into_inner());
        Ok(users.get(email).cloned())
    }

    async fn insert_if_absent(&self, user: &User) -> StoreResult<bool> {
        let mut users = self.users.lock().unwrap_or_else(|p| p.into_inner());
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(true)
    }
}
