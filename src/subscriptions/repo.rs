use std::{collections::BTreeMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::{
    db::bounded,
    error::StoreResult,
    subscriptions::repo_types::{CreateOutcome, Subscription, SubscriptionRow, SubscriptionStatus},
};

/// Every method is a single keyed statement, atomic per (email, ticker).
#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Inserts `sub`; an ACTIVE record for the pair is left untouched and a
    /// SENT one is replaced.
    async fn upsert_unless_active(&self, sub: &Subscription) -> StoreResult<CreateOutcome>;

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Subscription>>;

    async fn delete(&self, email: &str, ticker: &str) -> StoreResult<()>;

    async fn list_active(&self) -> StoreResult<Vec<Subscription>>;

    /// ACTIVE → SENT. Returns `false` when the record is gone or no longer ACTIVE.
    async fn mark_sent(&self, email: &str, ticker: &str, at: OffsetDateTime) -> StoreResult<bool>;
}

const COLUMNS: &str =
    "email, ticker, company_name, earnings_date, notify_when, status, created_at, last_notified";

#[derive(Clone)]
pub struct PgSubscriptionRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgSubscriptionRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn fetch(&self, sql: &str, email: Option<&str>) -> StoreResult<Vec<Subscription>> {
        let mut query = sqlx::query_as::<sqlx::Postgres, SubscriptionRow>(sql);
        if let Some(email) = email {
            query = query.bind(email);
        }
        let rows = bounded(self.timeout, query.fetch_all(&self.db)).await?;
        rows.into_iter().map(Subscription::try_from).collect()
    }
}

#[async_trait]
impl SubscriptionRepo for PgSubscriptionRepo {
    async fn upsert_unless_active(&self, sub: &Subscription) -> StoreResult<CreateOutcome> {
        // xmax = 0 only for a freshly inserted tuple
        let inserted: Option<bool> = bounded(
            self.timeout,
            sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO subscriptions
                    (email, ticker, company_name, earnings_date, notify_when, status, created_at, last_notified)
                VALUES ($1, $2, $3, $4, $5, 'ACTIVE', $6, NULL)
                ON CONFLICT (email, ticker) DO UPDATE SET
                    company_name  = EXCLUDED.company_name,
                    earnings_date = EXCLUDED.earnings_date,
                    notify_when   = EXCLUDED.notify_when,
                    status        = 'ACTIVE',
                    created_at    = EXCLUDED.created_at,
                    last_notified = NULL
                WHERE subscriptions.status = 'SENT'
                RETURNING (xmax = 0)
                "#,
            )
            .bind(&sub.email)
            .bind(&sub.ticker)
            .bind(&sub.company_name)
            .bind(sub.earnings_date)
            .bind(sub.notify_when.as_str())
            .bind(sub.created_at)
            .fetch_optional(&self.db),
        )
        .await?;

        Ok(match inserted {
            Some(true) => CreateOutcome::Created,
            Some(false) => CreateOutcome::Rearmed,
            None => CreateOutcome::AlreadySubscribed,
        })
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Subscription>> {
        let sql = format!("SELECT {COLUMNS} FROM subscriptions WHERE email = $1 ORDER BY ticker");
        self.fetch(&sql, Some(email)).await
    }

    async fn delete(&self, email: &str, ticker: &str) -> StoreResult<()> {
        bounded(
            self.timeout,
            sqlx::query("DELETE FROM subscriptions WHERE email = $1 AND ticker = $2")
                .bind(email)
                .bind(ticker)
                .execute(&self.db),
        )
        .await?;
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<Subscription>> {
        let sql = format!("SELECT {COLUMNS} FROM subscriptions WHERE status = 'ACTIVE'");
        self.fetch(&sql, None).await
    }

    async fn mark_sent(&self, email: &str, ticker: &str, at: OffsetDateTime) -> StoreResult<bool> {
        let done = bounded(
            self.timeout,
            sqlx::query(
                r#"
                UPDATE subscriptions
                SET status = 'SENT', last_notified = $3
                WHERE email = $1 AND ticker = $2 AND status = 'ACTIVE'
                "#,
            )
            .bind(email)
            .bind(ticker)
            .bind(at)
            .execute(&self.db),
        )
        .await?;
        Ok(done.rows_affected() == 1)
    }
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    rows: Mutex<BTreeMap<(String, String), Subscription>>,
}

impl InMemorySubscriptionRepo {
    fn rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), Subscription>> {
        self.rows.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn upsert_unless_active(&self, sub: &Subscription) -> StoreResult<CreateOutcome> {
        let mut rows = self.rows();
        let key = (sub.email.clone(), sub.ticker.clone());
        let outcome = match rows.get(&key).map(|s| s.status) {
            None => CreateOutcome::Created,
            Some(SubscriptionStatus::Active) => return Ok(CreateOutcome::AlreadySubscribed),
            Some(SubscriptionStatus::Sent) => CreateOutcome::Rearmed,
        };
        let mut fresh = sub.clone();
        fresh.status = SubscriptionStatus::Active;
        fresh.last_notified = None;
        rows.insert(key, fresh);
        Ok(outcome)
    }

    async fn list_by_email(&self, email: &str) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .rows()
            .values()
            .filter(|s| s.email == email)
            .cloned()
            .collect())
    }

    async fn delete(&self, email: &str, ticker: &str) -> StoreResult<()> {
        self.rows().remove(&(email.to_string(), ticker.to_string()));
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .rows()
            .values()
            .filter(|s| s.status == SubscriptionStatus::Active)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, email: &str, ticker: &str, at: OffsetDateTime) -> StoreResult<bool> {
        let mut rows = self.rows();
        match rows.get_mut(&(email.to_string(), ticker.to_string())) {
            Some(sub) if sub.status == SubscriptionStatus::Active => {
                sub.status = SubscriptionStatus::Sent;
                sub.last_notified = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
