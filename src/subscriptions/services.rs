use std::sync::Arc;

use time::Date;
use tracing::{error, info};

use crate::{
    error::StoreResult,
    mailer::Mailer,
    notify::templates,
    subscriptions::{
        repo::SubscriptionRepo,
        repo_types::{CreateOutcome, NotifyWhen, Subscription},
    },
};

pub(crate) fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Create/list/delete on behalf of an already verified email.
#[derive(Clone)]
pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepo>,
    mailer: Arc<dyn Mailer>,
}

impl SubscriptionService {
    pub fn new(repo: Arc<dyn SubscriptionRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    pub async fn create(
        &self,
        email: &str,
        ticker: &str,
        company_name: &str,
        earnings_date: Date,
        notify_when: NotifyWhen,
    ) -> StoreResult<CreateOutcome> {
        let sub = Subscription::new(email, ticker, company_name, earnings_date, notify_when);
        let outcome = self.repo.upsert_unless_active(&sub).await?;
        info!(email = %email, ticker = %ticker, ?outcome, "subscribe");

        if outcome != CreateOutcome::AlreadySubscribed {
            if let Err(e) = self.mailer.send(&templates::confirmation(&sub)).await {
                error!(error = %e, email = %email, ticker = %ticker, "confirmation email failed");
            }
        }
        Ok(outcome)
    }

    pub async fn list(&self, email: &str) -> StoreResult<Vec<Subscription>> {
        self.repo.list_by_email(email).await
    }

    pub async fn delete(&self, email: &str, ticker: &str) -> StoreResult<()> {
        self.repo.delete(email, ticker).await?;
        info!(email = %email, ticker = %ticker, "unsubscribe");
        Ok(())
    }
}
