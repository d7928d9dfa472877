//! Daily reminder run.
//!
//! A run scans every ACTIVE subscription, picks those whose reminder falls on
//! the current UTC date, attempts one email per pick and flips each to SENT
//! right after the attempt. Each flip is an independent conditional write, so
//! a run interrupted half way can simply be started again: records already
//! flipped are no longer ACTIVE and will not be matched twice.
//!
//! Two overlapping runs over the same window may both deliver before either
//! flips a record. Callers must not start a run while another is in flight.

use std::sync::Arc;

use time::{Date, OffsetDateTime, UtcOffset};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    error::StoreResult,
    mailer::Mailer,
    notify::templates,
    subscriptions::{
        repo::SubscriptionRepo,
        repo_types::{NotifyWhen, Subscription},
    },
};

/// The calendar dates a run at `now` looks for, both in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub today: Date,
    pub tomorrow: Option<Date>,
}

impl DueWindow {
    pub fn at(now: OffsetDateTime) -> Self {
        let today = now.to_offset(UtcOffset::UTC).date();
        Self {
            today,
            tomorrow: today.next_day(),
        }
    }

    pub fn is_due(&self, sub: &Subscription) -> bool {
        match sub.notify_when {
            NotifyWhen::DayOf => sub.earnings_date == self.today,
            NotifyWhen::DayBefore => Some(sub.earnings_date) == self.tomorrow,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub scanned: usize,
    pub eligible: usize,
    pub delivered: usize,
    pub failed: usize,
    pub marked: usize,
}

#[derive(Clone)]
pub struct NotificationMatcher {
    repo: Arc<dyn SubscriptionRepo>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationMatcher {
    pub fn new(repo: Arc<dyn SubscriptionRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { repo, mailer }
    }

    pub async fn run(&self) -> StoreResult<RunReport> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Only a failed scan aborts the run; per-record failures are logged and
    /// counted.
    pub async fn run_at(&self, now: OffsetDateTime) -> StoreResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("matcher_run", %run_id);
        self.process(now).instrument(span).await
    }

    async fn process(&self, now: OffsetDateTime) -> StoreResult<RunReport> {
        let window = DueWindow::at(now);
        info!(today = %window.today, "matcher started");

        let active = self.repo.list_active().await.map_err(|e| {
            error!(error = %e, "scan of active subscriptions failed");
            e
        })?;

        let mut report = RunReport {
            scanned: active.len(),
            ..RunReport::default()
        };

        for sub in active.iter().filter(|s| window.is_due(s)) {
            report.eligible += 1;

            match self.mailer.send(&templates::reminder(sub)).await {
                Ok(()) => {
                    report.delivered += 1;
                    info!(email = %sub.email, ticker = %sub.ticker, "reminder sent");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, email = %sub.email, ticker = %sub.ticker, "reminder delivery failed");
                }
            }

            // marked even after a failed send: one attempt per subscription
            match self.repo.mark_sent(&sub.email, &sub.ticker, now).await {
                Ok(true) => report.marked += 1,
                Ok(false) => {
                    warn!(email = %sub.email, ticker = %sub.ticker, "subscription changed during run; not marked")
                }
                Err(e) => {
                    error!(error = %e, email = %sub.email, ticker = %sub.ticker, "failed to mark subscription sent")
                }
            }
        }

        info!(
            scanned = report.scanned,
            eligible = report.eligible,
            delivered = report.delivered,
            failed = report.failed,
            marked = report.marked,
            "matcher finished"
        );
        Ok(report)
    }
}
