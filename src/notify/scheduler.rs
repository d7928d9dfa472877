use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::notify::matcher::NotificationMatcher;

/// Runs the matcher every `period` on the current task. Runs never overlap:
/// the next tick is only awaited after the previous run has returned, and
/// ticks missed while a run was slow are skipped rather than replayed.
pub async fn run_periodically(matcher: NotificationMatcher, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_secs = period.as_secs(), "matcher scheduler started");

    loop {
        ticker.tick().await;
        match matcher.run().await {
            Ok(report) => info!(eligible = report.eligible, marked = report.marked, "scheduled run done"),
            // the next tick is the retry
            Err(e) => error!(error = %e, "scheduled matcher run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::OffsetDateTime;

    use super::*;
    use crate::{
        mailer::testing::RecordingMailer,
        subscriptions::{
            repo::{InMemorySubscriptionRepo, SubscriptionRepo},
            repo_types::{NotifyWhen, Subscription, SubscriptionStatus},
        },
    };

    #[tokio::test(start_paused = true)]
    async fn repeated_ticks_deliver_once() {
        let repo = Arc::new(InMemorySubscriptionRepo::default());
        let today = OffsetDateTime::now_utc().date();
        let sub = Subscription::new("a@x.com", "MSFT", "Microsoft", today, NotifyWhen::DayOf);
        repo.upsert_unless_active(&sub).await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());

        let matcher = NotificationMatcher::new(repo.clone(), mailer.clone());
        let handle = tokio::spawn(run_periodically(matcher, Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(185)).await;
        handle.abort();

        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(
            repo.list_by_email("a@x.com").await.unwrap()[0].status,
            SubscriptionStatus::Sent
        );
    }
}
