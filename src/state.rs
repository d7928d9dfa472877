use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{InMemoryUserRepo, PgUserRepo, UserRepo},
        services::CredentialStore,
    },
    config::{AppConfig, StoreBackend},
    db,
    mailer::{LogMailer, Mailer, SesMailer},
    notify::matcher::NotificationMatcher,
    subscriptions::{
        repo::{InMemorySubscriptionRepo, PgSubscriptionRepo, SubscriptionRepo},
        services::SubscriptionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub credentials: CredentialStore,
    pub subscriptions: SubscriptionService,
    pub matcher: NotificationMatcher,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let mailer: Arc<dyn Mailer> = match &config.mail.source_email {
            Some(source) => Arc::new(SesMailer::new(source, &config.mail.region).await?),
            None => {
                warn!("MAIL_SOURCE_EMAIL not set; emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let (users, subscriptions): (Arc<dyn UserRepo>, Arc<dyn SubscriptionRepo>) =
            match config.store_backend {
                StoreBackend::Postgres => {
                    let pool = db::connect(&config).await?;
                    db::migrate(&pool).await?;
                    let timeout = config.store_timeout();
                    (
                        Arc::new(PgUserRepo::new(pool.clone(), timeout)),
                        Arc::new(PgSubscriptionRepo::new(pool, timeout)),
                    )
                }
                StoreBackend::Memory => {
                    warn!("using in-memory store; data is lost on exit");
                    (
                        Arc::new(InMemoryUserRepo::default()),
                        Arc::new(InMemorySubscriptionRepo::default()),
                    )
                }
            };
        info!(backend = ?config.store_backend, "store ready");

        Ok(Self::from_parts(config, users, subscriptions, mailer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            credentials: CredentialStore::new(users, mailer.clone()),
            subscriptions: SubscriptionService::new(subscriptions.clone(), mailer.clone()),
            matcher: NotificationMatcher::new(subscriptions, mailer),
            config,
        }
    }

    /// In-memory state for tests, with the recording mailer exposed.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::mailer::testing::RecordingMailer>) {
        let mailer = Arc::new(crate::mailer::testing::RecordingMailer::default());
        let state = Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(InMemoryUserRepo::default()),
            Arc::new(InMemorySubscriptionRepo::default()),
            mailer.clone(),
        );
        (state, mailer)
    }
}
