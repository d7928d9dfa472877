use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

use crate::error::StoreError;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// When, relative to the earnings date, the reminder goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyWhen {
    DayBefore,
    DayOf,
}

impl NotifyWhen {
    pub fn as_str(self) -> &'static str {
        match self {
            NotifyWhen::DayBefore => "DAY_BEFORE",
            NotifyWhen::DayOf => "DAY_OF",
        }
    }

    /// Human wording used in emails.
    pub fn label(self) -> &'static str {
        match self {
            NotifyWhen::DayBefore => "Day Before Earnings",
            NotifyWhen::DayOf => "Day of Earnings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Sent,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value {0:?}")]
pub struct UnknownVariant(pub String);

impl FromStr for NotifyWhen {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAY_BEFORE" => Ok(NotifyWhen::DayBefore),
            "DAY_OF" => Ok(NotifyWhen::DayOf),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "SENT" => Ok(SubscriptionStatus::Sent),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for NotifyWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reminder request for one company, keyed by (email, ticker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub email: String,
    pub ticker: String,
    pub company_name: String,
    #[serde(with = "iso_date")]
    pub earnings_date: Date,
    pub notify_when: NotifyWhen,
    pub status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_notified: Option<OffsetDateTime>,
}

impl Subscription {
    /// A fresh ACTIVE subscription created now.
    pub fn new(
        email: &str,
        ticker: &str,
        company_name: &str,
        earnings_date: Date,
        notify_when: NotifyWhen,
    ) -> Self {
        Self {
            email: email.to_string(),
            ticker: ticker.to_string(),
            company_name: company_name.to_string(),
            earnings_date,
            notify_when,
            status: SubscriptionStatus::Active,
            created_at: OffsetDateTime::now_utc(),
            last_notified: None,
        }
    }

    pub fn earnings_date_str(&self) -> String {
        let (y, m, d) = self.earnings_date.to_calendar_date();
        format!("{y:04}-{:02}-{d:02}", u8::from(m))
    }
}

/// What `create` did with the (email, ticker) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadySubscribed,
    /// A SENT record was replaced by a fresh ACTIVE one.
    Rearmed,
}

/// Raw `subscriptions` row; enum columns are stored as text.
#[derive(Debug, FromRow)]
pub struct SubscriptionRow {
    pub email: String,
    pub ticker: String,
    pub company_name: String,
    pub earnings_date: Date,
    pub notify_when: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub last_notified: Option<OffsetDateTime>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(r: SubscriptionRow) -> Result<Self, Self::Error> {
        let notify_when = r
            .notify_when
            .parse()
            .map_err(|e: UnknownVariant| StoreError::Corrupt(format!("notify_when: {e}")))?;
        let status = r
            .status
            .parse()
            .map_err(|e: UnknownVariant| StoreError::Corrupt(format!("status: {e}")))?;
        Ok(Self {
            email: r.email,
            ticker: r.ticker,
            company_name: r.company_name,
            earnings_date: r.earnings_date,
            notify_when,
            status,
            created_at: r.created_at,
            last_notified: r.last_notified,
        })
    }
}
