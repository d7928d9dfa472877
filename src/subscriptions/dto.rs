use serde::{Deserialize, Serialize};

use crate::subscriptions::repo_types::CreateOutcome;

/// Body of `POST /subscribe`. Any `email` field a client sends is ignored;
/// the caller's identity comes from the bearer token.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub ticker: Option<String>,
    pub company_name: Option<String>,
    pub earnings_date: Option<String>,
    pub notify_when: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnsubscribeRequest {
    pub ticker: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub outcome: CreateOutcome,
}
