use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use time::{macros::format_description, Date};
use tracing::instrument;

use crate::{
    auth::{jwt::AuthUser, MessageResponse},
    error::{ApiError, ApiResult},
    state::AppState,
    subscriptions::{
        dto::{SubscribeRequest, SubscribeResponse, UnsubscribeRequest},
        repo_types::{CreateOutcome, NotifyWhen, Subscription},
        services::normalize_ticker,
    },
};

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscriptions", get(list_subscriptions))
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> ApiResult<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::Validation(format!("earningsDate must be YYYY-MM-DD, got {raw:?}")))
}

#[instrument(skip(state, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> ApiResult<Json<SubscribeResponse>> {
    let Json(body) = payload?;
    let (Some(ticker), Some(company_name), Some(earnings_date), Some(notify_when)) = (
        required(body.ticker),
        required(body.company_name),
        required(body.earnings_date),
        required(body.notify_when),
    ) else {
        return Err(ApiError::Validation(
            "Missing required fields (ticker, companyName, earningsDate, notifyWhen)".into(),
        ));
    };

    let earnings_date = parse_date(&earnings_date)?;
    let notify_when: NotifyWhen = notify_when
        .parse()
        .map_err(|_| ApiError::Validation("notifyWhen must be DAY_BEFORE or DAY_OF".into()))?;
    let ticker = normalize_ticker(&ticker);

    let outcome = state
        .subscriptions
        .create(&email, &ticker, &company_name, earnings_date, notify_when)
        .await?;

    let message = match outcome {
        CreateOutcome::Created | CreateOutcome::Rearmed => "Subscription successful",
        CreateOutcome::AlreadySubscribed => "Already subscribed",
    };
    Ok(Json(SubscribeResponse {
        message: message.into(),
        outcome,
    }))
}

#[instrument(skip(state, payload))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(body) = payload?;
    let ticker = required(body.ticker)
        .map(|t| normalize_ticker(&t))
        .ok_or_else(|| ApiError::Validation("Ticker is required".into()))?;

    state.subscriptions.delete(&email, &ticker).await?;
    Ok(Json(MessageResponse::new("Unsubscribed successfully")))
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(email): AuthUser,
) -> ApiResult<Json<Vec<Subscription>>> {
    let subs = state.subscriptions.list(&email).await?;
    Ok(Json(subs))
}
