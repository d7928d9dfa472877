use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MessageResponse, PublicUser, SignupRequest},
        services::{is_valid_email, normalize_email},
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Pulls a required, non-blank credential pair out of a request body.
fn credentials(
    email: Option<String>,
    password: Option<String>,
) -> ApiResult<(String, String)> {
    let email = email.map(|e| normalize_email(&e)).unwrap_or_default();
    let password = password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Email and password are required".into()));
    }
    Ok((email, password))
}

/// Like [`credentials`], plus the address format check new accounts need.
fn signup_credentials(
    email: Option<String>,
    password: Option<String>,
) -> ApiResult<(String, String)> {
    let (email, password) = credentials(email, password)?;
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    Ok((email, password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(payload) = payload?;
    let (email, password) = signup_credentials(payload.email, payload.password)?;

    let user = state.credentials.create_user(&email, &password).await?;

    info!(email = %user.email, "signup complete");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let (email, password) = credentials(payload.email, payload.password)?;

    let user = state.credentials.verify_user(&email, &password).await?;

    let token = state.jwt.issue(&user.email).map_err(|e| {
        error!(error = %e, "token signing failed");
        ApiError::Internal(e.to_string())
    })?;

    info!(email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser { email: user.email },
    }))
}
