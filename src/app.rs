use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, subscriptions};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(subscriptions::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;

    use super::*;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        call(app, Method::POST, uri, token, Some(body)).await
    }

    async fn login_token(app: &Router, email: &str, password: &str) -> String {
        let creds = json!({ "email": email, "password": password });
        let (status, _) = post(app, "/signup", None, creds.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = post(app, "/login", None, creds).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    fn tomorrow() -> String {
        let d = OffsetDateTime::now_utc().date().next_day().unwrap();
        let (y, m, day) = d.to_calendar_date();
        format!("{y:04}-{:02}-{day:02}", u8::from(m))
    }

    #[tokio::test]
    async fn signup_and_login_scenario() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        let (status, body) = post(&app, "/signup", None, json!({"email": "a@x.com", "password": "pw123456"})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");

        let (status, body) = post(&app, "/signup", None, json!({"email": "a@x.com", "password": "other"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User already exists");

        let (status, body) = post(&app, "/login", None, json!({"email": "a@x.com", "password": "pw123456"})).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].as_str().unwrap().split('.').count() == 3);
        assert_eq!(body["user"]["email"], "a@x.com");

        let (status, _) = post(&app, "/login", None, json!({"email": "a@x.com", "password": "wrong"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_and_malformed_fields_are_bad_requests() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        let (status, _) = post(&app, "/signup", None, json!({"email": "a@x.com"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post(&app, "/login", None, json!({"password": "pw123456"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(&app, "/signup", None, json!({"email": "not-an-email", "password": "pw123456"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::post("/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_with_unparseable_email_is_unauthorized() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        let (status, body) = post(&app, "/login", None, json!({"email": "not-an-email", "password": "pw123456"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn subscribe_then_matcher_sends_one_reminder() {
        let (state, mailer) = AppState::fake();
        let expired = state
            .jwt
            .issue_at("a@x.com", OffsetDateTime::now_utc() - Duration::days(2))
            .unwrap();
        let matcher = state.matcher.clone();
        let app = build_app(state);
        let token = login_token(&app, "a@x.com", "pw123456").await;

        let sub = json!({
            "ticker": "MSFT",
            "companyName": "Microsoft",
            "earningsDate": tomorrow(),
            "notifyWhen": "DAY_BEFORE",
        });

        let (status, _) = post(&app, "/subscribe", Some(&expired), sub.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = post(&app, "/subscribe", Some(&token), sub.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "created");

        let (status, body) = post(&app, "/subscribe", Some(&token), sub).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_subscribed");

        let report = matcher.run().await.unwrap();
        assert_eq!(report.eligible, 1);
        let reminders: Vec<_> = mailer
            .sent_to("a@x.com")
            .into_iter()
            .filter(|m| m.subject.starts_with("Earnings Reminder"))
            .collect();
        assert_eq!(reminders.len(), 1);

        let (status, body) = call(&app, Method::GET, "/subscriptions", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["ticker"], "MSFT");
        assert_eq!(list[0]["status"], "SENT");
        assert!(list[0]["lastNotified"].is_string());
    }

    #[tokio::test]
    async fn subscription_endpoints_require_a_token() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        // a body email is not an identity
        let body = json!({
            "email": "a@x.com",
            "ticker": "MSFT",
            "companyName": "Microsoft",
            "earningsDate": "2026-10-20",
            "notifyWhen": "DAY_OF",
        });
        let (status, _) = post(&app, "/subscribe", None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = post(&app, "/unsubscribe", Some("garbage"), json!({"ticker": "MSFT"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::GET, "/subscriptions", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn subscribe_validates_fields() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let token = login_token(&app, "a@x.com", "pw123456").await;

        let (status, _) = post(&app, "/subscribe", Some(&token), json!({"ticker": "MSFT"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_date = json!({
            "ticker": "MSFT", "companyName": "Microsoft",
            "earningsDate": "20/10/2026", "notifyWhen": "DAY_OF",
        });
        let (status, _) = post(&app, "/subscribe", Some(&token), bad_date).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_when = json!({
            "ticker": "MSFT", "companyName": "Microsoft",
            "earningsDate": "2026-10-20", "notifyWhen": "WEEK_BEFORE",
        });
        let (status, _) = post(&app, "/subscribe", Some(&token), bad_when).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(&app, "/unsubscribe", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_scoped_to_caller() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let alice = login_token(&app, "a@x.com", "pw123456").await;
        let bob = login_token(&app, "b@x.com", "pw123456").await;

        let sub = json!({
            "ticker": "msft", "companyName": "Microsoft",
            "earningsDate": "2026-10-20", "notifyWhen": "DAY_OF",
        });
        post(&app, "/subscribe", Some(&alice), sub).await;

        // bob cannot remove alice's record
        let (status, _) = post(&app, "/unsubscribe", Some(&bob), json!({"ticker": "MSFT"})).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/subscriptions", Some(&alice), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        for _ in 0..2 {
            let (status, _) = post(&app, "/unsubscribe", Some(&alice), json!({"ticker": "MSFT"})).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, body) = call(&app, Method::GET, "/subscriptions", Some(&alice), None).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_and_cors() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let req = Request::get("/health")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
