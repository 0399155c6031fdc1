#![allow(dead_code, missing_docs, clippy::expect_used)]
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Form, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info};

use oauth_transport::{AuthTransport, OAuthConfig};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const GOOD_CODE: &str = "4/good-code";
pub const REFRESH_TOKEN: &str = "refresh-1";

/// A minimal provider: a token endpoint and one protected resource.
#[derive(Debug, Default)]
pub struct ProviderState {
    issued: AtomicUsize,
    current_token: Mutex<Option<String>>,
    token_calls: AtomicUsize,
    resource_calls: AtomicUsize,
    forms: Mutex<Vec<HashMap<String, String>>>,
    /// Delay applied to the token endpoint, to make refreshes overlap.
    token_delay: Mutex<Duration>,
}

impl ProviderState {
    fn issue(&self) -> String {
        let count = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{count}");
        *self
            .current_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn current_token(&self) -> Option<String> {
        self.current_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
pub struct TestProvider {
    addr: SocketAddr,
    state: Arc<ProviderState>,
}

impl TestProvider {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(ProviderState::default());
        let app = Router::new()
            .route("/o/oauth2/token", post(token))
            .route("/api/activities", get(activities))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding test provider")?;
        let addr = listener.local_addr().context("reading local address")?;
        info!(%addr, "launching test provider");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("provider running");
        });

        Ok(Self { addr, state })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn config(&self) -> OAuthConfig {
        OAuthConfig::builder(
            CLIENT_ID,
            CLIENT_SECRET,
            self.url("/o/oauth2/auth?access_type=offline"),
            self.url("/o/oauth2/token"),
        )
        .expect("valid endpoints")
        .with_scope("activities.read")
        .with_redirect_url("http://localhost:8080/callback")
        .build()
        .expect("valid config")
    }

    pub fn transport(&self) -> AuthTransport {
        AuthTransport::new(self.config())
    }

    /// Invalidates the current access token, the next resource call answers 401.
    pub fn expire_access_token(&self) {
        *self
            .state
            .current_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn slow_token_endpoint(&self, delay: Duration) {
        *self
            .state
            .token_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn resource_calls(&self) -> usize {
        self.state.resource_calls.load(Ordering::SeqCst)
    }

    pub fn forms(&self) -> Vec<HashMap<String, String>> {
        self.state
            .forms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn token(
    State(state): State<Arc<ProviderState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    state
        .forms
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(form.clone());
    let delay = *state
        .token_delay
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    tokio::time::sleep(delay).await;

    let field = |name: &str| form.get(name).map(String::as_str);
    let client_ok = field("client_id") == Some(CLIENT_ID) && field("client_secret") == Some(CLIENT_SECRET);
    debug!(grant_type = ?field("grant_type"), client_ok, "token request");

    match (client_ok, field("grant_type")) {
        (true, Some("authorization_code")) if field("code") == Some(GOOD_CODE) => {
            let access_token = state.issue();
            Json(json!({
                "access_token": access_token,
                "refresh_token": REFRESH_TOKEN,
                "expires_in": 3600,
                "token_type": "Bearer",
            }))
            .into_response()
        }
        (true, Some("refresh_token")) if field("refresh_token") == Some(REFRESH_TOKEN) => {
            let access_token = state.issue();
            Json(json!({
                "access_token": access_token,
                "expires_in": 3600,
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
    }
}

async fn activities(State(state): State<Arc<ProviderState>>, headers: HeaderMap) -> Response {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match (presented, state.current_token()) {
        (Some(presented), Some(current)) if presented == current => Json(json!({
            "items": [{ "id": "1", "title": "Morning run" }],
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}
