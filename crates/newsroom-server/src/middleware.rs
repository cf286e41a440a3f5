//! Request tagging, bearer-key auth, and the request cap for the
//! candidate API.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::{Choice, ConstantTimeEq};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const API_KEYS_VAR: &str = "NEWSROOM_API_KEYS";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id for one API call, echoed back in `x-request-id` and in
/// every response's `meta.request_id`.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Editor API keys. With no keys configured in development, auth is off.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Read keys from `NEWSROOM_API_KEYS`.
    ///
    /// # Errors
    ///
    /// Fails outside development when no key is configured.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Parse a comma-separated key list.
    ///
    /// # Errors
    ///
    /// Fails when `raw` holds no key and `is_development` is false.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let api_keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();

        if !api_keys.is_empty() {
            return Ok(Self {
                api_keys: Arc::new(api_keys),
                enabled: true,
            });
        }
        if !is_development {
            anyhow::bail!("{API_KEYS_VAR} must list at least one API key outside development");
        }

        tracing::warn!("{API_KEYS_VAR} is empty, candidate API is open (development only)");
        Ok(Self {
            api_keys: Arc::new(HashSet::new()),
            enabled: false,
        })
    }

    // Every key is compared so timing does not reveal which one matched.
    fn allows(&self, token: &str) -> bool {
        self.api_keys
            .iter()
            .fold(Choice::from(0), |acc, key| {
                acc | key.as_bytes().ct_eq(token.as_bytes())
            })
            .into()
    }
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    admitted: usize,
}

/// Fixed-window request cap shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    current: Arc<Mutex<Window>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            current: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                admitted: 0,
            })),
        }
    }

    /// Count one request against the current window. False once the window
    /// is full.
    async fn admit(&self) -> bool {
        let mut current = self.current.lock().await;
        if current.opened.elapsed() >= self.window {
            *current = Window {
                opened: Instant::now(),
                admitted: 0,
            };
        }
        if current.admitted >= self.max_requests {
            return false;
        }
        current.admitted += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Tag the request with the caller's `x-request-id`, or a fresh UUID, and
/// echo it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }
    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    if rate_limit.admit().await {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "request cap reached");
    ApiError::new(
        request_id_of(&req),
        "rate_limited",
        "too many requests, try again shortly",
    )
    .into_response()
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
