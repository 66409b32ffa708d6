use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "rate_limited",
                    message: "rate limit exceeded",
                },
            }),
        )
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::{from_fn, from_fn_with_state};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn get_root() -> Request {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn request_id_app() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(request_id))
    }

    fn rate_limited_app(state: RateLimitState) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(state, enforce_rate_limit))
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed_back() {
        let req = Request::builder()
            .uri("/")
            .header("x-request-id", "req-abc-123")
            .body(Body::empty())
            .unwrap();
        let res = request_id_app().oneshot(req).await.unwrap();
        assert_eq!(res.headers().get("x-request-id").unwrap(), "req-abc-123");
    }

    #[tokio::test]
    async fn missing_request_id_gets_a_generated_uuid() {
        let res = request_id_app().oneshot(get_root()).await.unwrap();
        let id = res
            .headers()
            .get("x-request-id")
            .expect("generated id")
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(id).is_ok(), "not a uuid: {id}");
    }

    #[tokio::test]
    async fn requests_over_the_window_limit_get_429() {
        let app = rate_limited_app(RateLimitState::new(2, Duration::from_secs(60)));
        for _ in 0..2 {
            let res = app.clone().oneshot(get_root()).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.oneshot(get_root()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn an_elapsed_window_resets_the_count() {
        let app = rate_limited_app(RateLimitState::new(1, Duration::from_millis(10)));
        let res = app.clone().oneshot(get_root()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.clone().oneshot(get_root()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let res = app.oneshot(get_root()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
