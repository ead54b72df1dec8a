//! HTTP gateway for tutorgate.
//!
//! Routes:
//! - `POST /chat`  : run the chat pipeline, answer as a `text/event-stream`
//! - `GET  /health`: liveness probe
//!
//! Layers applied to every route:
//! - CORS (permissive by default, or an explicit origin list)
//! - Request body size limit
//! - In-memory rate limiting per client (`/health` exempt)
//! - HTTP trace logging
//!
//! Built on Axum.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

use tutorgate_agent::{ChatPipeline, ChatRequest};
use tutorgate_config::{AppConfig, GatewayConfig};
use tutorgate_core::error::Error;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<ChatPipeline>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes));

    if config.rate_limit_per_minute > 0 {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            std::time::Duration::from_secs(60),
        ));
        router = router.layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }));
    }

    router
        .layer(cors_layer(&config.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS: `"*"` allows any origin (without credentials); otherwise only the
/// listed origins are allowed.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(parsed))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        warn!(
            missing = %missing.join(", "),
            "Credentials missing: chat requests will fail until they are set"
        );
    }

    let backends = tutorgate_providers::build_from_config(&config);
    let pipeline = Arc::new(ChatPipeline::from_backends(&backends, &config));
    let state = Arc::new(GatewayState { pipeline });

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, model = %config.model.chat_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Errors ---

/// Error body: `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            Self::new(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the client is within its limit.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// First `X-Forwarded-For` hop, else the peer IP, else "anonymous".
fn client_key(req: &axum::extract::Request) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let key = client_key(&req);
    if !limiter.check(&key) {
        warn!(client = %key, "Rate limit exceeded");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests, please slow down",
        ));
    }

    Ok(next.run(req).await)
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /chat`: validate, gate, then stream `data: {"content": ...}`
/// frames ending in `data: [DONE]`.
///
/// Dropping the response stream (client disconnect) cancels generation.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let Json(request) = payload?;

    let reply = state.pipeline.handle(&request).await.map_err(|e| {
        if e.is_client_error() {
            info!(session_id = %request.session_id, error = %e, "Chat request rejected");
        } else {
            error!(session_id = %request.session_id, error = %e, "Chat request failed");
        }
        ApiError::from(e)
    })?;

    let guard = reply.cancel.clone().drop_guard();
    let stream = ReceiverStream::new(reply.frames).map(move |frame| {
        let _cancel_on_drop = &guard;
        Ok(SseEvent::default().data(frame.data()))
    });

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tower::ServiceExt;
    use tutorgate_agent::PipelineSettings;
    use tutorgate_core::error::{ProviderError, StoreError};
    use tutorgate_core::knowledge::{ContextChunk, SimilarityQuery, SimilarityStore};
    use tutorgate_core::provider::*;
    use tutorgate_knowledge::InMemoryLog;

    /// Embeds everything as a unit vector and streams a fixed answer.
    struct FakeModel {
        answer: Vec<&'static str>,
    }

    #[async_trait]
    impl Provider for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: tutorgate_core::Message::assistant(self.answer.concat()),
                usage: None,
                model: request.model,
            })
        }

        async fn stream(&self, _request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
            let (tx, rx) = mpsc::channel(self.answer.len() + 1);
            for delta in &self.answer {
                let _ = tx.try_send(Ok(StreamChunk::text(*delta)));
            }
            let _ = tx.try_send(Ok(StreamChunk::finished(None)));
            Ok(rx)
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| vec![1.0, 0.0]).collect(),
                model: request.model,
                usage: None,
            })
        }
    }

    struct FixedStore {
        score: Option<f32>,
    }

    #[async_trait]
    impl SimilarityStore for FixedStore {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _query: SimilarityQuery) -> Result<Vec<ContextChunk>, StoreError> {
            match self.score {
                Some(s) => Ok(vec![ContextChunk::new("Lessons are £40 per hour", s)]),
                None => Err(StoreError::QueryFailed("rpc down".into())),
            }
        }
    }

    fn app_with(score: Option<f32>, gateway: GatewayConfig) -> Router {
        let model = Arc::new(FakeModel {
            answer: vec!["Lessons cost ", "**£40**."],
        });
        let pipeline = ChatPipeline::new(
            model.clone(),
            model,
            Arc::new(FixedStore { score }),
            Arc::new(InMemoryLog::new()),
            PipelineSettings::default(),
        );
        build_router(
            Arc::new(GatewayState {
                pipeline: Arc::new(pipeline),
            }),
            &gateway,
        )
    }

    fn app(score: Option<f32>) -> Router {
        app_with(score, GatewayConfig::default())
    }

    fn chat_request(text: &str) -> Request<Body> {
        let body = serde_json::json!({
            "message": [{"role": "user", "content": text}],
            "session_id": "test-session"
        });
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app(Some(0.9))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn on_topic_chat_streams_frames() {
        let response = app(Some(0.9)).oneshot(chat_request("How much are lessons?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_text(response).await;
        let first = body.find(r#"data: {"content":"Lessons cost "}"#).unwrap();
        let second = body.find(r#"data: {"content":"**£40**."}"#).unwrap();
        let done = body.find("data: [DONE]").unwrap();
        assert!(first < second && second < done);
    }

    #[tokio::test]
    async fn off_topic_first_message_streams_rejection() {
        let response = app(Some(0.05)).oneshot(chat_request("What is a stack?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Please only ask information relevant to Barney's tutoring services"));
        assert!(body.contains("ebarneytutoring@gmail.com"));
        assert!(body.trim_end().ends_with("data: [DONE]"));
        assert!(!body.contains("Lessons cost"));
    }

    #[tokio::test]
    async fn too_long_message_is_400_with_detail() {
        let response = app(Some(0.9)).oneshot(chat_request(&"x".repeat(300))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let detail = json["detail"].as_str().unwrap().to_lowercase();
        assert!(detail.contains("message too long"));
    }

    #[tokio::test]
    async fn malformed_body_gets_detail() {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message": "not a list"}"#))
            .unwrap();
        let response = app(Some(0.9)).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["detail"].is_string());
    }

    #[tokio::test]
    async fn store_failure_is_500() {
        let response = app(None).oneshot(chat_request("pricing?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("rpc down"));
    }

    #[tokio::test]
    async fn rate_limit_applies_per_client() {
        let app = app_with(
            Some(0.9),
            GatewayConfig {
                rate_limit_per_minute: 2,
                ..GatewayConfig::default()
            },
        );

        for _ in 0..2 {
            let response = app.clone().oneshot(chat_request("pricing?")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(chat_request("pricing?")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let mut other = chat_request("pricing?");
        other
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let response = app.clone().oneshot(other).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn permissive_cors_by_default() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "https://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app(Some(0.9)).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("*")
        );
    }

    #[tokio::test]
    async fn explicit_cors_origin_is_echoed() {
        let app = app_with(
            Some(0.9),
            GatewayConfig {
                cors_origins: vec!["https://barneytutoring.co.uk".into()],
                ..GatewayConfig::default()
            },
        );
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "https://barneytutoring.co.uk")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            HeaderValue::from_static("https://barneytutoring.co.uk")
        );
    }

    #[test]
    fn rate_limiter_window() {
        let limiter = RateLimiter::new(2, std::time::Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        let req = Request::builder()
            .uri("/chat")
            .header("x-forwarded-for", "198.51.100.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "198.51.100.7");

        let mut req = Request::builder().uri("/chat").body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "anonymous");

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_key(&req), "192.0.2.1");
    }
}
