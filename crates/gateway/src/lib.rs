//! HTTP gateway for Skald.
//!
//! Exposes the conversation endpoints, history queries, OAuth code
//! exchange, image inpainting, and a health check.
//!
//! Built on Axum.

pub mod auth;
pub mod error;
pub mod routes;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    middleware::{self, Next},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{Instrument, info, info_span, warn};

use skald_chat::{ChatOptions, ChatService, HistoryQuery};
use skald_config::{AppConfig, GatewayConfig, StoreBackend};
use skald_core::{Generator, TurnStore};
use skald_generation::BaldrClient;
use skald_store::{InMemoryTurnStore, SqliteTurnStore};

use crate::auth::OAuthExchanger;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub chat: ChatService,
    pub query: HistoryQuery,
    pub oauth: Option<OAuthExchanger>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Wire the service graph around an existing store and generator.
    pub fn new(
        store: Arc<dyn TurnStore>,
        generator: Arc<dyn Generator>,
        options: ChatOptions,
        oauth: Option<OAuthExchanger>,
    ) -> Self {
        let query = HistoryQuery::new(store.clone(), options.decode_policy, options.store_timeout);
        Self {
            chat: ChatService::new(store, generator, options),
            query,
            oauth,
        }
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS for the configured origins
/// - Request body size limit
/// - Request logging (method, path, client, status, duration)
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/chat", post(routes::chat_handler))
        .route("/chat/{chat_id}", get(routes::chat_history_handler))
        .route("/user/", get(routes::missing_user_handler))
        .route("/user/{user_id}", get(routes::user_history_handler))
        .route("/auth", post(auth::auth_handler))
        .route("/inpaint", post(routes::inpaint_handler))
        .route("/health", get(routes::health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600))
}

/// Log one line per request. Bodies are never logged, only their length.
async fn log_requests(req: axum::extract::Request, next: Next) -> axum::response::Response {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into());
    let body_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let span = info_span!("request", %request_id);
    let mut response = next.run(req).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }

    span.in_scope(|| {
        info!(
            method = %method,
            path = %path,
            client = %client,
            body_len,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Handled request"
        );
    });
    response
}

/// Open the configured store and check it answers.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn TurnStore>, skald_core::Error> {
    let store: Arc<dyn TurnStore> = match config.store.backend {
        StoreBackend::Sqlite => Arc::new(SqliteTurnStore::new(&config.store.url).await?),
        StoreBackend::Memory => {
            warn!("Using the in-memory store; turns are lost on restart");
            Arc::new(InMemoryTurnStore::new())
        }
    };
    store.ping().await?;
    Ok(store)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = open_store(&config).await?;
    let generator: Arc<dyn Generator> = Arc::new(BaldrClient::from_config(&config.generation)?);
    if config.generation.base_url.is_none() {
        warn!("generation.base_url is not set (BALDR_URL); chat requests will fail");
    }

    let oauth = OAuthExchanger::from_config(&config.oauth)?;
    if oauth.is_none() {
        info!("OAuth not configured; POST /auth will answer 503");
    }

    let state = Arc::new(GatewayState::new(
        store.clone(),
        generator,
        ChatOptions::from_config(&config),
        oauth,
    ));
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, store = store.name(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use skald_core::{
        GenerationError, GenerationReply, GenerationRequest, InpaintReply, InpaintRequest,
        RecordBatch, StoreError, Turn,
    };
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Replies with a fixed text, or with the configured error.
    struct MockGenerator {
        reply: Result<GenerationReply, GenerationError>,
        calls: Mutex<Vec<GenerationRequest>>,
    }

    impl MockGenerator {
        fn ok(text: &str, image: Option<&str>) -> Self {
            Self {
                reply: Ok(GenerationReply {
                    content: text.into(),
                    image: image.map(String::from),
                    image_name: None,
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn err(error: GenerationError) -> Self {
            Self {
                reply: Err(error),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for MockGenerator {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationReply, GenerationError> {
            self.calls.lock().unwrap().push(request);
            self.reply.clone()
        }

        async fn inpaint(&self, request: InpaintRequest) -> Result<InpaintReply, GenerationError> {
            Ok(InpaintReply {
                image: format!("edited-{}", request.image),
            })
        }
    }

    struct DownStore;

    #[async_trait]
    impl TurnStore for DownStore {
        fn name(&self) -> &str {
            "down"
        }
        async fn find_by_chat(&self, _: &str) -> Result<RecordBatch, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_by_user(&self, _: &str) -> Result<RecordBatch, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn insert_many(&self, _: &[Turn]) -> Result<(), StoreError> {
            Err(StoreError::WriteFailed("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Reads fine; writes never finish.
    struct StalledWriteStore;

    #[async_trait]
    impl TurnStore for StalledWriteStore {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn find_by_chat(&self, _: &str) -> Result<RecordBatch, StoreError> {
            Ok(RecordBatch::default())
        }
        async fn find_by_user(&self, _: &str) -> Result<RecordBatch, StoreError> {
            Ok(RecordBatch::default())
        }
        async fn insert_many(&self, _: &[Turn]) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    fn app_with(store: Arc<dyn TurnStore>, generator: Arc<MockGenerator>) -> Router {
        let state = Arc::new(GatewayState::new(
            store,
            generator,
            ChatOptions::default(),
            None,
        ));
        build_router(state, &GatewayConfig::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_store() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("hi", None)),
        );
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "in_memory");
    }

    #[tokio::test]
    async fn health_degrades_when_store_is_down() {
        let app = app_with(Arc::new(DownStore), Arc::new(MockGenerator::ok("hi", None)));
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn health_degrades_when_store_ping_hangs() {
        let app = app_with(
            Arc::new(StalledWriteStore),
            Arc::new(MockGenerator::ok("hi", None)),
        );
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "degraded");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_is_gateway_timeout() {
        let app = app_with(
            Arc::new(StalledWriteStore),
            Arc::new(MockGenerator::ok("hello", None)),
        );
        let response = app
            .oneshot(post_json(
                "/chat",
                json!({"chat_id": "c1", "content": "hi", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "timeout");
        assert!(body["message"].as_str().unwrap().contains("persistence"));
    }

    #[tokio::test]
    async fn chat_returns_assistant_turn_and_persists() {
        let store = Arc::new(InMemoryTurnStore::new());
        let app = app_with(store.clone(), Arc::new(MockGenerator::ok("hello", Some("x.png"))));

        let response = app
            .oneshot(post_json(
                "/chat",
                json!({"chat_id": "c1", "content": "hi", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["role"], "assistant");
        assert_eq!(body["content"], "hello");
        assert_eq!(body["image"], "x.png");
        assert_eq!(body["chat_id"], "c1");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("hi", None)),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn missing_chat_id_is_bad_request() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("hi", None)),
        );
        let response = app
            .oneshot(post_json("/chat", json!({"content": "hi"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generation_failure_is_internal_error_with_kind() {
        let store = Arc::new(InMemoryTurnStore::new());
        let app = app_with(
            store.clone(),
            Arc::new(MockGenerator::err(GenerationError::ResponseInvalid(
                "expected value".into(),
            ))),
        );
        let response = app
            .oneshot(post_json(
                "/chat",
                json!({"chat_id": "c1", "content": "hi", "user_id": "u1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "generation_response_invalid"
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn history_endpoints_return_stored_turns() {
        let store = Arc::new(InMemoryTurnStore::new());
        store
            .insert_many(&[
                Turn::user("c1", "hi").with_user_id("u1"),
                Turn::assistant("c1", "hello").with_user_id("u1"),
                Turn::user("c2", "again").with_user_id("u1"),
            ])
            .await
            .unwrap();
        let app = app_with(store, Arc::new(MockGenerator::ok("x", None)));

        let response = app.clone().oneshot(get("/chat/c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = app.clone().oneshot(get("/chat/unknown")).await.unwrap();
        assert_eq!(body_json(response).await, json!([]));

        let response = app.oneshot(get("/user/u1")).await.unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_user_path_is_bad_request() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("x", None)),
        );
        let response = app.oneshot(get("/user/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn skipped_records_are_flagged_in_header() {
        let store = Arc::new(InMemoryTurnStore::new());
        store.insert_many(&[Turn::user("c1", "ok")]).await.unwrap();
        store
            .insert_raw(json!({"chat_id": "c1", "role": "ghost"}))
            .await;
        let app = app_with(store, Arc::new(MockGenerator::ok("x", None)));

        let response = app.oneshot(get("/chat/c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[routes::SKIPPED_RECORDS_HEADER],
            HeaderValue::from(1usize)
        );
    }

    #[tokio::test]
    async fn store_outage_on_history_is_internal_error() {
        let app = app_with(Arc::new(DownStore), Arc::new(MockGenerator::ok("x", None)));
        let response = app.oneshot(get("/chat/c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "store_unavailable");
    }

    #[tokio::test]
    async fn inpaint_returns_image_and_records_turn() {
        let store = Arc::new(InMemoryTurnStore::new());
        let app = app_with(store.clone(), Arc::new(MockGenerator::ok("x", None)));

        let response = app
            .oneshot(post_json(
                "/inpaint",
                json!({"chat_id": "c1", "user_id": "u1", "prompt": "blue", "image": "cat.png", "image_name": "cat"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"img": "edited-cat.png", "img_name": "cat"})
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn auth_without_oauth_config_is_unavailable() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("x", None)),
        );
        let response = app
            .oneshot(post_json("/auth", json!({"code": "abc"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = app_with(
            Arc::new(InMemoryTurnStore::new()),
            Arc::new(MockGenerator::ok("x", None)),
        );
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/chat")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
    }
}
