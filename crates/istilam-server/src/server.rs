//! Web server entrypoints live here.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{MatchedPath, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{
    add_extension::AddExtensionLayer,
    classify::ServerErrorsFailureClass,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{CorsConfig, ServerConfig, parse_header, parse_method};
use crate::violations::{
    EnquiryError, EnquiryErrorKind, EnquiryRequest, ExtractionResult, ViolationProvider,
    ViolationRecord,
};

const ROOT_PATH: &str = "/";
const TEST_PATH: &str = "/test";
const VIOLATIONS_PATH: &str = "/api/violations";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_ID_HEADER: &str = "x-request-id";

const ROOT_STATUS: &str = "Service is running";
// User-facing messages stay in the portal's locale; internal detail goes to
// the logs only.
const MSG_SERVICE_OK: &str = "الخدمة تعمل بشكل صحيح";
const MSG_ENQUIRY_OK: &str = "تم الاستعلام بنجاح";
const MSG_MISSING_CIVIL_ID: &str = "يرجى تقديم الرقم المدني";
const MSG_ENQUIRY_FAILED: &str = "حدث خطأ أثناء الاستعلام. يرجى المحاولة مرة أخرى.";
const MSG_NOT_FOUND: &str = "المسار المطلوب غير موجود";

#[derive(Debug, Serialize, Copy, Clone, PartialEq, Eq)]
struct RootResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestResponse {
    success: bool,
    message: &'static str,
    server_time: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ViolationsBody {
    #[serde(default)]
    plate_number: Option<String>,
    #[serde(default)]
    civil_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ViolationsResponse {
    success: bool,
    message: &'static str,
    violations: Vec<ViolationRecord>,
    confirmed_zero: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ApiFailureBody {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Clone)]
struct ApiError {
    status: StatusCode,
    body: ApiFailureBody,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ShutdownEvent {
    Pending,
    CtrlC,
    SigTerm,
    ListenerFailed,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listen address may not be empty")]
    EmptyListenAddr,
    #[error("invalid listen address `{address}`: {source}")]
    InvalidListenAddr {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to determine local address: {source}")]
    LocalAddr {
        #[source]
        source: std::io::Error,
    },
    #[error("axum server error: {source}")]
    Serve {
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CORS configuration: {reason}")]
    CorsConfig { reason: String },
}

pub type DynViolationProvider = Arc<dyn ViolationProvider>;
type ApiStateHandle = Arc<ApiState>;

#[derive(Clone)]
struct ApiState {
    provider: DynViolationProvider,
}

impl ApiState {
    fn new(provider: DynViolationProvider) -> Self {
        Self { provider }
    }
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str) -> Self {
        ApiError {
            status,
            body: ApiFailureBody {
                success: false,
                message,
            },
        }
    }

    fn missing_civil_id() -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, MSG_MISSING_CIVIL_ID)
    }

    fn invalid_body() -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, MSG_MISSING_CIVIL_ID)
    }

    fn enquiry_failed() -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, MSG_ENQUIRY_FAILED)
    }

    fn not_found() -> Self {
        ApiError::new(StatusCode::NOT_FOUND, MSG_NOT_FOUND)
    }
}

impl From<EnquiryError> for ApiError {
    fn from(error: EnquiryError) -> Self {
        // The envelope never carries internal detail; that belongs to the
        // trace output alone.
        match &error.kind {
            EnquiryErrorKind::Collaborator { stage } => {
                tracing::error!(stage = %stage, message = %error.message, "enquiry collaborator failed");
            }
            EnquiryErrorKind::Internal => {
                tracing::error!(message = %error.message, "enquiry failed internally");
            }
        }
        ApiError::enquiry_failed()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl ViolationsBody {
    fn into_request(self) -> Result<EnquiryRequest, ApiError> {
        let civil_id = self
            .civil_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(ApiError::missing_civil_id)?
            .to_string();
        let plate_number = self
            .plate_number
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(EnquiryRequest {
            plate_number,
            civil_id,
        })
    }
}

pub fn build_api_router() -> Router {
    debug_assert!(VIOLATIONS_PATH.starts_with("/api/"));

    Router::new()
        .route(ROOT_PATH, get(root_status))
        .route(TEST_PATH, get(test_liveness))
        .route(VIOLATIONS_PATH, post(violations_enquiry))
}

pub async fn serve(config: ServerConfig, provider: DynViolationProvider) -> Result<(), ServerError> {
    debug_assert!(config.listen_addr.len() <= 128);
    debug_assert!(!config.listen_addr.contains('\n'));

    let state: ApiStateHandle = Arc::new(ApiState::new(provider));
    let listen_addr = parse_listen_addr(&config.listen_addr)?;

    let listener = bind_listener(listen_addr).await?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::LocalAddr { source })?;
    tracing::info!(%local_addr, "istilam server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownEvent::Pending);
    let shutdown_future = broadcast_shutdown(shutdown_tx);

    let app = build_app_router(&config, state)?;

    let mut server_future = Box::pin(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_future)
            .await
    });

    let drain_rx = shutdown_rx.clone();
    let mut drain_timeout = Box::pin(drain_timeout_future(drain_rx));

    tokio::select! {
        result = server_future.as_mut() => {
            if let Err(source) = result {
                return Err(ServerError::Serve { source });
            }
        }
        _ = drain_timeout.as_mut() => {
            // Timeout elapsed; dropping the server future forces termination.
        }
    }

    let final_event = *shutdown_rx.borrow();
    if final_event == ShutdownEvent::Pending {
        tracing::info!("server stopped without external shutdown signal");
    } else {
        tracing::info!(?final_event, "server shutdown complete");
    }

    Ok(())
}

fn build_app_router(config: &ServerConfig, state: ApiStateHandle) -> Result<Router, ServerError> {
    let mut router = Router::new()
        .merge(build_api_router())
        .fallback(not_found_handler);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let path = matched_path_or_uri(request);
            let request_id =
                header_request_id(request.headers()).unwrap_or_else(|| "-".to_string());
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %path,
                request_id = %request_id
            )
        })
        .on_response(
            |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                let status = response.status().as_u16();
                let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
                tracing::info!(parent: span, status, latency_ms, "request completed");
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, span: &tracing::Span| {
                let latency_ms = latency.as_millis().min(u128::from(u64::MAX)) as u64;
                tracing::error!(parent: span, latency_ms, error = %error, "request failed");
            },
        );

    if config.cors.enabled {
        let cors_layer = build_cors_layer(&config.cors)?;
        router = router.layer(cors_layer);
    }

    router = router.layer(trace_layer);

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let make_request_id = MakeRequestUuid;
    router = router
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, make_request_id));

    Ok(router.layer(AddExtensionLayer::new(state)))
}

fn build_cors_layer(config: &CorsConfig) -> Result<CorsLayer, ServerError> {
    debug_assert!(!config.allow_origins.is_empty());

    let wildcard = config.allow_origins.iter().any(|origin| origin == "*");
    if wildcard && config.allow_credentials {
        return Err(ServerError::CorsConfig {
            reason: "allow_credentials cannot be combined with a `*` origin".to_string(),
        });
    }

    let origin = if wildcard {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allow_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|err| ServerError::CorsConfig {
                    reason: format!("origin `{origin}` is not a valid header value: {err}"),
                })
            })
            .collect::<Result<_, _>>()?;
        AllowOrigin::list(origins)
    };

    let methods: Vec<Method> = config
        .allow_methods
        .iter()
        .map(|method| parse_method(method).map_err(|reason| ServerError::CorsConfig { reason }))
        .collect::<Result<_, _>>()?;

    let allow_headers: Vec<HeaderName> = config
        .allow_headers
        .iter()
        .map(|name| parse_header(name).map_err(|reason| ServerError::CorsConfig { reason }))
        .collect::<Result<_, _>>()?;

    let mut cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::list(methods))
        .allow_credentials(config.allow_credentials)
        .max_age(Duration::from_secs(config.max_age_secs));

    if !allow_headers.is_empty() {
        cors = cors.allow_headers(AllowHeaders::list(allow_headers));
    }

    Ok(cors)
}

async fn root_status() -> impl IntoResponse {
    Json(RootResponse {
        status: ROOT_STATUS,
    })
}

async fn test_liveness() -> impl IntoResponse {
    Json(TestResponse {
        success: true,
        message: MSG_SERVICE_OK,
        server_time: Utc::now().to_rfc3339(),
    })
}

async fn violations_enquiry(
    Extension(state): Extension<ApiStateHandle>,
    payload: Result<Json<ViolationsBody>, JsonRejection>,
) -> Result<Json<ViolationsResponse>, ApiError> {
    // A missing or malformed JSON body is the same validation failure as a
    // missing civil ID; the caller gets one fixed message either way.
    let Json(body) = payload.map_err(|_| ApiError::invalid_body())?;
    let request = body.into_request()?;

    tracing::info!(
        civil_id_len = request.civil_id.len(),
        has_plate = request.plate_number.is_some(),
        "processing violations enquiry"
    );

    let ExtractionResult {
        records,
        confirmed_zero,
    } = state
        .provider
        .enquire(request)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(
        violations = records.len(),
        confirmed_zero,
        "enquiry completed"
    );

    Ok(Json(ViolationsResponse {
        success: true,
        message: MSG_ENQUIRY_OK,
        violations: records,
        confirmed_zero,
    }))
}

async fn not_found_handler(request: Request<Body>) -> axum::response::Response {
    debug_assert!(request.uri().path().starts_with('/'));
    ApiError::not_found().into_response()
}

fn matched_path_or_uri<B>(request: &Request<B>) -> String {
    if let Some(path) = request.extensions().get::<MatchedPath>() {
        return path.as_str().to_string();
    }
    request.uri().path().to_string()
}

fn header_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

async fn wait_for_shutdown() -> ShutdownEvent {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownEvent::CtrlC,
            Err(error) => {
                tracing::warn!(%error, "failed to capture Ctrl+C signal");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => match term.recv().await {
                Some(_) => ShutdownEvent::SigTerm,
                None => ShutdownEvent::ListenerFailed,
            },
            Err(error) => {
                tracing::warn!(%error, "failed to capture SIGTERM");
                ShutdownEvent::ListenerFailed
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending();

    tokio::select! {
        event = ctrl_c => event,
        event = sigterm => event,
    }
}

fn parse_listen_addr(addr: &str) -> Result<SocketAddr, ServerError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ServerError::EmptyListenAddr);
    }

    trimmed
        .parse()
        .map_err(|source| ServerError::InvalidListenAddr {
            address: trimmed.to_string(),
            source,
        })
}

async fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })
}

fn broadcast_shutdown(
    sender: watch::Sender<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let event = wait_for_shutdown().await;
        debug_assert!(event != ShutdownEvent::Pending);
        if let Err(error) = sender.send(event) {
            tracing::warn!(?event, %error, "failed to broadcast shutdown event");
        }
    }
}

fn drain_timeout_future(
    mut receiver: watch::Receiver<ShutdownEvent>,
) -> impl Future<Output = ()> + Send + 'static {
    async move {
        if receiver.changed().await.is_ok() {
            let event = *receiver.borrow_and_update();
            tracing::info!(?event, "shutdown signal received; draining connections");
            tokio::time::sleep(DRAIN_TIMEOUT).await;
            tracing::warn!(
                ?event,
                seconds = DRAIN_TIMEOUT.as_secs(),
                "graceful shutdown timed out; continuing shutdown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct MockViolationProvider {
        result: ExtractionResult,
    }

    #[async_trait::async_trait]
    impl ViolationProvider for MockViolationProvider {
        async fn enquire(
            &self,
            _request: EnquiryRequest,
        ) -> Result<ExtractionResult, EnquiryError> {
            Ok(self.result.clone())
        }
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl ViolationProvider for FailingProvider {
        async fn enquire(
            &self,
            _request: EnquiryRequest,
        ) -> Result<ExtractionResult, EnquiryError> {
            Err(EnquiryError::collaborator(
                "navigate",
                "navigation timed out after 60s",
            ))
        }
    }

    fn router_with(provider: DynViolationProvider) -> Router {
        let state = Arc::new(ApiState::new(provider));
        build_app_router(&ServerConfig::default(), state).expect("router builds")
    }

    fn mock_router(result: ExtractionResult) -> Router {
        router_with(Arc::new(MockViolationProvider { result }))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("response body readable")
            .to_bytes();
        serde_json::from_slice(bytes.as_ref()).expect("response body is JSON")
    }

    fn post_violations(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(VIOLATIONS_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn root_reports_service_running() {
        let response = mock_router(ExtractionResult::default())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(ROOT_PATH)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("root handler responds");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "Service is running" })
        );
    }

    #[tokio::test]
    async fn test_route_echoes_liveness() {
        let response = mock_router(ExtractionResult::default())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(TEST_PATH)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("test handler responds");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!(MSG_SERVICE_OK));
        assert!(
            value["serverTime"].as_str().is_some_and(|t| !t.is_empty()),
            "serverTime must be present: {value}"
        );
    }

    #[tokio::test]
    async fn enquiry_returns_records_and_zero_flag() {
        let record = ViolationRecord {
            id: Some("10234".to_string()),
            date: Some("15/02/2025".to_string()),
            time: Some("14:30".to_string()),
            amount: Some("20".to_string()),
            kind: Some("تجاوز السرعة المقررة".to_string()),
            location: Some("طريق الدائري السادس".to_string()),
        };
        let router = mock_router(ExtractionResult::from_records(vec![record]));

        let response = router
            .oneshot(post_violations(
                json!({ "plateNumber": "12345", "civilId": "289010112345" }),
            ))
            .await
            .expect("enquiry responds");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!(MSG_ENQUIRY_OK));
        assert_eq!(value["confirmedZero"], json!(false));
        assert_eq!(value["violations"][0]["id"], json!("10234"));
        assert_eq!(value["violations"][0]["type"], json!("تجاوز السرعة المقررة"));
        assert_eq!(value["violations"][0]["date"], json!("15/02/2025"));
    }

    #[tokio::test]
    async fn confirmed_zero_is_machine_readable() {
        let router = mock_router(ExtractionResult::confirmed_zero());

        let response = router
            .oneshot(post_violations(json!({ "civilId": "289010112345" })))
            .await
            .expect("enquiry responds");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["confirmedZero"], json!(true));
        assert_eq!(value["violations"], json!([]));
    }

    #[tokio::test]
    async fn uncertain_empty_stays_distinct_from_confirmed_zero() {
        let router = mock_router(ExtractionResult::unrecognized());

        let response = router
            .oneshot(post_violations(json!({ "civilId": "289010112345" })))
            .await
            .expect("enquiry responds");

        assert_eq!(response.status(), StatusCode::OK);
        let value = body_json(response).await;
        assert_eq!(value["confirmedZero"], json!(false));
        assert_eq!(value["violations"], json!([]));
    }

    #[tokio::test]
    async fn missing_civil_id_is_rejected() {
        let router = mock_router(ExtractionResult::default());

        let response = router
            .oneshot(post_violations(json!({ "plateNumber": "12345" })))
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["message"], json!(MSG_MISSING_CIVIL_ID));
    }

    #[tokio::test]
    async fn blank_civil_id_is_rejected() {
        let router = mock_router(ExtractionResult::default());

        let response = router
            .oneshot(post_violations(json!({ "civilId": "   " })))
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_with_envelope() {
        let router = mock_router(ExtractionResult::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(VIOLATIONS_PATH)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .expect("request builds"),
            )
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(false));
    }

    #[tokio::test]
    async fn provider_failure_maps_to_generic_500() {
        let router = router_with(Arc::new(FailingProvider));

        let response = router
            .oneshot(post_violations(json!({ "civilId": "289010112345" })))
            .await
            .expect("handler responds");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["message"], json!(MSG_ENQUIRY_FAILED));
        // No internal detail leaks into the envelope.
        assert!(!value.to_string().contains("navigation timed out"));
    }

    #[tokio::test]
    async fn unknown_route_returns_envelope_404() {
        let router = mock_router(ExtractionResult::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/nope")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("fallback responds");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let value = body_json(response).await;
        assert_eq!(value["success"], json!(false));
    }

    #[tokio::test]
    async fn wildcard_cors_allows_any_origin() {
        let router = mock_router(ExtractionResult::default());

        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(ROOT_PATH)
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("request succeeds");

        assert_eq!(response.status(), StatusCode::OK);
        let header_value = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .expect("ACAO header present with wildcard CORS");
        assert_eq!(header_value, "*");
    }

    #[tokio::test]
    async fn wildcard_origin_with_credentials_is_rejected() {
        let cors = CorsConfig {
            allow_credentials: true,
            ..CorsConfig::default()
        };
        let error = build_cors_layer(&cors).expect_err("wildcard plus credentials must fail");
        assert!(matches!(error, ServerError::CorsConfig { .. }));
    }
}
