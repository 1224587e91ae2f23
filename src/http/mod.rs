//! HTTP transport for MCP with optional SSE streaming.
//!
//! `POST /mcp` carries one JSON-RPC request and answers either with a JSON
//! body or, when the client accepts `text/event-stream`, with an SSE stream.
//! `GET /mcp` opens a long-lived SSE stream.

pub mod sender;
pub mod session;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::protocol::{error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::mcp::server::McpServer;
use crate::mcp::transport::Transport;

pub use sender::{DirectSender, StreamingSender};
pub use session::{generate_session_id, SessionRegistry, SseSession};

/// Session id header, set on every SSE response.
pub const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");

/// Protocol version header. Accepted in CORS but not enforced.
pub const MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");

/// Resume cursor header sent by reconnecting SSE clients.
pub const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

const SSE_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Frames buffered per SSE stream before writes start to wait.
const EVENT_BUFFER: usize = 64;

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    /// Deadline for reading a request body.
    pub read_timeout: Duration,
    /// Deadline for handing one SSE frame to a stalled stream.
    pub write_timeout: Duration,
    /// Reported on the status page; not enforced by the listener.
    pub idle_timeout: Duration,
    /// Bound on the graceful shutdown wait.
    pub shutdown_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP server state.
#[derive(Clone)]
struct HttpState {
    server: Arc<McpServer>,
    registry: Arc<SessionRegistry>,
    config: HttpConfig,
    shutdown: CancellationToken,
}

/// MCP over HTTP with SSE streaming.
pub struct HttpTransport {
    config: HttpConfig,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Sessions currently streaming.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Build the router serving `server`.
    pub fn router(&self, server: Arc<McpServer>) -> Router {
        let state = HttpState {
            server,
            registry: self.registry.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                LAST_EVENT_ID,
                MCP_SESSION_ID,
                MCP_PROTOCOL_VERSION,
            ])
            .expose_headers([MCP_SESSION_ID, MCP_PROTOCOL_VERSION])
            .max_age(Duration::from_secs(86400));

        Router::new()
            .route("/", get(status_page))
            .route("/health", get(health_check))
            .route("/mcp", get(handle_get).post(handle_post))
            .layer(middleware::from_fn(answer_preflight))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_XSS_PROTECTION,
                HeaderValue::from_static("1; mode=block"),
            ))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, server: Arc<McpServer>, cancel: CancellationToken) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Starting HTTP transport on {}", addr);
        info!("MCP endpoint: http://localhost:{}/mcp", self.config.port);

        let app = self.router(server);
        let graceful = self.shutdown.clone().cancelled_owned();
        let mut serve = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
        });

        tokio::select! {
            result = &mut serve => {
                self.registry.close_all().await;
                return match result {
                    Ok(served) => served.map_err(Error::from),
                    Err(e) => Err(Error::HttpServer(e.to_string())),
                };
            }
            _ = cancel.cancelled() => info!("HTTP transport shutting down"),
            _ = self.shutdown.cancelled() => info!("HTTP transport stopped"),
        }

        self.registry.close_all().await;
        self.shutdown.cancel();

        match tokio::time::timeout(self.config.shutdown_timeout, &mut serve).await {
            Ok(Ok(served)) => served.map_err(Error::from),
            Ok(Err(e)) => Err(Error::HttpServer(e.to_string())),
            Err(_) => {
                warn!(
                    "Graceful shutdown did not finish within {:?}, aborting",
                    self.config.shutdown_timeout
                );
                serve.abort();
                Ok(())
            }
        }
    }

    async fn stop(&self) -> Result<()> {
        self.registry.close_all().await;
        self.shutdown.cancel();
        Ok(())
    }
}

/// Any OPTIONS request succeeds; CORS headers are added by the outer layer.
async fn answer_preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// A JSON-RPC error as an HTTP response.
fn error_response(
    status: StatusCode,
    id: Option<RequestId>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Response {
    let body = JsonRpcResponse::error(id, JsonRpcError::new(code, message, data));
    (status, Json(body)).into_response()
}

async fn handle_post(State(state): State<HttpState>, headers: HeaderMap, body: Body) -> Response {
    let bytes = match tokio::time::timeout(
        state.config.read_timeout,
        axum::body::to_bytes(body, MAX_BODY_BYTES),
    )
    .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                Some(RequestId::unknown()),
                error_codes::PARSE_ERROR,
                "Parse error",
                Some(Value::String(e.to_string())),
            )
        }
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                Some(RequestId::unknown()),
                error_codes::PARSE_ERROR,
                "Parse error",
                Some(Value::String("request body read timed out".to_string())),
            )
        }
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            debug!("Failed to parse request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                Some(RequestId::unknown()),
                error_codes::PARSE_ERROR,
                "Parse error",
                Some(Value::String(e.to_string())),
            );
        }
    };

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let wants_sse = accept.contains("text/event-stream");
    let wants_json = accept.contains("application/json");

    if !wants_json && !wants_sse {
        return error_response(
            StatusCode::BAD_REQUEST,
            request.id,
            error_codes::INVALID_REQUEST,
            "Accept header must include application/json and/or text/event-stream",
            None,
        );
    }

    if !request.has_valid_version() {
        return error_response(
            StatusCode::BAD_REQUEST,
            request.id,
            error_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
            None,
        );
    }

    if request.is_notification() {
        debug!("Received notification: {}", request.method);
        return StatusCode::NO_CONTENT.into_response();
    }

    if wants_sse {
        return stream_request(state, &headers, request).await;
    }

    let id = request.id.clone();
    let sender = DirectSender::new();
    let result = state
        .server
        .handle_request_with_timeout(request, &sender, None, &state.shutdown)
        .await;
    if let Err(e) = &result {
        warn!("Error handling request: {}", e);
    }

    match (sender.take(), result) {
        (Some(response), _) => Json(response).into_response(),
        (None, Err(e)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            id,
            error_codes::INTERNAL_ERROR,
            "Internal error",
            Some(Value::String(e.to_string())),
        ),
        (None, Ok(())) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            id,
            error_codes::INTERNAL_ERROR,
            "No response generated",
            None,
        ),
    }
}

/// Answer a POST as one event on an SSE stream that stays open until the
/// client disconnects or the transport stops.
async fn stream_request(
    state: HttpState,
    headers: &HeaderMap,
    request: JsonRpcRequest,
) -> Response {
    let (session, response) = open_session(&state, headers).await;

    tokio::spawn(async move {
        let id = request.id.clone();
        let sender = StreamingSender::new(session.clone());
        let result = state
            .server
            .handle_request_with_timeout(request, &sender, Some(session.id()), &state.shutdown)
            .await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_delivery_error() => {
                debug!("SSE session {} went away: {}", session.id(), e);
            }
            Err(e) => {
                warn!("Error handling SSE request: {}", e);
                if let (Some(id), false) = (id, sender.is_sent()) {
                    let data = Some(Value::String(e.to_string()));
                    if let Err(e) = session
                        .send_error(id, error_codes::INTERNAL_ERROR, "Internal error", data)
                        .await
                    {
                        debug!("Could not report failure on session {}: {}", session.id(), e);
                    }
                }
            }
        }
    });

    response
}

async fn handle_get(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let (_, response) = open_session(&state, &headers).await;
    response
}

/// Register a session for this request and build its streaming response.
async fn open_session(state: &HttpState, headers: &HeaderMap) -> (Arc<SseSession>, Response) {
    let first_event_id = headers
        .get(&LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(|last| last.saturating_add(1))
        .unwrap_or(0);

    let session_id = headers
        .get(&MCP_SESSION_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .unwrap_or_else(generate_session_id);

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let token = state.shutdown.child_token();
    let session = Arc::new(SseSession::new(
        session_id.clone(),
        first_event_id,
        tx,
        token.clone(),
        state.config.write_timeout,
    ));

    if let Some(previous) = state.registry.insert(session.clone()).await {
        debug!("Replacing SSE session {}", session_id);
        previous.close();
    }
    spawn_session_watcher(state.registry.clone(), session.clone());
    info!("SSE session {} opened", session_id);

    let connected = json!({
        "sessionId": session_id,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    if let Err(e) = session.send_event(Some("connected"), &connected).await {
        warn!("Failed to send connected event: {}", e);
    }

    // Dropping the body (client gone or stream finished) cancels the session.
    let guard = token.drop_guard();
    let stream = ReceiverStream::new(rx).map(move |frame| {
        let _guard = &guard;
        Ok::<_, Infallible>(frame)
    });

    let response = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(SSE_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        [(MCP_SESSION_ID, session_id)],
        Body::from_stream(stream),
    )
        .into_response();

    (session, response)
}

/// Deregister and close `session` once its token is cancelled.
fn spawn_session_watcher(registry: Arc<SessionRegistry>, session: Arc<SseSession>) {
    tokio::spawn(async move {
        session.cancel_token().cancelled().await;
        registry.remove(&session).await;
        session.close();
    });
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Human-readable status page.
async fn status_page(State(state): State<HttpState>) -> impl IntoResponse {
    let info = state.server.server_info();
    let sessions = state.registry.len().await;
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{name}</title></head>
<body>
<h1>{name} v{version}</h1>
<ul>
<li>Port: {port}</li>
<li>Protocol: MCP {protocol}</li>
<li>Transport: HTTP + SSE</li>
<li>Active sessions: {sessions}</li>
<li>Idle timeout: {idle}s</li>
</ul>
<h2>Endpoints</h2>
<ul>
<li><code>POST /mcp</code> JSON-RPC requests (JSON or SSE response)</li>
<li><code>GET /mcp</code> open an SSE stream</li>
<li><code>GET /health</code> health check</li>
</ul>
</body>
</html>"#,
        name = info.name,
        version = info.version,
        port = state.config.port,
        protocol = crate::mcp::protocol::MCP_VERSION,
        sessions = sessions,
        idle = state.config.idle_timeout.as_secs(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::TeaHandler;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn transport() -> HttpTransport {
        HttpTransport::new(HttpConfig {
            write_timeout: Duration::from_secs(1),
            ..HttpConfig::default()
        })
    }

    fn server() -> Arc<McpServer> {
        Arc::new(McpServer::from_handler(
            "MCP Server",
            "1.0.0",
            Arc::new(TeaHandler::new()),
        ))
    }

    fn post(accept: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Split a complete SSE body into (id, event, data) frames.
    fn frames(text: &str) -> Vec<(i64, Option<String>, Value)> {
        text.split("\n\n")
            .filter(|frame| !frame.trim().is_empty())
            .map(|frame| {
                let mut id = None;
                let mut event = None;
                let mut data = String::new();
                for line in frame.lines() {
                    if let Some(value) = line.strip_prefix("id: ") {
                        id = Some(value.parse().unwrap());
                    } else if let Some(value) = line.strip_prefix("event: ") {
                        event = Some(value.to_string());
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data.push_str(value);
                    }
                }
                (id.unwrap(), event, serde_json::from_str(&data).unwrap())
            })
            .collect()
    }

    async fn next_frame(body: &mut Body) -> String {
        let frame = body.frame().await.unwrap().unwrap();
        String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = transport()
            .router(server())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(json_body(response).await, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_status_page() {
        let response = transport()
            .router(server())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("HTTP + SSE"));
        assert!(html.contains("Active sessions: 0"));
        assert!(html.contains("Port: 8080"));
        assert!(html.contains("Idle timeout: 120s"));
    }

    #[tokio::test]
    async fn test_options_is_ok() {
        let response = transport()
            .router(server())
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/mcp")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = transport()
            .router(server())
            .oneshot(post(
                Some("application/json"),
                r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn test_unknown_method_over_json() {
        let response = transport()
            .router(server())
            .oneshot(post(
                Some("application/json"),
                r#"{"jsonrpc":"2.0","id":7,"method":"frobnicate"}"#,
            ))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["id"], 7);
        assert_eq!(body["error"]["code"], -32601);
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = transport()
            .router(server())
            .oneshot(post(Some("application/json"), "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["id"], -1);
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_missing_accept_header() {
        let response = transport()
            .router(server())
            .oneshot(post(None, r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_invalid_version() {
        let response = transport()
            .router(server())
            .oneshot(post(
                Some("application/json"),
                r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Invalid JSON-RPC version");
    }

    #[tokio::test]
    async fn test_notification_returns_no_content() {
        let response = transport()
            .router(server())
            .oneshot(post(
                Some("application/json, text/event-stream"),
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_post_with_sse() {
        let transport = transport();
        let response = transport
            .router(server())
            .oneshot(post(
                Some("text/event-stream"),
                r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], SSE_CONTENT_TYPE);
        let session_id = response.headers()[&MCP_SESSION_ID]
            .to_str()
            .unwrap()
            .to_string();
        assert!(session_id.starts_with("session_"));

        let mut body = response.into_body();
        let connected = next_frame(&mut body).await;
        let reply = next_frame(&mut body).await;
        let frames = frames(&format!("{}{}", connected, reply));

        assert_eq!(frames.len(), 2);
        let (id, event, data) = &frames[0];
        assert_eq!(*id, 0);
        assert_eq!(event.as_deref(), Some("connected"));
        assert_eq!(data["sessionId"], session_id.as_str());

        let (id, event, data) = &frames[1];
        assert_eq!(*id, 1);
        assert!(event.is_none());
        assert_eq!(data["id"], 5);
        assert!(data["result"]["tools"].is_array());

        // The stream outlives the response until the transport stops.
        assert!(transport.registry().get(&session_id).await.is_some());
        transport.stop().await.unwrap();
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_get_resumes_from_last_event_id() {
        let transport = transport();
        let response = transport
            .router(server())
            .oneshot(
                Request::get("/mcp")
                    .header(&MCP_SESSION_ID, "session-abc")
                    .header(&LAST_EVENT_ID, "41")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[&MCP_SESSION_ID], "session-abc");
        let mut body = response.into_body();
        let first = next_frame(&mut body).await;
        assert!(first.starts_with("id: 42\nevent: connected\n"));
        assert!(first.contains("\"sessionId\":\"session-abc\""));

        let session = transport.registry().get("session-abc").await.unwrap();
        assert_eq!(session.send_event(None, &json!({"n": 1})).await.unwrap(), 43);
        assert_eq!(next_frame(&mut body).await, "id: 43\ndata: {\"n\":1}\n\n");
    }

    #[tokio::test]
    async fn test_fractional_id_is_echoed() {
        let response = transport()
            .router(server())
            .oneshot(post(
                Some("application/json"),
                r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], 1.5);
        assert_eq!(body["result"], json!({}));
    }

    #[tokio::test]
    async fn test_reopened_session_continues_its_cursor() {
        let transport = transport();
        let first = transport
            .router(server())
            .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let session_id = first.headers()[&MCP_SESSION_ID]
            .to_str()
            .unwrap()
            .to_string();
        let mut first_body = first.into_body();
        assert!(next_frame(&mut first_body).await.starts_with("id: 0\nevent: connected\n"));

        let earlier = transport.registry().get(&session_id).await.unwrap();
        assert_eq!(earlier.send_event(None, &json!({"n": 1})).await.unwrap(), 1);
        assert_eq!(earlier.send_event(None, &json!({"n": 2})).await.unwrap(), 2);
        assert!(next_frame(&mut first_body).await.starts_with("id: 1\n"));
        assert!(next_frame(&mut first_body).await.starts_with("id: 2\n"));

        let second = transport
            .router(server())
            .oneshot(
                Request::get("/mcp")
                    .header(&MCP_SESSION_ID, session_id.as_str())
                    .header(&LAST_EVENT_ID, "2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.headers()[&MCP_SESSION_ID], session_id.as_str());
        let mut second_body = second.into_body();
        assert!(next_frame(&mut second_body)
            .await
            .starts_with("id: 3\nevent: connected\n"));

        // The superseded stream ends and its session refuses further events.
        assert!(first_body.frame().await.is_none());
        assert!(earlier.is_closed());
        assert!(earlier.send_event(None, &json!({})).await.is_err());

        let resumed = transport.registry().get(&session_id).await.unwrap();
        assert!(!Arc::ptr_eq(&resumed, &earlier));
        assert_eq!(resumed.send_event(None, &json!({"n": 4})).await.unwrap(), 4);
        assert_eq!(next_frame(&mut second_body).await, "id: 4\ndata: {\"n\":4}\n\n");
    }

    #[tokio::test]
    async fn test_stalled_stream_does_not_delay_stop() {
        let transport = HttpTransport::new(HttpConfig {
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(1),
            ..HttpConfig::default()
        });
        let response = transport
            .router(server())
            .oneshot(
                Request::get("/mcp")
                    .header(&MCP_SESSION_ID, "stalled")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let session = transport.registry().get("stalled").await.unwrap();

        // The connected event already holds one slot of the buffer.
        for n in 1..EVENT_BUFFER {
            session.send_event(None, &json!({ "n": n })).await.unwrap();
        }
        let blocked = {
            let session = session.clone();
            tokio::spawn(async move { session.send_event(None, &json!("blocked")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_millis(500), transport.stop())
            .await
            .unwrap()
            .unwrap();

        let result = tokio::time::timeout(Duration::from_millis(500), blocked)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());
        assert!(transport.registry().is_empty().await);
        drop(response);
    }

    #[tokio::test]
    async fn test_stop_closes_sessions() {
        let transport = transport();
        let response = transport
            .router(server())
            .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let session_id = response.headers()[&MCP_SESSION_ID]
            .to_str()
            .unwrap()
            .to_string();
        let session = transport.registry().get(&session_id).await.unwrap();
        assert_eq!(transport.registry().len().await, 1);

        transport.stop().await.unwrap();

        assert!(transport.registry().is_empty().await);
        assert!(session.is_closed());
        assert!(session.send_event(None, &json!({})).await.is_err());

        // The stream drains its connected event and then ends.
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(std::str::from_utf8(&bytes).unwrap().starts_with("id: 0\nevent: connected\n"));
    }

    #[tokio::test]
    async fn test_dropped_stream_deregisters_session() {
        let transport = transport();
        let response = transport
            .router(server())
            .oneshot(
                Request::get("/mcp")
                    .header(&MCP_SESSION_ID, "short-lived")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(transport.registry().get("short-lived").await.is_some());

        drop(response);

        tokio::time::timeout(Duration::from_secs(1), async {
            while transport.registry().get("short-lived").await.is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
