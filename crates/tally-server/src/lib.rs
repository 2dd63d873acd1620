//! Tally Web Server
//!
//! Axum-based REST API for the Tally statement analyzer.
//!
//! Security features:
//! - API key and trusted-network authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Upload size limit on statements
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::ai::{AIBackend, AIClient};
use tally_core::db::Database;
use tally_core::error::{Error as CoreError, ErrorCategory};
use tally_core::pipeline::AnalysisPipeline;
use tally_core::prompts::PromptBuilder;

mod handlers;

/// Maximum statement upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Comma-separated API keys accepted as `Bearer <key>`
pub const API_KEYS_ENV: &str = "TALLY_API_KEYS";

/// Comma-separated IPs/CIDRs that bypass authentication
pub const TRUSTED_NETWORKS_ENV: &str = "TALLY_TRUSTED_NETWORKS";

/// Comma-separated IPs/CIDRs of reverse proxies whose X-Forwarded-For is trusted
pub const TRUSTED_PROXIES_ENV: &str = "TALLY_TRUSTED_PROXIES";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys, sent as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
    /// Trusted networks that bypass authentication (e.g., "192.168.1.0/24", "10.0.0.5")
    pub trusted_networks: Vec<ipnet::IpNet>,
    /// Trusted proxies whose X-Forwarded-For headers are trusted
    pub trusted_proxies: Vec<ipnet::IpNet>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            trusted_networks: vec![],
            trusted_proxies: vec![],
        }
    }
}

impl ServerConfig {
    /// Read API keys, trusted networks and trusted proxies from the environment
    pub fn from_env(require_auth: bool) -> Self {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            require_auth,
            allowed_origins: vec![],
            api_keys: parse_api_keys(&var(API_KEYS_ENV)),
            trusted_networks: parse_trusted_networks(&var(TRUSTED_NETWORKS_ENV)),
            trusted_proxies: parse_trusted_networks(&var(TRUSTED_PROXIES_ENV)),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Arc<Database>,
    pub pipeline: AnalysisPipeline,
    pub config: ServerConfig,
}

impl AppState {
    /// Wire the analysis pipeline over the database and AI client
    pub fn new(db: Database, ai: AIClient, prompts: PromptBuilder, config: ServerConfig) -> Self {
        let db = Arc::new(db);
        let pipeline = AnalysisPipeline::new(db.clone(), Arc::new(ai), prompts);
        Self {
            db,
            pipeline,
            config,
        }
    }
}

/// Authentication middleware - validates API keys or trusted networks
///
/// # Security Notes
///
/// **Trusted networks**: Requests from IPs in `trusted_networks` bypass all authentication.
/// The client IP is the TCP peer address unless the peer is a configured trusted proxy.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    connect_info: Option<axum::extract::ConnectInfo<std::net::SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    if !state.config.trusted_networks.is_empty() {
        let client_ip = get_client_ip(
            &request,
            connect_info.as_ref(),
            &state.config.trusted_proxies,
        );

        tracing::debug!(
            ?client_ip,
            trusted_networks = ?state.config.trusted_networks,
            path = %request.uri().path(),
            "Checking trusted network auth"
        );

        if let Some(ip) = client_ip {
            if is_ip_trusted(&ip, &state.config.trusted_networks) {
                info!(ip = %ip, path = %request.uri().path(), "Authenticated via trusted network");
                return next.run(request).await;
            }
        }
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys in constant time
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Extract client IP address, respecting trusted proxies
///
/// SECURITY: X-Forwarded-For is ONLY read when the TCP connection comes from a
/// configured trusted proxy. Otherwise only the peer address is used.
pub(crate) fn get_client_ip(
    request: &Request,
    connect_info: Option<&axum::extract::ConnectInfo<std::net::SocketAddr>>,
    trusted_proxies: &[ipnet::IpNet],
) -> Option<std::net::IpAddr> {
    let peer_ip = connect_info.map(|ci| ci.0.ip())?;

    if !trusted_proxies.iter().any(|net| net.contains(&peer_ip)) {
        return Some(peer_ip);
    }

    // "client, proxy1, proxy2" - the first entry is the original client
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    };

    Some(forwarded.or_else(real_ip).unwrap_or(peer_ip))
}

/// Check if an IP address is within any of the trusted networks
fn is_ip_trusted(ip: &std::net::IpAddr, trusted_networks: &[ipnet::IpNet]) -> bool {
    trusted_networks.iter().any(|network| network.contains(ip))
}

/// Parse a comma-separated list of IP addresses and CIDR networks
///
/// Examples:
/// - "192.168.1.0/24" - entire subnet
/// - "10.0.0.5" - single IP (parsed as /32 for IPv4 or /128 for IPv6)
/// - "192.168.1.0/24,10.0.0.0/8" - multiple networks
pub fn parse_trusted_networks(input: &str) -> Vec<ipnet::IpNet> {
    input
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(net) = s.parse::<ipnet::IpNet>() {
                return Some(net);
            }
            if let Ok(ip) = s.parse::<std::net::IpAddr>() {
                return Some(ipnet::IpNet::from(ip));
            }
            warn!(input = s, "Failed to parse trusted network entry");
            None
        })
        .collect()
}

/// Parse a comma-separated list of API keys
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Identify the caller for audit logging: "api-key" or "local-dev"
pub fn get_user(headers: &axum::http::HeaderMap) -> String {
    let bearer = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "));

    match bearer {
        Some(_) => "api-key".to_string(),
        None => "local-dev".to_string(),
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: AppState, static_dir: Option<&str>) -> Router {
    let config = state.config.clone();
    let state = Arc::new(state);

    let api_routes = Router::new()
        // Analyze
        .route(
            "/analyze",
            // Leaves room for the multipart framing and the account field
            post(handlers::analyze_statement)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + 64 * 1024)),
        )
        // History
        .route("/history", get(handlers::list_history))
        .route("/history/:id", delete(handlers::delete_analysis))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/accounts", get(handlers::list_accounts))
        // Audit log
        .route("/audit", get(handlers::list_audit_log))
        // AI backend
        .route("/health", get(handlers::ai_health));

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        cors
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    };

    // CSP: restrict scripts to same-origin, allow inline styles, allow data: for chart images
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve the dashboard UI if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    if !state.config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }

    check_ai_connection(state.pipeline.ai()).await;

    let app = create_router(state, static_dir)
        .into_make_service_with_connect_info::<std::net::SocketAddr>();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(ai: &dyn AIBackend) {
    if ai.health_check().await {
        info!(host = ai.host(), model = ai.model(), "AI backend connected");
    } else {
        warn!(
            host = ai.host(),
            model = ai.model(),
            "AI backend configured but not responding"
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let status = match err.category() {
            ErrorCategory::Input => StatusCode::BAD_REQUEST,
            ErrorCategory::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Extraction => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match err {
            // Storage details stay in the log
            CoreError::Database(_) | CoreError::Pool(_) => Self {
                status,
                message: "Analysis store unavailable".to_string(),
                internal: Some(err.into()),
            },
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => Self {
                status,
                message: "An internal error occurred".to_string(),
                internal: Some(err.into()),
            },
            _ => {
                warn!(status = status.as_u16(), error = %err, "Request failed");
                let message = match err {
                    CoreError::Input(msg)
                    | CoreError::Configuration(msg)
                    | CoreError::Upstream(msg) => msg,
                    other => other.to_string(),
                };
                Self {
                    status,
                    message,
                    internal: None,
                }
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
