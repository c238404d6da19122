//! GoTEK Web Server
//!
//! Axum-based REST API and WhatsApp webhook for the GoTEK finance bot.
//!
//! Security features:
//! - Session JWTs in an HttpOnly cookie (or `Authorization: Bearer`)
//! - Webhook bodies checked against `X-Hub-Signature-256` when an app secret is set
//! - Restrictive CORS policy
//! - Input validation (pagination limits)
//! - Audit logging for writes
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use gotek_core::{AIBackend, AIClient, Bot, Database, Messenger};

mod handlers;
mod scheduler;
pub mod session;

pub use scheduler::{run_reminders, start_reminder_scheduler, ReminderScheduleConfig};
pub use session::AuthUser;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Authorization header for bearer session tokens
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// HS256 secret for session tokens
    pub jwt_secret: String,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Add `Secure` to the session cookie (disable for plain-HTTP local dev)
    pub cookie_secure: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Token Meta echoes back during webhook verification
    pub webhook_verify_token: Option<String>,
    /// App secret for `X-Hub-Signature-256`; unset skips the check
    pub webhook_app_secret: Option<String>,
}

impl ServerConfig {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            session_ttl_hours: 168,
            cookie_secure: true,
            allowed_origins: vec![],
            webhook_verify_token: None,
            webhook_app_secret: None,
        }
    }

    /// Read configuration from the environment
    ///
    /// `GOTEK_JWT_SECRET` is required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("GOTEK_JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("GOTEK_JWT_SECRET must be set to sign sessions"))?;

        let mut config = Self::new(&jwt_secret);

        if let Some(hours) = std::env::var("GOTEK_SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|h| *h > 0)
        {
            config.session_ttl_hours = hours;
        }
        if let Ok(secure) = std::env::var("GOTEK_COOKIE_SECURE") {
            config.cookie_secure = !matches!(secure.to_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Ok(origins) = std::env::var("GOTEK_ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        config.webhook_verify_token = non_empty_env("WHATSAPP_VERIFY_TOKEN");
        config.webhook_app_secret = non_empty_env("WHATSAPP_APP_SECRET");

        Ok(config)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Parse a comma-separated list of CORS origins
pub fn parse_origins(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Optional collaborators, overridable for testing
#[derive(Clone, Default)]
pub struct RouterOptions {
    pub ai: Option<AIClient>,
    pub messenger: Option<Messenger>,
    /// Pin "today" for dates and budget months
    pub today: Option<NaiveDate>,
}

impl RouterOptions {
    /// AI backend and WhatsApp client from the environment
    pub fn from_env() -> Self {
        Self {
            ai: AIClient::from_env(),
            messenger: Messenger::from_env(),
            today: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub bot: Bot,
    pub ai: Option<AIClient>,
    /// Outbound WhatsApp; None leaves webhook messages unanswered
    pub messenger: Option<Messenger>,
}

/// Authentication middleware - validates the session cookie or bearer token
///
/// On success the [`AuthUser`] is inserted into request extensions for
/// handlers to extract.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session::token_from_cookie_header)
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|auth| auth.strip_prefix("Bearer "))
        })
        .map(str::to_string);

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Unauthorized request - no session");
        return AppError::unauthorized("Authentication required").into_response();
    };

    match session::verify_token(&state.config, &token) {
        Ok(user) => {
            tracing::debug!(user_id = user.id, path = %request.uri().path(), "Authenticated via session");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "Rejected session token");
            AppError::unauthorized("Session expired or invalid").into_response()
        }
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    create_router_with_options(db, static_dir, config, RouterOptions::from_env())
}

/// Create the application router with explicit collaborators (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    options: RouterOptions,
) -> Router {
    match &options.ai {
        Some(client) => info!(
            "AI backend configured: {} ({}, model {})",
            client.backend_name(),
            client.host(),
            client.model()
        ),
        None => info!("ℹ️  AI backend not configured (set GEMINI_API_KEY or QWEN_API_KEY)"),
    }
    match &options.messenger {
        Some(messenger) => info!("Outbound messaging: {}", messenger.name()),
        None => info!("ℹ️  WhatsApp replies disabled (set WHATSAPP_TOKEN and WHATSAPP_PHONE_NUMBER_ID)"),
    }

    let mut bot = Bot::new(db.clone(), options.ai.clone());
    if let Some(today) = options.today {
        bot = bot.with_today(today);
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        bot,
        ai: options.ai,
        messenger: options.messenger,
    });

    let public_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/webhook/whatsapp",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .route("/health", get(handlers::health));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::get_me))
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/categories/:id", delete(handlers::delete_category))
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::get_transaction).delete(handlers::delete_transaction),
        )
        // Budgets
        .route(
            "/budgets",
            get(handlers::list_budgets).post(handlers::set_budget),
        )
        .route("/budgets/status", get(handlers::budget_status))
        .route("/budgets/:id", delete(handlers::delete_budget))
        // Debts
        .route("/debts", get(handlers::list_debts).post(handlers::create_debt))
        .route("/debts/:id", delete(handlers::delete_debt))
        .route("/debts/:id/pay", post(handlers::pay_debt))
        // Reports
        .route("/summary", get(handlers::get_summary))
        .route("/export/transactions", get(handlers::export_transactions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = public_routes.merge(protected_routes);

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
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
        // Cookies cross origins only with explicit origins
        cors.allow_origin(origins).allow_credentials(true)
    };

    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
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

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with configuration from the environment
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.cookie_secure {
        warn!("⚠️  Session cookie sent without Secure - use only behind plain-HTTP local dev");
    }
    if config.webhook_app_secret.is_none() {
        warn!("⚠️  WHATSAPP_APP_SECRET not set - webhook signatures are not verified");
    }

    let options = RouterOptions::from_env();

    check_ai_connection(options.ai.as_ref()).await;

    // Start reminder scheduler if configured
    match (ReminderScheduleConfig::from_env(), &options.messenger) {
        (Some(reminder_config), Some(messenger)) => {
            start_reminder_scheduler(db.clone(), messenger.clone(), reminder_config);
        }
        (Some(_), None) => {
            warn!("Debt reminders configured but WhatsApp is not; reminders disabled");
        }
        _ => {}
    }

    let app = create_router_with_options(db, static_dir, config, options);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(ai: Option<&AIClient>) {
    let Some(client) = ai else {
        return;
    };
    if client.health_check().await {
        info!("✅ AI backend connected: {} ({})", client.host(), client.model());
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} ({})",
            client.host(),
            client.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map domain errors to client-facing statuses
    ///
    /// Infrastructure failures stay 500s with the detail kept for the log.
    pub fn from_core(err: gotek_core::Error) -> Self {
        use gotek_core::Error;
        match err {
            Error::InvalidData(msg) => Self::bad_request(&msg),
            Error::NotFound(msg) => Self::not_found(&format!("{} not found", msg)),
            Error::Conflict(msg) => Self::conflict(&msg),
            Error::Auth(msg) => Self::unauthorized(&msg),
            other => other.into(),
        }
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

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err.into()),
        }
    }
}

#[cfg(test)]
mod tests;
