// HTTP server for the execution service
//
// Routes:
// - GET  /                 liveness probe, returns the welcome message
// - POST /system/execute   runs one CommandRequest, always answers with a CommandResult
// - GET  /health           bare 200 for orchestration health checks
// - GET  /metrics          Prometheus text format (when enabled)

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::metrics;
use crate::protocol::{CommandRequest, CommandResult, WelcomeMessage};
use crate::service::ExecutionService;

/// Path of the execution endpoint
pub const EXECUTE_PATH: &str = "/system/execute";

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    service: ExecutionService,
    greeting: Arc<str>,
    metrics_enabled: bool,
}

impl AppState {
    pub fn new(service: ExecutionService, greeting: impl Into<String>, metrics_enabled: bool) -> Self {
        Self {
            service,
            greeting: Arc::from(greeting.into()),
            metrics_enabled,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ExecutionService::from_config(&config.execution),
            config.identity.greeting(),
            config.metrics.enabled,
        )
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route(EXECUTE_PATH, post(execute_handler))
        .route("/health", get(health_handler));

    if state.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve the gateway on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if state.metrics_enabled {
        metrics::init().context("Failed to initialize metrics")?;
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Gateway server error")?;

    Ok(())
}

/// Bind the configured address and serve until Ctrl-C
pub async fn run_server(config: &Config) -> Result<()> {
    let addr = config.server.listen_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        "Execution service listening on {} (timeout: {}s, shell: {})",
        addr, config.execution.timeout_secs, config.execution.shell
    );

    serve(listener, AppState::from_config(config), shutdown_signal()).await?;

    info!("Execution service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight requests");
}

/// Liveness endpoint handler
async fn root_handler(State(state): State<AppState>) -> Json<WelcomeMessage> {
    Json(WelcomeMessage {
        message: state.greeting.to_string(),
    })
}

/// Execution endpoint handler
async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResult> {
    Json(state.service.execute(request).await)
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}
