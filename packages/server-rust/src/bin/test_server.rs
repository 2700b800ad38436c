//! Demo server: dispatches HTTP requests to tenant shells.
//!
//! Tenants come from `--tenants <file.json>` or default to a single
//! `default` tenant that serves every request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use clap::Parser;
use serde_json::json;
use shellgate_core::{
    ActivationMarker, RequestServices, SettingsSource, ShellContainer, ShellFactory, TenantContext,
    TenantEvents, TenantId, TenantSettings,
};
use shellgate_server::shell::ShellStatus;
use shellgate_server::{
    build_dispatch_pipeline, GateConfig, HttpDispatchService, JsonSettingsSource, ShellHost,
    ShellServices, StaticSettingsSource,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "test-server")]
#[command(about = "Multi-tenant shell dispatch demo server")]
struct Args {
    /// Host address to bind to.
    #[arg(long, env = "SHELLGATE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on. 0 picks an ephemeral port.
    #[arg(short, long, env = "SHELLGATE_PORT", default_value = "8080")]
    port: u16,

    /// JSON file holding an array of tenant settings.
    #[arg(long, env = "SHELLGATE_TENANTS")]
    tenants: Option<PathBuf>,

    /// Upper bound on each lifecycle listener call, in milliseconds.
    #[arg(long, env = "SHELLGATE_ACTIVATION_TIMEOUT_MS")]
    activation_timeout_ms: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "SHELLGATE_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = GateConfig {
        activation_timeout: args.activation_timeout_ms.map(Duration::from_millis),
    };
    let source: Arc<dyn SettingsSource> = match &args.tenants {
        Some(path) => Arc::new(JsonSettingsSource::new(path)),
        None => Arc::new(StaticSettingsSource::new(vec![TenantSettings::running(
            TenantId::new("default")?,
        )])),
    };
    let host = Arc::new(ShellHost::new(&config, source, Arc::new(DemoShellFactory)));
    host.initialize().await?;

    let tenant_app = Router::new()
        .route("/", get(tenant_home))
        .fallback(tenant_home);
    let dispatch =
        HttpDispatchService::new(build_dispatch_pipeline(Arc::clone(&host), tenant_app));

    let app = Router::new()
        .route("/_shells", get(list_shells))
        .fallback_service(dispatch)
        .with_state(host)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let listener = TcpListener::bind(format!("{}:{}", args.host, args.port)).await?;
    info!(addr = %listener.local_addr()?, "test server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("test server stopped");
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shellgate_server=debug,test_server=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| fmt::layer().json()))
        .with((!json_logs).then(|| fmt::layer()))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
    }
}

async fn tenant_home(
    Extension(tenant): Extension<TenantContext>,
    Extension(services): Extension<RequestServices>,
    Extension(marker): Extension<ActivationMarker>,
    req: Request,
) -> Json<serde_json::Value> {
    let scope = services.scope();
    let greeting = scope.get::<Greeting>().map(|g| g.0.clone());
    let request_id = scope.get::<RequestStamp>().map(|s| s.0.to_string());
    Json(json!({
        "tenant": tenant.tenant_id(),
        "path": req.uri().path(),
        "greeting": greeting,
        "scope_id": request_id,
        "activated_now": marker.triggered,
    }))
}

async fn list_shells(State(host): State<Arc<ShellHost>>) -> Json<Vec<ShellStatus>> {
    Json(host.shells())
}

// ---------------------------------------------------------------------------
// Demo shell
// ---------------------------------------------------------------------------

/// Shell-wide greeting, read from the tenant's `greeting` property.
struct Greeting(String);

/// Per-request identifier, built once per scope.
struct RequestStamp(Uuid);

/// Logs the tenant's lifecycle events.
struct LifecycleLogger {
    tenant: TenantId,
}

#[async_trait]
impl TenantEvents for LifecycleLogger {
    fn name(&self) -> &str {
        "lifecycle-logger"
    }

    async fn activating(&self) -> anyhow::Result<()> {
        info!(tenant = %self.tenant, "tenant activating");
        Ok(())
    }

    async fn activated(&self) -> anyhow::Result<()> {
        info!(tenant = %self.tenant, "tenant activated");
        Ok(())
    }
}

struct DemoShellFactory;

#[async_trait]
impl ShellFactory for DemoShellFactory {
    async fn create(&self, settings: &TenantSettings) -> anyhow::Result<Arc<dyn ShellContainer>> {
        let greeting = settings
            .properties
            .get("greeting")
            .cloned()
            .unwrap_or_else(|| format!("Welcome to {}", settings.name));

        Ok(Arc::new(
            ShellServices::builder()
                .singleton(Greeting(greeting))
                .scoped(|_| RequestStamp(Uuid::new_v4()))
                .listener(Arc::new(LifecycleLogger {
                    tenant: settings.name.clone(),
                }))
                .build(),
        ))
    }
}
