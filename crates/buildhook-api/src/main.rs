//! buildhook webhook server

use buildhook_api::{AppState, routes};
use buildhook_config::settings::{
    DEFAULT_IMAGE_NAMESPACE, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_PORT, DEFAULT_WORKING_DIR,
    resolve_deploy_config,
};
use buildhook_config::{RunnerSettings, ServerSettings, WebhookAuth};
use buildhook_core::event::DEFAULT_TRIGGER_EVENT;
use buildhook_scheduler::JobRunner;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "buildhook-server")]
#[command(about = "Build and deploy on git push", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Base directory for job checkouts
    #[arg(long, env = "WORKING_DIR", default_value = DEFAULT_WORKING_DIR)]
    working_dir: PathBuf,

    /// Shared secret for webhook signatures
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,

    /// Accept deliveries without a signature when no secret is set
    #[arg(long, env = "ALLOW_UNSIGNED_WEBHOOKS")]
    allow_unsigned: bool,

    /// Publish images and roll out services after building
    #[arg(long = "deploy", env = "ENABLE_ECS_DEPLOY")]
    deploy: bool,

    /// Deployment config file (searched for when omitted)
    #[arg(long, env = "DEPLOY_CONFIG")]
    deploy_config: Option<PathBuf>,

    /// Prefix of local image tags
    #[arg(long, env = "IMAGE_NAMESPACE", default_value = DEFAULT_IMAGE_NAMESPACE)]
    image_namespace: String,

    /// Event type that triggers a build
    #[arg(long, env = "TRIGGER_EVENT", default_value = DEFAULT_TRIGGER_EVENT)]
    trigger_event: String,

    /// Maximum number of jobs running at once
    #[arg(long, env = "MAX_CONCURRENT_JOBS", default_value_t = DEFAULT_MAX_CONCURRENT_JOBS)]
    max_concurrent_jobs: usize,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let auth = WebhookAuth::from_parts(args.webhook_secret, args.allow_unsigned)?;
    let deploy_config_path =
        resolve_deploy_config(args.deploy, args.deploy_config, &std::env::current_dir()?);

    let settings = ServerSettings {
        port: args.port,
        trigger_event: args.trigger_event,
        auth,
        runner: RunnerSettings {
            working_dir: args.working_dir,
            image_namespace: args.image_namespace,
            deploy_config_path,
            max_concurrent_jobs: args.max_concurrent_jobs,
        },
    };

    info!(
        working_dir = %settings.runner.working_dir.display(),
        trigger_event = %settings.trigger_event,
        deploy = settings.runner.deploy_enabled(),
        max_concurrent_jobs = settings.runner.max_concurrent_jobs,
        "Configured build runner"
    );

    let runner = Arc::new(JobRunner::from_settings(&settings.runner));
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let state = AppState::new(settings, runner);

    let dispatcher = state.dispatcher.clone();
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    info!("Starting server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown();
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
