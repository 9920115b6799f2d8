use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use hookwatch_core::config::HookwatchConfig;
use tracing::{info, warn};

mod app;
mod http;
mod ws;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("HOOKWATCH_GIT_SHA"), ")");

/// Webhook receiver with a live browser viewer.
#[derive(Debug, Parser)]
#[command(name = "hookwatch", version = VERSION)]
struct Cli {
    /// TOML config file (default: $HOOKWATCH_CONFIG, then ./hookwatch.toml).
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind, overrides HOST and the config file.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overrides PORT and the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(&self, config: &mut HookwatchConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hookwatch_gateway=info,hookwatch_history=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > HOOKWATCH_CONFIG env > ./hookwatch.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("HOOKWATCH_CONFIG").ok());
    let mut config = HookwatchConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        HookwatchConfig::default()
    });
    cli.apply(&mut config);

    let state = Arc::new(app::AppState::new(config));
    let router = app::build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(state.config.bind_addr()).await?;
    info!(
        addr = %listener.local_addr()?,
        version = VERSION,
        "hookwatch listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("hookwatch stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
