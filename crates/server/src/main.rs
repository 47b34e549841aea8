//! Voice Duet entry point
//!
//! Runs one conversation between the two configured agents and, when the
//! server is enabled, streams it to viewers while it runs and keeps serving
//! the finished conversation for `server.linger_secs`.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_duet_agent::{LifecycleController, RunConfig};
use voice_duet_config::{load_settings, Settings};
use voice_duet_server::{
    create_router, init_metrics, run_conversation, AppState, BroadcastSurface, ServerError,
};
use voice_duet_transport::{Connector, SimulatedConnector, WebSocketConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_DUET_ENV").ok();
    let config = load_settings(env.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Voice Duet v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        simulate = config.realtime.simulate,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let connector: Arc<dyn Connector> = if config.realtime.simulate {
        Arc::new(SimulatedConnector::new())
    } else {
        Arc::new(WebSocketConnector::from_config(&config.realtime))
    };
    tracing::info!(connector = connector.name(), "Realtime connector selected");

    let surface = Arc::new(BroadcastSurface::default());
    let controller = LifecycleController::new(
        RunConfig::from_settings(&config),
        connector,
        surface.clone(),
    );
    let state = AppState::new(config.clone(), surface, controller.subscribe_phase());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = if config.server.enabled {
        let listener = bind(&config).await?;
        let app = create_router(state.clone());
        Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        }))
    } else {
        None
    };

    let linger = if server.is_some() {
        config.server.linger()
    } else {
        std::time::Duration::ZERO
    };
    let outcome = run_conversation(&controller, &state, shutdown_signal(), linger).await;

    let _ = stop_tx.send(());
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => tracing::info!("Server shutdown complete"),
            Ok(Err(e)) => tracing::error!(error = %e, "Server stopped with an error"),
            Err(e) => tracing::error!(error = %e, "Server task failed"),
        }
    }

    let report = outcome.context("Conversation failed to start")?;

    println!("{}", report.log.transcript());
    tracing::info!(
        reason = report.end_reason.as_str(),
        turns = report.turns_taken,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Run complete"
    );

    Ok(())
}

async fn bind(config: &Settings) -> Result<tokio::net::TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|_| {
            ServerError::InvalidAddress(format!("{}:{}", config.server.host, config.server.port))
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    tracing::info!("Listening on {}", addr);
    Ok(listener)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, ending conversation...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, ending conversation...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_duet={},tower_http=info", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).boxed()
    };
    subscriber.with(fmt_layer).init();
}
