use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idempotent::config::{self, Config, StoreBackend};
use idempotent::jobs;
use idempotent::store::{MemoryTokenStore, RedisTokenStore, TimeoutStore, TokenStore};
use idempotent::token::UNUSED_MARKER;
use idempotent::{api, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when an endpoint is configured
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "idempotent"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "idempotent=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => handle_token_command(cfg, command).await,
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Open the configured backend, bounded by the store timeout.
async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn TokenStore>> {
    let inner: Arc<dyn TokenStore> = match cfg.store_backend {
        StoreBackend::Redis => {
            tracing::info!("Connecting to Redis...");
            let store = RedisTokenStore::connect(&cfg.redis_url)
                .await
                .context("failed to connect to Redis")?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-process token store: only safe with a single serving instance");
            let store = MemoryTokenStore::new();
            jobs::sweep::spawn(store.clone(), jobs::sweep::SWEEP_INTERVAL);
            Arc::new(store)
        }
    };
    Ok(Arc::new(TimeoutStore::new(inner, cfg.store_timeout())))
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);
    let store = open_store(&cfg).await?;

    tracing::info!(
        ttl_secs = cfg.token_ttl_secs,
        token_name = %cfg.token_name,
        backend = ?cfg.store_backend,
        "token guard configured"
    );

    let state = AppState::new(cfg, store);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("idempotent listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_token_command(cfg: Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    if cfg.store_backend == StoreBackend::Memory {
        anyhow::bail!("token commands need a shared store; set IDEMPOTENT_STORE=redis");
    }
    let store = open_store(&cfg).await?;

    match cmd {
        cli::TokenCommands::Issue => {
            let state = AppState::new(cfg, store);
            let token = state.issuer.issue().await.context("failed to issue token")?;
            println!(
                "Token issued:\n  Value:   {}\n  Expires: in {}s\n  Use:     {}: {}",
                token,
                state.issuer.ttl().as_secs(),
                state.config.token_name,
                token
            );
        }
        cli::TokenCommands::Revoke { token } => {
            let removed = store
                .atomic_consume(token.trim(), UNUSED_MARKER)
                .await
                .context("failed to revoke token")?;
            if removed {
                println!("Token revoked.");
            } else {
                println!("Token not found, already used, or expired.");
            }
        }
    }
    Ok(())
}
