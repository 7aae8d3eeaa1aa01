//! Vantage API server binary.
//!
//! Reads configuration from the environment (and `.env`), runs migrations and
//! serves the auth API until Ctrl-C.

use std::net::SocketAddr;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vantage_api::AppState;
use vantage_api::config::ApiConfig;

const DEFAULT_LOG_FILTER: &str = "info,vantage_api=debug,vantage_core=debug";

/// CLI arguments for the API server. Anything not given here comes from the
/// environment.
#[derive(Parser, Debug)]
#[command(name = "vantage_api_server", about = "Vantage API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost:5432/vantage")]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Serve from in-memory stores instead of PostgreSQL. Data is lost on exit.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        bind_addr: args.bind,
        database_url: args.database_url,
        ..ApiConfig::from_env()
    };

    info!(?config, in_memory = args.in_memory, "starting vantage_api_server");

    let state = if args.in_memory {
        AppState::in_memory(config.clone())?
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        vantage_api::migrate(&pool).await?;

        AppState::postgres(config.clone(), pool)?
    };

    let app = vantage_api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, env = ?config.env, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await?;

    // Drain queued activity writes before exiting.
    state.activity.flush().await;
    info!("server stopped");

    Ok(())
}
