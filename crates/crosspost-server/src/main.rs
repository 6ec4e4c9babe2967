mod cleanup;
mod config;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crosspost_api::{AppState, AppStateInner, session};
use crosspost_bot::Services;
use crosspost_core::{ChannelRegistry, Clock, Ingestor, Linker, SystemClock};
use crosspost_db::{Database, Store};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "crosspost", version, about = "Telegram account and channel linking service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API, the Telegram bot and the token sweeper (default).
    Serve,
    /// Print a session JWT for an owner.
    MintSession {
        owner_id: i64,
        /// Days until the session expires.
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosspost=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::MintSession { owner_id, days } => {
            anyhow::ensure!(days > 0, "--days must be positive");
            let token = session::issue(&config.jwt_secret, owner_id, chrono::Duration::days(days))?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let store: Arc<dyn Store> = Arc::new(Database::open(&config.db_path)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let linker = Linker::new(store.clone(), clock.clone(), config.bot_username.clone());
    let channels = ChannelRegistry::new(store.clone(), clock.clone());
    let ingestor = Ingestor::new(store, clock);

    let cancel = CancellationToken::new();

    let sweeper = tokio::spawn(cleanup::run_sweep_loop(
        linker.clone(),
        config.sweep_interval_secs,
        cancel.clone(),
    ));

    let bot = match &config.bot_token {
        Some(token) => {
            let services = Services {
                linker: linker.clone(),
                channels: channels.clone(),
                ingestor,
            };
            Some(crosspost_bot::start_polling(token, services, cancel.clone()).await?)
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set, telegram bot disabled");
            None
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        linker,
        channels,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = crosspost_api::router(state)
        .layer(cors(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    info!("Crosspost server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(bot) = bot {
        bot.await.ok();
    }
    sweeper.await.ok();

    Ok(())
}

fn cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
