use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use goalpost::{api, config::Config, models::SessionRecord};

#[derive(Parser)]
#[command(name = "goalpost")]
#[command(about = "Personal goal and milestone tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,
    /// Create the database schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "goalpost=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config).await?,
        Commands::Migrate => {
            let db = cli.config.open_database()?;
            db.migrate()?;
            tracing::info!("Database schema is up to date");
        }
    }

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = config.open_database()?;
    db.migrate()?;

    let purged = db.with_connection(|conn| SessionRecord::purge_expired(conn, chrono::Utc::now()))?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let state = api::AppState::new(db, config.cookie_key(), config.is_production());
    let app = api::create_router(state);

    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!("Goalpost listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
