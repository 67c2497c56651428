/// EVE TS3 Server - keeps TeamSpeak 3 server groups in sync with EVE affiliation
use clap::{Parser, Subcommand};
use eve_ts3_query::TcpConnector;
use eve_ts3_server::{config::ServerConfig, create_router, state::AppState};
use eve_ts3_storage::SqliteUserStore;
use eve_ts3_sync::{HttpValidationAuthority, SyncEngine};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "eve-ts3-server")]
#[command(about = "TeamSpeak 3 server group sync for EVE Online", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync engine and the HTTP server
    Serve {
        /// Configuration file path
        #[arg(short, long, env = "EVETS3_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Write a default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// List stored users
    ListUsers {
        /// Configuration file path
        #[arg(short, long, env = "EVETS3_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run one validation pass and exit
    Validate {
        /// Configuration file path
        #[arg(short, long, env = "EVETS3_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "eve_ts3_server=info,eve_ts3_sync=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            serve(config).await?;
        }
        Commands::Init { output } => {
            init(&output)?;
        }
        Commands::ListUsers { config } => {
            list_users(config).await?;
        }
        Commands::Validate { config } => {
            validate(config).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    let config = ServerConfig::load(path.as_deref())?;
    config.validate()?;
    Ok(config)
}

async fn build_engine(config: &ServerConfig) -> anyhow::Result<Arc<SyncEngine>> {
    let pool = eve_ts3_storage::create_pool(&config.storage.database_url).await?;
    eve_ts3_storage::run_migrations(&pool).await?;
    let store = Arc::new(SqliteUserStore::new(pool));
    tracing::info!("Database connected");

    let connector = Arc::new(TcpConnector::new(
        Duration::from_secs(10),
        config.command_timeout(),
    ));
    let authority = Arc::new(HttpValidationAuthority::new(
        config.validation.endpoint.clone(),
        config.request_timeout(),
    )?);

    Ok(Arc::new(SyncEngine::new(
        config.to_sync_config(),
        connector,
        store,
        authority,
    )))
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Starting EVE TS3 Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);

    let engine = build_engine(&config).await?;
    engine.start().await?;

    let app = create_router(AppState::new(Arc::clone(&engine)));

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            engine.stop().await?;
            return Err(e.into());
        }
    };

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.stop().await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn init(output: &std::path::Path) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists, not overwriting", output.display());
    }

    std::fs::write(output, ServerConfig::template()?)?;
    println!("Wrote default configuration to {}", output.display());

    Ok(())
}

async fn list_users(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let pool = eve_ts3_storage::create_pool(&config.storage.database_url).await?;
    eve_ts3_storage::run_migrations(&pool).await?;

    let users = eve_ts3_storage::users::get_all(&pool).await?;

    println!("Users:");
    for user in users {
        println!(
            "  {} - {} [{} {}] uid={} cldbid={}{}",
            user.eve_char_id,
            user.eve_char_name,
            user.eve_alli_ticker,
            user.eve_corp_ticker,
            user.ts3_uid,
            user.ts3_cldbid,
            if user.active { "" } else { " (inactive)" }
        );
    }

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config).await?;

    let summary = engine.validate_once().await?;

    println!(
        "Checked {} users: {} deactivated, {} moved, {} unchanged, {} failed",
        summary.checked, summary.deactivated, summary.moved, summary.unchanged, summary.failed
    );

    Ok(())
}
