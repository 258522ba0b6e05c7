pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use config::Config;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = cli::Cli::parse();

    match cli.command {
        None | Some(cli::Commands::Serve) => run_server(config).await,

        Some(cli::Commands::Init) => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        Some(cli::Commands::User { command }) => match command {
            cli::UserCommands::Add { username, role } => {
                cmd_user_add(&config, &username, &role).await
            }
            cli::UserCommands::Passwd { username } => cmd_user_passwd(&config, &username).await,
        },
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    info!("Tally v{} starting...", env!("CARGO_PKG_VERSION"));

    let state = api::create_app_state(config.clone()).await?;
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let server_handle = tokio::spawn(async move {
        info!("🌐 Web server running at http://{}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Server running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Server stopped");

    Ok(())
}

async fn cmd_user_add(config: &Config, username: &str, role: &str) -> anyhow::Result<()> {
    let role: auth::role::Role = role.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let store = db::Store::new(&config.general.database_path).await?;

    if store.get_user_by_username(username).await?.is_some() {
        println!("User '{}' already exists.", username);
        return Ok(());
    }

    println!("Password for '{}':", username);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let password = input.trim();

    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    let user = store
        .create_user(username, password, role, &config.security)
        .await?;

    println!("✓ Created user '{}' with role {}", user.username, user.role);

    Ok(())
}

async fn cmd_user_passwd(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = db::Store::new(&config.general.database_path).await?;

    if store.get_user_by_username(username).await?.is_none() {
        println!("User '{}' not found.", username);
        return Ok(());
    }

    println!("New password for '{}':", username);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let password = input.trim();

    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    store
        .update_user_password(username, password, &config.security)
        .await?;

    println!("✓ Password updated for '{}'", username);

    Ok(())
}
