// src/main.rs
use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod approval;
mod calendar;
mod config;
mod costs;
mod data_service;
mod error;
mod handlers;
mod hours_report;
mod luma_client;
mod models;
mod permissions;
mod project_handlers;
mod resource_handlers;
mod routes;
mod seed;
mod session;
mod task_tree;
mod timesheet_handlers;

#[cfg(test)]
mod test_utils;

use config::Config;
use data_service::DataService;
use luma_client::LumaClient;
use routes::{build_router, AppState};
use session::InMemorySessionStore;

/// TimeOS backend: timesheets, approvals, projects and cost reports over Luma.
#[derive(Parser, Debug)]
#[command(name = "timeos-core")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Wipe every collection and load the demo data
    Reset,
    /// Probe the document store and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration from environment")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = LumaClient::new(config.luma_config()).context("Failed to create Luma client")?;
    let data = DataService::new(Arc::new(client));
    info!("Document store at {}", config.luma_api_url);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, data).await,
        Command::Reset => {
            let counts = seed::reset_store(&data)
                .await
                .context("Failed to reset the document store")?;
            info!("Reset complete: {:?}", counts);
            Ok(())
        }
        Command::Check => {
            let collections = data
                .health_check()
                .await
                .context("Document store health check failed")?;
            info!("Document store reachable ({} collections)", collections.len());
            Ok(())
        }
    }
}

async fn serve(config: &Config, data: DataService) -> Result<()> {
    let state = AppState::new(data, Arc::new(InMemorySessionStore::default()));
    let app = build_router(state);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config =
                RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
                    .await
                    .with_context(|| {
                        format!("Failed to load TLS cert/key from {} and {}", cert_path, key_path)
                    })?;
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Starting server on http://{}", addr);
            axum::serve(listener, app).await.context("HTTP server error")?;
        }
    }
    Ok(())
}
