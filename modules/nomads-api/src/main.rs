use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use firebase_client::FirebaseApp;
use nomads_common::Config;
use nomads_store::DocumentStore;

mod auth;
mod error;
mod rest;
mod routes;
mod seed;
#[cfg(test)]
mod testing;

use auth::IdentityProvider;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Parser)]
#[command(name = "nomads-api", about = "Active Nomads REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API (default)
    Serve,
    /// Load the bundled event list into the events collection and exit
    Seed {
        /// Also skip titles repeated within the list
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("nomads=info".parse()?)
                .add_directive("firebase_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let firebase = FirebaseApp::from_service_account_json(config.service_account_json()?)?;
    let store: Arc<dyn DocumentStore> = Arc::new(firebase.firestore);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Seed { strict } => {
            let report = seed::seed_from_config(store.as_ref(), &config, strict).await?;
            info!(
                inserted = report.inserted,
                skipped = report.skipped,
                "Seeding finished"
            );
            Ok(())
        }
        Command::Serve => {
            seed::seed_on_startup(store.as_ref(), &config).await?;

            let state = Arc::new(AppState {
                store,
                identity: firebase.auth,
            });
            let app = routes::build_router(state);

            let addr = format!("{}:{}", config.web_host, config.web_port);
            info!("Active Nomads API starting on {addr}");

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
