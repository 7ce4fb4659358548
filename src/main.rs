//! service-records - CRUD services for service-call tasks and inventory
//!
//! Both services are the same generic record resource backed by a MongoDB
//! collection, instantiated with a different record shape and base path.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod api;
mod config;
mod models;
mod store;

use config::Config;
use models::{InventoryItem, Resource, Task};
use store::MongoStore;

#[derive(Parser)]
#[command(name = "service-records")]
#[command(about = "CRUD services for service-call tasks and inventory records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a record service
    Serve {
        /// Which collection to serve
        #[arg(value_enum)]
        service: Service,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Service {
    /// Service-call tasks at /tasks
    Tasks,
    /// Stock movements at /api/inventory
    Inventory,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry RUST_LOG, so load it before logging
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("service_records=info".parse()?),
        )
        .init();

    if let Err(e) = dotenv
        && !e.not_found()
    {
        tracing::warn!(error = %e, "Failed to load .env file");
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            service,
            config,
            port,
            bind,
        } => {
            let mut cfg = if let Some(path) = config {
                Config::load_from(&path)?
            } else {
                Config::load()?
            };

            // Override with CLI args
            let apply_cli = |cfg: &mut Config| {
                if let Some(p) = port {
                    cfg.server.port = p;
                }
                if let Some(b) = bind.clone() {
                    cfg.server.bind = b;
                }
            };

            match service {
                Service::Tasks => {
                    cfg.apply_env(Task::URI_ENV)?;
                    apply_cli(&mut cfg);
                    run_server::<Task>(cfg).await
                }
                Service::Inventory => {
                    cfg.apply_env(InventoryItem::URI_ENV)?;
                    apply_cli(&mut cfg);
                    run_server::<InventoryItem>(cfg).await
                }
            }
        }

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            let cfg = Config::default();
            cfg.save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!("  1. Set [database].uri in the file, or export MONGODB_URI / MONGO_URI");
            println!(
                "  2. Start a service: service-records serve tasks --config {}",
                path.display()
            );

            Ok(())
        }
    }
}

async fn run_server<T: Resource>(config: Config) -> Result<()> {
    let uri = config.database_uri(T::URI_ENV)?;

    // A store that is unreachable at boot is fatal; later outages only fail requests
    let store = MongoStore::<T>::connect(uri, config.database.name.as_deref())
        .await
        .context("Failed to connect to MongoDB")?;

    tracing::info!(
        database = %store.database_name(),
        collection = T::COLLECTION,
        "Connected to MongoDB"
    );

    let state = api::AppState::new(store);
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        service = T::SERVICE,
        "Server running on http://{}{}",
        addr,
        T::BASE_PATH
    );

    axum::serve(listener, app).await?;

    Ok(())
}
