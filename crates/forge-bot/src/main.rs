//! Dynamic slash-command bot process.
//!
//! Wires the record store, the Gemini generator, and the command registrar
//! together, replays persisted commands at startup, then serves the HTTP
//! surface the gateway talks to.

mod admin;
mod config;
mod registry;
mod server;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forge_engine::Registrar;
use forge_llm::{CodeGenerator, GeminiClient, GeminiConfig};
use forge_store::{GuildRepository, HttpRecordStore};

use crate::admin::AdminService;
use crate::config::Config;
use crate::registry::LocalRegistry;
use crate::server::AppState;

/// Dynamic command bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/forge-bot.toml")]
    config: String,

    /// Record store base URL (overrides config file)
    #[arg(long, env = "FORGE_STORE_BASE_URL")]
    store_url: Option<String>,

    /// Root record key (overrides config file)
    #[arg(long, env = "FORGE_ROOT_RECORD_KEY")]
    root_record_key: Option<String>,

    /// Root master key (overrides config file)
    #[arg(long, env = "FORGE_MASTER_KEY")]
    root_master_key: Option<String>,

    /// Gemini API key (overrides config file)
    #[arg(long, env = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,

    /// HTTP server port (overrides config file)
    #[arg(long, env = "FORGE_HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forge_bot=debug,forge_engine=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dynamic command bot");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    if let Some(store_url) = args.store_url {
        config.storage.base_url = store_url;
    }
    if let Some(root_record_key) = args.root_record_key {
        config.storage.root_record_key = root_record_key;
    }
    if let Some(root_master_key) = args.root_master_key {
        config.storage.root_master_key = root_master_key;
    }
    if let Some(gemini_api_key) = args.gemini_api_key {
        config.gemini.api_key = gemini_api_key;
    }
    if let Some(port) = args.http_port {
        config.http.port = port;
    }

    let store = HttpRecordStore::new(&config.storage.base_url);
    let repo = Arc::new(GuildRepository::new(
        store,
        config.storage.root_record_key.clone(),
        config.storage.root_master_key.clone(),
    ));

    let mut gemini = GeminiConfig::new(config.gemini.api_key.clone());
    gemini.model = config.gemini.model.clone();
    let generator = CodeGenerator::new(GeminiClient::new(gemini));

    let registrar = Arc::new(Registrar::new(repo, LocalRegistry::new(), generator));

    let summary = registrar.reconcile_all().await;
    info!(
        guilds = summary.guilds,
        bound = summary.bound,
        skipped = summary.skipped,
        "startup reconciliation finished"
    );

    let state = AppState::new(Arc::new(AdminService::new(registrar)));
    server::serve(state, config.http.port).await
}
