use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hq_core::{FieldRegistry, QueryEngine, WherePolicy};

mod api;
mod history;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "hq-hub",
    version,
    about = "Proxy history query server"
)]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:8889")]
    bind: String,

    /// Path to config file
    #[arg(long, default_value = "hq-hub.toml")]
    config: PathBuf,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Default, Clone, Debug)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    query: QueryConfig,
}

#[derive(Deserialize, Clone, Debug)]
struct ServerConfig {
    /// Maximum number of transactions kept; the oldest are evicted first.
    #[serde(default = "default_history_capacity")]
    history_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
struct QueryConfig {
    /// Reject queries without a WHERE clause instead of matching everything.
    #[serde(default = "default_require_where")]
    require_where: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            require_where: default_require_where(),
        }
    }
}

fn default_history_capacity() -> usize {
    10_000
}
fn default_require_where() -> bool {
    true
}

impl QueryConfig {
    fn where_policy(&self) -> WherePolicy {
        if self.require_where {
            WherePolicy::Required
        } else {
            WherePolicy::MatchAll
        }
    }
}

fn load_config(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Cannot read config {:?}: {}; using defaults", path, e);
            return Config::default();
        }
    };
    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Invalid config {:?}: {}; using defaults", path, e);
        Config::default()
    })
}

// =============================================================================
// Application State
// =============================================================================

struct AppState {
    history: Arc<history::HistoryStore>,
    engine: QueryEngine,
    start_time: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hq_hub=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config);

    let addr: SocketAddr = match args.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address '{}': {}", args.bind, e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        history: Arc::new(history::HistoryStore::new(config.server.history_capacity)),
        engine: QueryEngine::new(FieldRegistry::with_builtins(), config.query.where_policy()),
        start_time: Instant::now(),
        started_at: chrono::Utc::now(),
    });

    let app = api::router(state);

    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("  hq-hub v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  Query:    http://{}/query", addr);
    tracing::info!("  API:      http://{}/api/status", addr);
    tracing::info!("  Capacity: {} transactions", config.server.history_capacity);
    tracing::info!("  WHERE:    {}", if config.query.require_where { "required" } else { "optional" });
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
