//! looknlink-web: REST + WebSocket server over the tree store.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use clap::Parser;

use crate::store::TreeStore;

use config::{Cli, Config};
use state::AppState;

/// Entry point: parse CLI, open the store, start serving.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::tlog!("looknlink-web starting");
    crate::tlog!("  data directory: {}", config.data_dir.display());

    let db_path = config.db_path();
    let store = TreeStore::open(&db_path)?;
    crate::tlog!(
        "  database: {} ({} leaves)",
        db_path.display(),
        store.leaf_count()?
    );

    let state = AppState::new(store, config.preview_cache).shared();
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    crate::tlog!("looknlink-web listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
