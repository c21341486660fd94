use std::net::SocketAddr;
use std::path::Path;

use skills_assessment::{
    config::{get_config, init_config},
    database::{pool::create_pool, seed::load_seed_file, Stores},
    routes, AppState,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    init_config()?;
    let config = get_config();

    let stores = match &config.database_url {
        Some(url) => Stores::postgres(create_pool(url).await?),
        None => {
            info!("DATABASE_URL not set, keeping data in memory");
            Stores::in_memory()
        }
    };

    if let Some(path) = &config.seed_path {
        let summary = load_seed_file(&stores, Path::new(path)).await?;
        info!("Seed from {}: {:?}", path, summary);
    }

    let app_state = AppState::from_config(stores, config);

    let app = routes::router(app_state, config.api_rps)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
