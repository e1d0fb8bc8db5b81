mod categories;
mod error;
mod form;
mod items;
mod router;
mod telemetry;
mod templates;

use std::{net::SocketAddr, sync::Arc};

use catalog_storage::Database;
use catalog_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    let templates = Arc::new(templates::Templates::new()?);

    let state = router::AppState::new(metrics, database, templates);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
