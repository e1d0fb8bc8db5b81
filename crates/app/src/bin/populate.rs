//! Seeds a catalog database with sample categories and items.
//!
//! Usage: `populate [DATABASE_URL]`. Without an argument the URL is read
//! from the environment the same way the server reads it.

use catalog_storage::{populate, Database};
use catalog_util::{database_url, load_env_file};
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(database_url);
    info!(stage = "seed", "populating catalog database");

    let database = Database::connect(&url).await?;
    database.run_migrations().await?;

    match populate(&database, Utc::now()).await {
        Ok(report) => {
            info!(
                stage = "seed",
                categories = report.categories.len(),
                items = report.items.len(),
                "seeding complete"
            );
            Ok(())
        }
        Err(err) => {
            error!(stage = "seed", error = %err, "seeding failed");
            Err(err.into())
        }
    }
}
