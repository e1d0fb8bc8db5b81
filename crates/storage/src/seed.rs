//! Sample data for a fresh catalog database.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use catalog_core::{Category, Item};

use crate::{CategoryError, Database, ItemError, NewCategory, NewItem};

const SEED_CATEGORIES: &[(&str, &str)] = &[
    ("category 1", "details of category 1"),
    ("category 2", "details of category 2"),
    ("category 3", "details of category 3"),
];

/// `(name, description, category index, stock)`
const SEED_ITEMS: &[(&str, &str, usize, &str)] = &[
    ("item 1", "item 1 details", 0, "0"),
    ("item 2", "item 2 details", 1, "1"),
    ("item 3", "item 3 details", 2, "2"),
];

/// Records created by [`populate`].
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub categories: Vec<Category>,
    pub items: Vec<Item>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to create category: {0}")]
    Category(#[from] CategoryError),
    #[error("failed to create item: {0}")]
    Item(#[from] ItemError),
}

/// Inserts the sample categories, then the sample items referencing them.
pub async fn populate(database: &Database, now: DateTime<Utc>) -> Result<SeedReport, SeedError> {
    let categories = create_categories(database, now).await?;
    let items = create_items(database, &categories, now).await?;
    Ok(SeedReport { categories, items })
}

async fn create_categories(
    database: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<Category>, SeedError> {
    let repo = database.categories();
    let mut created = Vec::with_capacity(SEED_CATEGORIES.len());
    for (name, description) in SEED_CATEGORIES {
        let category = repo
            .insert(&NewCategory {
                name,
                description,
                created_at: now,
            })
            .await?;
        info!(stage = "seed", id = %category.id, name = %category.name, "created category");
        created.push(category);
    }
    Ok(created)
}

async fn create_items(
    database: &Database,
    categories: &[Category],
    now: DateTime<Utc>,
) -> Result<Vec<Item>, SeedError> {
    let repo = database.items();
    let mut created = Vec::with_capacity(SEED_ITEMS.len());
    for (name, description, category_index, stock) in SEED_ITEMS {
        let Some(category) = categories.get(*category_index) else {
            continue;
        };
        let item = repo
            .insert(&NewItem {
                name,
                category_id: &category.id,
                description,
                stock,
                recorded_at: now,
            })
            .await?;
        info!(stage = "seed", id = %item.id, name = %item.name, category = %category.name, "created item");
        created.push(item);
    }
    Ok(created)
}
