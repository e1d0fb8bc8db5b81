use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use thiserror::Error;
use uuid::Uuid;

use catalog_core::{Category, CategoryRef, Item, ResolvedItem};

pub mod seed;

pub use seed::{populate, SeedError, SeedReport};

/// SQLite extended result code for a violated foreign key constraint.
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// Foreign keys and the busy timeout are configured on every pooled
    /// connection, not only the first one.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for the `categories` table.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for the `items` table.
    pub fn items(&self) -> ItemRepository {
        ItemRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CategoryRow {
    fn into_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Values required to create a category.
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Result of [`CategoryRepository::delete_if_unreferenced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryDeleteOutcome {
    Deleted,
    Missing,
    /// At least one item still references the category; nothing was removed.
    Referenced,
}

/// Repository for the `categories` table.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Lists every category ordered by name.
    pub async fn list(&self) -> Result<Vec<Category>, CategoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at, updated_at \
             FROM categories ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CategoryRow::into_domain).collect())
    }

    /// Loads a single category.
    pub async fn find(&self, id: &str) -> Result<Option<Category>, CategoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CategoryRow::into_domain))
    }

    pub async fn count(&self) -> Result<u64, CategoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM categories")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }

    /// Inserts a category under a freshly allocated identifier.
    pub async fn insert(&self, record: &NewCategory<'_>) -> Result<Category, CategoryError> {
        let id = Uuid::new_v4().to_string();
        let created_at = to_rfc3339(record.created_at);
        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(record.name)
        .bind(record.description)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(Category {
            id,
            name: record.name.to_string(),
            description: record.description.to_string(),
            created_at: record.created_at,
            updated_at: record.created_at,
        })
    }

    /// Removes the category only when no item references it.
    ///
    /// The reference check and the removal are one statement, so an item
    /// created concurrently cannot be orphaned.
    pub async fn delete_if_unreferenced(
        &self,
        id: &str,
    ) -> Result<CategoryDeleteOutcome, CategoryError> {
        let result = sqlx::query(
            "DELETE FROM categories \
             WHERE id = ? \
               AND NOT EXISTS (SELECT 1 FROM items WHERE items.category_id = categories.id)",
        )
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => return Ok(CategoryDeleteOutcome::Deleted),
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) =>
            {
                return Ok(CategoryDeleteOutcome::Referenced);
            }
            Err(err) => return Err(CategoryError::Database(err)),
        }

        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?) AS present")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let present: i64 = row.get("present");

        Ok(if present != 0 {
            CategoryDeleteOutcome::Referenced
        } else {
            CategoryDeleteOutcome::Missing
        })
    }
}

/// Errors that can occur while accessing categories.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    name: String,
    category_id: String,
    description: String,
    stock: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_domain(self) -> Item {
        Item {
            id: self.id,
            name: self.name,
            category_id: self.category_id,
            description: self.description,
            stock: self.stock,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Item row joined with the name of its category.
#[derive(Debug, sqlx::FromRow)]
struct ResolvedItemRow {
    #[sqlx(flatten)]
    item: ItemRow,
    category_name: Option<String>,
}

impl ResolvedItemRow {
    fn into_domain(self) -> ResolvedItem {
        let item = self.item.into_domain();
        let category = self
            .category_name
            .map(|name| CategoryRef::new(item.category_id.clone(), name));
        ResolvedItem::new(item, category)
    }
}

const RESOLVED_ITEM_SELECT: &str = "\
SELECT i.id, i.name, i.category_id, i.description, i.stock, i.created_at, i.updated_at, \
       c.name AS category_name \
  FROM items AS i \
  LEFT JOIN categories AS c ON c.id = i.category_id";

/// Values written by an item insert or update.
pub struct NewItem<'a> {
    pub name: &'a str,
    pub category_id: &'a str,
    pub description: &'a str,
    pub stock: &'a str,
    pub recorded_at: DateTime<Utc>,
}

/// Repository for the `items` table.
#[derive(Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Lists every item with its category resolved, ordered by item name.
    pub async fn list_resolved(&self) -> Result<Vec<ResolvedItem>, ItemError> {
        let sql = format!("{RESOLVED_ITEM_SELECT} ORDER BY i.name ASC, i.id ASC");
        let rows = sqlx::query_as::<_, ResolvedItemRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ResolvedItemRow::into_domain).collect())
    }

    /// Loads a single item with its category resolved.
    pub async fn find_resolved(&self, id: &str) -> Result<Option<ResolvedItem>, ItemError> {
        let sql = format!("{RESOLVED_ITEM_SELECT} WHERE i.id = ?");
        let row = sqlx::query_as::<_, ResolvedItemRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ResolvedItemRow::into_domain))
    }

    pub async fn find(&self, id: &str) -> Result<Option<Item>, ItemError> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, category_id, description, stock, created_at, updated_at \
             FROM items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ItemRow::into_domain))
    }

    /// Lists the items that reference `category_id`.
    pub async fn list_for_category(&self, category_id: &str) -> Result<Vec<Item>, ItemError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, category_id, description, stock, created_at, updated_at \
             FROM items WHERE category_id = ? ORDER BY name ASC, id ASC",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_domain).collect())
    }

    pub async fn count(&self) -> Result<u64, ItemError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM items")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }

    /// Inserts an item under a freshly allocated identifier.
    pub async fn insert(&self, record: &NewItem<'_>) -> Result<Item, ItemError> {
        let id = Uuid::new_v4().to_string();
        let recorded_at = to_rfc3339(record.recorded_at);
        sqlx::query(
            "INSERT INTO items (id, name, category_id, description, stock, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(record.name)
        .bind(record.category_id)
        .bind(record.description)
        .bind(record.stock)
        .bind(&recorded_at)
        .bind(&recorded_at)
        .execute(&self.pool)
        .await
        .map_err(map_item_write_error)?;

        Ok(Item {
            id,
            name: record.name.to_string(),
            category_id: record.category_id.to_string(),
            description: record.description.to_string(),
            stock: record.stock.to_string(),
            created_at: record.recorded_at,
            updated_at: record.recorded_at,
        })
    }

    /// Overwrites the item stored under `id`, keeping its identifier and
    /// creation time. Returns `None` when no such item exists.
    pub async fn update(&self, id: &str, record: &NewItem<'_>) -> Result<Option<Item>, ItemError> {
        let row = sqlx::query_as::<_, ItemRow>(
            "UPDATE items \
             SET name = ?, category_id = ?, description = ?, stock = ?, updated_at = ? \
             WHERE id = ? \
             RETURNING id, name, category_id, description, stock, created_at, updated_at",
        )
        .bind(record.name)
        .bind(record.category_id)
        .bind(record.description)
        .bind(record.stock)
        .bind(to_rfc3339(record.recorded_at))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_item_write_error)?;

        Ok(row.map(ItemRow::into_domain))
    }

    /// Removes the item, returning whether a row was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool, ItemError> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_item_write_error(err: sqlx::Error) -> ItemError {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) =>
        {
            ItemError::UnknownCategory
        }
        other => ItemError::Database(other),
    }
}

/// Errors that can occur while accessing items.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("referenced category does not exist")]
    UnknownCategory,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
