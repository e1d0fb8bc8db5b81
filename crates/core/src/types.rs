use chrono::{DateTime, Utc};
use serde::Serialize;

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Canonical detail location.
    pub fn url(&self) -> String {
        category_url(&self.id)
    }
}

/// An inventory item. `category_id` is a non-owning reference to a [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub description: String,
    pub stock: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Canonical detail location.
    pub fn url(&self) -> String {
        item_url(&self.id)
    }
}

/// Minimal category projection embedded into item views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl CategoryRef {
    pub fn new(id: String, name: String) -> Self {
        let url = category_url(&id);
        Self { id, name, url }
    }
}

/// Item joined with the category it references.
///
/// `category` is `None` only when the reference is dangling, which the
/// store's foreign key prevents for rows written through the repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub stock: String,
    pub category: Option<CategoryRef>,
    pub url: String,
}

impl ResolvedItem {
    pub fn new(item: Item, category: Option<CategoryRef>) -> Self {
        let url = item.url();
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            stock: item.stock,
            category,
            url,
        }
    }
}

pub fn category_url(id: &str) -> String {
    format!("/categories/{id}")
}

pub fn item_url(id: &str) -> String {
    format!("/items/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        let now = Utc::now();
        Item {
            id: "i-1".to_string(),
            name: "Hammer".to_string(),
            category_id: "c-1".to_string(),
            description: "Claw hammer".to_string(),
            stock: "5".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn urls_point_at_detail_pages() {
        let item = sample_item();
        assert_eq!(item.url(), "/items/i-1");
        assert_eq!(CategoryRef::new("c-1".into(), "Tools".into()).url, "/categories/c-1");
    }

    #[test]
    fn resolved_item_keeps_reference_and_location() {
        let category = CategoryRef::new("c-1".into(), "Tools".into());
        let resolved = ResolvedItem::new(sample_item(), Some(category.clone()));
        assert_eq!(resolved.url, "/items/i-1");
        assert_eq!(resolved.category, Some(category));
        assert_eq!(resolved.stock, "5");
    }
}
