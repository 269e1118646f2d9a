use serde::{Deserialize, Serialize};

/// A catalog category, immutable once discovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    /// Ids of every grouping above this category, root first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Category {
    /// Placeholder for a requested id the source did not list
    pub fn synthetic(id: u64) -> Self {
        Self {
            id,
            name: format!("Category {}", id),
            parent_id: None,
            ancestors: Vec::new(),
            product_count: None,
            url: None,
        }
    }

    /// True if this category or one of its ancestors is in `ids`
    pub fn is_within(&self, ids: &[u64]) -> bool {
        ids.contains(&self.id) || self.ancestors.iter().any(|a| ids.contains(a))
    }
}

/// One product-in-category relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub category_id: u64,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Persisted pagination state and results for one category
///
/// Rewritten after every page, so `next_offset` always points at the first
/// page that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryListing {
    pub category_id: u64,
    pub category_name: String,
    /// Total the source claimed on the first page, if it sent one
    pub reported_total: Option<u64>,
    pub page_size: u32,
    pub next_offset: u64,
    pub pages_fetched: u32,
    /// Entries received so far, repeats included
    pub entries_received: u64,
    pub complete: bool,
    pub entries: Vec<ListingEntry>,
}

impl CategoryListing {
    /// Creates an empty listing positioned at the first page
    pub fn new(category: &Category, page_size: u32, first_offset: u64) -> Self {
        Self {
            category_id: category.id,
            category_name: category.name.clone(),
            reported_total: None,
            page_size,
            next_offset: first_offset,
            pages_fetched: 0,
            entries_received: 0,
            complete: false,
            entries: Vec::new(),
        }
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.product_id.as_str())
    }
}
