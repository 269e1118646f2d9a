//! JSON document store
//!
//! Categories, listings and product records are stored as one JSON document
//! each under the data directory:
//!
//! ```text
//! <data-dir>/
//!   categories/categories.json
//!   categories/category_<id>.json
//!   products/product_<id>.json
//!   consolidated/...
//!   raw/<section>/<id>.json
//! ```
//!
//! Every write goes to a temporary sibling first and is renamed into place,
//! so a document on disk is always either the old or the new version.

use crate::model::{Category, CategoryListing, ProductRecord};
use crate::storage::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CATEGORIES_DIR: &str = "categories";
const PRODUCTS_DIR: &str = "products";
const CONSOLIDATED_DIR: &str = "consolidated";
const RAW_DIR: &str = "raw";
const LEDGER_FILE: &str = "ledger.db";

/// Product records read back from disk
#[derive(Debug, Default)]
pub struct ProductScan {
    /// Readable records, ordered by product id
    pub records: Vec<ProductRecord>,

    /// Files that exist but could not be parsed
    pub unreadable: Vec<PathBuf>,
}

/// Reads and writes the persisted JSON documents
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Opens a store rooted at `root`, creating the directory layout
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let store = Self { root: root.into() };
        for dir in [CATEGORIES_DIR, PRODUCTS_DIR, CONSOLIDATED_DIR] {
            fs::create_dir_all(store.root.join(dir))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn consolidated_dir(&self) -> PathBuf {
        self.root.join(CONSOLIDATED_DIR)
    }

    pub fn product_path(&self, product_id: &str) -> PathBuf {
        self.root
            .join(PRODUCTS_DIR)
            .join(format!("product_{}.json", file_stem(product_id)))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(CATEGORIES_DIR).join("categories.json")
    }

    fn listing_path(&self, category_id: u64) -> PathBuf {
        self.root
            .join(CATEGORIES_DIR)
            .join(format!("category_{}.json", category_id))
    }

    // ===== Categories =====

    pub fn save_categories(&self, categories: &[Category]) -> StorageResult<()> {
        write_json_atomic(&self.index_path(), &categories)
    }

    /// Loads the category index, or None if discovery never ran
    pub fn load_categories(&self) -> StorageResult<Option<Vec<Category>>> {
        read_json_optional(&self.index_path())
    }

    pub fn save_listing(&self, listing: &CategoryListing) -> StorageResult<()> {
        write_json_atomic(&self.listing_path(listing.category_id), listing)
    }

    pub fn load_listing(&self, category_id: u64) -> StorageResult<Option<CategoryListing>> {
        read_json_optional(&self.listing_path(category_id))
    }

    /// Loads every listing document, ordered by category id
    ///
    /// Unreadable listings are skipped with a warning.
    pub fn list_listings(&self) -> StorageResult<Vec<CategoryListing>> {
        let mut listings = Vec::new();

        for path in documents_with_prefix(&self.root.join(CATEGORIES_DIR), "category_")? {
            match read_json::<CategoryListing>(&path) {
                Ok(listing) => listings.push(listing),
                Err(e) => tracing::warn!("Skipping unreadable listing {}: {}", path.display(), e),
            }
        }

        listings.sort_by_key(|l| l.category_id);
        Ok(listings)
    }

    // ===== Products =====

    pub fn save_product(&self, record: &ProductRecord) -> StorageResult<()> {
        write_json_atomic(&self.product_path(&record.product_id), record)
    }

    pub fn load_product(&self, product_id: &str) -> StorageResult<Option<ProductRecord>> {
        read_json_optional(&self.product_path(product_id))
    }

    /// Reads every persisted product record
    pub fn load_all_products(&self) -> StorageResult<ProductScan> {
        let mut scan = ProductScan::default();

        for path in documents_with_prefix(&self.root.join(PRODUCTS_DIR), "product_")? {
            match read_json::<ProductRecord>(&path) {
                Ok(record) => scan.records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable product file {}: {}", path.display(), e);
                    scan.unreadable.push(path);
                }
            }
        }

        scan.records
            .sort_by(|a, b| compare_ids(&a.product_id, &b.product_id));
        Ok(scan)
    }

    // ===== Raw bodies and exports =====

    /// Keeps a raw source body for debugging
    pub fn save_raw(&self, section: &str, entity_id: &str, body: &Value) -> StorageResult<()> {
        let dir = self.root.join(RAW_DIR).join(sanitize(section));
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join(format!("{}.json", file_stem(entity_id))), body)
    }

    /// Writes a pretty-printed JSON document into `consolidated/`
    pub fn write_consolidated_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> StorageResult<PathBuf> {
        let path = self.consolidated_dir().join(file_name);
        write_json_atomic(&path, value)?;
        Ok(path)
    }

    /// Writes raw bytes into `consolidated/`
    pub fn write_consolidated_bytes(&self, file_name: &str, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.consolidated_dir().join(file_name);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}

/// Maps an entity id to a file name stem, one stem per id
///
/// Ids made of ASCII letters, digits and `-` are used as they are. Anything
/// else is sanitized and suffixed with a short SHA-256 of the raw id, so two
/// ids that sanitize alike still get separate files. Plain stems never
/// contain `_`, suffixed stems always do.
pub fn file_stem(id: &str) -> String {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return id.to_string();
    }

    let digest = Sha256::digest(id.as_bytes());
    format!("{}_{}", sanitize(id), hex::encode(&digest[..6]))
}

/// Replaces everything but ASCII letters, digits, `-` and `_` with `_`
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Orders numeric ids numerically and everything else lexically
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn documents_with_prefix(dir: &Path, prefix: &str) -> StorageResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_match = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(prefix) && n.ends_with(".json"))
            .unwrap_or(false);
        if is_match {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_json_optional<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Database(format!("invalid document path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
