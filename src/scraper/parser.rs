//! JSON response parsing for source payloads
//!
//! This module turns raw source bodies into model types:
//! - Category trees (flattened to leaf categories)
//! - Listing pages (entries plus the reported total)
//! - The five per-product sections
//!
//! Parsing is tolerant of extra and missing optional fields. A body that lacks
//! what a section cannot do without yields `SourceError::Schema`.

use crate::model::{
    Category, ListingEntry, Offer, OfferSummary, PriceHistory, PricePoint, ProductDetail, Review,
    ReviewKind, ReviewSummary, SimilarProducts,
};
use crate::SourceError;
use serde_json::Value;

/// Keys under which the category index nests child categories
const CHILD_KEYS: [&str; 3] = ["categories", "children", "subCategories"];

/// One page of a category listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    /// Total hits the source reports for the whole category
    pub reported_total: Option<u64>,
    pub entries: Vec<ListingEntry>,
}

/// Flattens the category index into leaf categories
///
/// Nodes may nest children under `categories`, `children` or `subCategories`
/// at any depth. Nodes without children are leaves; a leaf's `parent_id` is
/// its nearest ancestor that has an id, and `ancestors` lists all of them.
/// Ids that appear twice keep their first occurrence.
pub fn parse_categories(body: &Value) -> Result<Vec<Category>, SourceError> {
    let roots = tree_roots(body).ok_or_else(|| {
        SourceError::schema("categories", "body is not a JSON object or array")
    })?;

    let mut leaves = Vec::new();
    for node in roots {
        collect_leaves(node, &mut Vec::new(), &mut leaves);
    }

    let mut seen = std::collections::HashSet::new();
    leaves.retain(|c: &Category| seen.insert(c.id));

    if leaves.is_empty() {
        return Err(SourceError::schema("categories", "no categories found"));
    }
    Ok(leaves)
}

/// Top-level nodes: an array, a wrapper object holding one, or a single node
fn tree_roots(body: &Value) -> Option<&[Value]> {
    match body {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(_) if category_id(body).is_none() => {
            Some(child_array(body).unwrap_or(std::slice::from_ref(body)))
        }
        Value::Object(_) => Some(std::slice::from_ref(body)),
        _ => None,
    }
}

fn collect_leaves(node: &Value, path: &mut Vec<u64>, leaves: &mut Vec<Category>) {
    let id = category_id(node);

    if let Some(children) = child_array(node).filter(|c| !c.is_empty()) {
        if let Some(id) = id {
            path.push(id);
        }
        for child in children {
            collect_leaves(child, path, leaves);
        }
        if id.is_some() {
            path.pop();
        }
        return;
    }

    let Some(id) = id else {
        return;
    };
    let name = string_at(node, &["/name", "/title", "/displayName"])
        .unwrap_or_else(|| format!("Category {}", id));

    leaves.push(Category {
        id,
        name,
        parent_id: path.last().copied(),
        ancestors: path.clone(),
        product_count: u64_at(node, &["/productCount", "/numberOfProducts"]),
        url: string_at(node, &["/url", "/href", "/path"]),
    });
}

fn child_array(node: &Value) -> Option<&[Value]> {
    CHILD_KEYS
        .iter()
        .find_map(|key| node.get(key).and_then(Value::as_array))
        .map(Vec::as_slice)
}

/// A category id from the `id` field, or from a `/cl/<id>...` link
fn category_id(node: &Value) -> Option<u64> {
    if let Some(id) = node.get("id").and_then(as_u64) {
        return Some(id);
    }

    let link = string_at(node, &["/url", "/href", "/path"])?;
    let (_, rest) = link.split_once("/cl/")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parses one listing page
///
/// A body without a `products` array is an empty page. Products without a
/// usable id are dropped.
pub fn parse_listing_page(body: &Value, category_id: u64) -> Result<ListingPage, SourceError> {
    if !body.is_object() {
        return Err(SourceError::schema("listing", "body is not a JSON object"));
    }

    let entries = body
        .get("products")
        .and_then(Value::as_array)
        .map(|products| {
            products
                .iter()
                .filter_map(|product| {
                    let product_id = product.get("id").and_then(as_id)?;
                    Some(ListingEntry {
                        category_id,
                        product_id,
                        name: string_at(product, &["/name"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ListingPage {
        reported_total: u64_at(body, &["/totalProductHits", "/total"]),
        entries,
    })
}

/// Parses the initial product detail; a product name is required
pub fn parse_detail(body: &Value) -> Result<ProductDetail, SourceError> {
    let name = string_at(body, &["/product/name", "/name", "/productName"])
        .ok_or_else(|| SourceError::schema("detail", "product name missing"))?;

    Ok(ProductDetail {
        name,
        description: string_at(body, &["/product/description", "/description"]),
        brand: string_at(
            body,
            &["/product/brand/name", "/brand/name", "/product/brand", "/brand"],
        ),
        category_name: string_at(body, &["/product/category/name", "/category/name"]),
        image_url: string_at(
            body,
            &["/product/image/url", "/image/url", "/product/imageUrl", "/imageUrl"],
        ),
    })
}

/// Parses merchant offers and derives the lowest one
///
/// Offers without a readable price are skipped.
pub fn parse_offers(body: &Value) -> Result<OfferSummary, SourceError> {
    let items = match body {
        Value::Array(items) => items,
        _ => body
            .get("offers")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::schema("offers", "offers array missing"))?,
    };

    let offers = items
        .iter()
        .filter_map(|item| {
            let price = item
                .pointer("/price/amount")
                .or_else(|| item.get("price"))
                .and_then(as_f64)?;
            Some(Offer {
                merchant: string_at(item, &["/merchant/name", "/merchantName"]),
                price,
                currency: string_at(item, &["/price/currency", "/currency"]),
                url: string_at(item, &["/url", "/link"]),
                in_stock: item
                    .get("inStock")
                    .and_then(Value::as_bool)
                    .or_else(|| {
                        item.get("stockStatus")
                            .and_then(Value::as_str)
                            .map(|s| s.eq_ignore_ascii_case("IN_STOCK"))
                    }),
            })
        })
        .collect();

    Ok(OfferSummary::from_offers(offers))
}

/// Parses the review overview: aggregate rating plus user and pro reviews
pub fn parse_reviews(body: &Value) -> Result<ReviewSummary, SourceError> {
    if !body.is_object() {
        return Err(SourceError::schema("reviews", "body is not a JSON object"));
    }

    let mut reviews = parse_review_list(body.get("userReviews"), ReviewKind::User);
    reviews.extend(parse_review_list(body.get("proReviews"), ReviewKind::Pro));

    Ok(ReviewSummary::new(
        body.get("averageRating").and_then(as_f64),
        body.get("totalReviews").and_then(as_u64),
        reviews,
    ))
}

fn parse_review_list(list: Option<&Value>, kind: ReviewKind) -> Vec<Review> {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| Review {
                    kind,
                    rating: item
                        .get("rating")
                        .or_else(|| item.get("score"))
                        .and_then(as_f64),
                    title: string_at(item, &["/title", "/headline"]),
                    text: string_at(item, &["/text", "/body", "/summary"]),
                    author: string_at(item, &["/author/name", "/userName", "/author", "/source"]),
                    date: string_at(item, &["/date", "/createdDate", "/publishedDate"]),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parses one interval of price history; points without a price are dropped
pub fn parse_price_history(body: &Value, interval: &str) -> Result<PriceHistory, SourceError> {
    let items = body
        .get("pricePoints")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::schema("price history", "pricePoints array missing"))?;

    let points = items
        .iter()
        .filter_map(|item| {
            let price = item
                .get("price")
                .and_then(|p| as_f64(p).or_else(|| p.get("amount").and_then(as_f64)))?;
            Some(PricePoint {
                date: item
                    .get("date")
                    .or_else(|| item.get("time"))
                    .and_then(|d| match d {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    }),
                price,
            })
        })
        .collect();

    Ok(PriceHistory::new(interval, points))
}

/// Parses similar products into their ids
pub fn parse_similar(body: &Value) -> Result<SimilarProducts, SourceError> {
    let items = body
        .get("products")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::schema("similar", "products array missing"))?;

    Ok(SimilarProducts {
        product_ids: items
            .iter()
            .filter_map(|item| item.get("id").and_then(as_id))
            .collect(),
    })
}

fn string_at(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| {
        value
            .pointer(p)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn u64_at(value: &Value, pointers: &[&str]) -> Option<u64> {
    pointers.iter().find_map(|p| value.pointer(p).and_then(as_u64))
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v: &f64| v.is_finite())
}

fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
