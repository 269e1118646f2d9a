//! Data model for scraped catalog entities
//!
//! Categories and listings come from discovery and pagination; a
//! [`ProductRecord`] is the merged result of the five per-product sections.

mod category;
mod product;

pub use category::{Category, CategoryListing, ListingEntry};
pub use product::{
    Offer, OfferSummary, PriceHistory, PricePoint, PriceStats, ProductDetail, ProductRecord,
    Review, ReviewKind, ReviewSummary, Section, SectionKind, SimilarProducts,
};
