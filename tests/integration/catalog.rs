//! A mock catalog source served by wiremock

use price_harvest::config::Config;
use price_harvest::scraper::{run_pipeline, Mode};
use price_harvest::source::HttpTransport;
use price_harvest::output::RunReport;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CATEGORY_ID: u64 = 10;

/// HTTP status each product endpoint answers with
#[derive(Debug, Clone)]
pub struct ProductFixture {
    pub id: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub detail_status: u16,
    pub offers_status: u16,
    pub reviews_status: u16,
}

impl ProductFixture {
    pub fn ok(id: &'static str, name: &'static str, price: f64) -> Self {
        Self {
            id,
            name,
            price,
            detail_status: 200,
            offers_status: 200,
            reviews_status: 200,
        }
    }
}

/// Creates a config pointing at the mock server with no pacing
pub fn test_config(server: &MockServer, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.base_url = server.uri();
    config.scheduler.min_delay_ms = 0;
    config.scheduler.max_delay_ms = 0;
    config.scheduler.max_attempts = 2;
    config.scheduler.backoff_base_ms = 1;
    config.scheduler.max_backoff_ms = 5;
    config.listing.page_size = 50;
    config.products.price_history_intervals = vec!["THREE_MONTHS".to_string()];
    config.output.data_dir = data_dir.to_string_lossy().to_string();
    config
}

pub async fn run(config: Config, mode: Mode) -> RunReport {
    let transport = Arc::new(HttpTransport::new(&config.source).expect("client"));
    run_pipeline(config, "test-hash", mode, transport)
        .await
        .expect("run completes")
}

pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

fn json_response(status: u16, body: Value) -> ResponseTemplate {
    if status == 200 {
        ResponseTemplate::new(200).set_body_json(body)
    } else {
        ResponseTemplate::new(status)
    }
}

/// Mounts the category index, a single-page listing, and every product endpoint
pub async fn mount_catalog(server: &MockServer, products: &[ProductFixture]) {
    Mock::given(method("GET"))
        .and(path_regex(r"/category-edge-rest/public/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "categories": [{
                "id": 1,
                "name": "Home",
                "categories": [{ "id": CATEGORY_ID, "name": "Kettles" }]
            }]
        })))
        .mount(server)
        .await;

    let listed: Vec<Value> = products
        .iter()
        .map(|p| json!({ "id": p.id, "name": p.name }))
        .collect();
    Mock::given(method("GET"))
        .and(path_regex(format!(r"/search/category/v4/[^/]+/{}$", CATEGORY_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalProductHits": products.len(),
            "products": listed
        })))
        .mount(server)
        .await;

    for product in products {
        mount_product(server, product).await;
    }
}

async fn mount_product(server: &MockServer, product: &ProductFixture) {
    let id = product.id;

    Mock::given(method("GET"))
        .and(path_regex(format!(r"/initial/[^/]+/\d+/{}$", id)))
        .respond_with(json_response(
            product.detail_status,
            json!({
                "product": {
                    "name": product.name,
                    "description": format!("{} description", product.name),
                    "brand": { "name": "Acme" }
                }
            }),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(format!(r"/offers/[^/]+/{}$", id)))
        .respond_with(json_response(
            product.offers_status,
            json!({
                "offers": [
                    {
                        "merchant": { "name": "Shop A" },
                        "price": { "amount": product.price + 5.0, "currency": "GBP" }
                    },
                    {
                        "merchant": { "name": "Shop B" },
                        "price": { "amount": product.price, "currency": "GBP" }
                    }
                ]
            }),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(format!(r"/reviews/overview/[^/]+/{}/$", id)))
        .respond_with(json_response(
            product.reviews_status,
            json!({
                "averageRating": 4.5,
                "totalReviews": 2,
                "userReviews": [{ "rating": 5, "title": "Great" }],
                "proReviews": [{ "score": 4, "source": "Which?" }]
            }),
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(format!(r"/pricehistory/product/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pricePoints": [
                { "date": "2024-01-01", "price": product.price + 10.0 },
                { "date": "2024-02-01", "price": product.price }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(format!(r"/similar/[^/]+/\d+/{}$", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [{ "id": "900" }, { "id": "901" }]
        })))
        .mount(server)
        .await;
}
