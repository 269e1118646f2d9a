//! Endpoint url construction
//!
//! Turns the configured path templates into concrete source requests. Ids
//! substituted into paths are percent-encoded so a hostile id cannot change
//! the path structure.

use crate::config::Config;
use crate::source::SourceRequest;
use url::Url;

/// Builds requests for every source resource the scraper consumes
#[derive(Debug, Clone)]
pub struct Endpoints {
    api_base: String,
    locale: String,
    granularity: String,
    templates: crate::config::EndpointsConfig,
    user_review_limit: u32,
    pro_review_limit: u32,
    similar_limit: u32,
    headers: Vec<(String, String)>,
}

impl Endpoints {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base: format!(
                "{}/{}/api",
                config.source.base_url.trim_end_matches('/'),
                config.source.country
            ),
            locale: config.source.locale.clone(),
            granularity: config.products.price_history_granularity.clone(),
            templates: config.endpoints.clone(),
            user_review_limit: config.products.user_review_limit,
            pro_review_limit: config.products.pro_review_limit,
            similar_limit: config.products.similar_limit,
            headers: config
                .source
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// The category index
    pub fn categories(&self) -> Result<SourceRequest, url::ParseError> {
        Ok(self.request(self.resolve(&self.templates.categories, None, None)?))
    }

    /// One page of a category's product listing
    pub fn listing_page(
        &self,
        category_id: u64,
        offset: u64,
        size: u32,
    ) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.listing, Some(category_id), None)?;
        Ok(self.request(url)
            .param("size", size)
            .param("offset", offset))
    }

    /// Initial product detail
    pub fn detail(&self, category_id: u64, product_id: &str) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.detail, Some(category_id), Some(product_id))?;
        Ok(self.request(url))
    }

    /// Merchant offers, national new/unknown-condition items, recommended order
    pub fn offers(&self, product_id: &str) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.offers, None, Some(product_id))?;
        Ok(self.request(url)
            .param("af_ORIGIN", "NATIONAL")
            .param("af_ITEM_CONDITION", "NEW,UNKNOWN")
            .param("sortByPreset", "RECOMMENDED"))
    }

    /// Review overview with user and professional reviews
    pub fn reviews(&self, product_id: &str) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.reviews, None, Some(product_id))?;
        Ok(self.request(url)
            .param("limitUser", self.user_review_limit)
            .param("limitPro", self.pro_review_limit)
            .param("lang", "en"))
    }

    /// Price history for one interval
    pub fn price_history(&self, product_id: &str, interval: &str) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.price_history, None, Some(product_id))?;
        Ok(self.request(url)
            .param("merchantId", "")
            .param("selectedInterval", interval)
            .param("filter", "NATIONAL"))
    }

    /// Products the source considers similar
    pub fn similar(&self, category_id: u64, product_id: &str) -> Result<SourceRequest, url::ParseError> {
        let url = self.resolve(&self.templates.similar, Some(category_id), Some(product_id))?;
        Ok(self.request(url).param("size", self.similar_limit))
    }

    /// A GET request carrying the configured session headers
    fn request(&self, url: Url) -> SourceRequest {
        self.headers
            .iter()
            .fold(SourceRequest::get(url), |request, (name, value)| {
                request.header(name, value)
            })
    }

    /// Fills a path template segment by segment onto the api base
    ///
    /// Substituted values are percent-encoded as single path segments, so a
    /// `/` or space inside an id stays inside its segment.
    fn resolve(
        &self,
        template: &str,
        category_id: Option<u64>,
        product_id: Option<&str>,
    ) -> Result<Url, url::ParseError> {
        let category_id = category_id.map(|id| id.to_string());
        let mut url = Url::parse(&self.api_base)?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments.pop_if_empty();

            let relative = template.strip_prefix('/').unwrap_or(template);
            for segment in relative.split('/') {
                let mut filled = segment
                    .replace("{locale}", &self.locale)
                    .replace("{granularity}", &self.granularity);
                if let Some(id) = &category_id {
                    filled = filled.replace("{category_id}", id);
                }
                if let Some(id) = product_id {
                    filled = filled.replace("{product_id}", id);
                }
                segments.push(&filled);
            }
        }

        Ok(url)
    }
}
