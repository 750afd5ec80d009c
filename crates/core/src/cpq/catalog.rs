use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::discount::Discount;
use crate::domain::product::Product;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog returned malformed data: {0}")]
    Decode(String),
    #[error("catalog is misconfigured: {0}")]
    Configuration(String),
}

/// How a raw search box value is matched against the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductQuery {
    /// No query: a bounded default listing.
    Listing,
    /// Identifier-looking input, matched as a case-insensitive part-number prefix.
    PartNumber(String),
    /// Free text, matched as a case-insensitive substring of part number or description.
    Text(String),
}

impl ProductQuery {
    pub fn classify(raw: &str) -> Self {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            Self::Listing
        } else if looks_like_part_number(&needle) {
            Self::PartNumber(needle)
        } else {
            Self::Text(needle)
        }
    }

    /// Lowercased search needle, `None` for a listing.
    pub fn needle(&self) -> Option<&str> {
        match self {
            Self::Listing => None,
            Self::PartNumber(needle) | Self::Text(needle) => Some(needle),
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::Listing => true,
            Self::PartNumber(needle) => product.part_number.to_lowercase().starts_with(needle),
            Self::Text(needle) => {
                product.part_number.to_lowercase().contains(needle)
                    || product.description.to_lowercase().contains(needle)
            }
        }
    }
}

pub fn looks_like_part_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

/// Filters, orders by part number and caps a product set the way a catalog query would.
pub fn select_products<'a>(
    products: impl IntoIterator<Item = &'a Product>,
    query: &ProductQuery,
    limit: usize,
) -> Vec<Product> {
    let mut matched: Vec<Product> =
        products.into_iter().filter(|product| query.matches(product)).cloned().collect();
    matched.sort_by(|left, right| left.part_number.cmp(&right.part_number));
    matched.truncate(limit);
    matched
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub result_limit: usize,
    pub default_listing_limit: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { result_limit: 50, default_listing_limit: 20 }
    }
}

impl SearchLimits {
    pub fn for_query(&self, query: &ProductQuery) -> usize {
        match query {
            ProductQuery::Listing => self.default_listing_limit,
            ProductQuery::PartNumber(_) | ProductQuery::Text(_) => self.result_limit,
        }
    }
}

/// Remote product/discount source.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn search_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError>;

    async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError>;

    async fn count_products(&self) -> Result<u64, CatalogError>;
}

#[async_trait]
impl<G> CatalogGateway for Box<G>
where
    G: CatalogGateway + ?Sized,
{
    async fn search_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        (**self).search_products(query, limit).await
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError> {
        (**self).list_discounts().await
    }

    async fn count_products(&self) -> Result<u64, CatalogError> {
        (**self).count_products().await
    }
}

/// Gateway wrapper that applies result limits and degrades failures to empty results.
pub struct CatalogClient<G> {
    gateway: G,
    limits: SearchLimits,
}

impl<G: CatalogGateway> CatalogClient<G> {
    pub fn new(gateway: G, limits: SearchLimits) -> Self {
        Self { gateway, limits }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    pub async fn try_search(&self, query: &ProductQuery) -> Result<Vec<Product>, CatalogError> {
        let limit = self.limits.for_query(query);
        let mut products = self.gateway.search_products(query, limit).await?;
        products.truncate(limit);
        debug!(
            event_name = "catalog.search.completed",
            query = ?query,
            results = products.len(),
            "catalog search completed"
        );
        Ok(products)
    }

    pub async fn search(&self, query: &ProductQuery) -> Vec<Product> {
        self.try_search(query).await.unwrap_or_else(|error| {
            warn!(
                event_name = "catalog.search.failed",
                query = ?query,
                error = %error,
                "catalog search failed; showing no results"
            );
            Vec::new()
        })
    }

    pub async fn discount_tiers(&self) -> Vec<Discount> {
        self.gateway.list_discounts().await.unwrap_or_else(|error| {
            warn!(
                event_name = "catalog.discounts.failed",
                error = %error,
                "loading discount tiers failed; continuing without tiers"
            );
            Vec::new()
        })
    }

    /// Exact, case-insensitive part number lookup.
    pub async fn find_part(&self, part_number: &str) -> Result<Option<Product>, CatalogError> {
        let query = ProductQuery::classify(part_number);
        if query == ProductQuery::Listing {
            return Ok(None);
        }
        let wanted = part_number.trim();
        Ok(self
            .try_search(&query)
            .await?
            .into_iter()
            .find(|product| product.part_number.eq_ignore_ascii_case(wanted)))
    }

    pub async fn ping(&self) -> Result<u64, CatalogError> {
        self.gateway.count_products().await
    }
}
