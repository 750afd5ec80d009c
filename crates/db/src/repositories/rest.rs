use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use quotedesk_core::domain::discount::Discount;
use quotedesk_core::domain::product::Product;
use quotedesk_core::{CatalogError, CatalogGateway, ProductQuery};

use super::{rows_into_discounts, rows_into_products, DiscountRow, ProductRow, RepositoryError};

#[derive(Clone, Debug)]
pub struct RestCatalogSettings {
    pub base_url: String,
    pub api_key: SecretString,
    pub products_table: String,
    pub discounts_table: String,
    pub timeout: Duration,
}

/// Catalog served by a PostgREST-style HTTP endpoint (`/rest/v1/{table}`).
pub struct RestCatalogGateway {
    client: Client,
    settings: RestCatalogSettings,
}

impl RestCatalogGateway {
    pub fn new(settings: RestCatalogSettings) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| RepositoryError::Http(error.to_string()))?;
        table_url(&settings.base_url, &settings.products_table)?;
        Ok(Self { client, settings })
    }

    pub fn products_url(&self, query: &ProductQuery, limit: usize) -> Result<Url, RepositoryError> {
        let mut url = table_url(&self.settings.base_url, &self.settings.products_table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(filter) = product_filter(query) {
                pairs.append_pair("or", &filter);
            }
            pairs.append_pair("order", "item.asc");
            pairs.append_pair("limit", &limit.to_string());
        }
        Ok(url)
    }

    pub fn discounts_url(&self) -> Result<Url, RepositoryError> {
        let mut url = table_url(&self.settings.base_url, &self.settings.discounts_table)?;
        url.query_pairs_mut().append_pair("select", "*");
        Ok(url)
    }

    fn count_url(&self) -> Result<Url, RepositoryError> {
        let mut url = table_url(&self.settings.base_url, &self.settings.products_table)?;
        url.query_pairs_mut().append_pair("select", "id").append_pair("limit", "1");
        Ok(url)
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let key = self.settings.api_key.expose_secret();
        self.client
            .get(url)
            .header("apikey", key)
            .header(AUTHORIZATION, format!("Bearer {key}"))
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T, RepositoryError> {
        let path = url.path().to_string();
        let response = self.get(url).send().await.map_err(|err| {
            error!(event_name = "catalog.rest.request_failed", path = %path, error = %err, "catalog request failed");
            RepositoryError::Http(format!("request to {path} failed: {err}"))
        })?;

        if !response.status().is_success() {
            return Err(RepositoryError::Http(format!(
                "catalog endpoint {path} returned {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| RepositoryError::Decode(format!("invalid payload from {path}: {err}")))
    }
}

#[async_trait]
impl CatalogGateway for RestCatalogGateway {
    async fn search_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        let rows: Vec<ProductRow> = self.fetch(self.products_url(query, limit)?).await?;
        debug!(event_name = "catalog.rest.search", query = ?query, results = rows.len(), "rest catalog search");
        Ok(rows_into_products(rows)?)
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError> {
        let rows: Vec<DiscountRow> = self.fetch(self.discounts_url()?).await?;
        Ok(rows_into_discounts(rows)?)
    }

    async fn count_products(&self) -> Result<u64, CatalogError> {
        let response = self
            .get(self.count_url()?)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|err| RepositoryError::Http(format!("count request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(RepositoryError::Http(format!(
                "count request returned {}",
                response.status()
            ))
            .into());
        }

        Ok(total_from_headers(response.headers())?)
    }
}

fn table_url(base_url: &str, table: &str) -> Result<Url, RepositoryError> {
    let base = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{base}/rest/v1/{}", table.trim()))
        .map_err(|error| {
            RepositoryError::Configuration(format!("invalid catalog url `{base}`: {error}"))
        })
}

/// `or=(...)` filter for a query; `None` lists the whole table.
fn product_filter(query: &ProductQuery) -> Option<String> {
    match query {
        ProductQuery::Listing => None,
        ProductQuery::PartNumber(needle) => Some(format!(
            "(item.eq.{},item.ilike.{})",
            quoted(needle),
            quoted(&format!("{needle}*"))
        )),
        ProductQuery::Text(needle) => {
            let pattern = quoted(&format!("*{needle}*"));
            Some(format!("(item.ilike.{pattern},description.ilike.{pattern})"))
        }
    }
}

/// Double-quotes a filter value so commas and parentheses stay literal.
fn quoted(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Reads the total from a `Content-Range` header such as `0-0/42` or `*/0`.
fn total_from_headers(headers: &HeaderMap<HeaderValue>) -> Result<u64, RepositoryError> {
    let raw = headers
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| RepositoryError::Decode("count response has no Content-Range".to_string()))?;

    raw.rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| RepositoryError::Decode(format!("unexpected Content-Range `{raw}`")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};

    use quotedesk_core::{CatalogError, CatalogGateway, ProductQuery};

    use super::{total_from_headers, RestCatalogGateway, RestCatalogSettings};

    fn gateway(base_url: &str) -> RestCatalogGateway {
        RestCatalogGateway::new(RestCatalogSettings {
            base_url: base_url.to_string(),
            api_key: "anon-key".to_string().into(),
            products_table: "pricing".to_string(),
            discounts_table: "discounts".to_string(),
            timeout: Duration::from_secs(2),
        })
        .expect("gateway")
    }

    fn decoded_query(url: &reqwest::Url) -> Vec<(String, String)> {
        url.query_pairs().map(|(key, value)| (key.into_owned(), value.into_owned())).collect()
    }

    #[test]
    fn part_number_search_uses_exact_or_prefix_filter() {
        let url = gateway("https://catalog.example.com/")
            .products_url(&ProductQuery::classify("AB-1"), 50)
            .expect("url");

        assert_eq!(url.path(), "/rest/v1/pricing");
        assert_eq!(
            decoded_query(&url),
            [
                ("select".to_string(), "*".to_string()),
                ("or".to_string(), "(item.eq.\"ab-1\",item.ilike.\"ab-1*\")".to_string()),
                ("order".to_string(), "item.asc".to_string()),
                ("limit".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn text_search_matches_item_or_description() {
        let url = gateway("https://catalog.example.com")
            .products_url(&ProductQuery::classify("ball valve, brass"), 50)
            .expect("url");

        let or = decoded_query(&url)
            .into_iter()
            .find(|(key, _)| key == "or")
            .map(|(_, value)| value)
            .expect("or filter");
        assert_eq!(
            or,
            "(item.ilike.\"*ball valve, brass*\",description.ilike.\"*ball valve, brass*\")"
        );
    }

    #[test]
    fn listing_has_no_filter() {
        let gateway = gateway("https://catalog.example.com");
        let url = gateway.products_url(&ProductQuery::Listing, 20).expect("url");
        assert!(decoded_query(&url).iter().all(|(key, _)| key != "or"));
        assert_eq!(gateway.discounts_url().expect("url").as_str(), "https://catalog.example.com/rest/v1/discounts?select=*");
    }

    #[test]
    fn content_range_total_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-0/42"));
        assert_eq!(total_from_headers(&headers).expect("total"), 42);

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/0"));
        assert_eq!(total_from_headers(&headers).expect("total"), 0);

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/*"));
        assert!(total_from_headers(&headers).is_err());
    }

    #[test]
    fn malformed_base_url_is_rejected_up_front() {
        let result = RestCatalogGateway::new(RestCatalogSettings {
            base_url: "not a url".to_string(),
            api_key: "anon-key".to_string().into(),
            products_table: "pricing".to_string(),
            discounts_table: "discounts".to_string(),
            timeout: Duration::from_secs(2),
        });
        let Err(error) = result else { panic!("malformed url accepted") };
        assert!(matches!(CatalogError::from(error), CatalogError::Configuration(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let gateway = gateway("http://127.0.0.1:9");
        let error = gateway
            .search_products(&ProductQuery::Listing, 20)
            .await
            .expect_err("nothing listens on port 9");
        assert!(matches!(error, CatalogError::Unavailable(_)));
    }
}
