use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use quotedesk_core::cpq::pricing::DiscountRate;
use quotedesk_core::domain::discount::Discount;
use quotedesk_core::domain::product::Product;
use quotedesk_core::CatalogError;

pub mod memory;
pub mod rest;
pub mod sql;

pub use memory::InMemoryCatalogGateway;
pub use rest::{RestCatalogGateway, RestCatalogSettings};
pub use sql::SqlCatalogGateway;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http error: {0}")]
    Http(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid catalog settings: {0}")]
    Configuration(String),
}

impl From<RepositoryError> for CatalogError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => Self::Unavailable(error.to_string()),
            RepositoryError::Http(message) => Self::Unavailable(message),
            RepositoryError::Decode(message) => Self::Decode(message),
            RepositoryError::Configuration(message) => Self::Configuration(message),
        }
    }
}

/// A `pricing` record as stored or served by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProductRow {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub item: String,
    #[serde(default)]
    pub description: Option<String>,
    pub list_price: Decimal,
}

impl ProductRow {
    pub fn into_product(self) -> Result<Product, RepositoryError> {
        Product::new(self.id, self.item, self.description.unwrap_or_default(), self.list_price)
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}

/// A `discounts` record. `multiplier` is what remains of the list price,
/// so a 25% tier is stored as `0.75`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DiscountRow {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub discount: String,
    pub multiplier: Decimal,
}

impl DiscountRow {
    pub fn into_discount(self) -> Result<Discount, RepositoryError> {
        let rate = DiscountRate::new(Decimal::ONE - self.multiplier).map_err(|_| {
            RepositoryError::Decode(format!(
                "discount `{}` has multiplier {} outside (0, 1]",
                self.id, self.multiplier
            ))
        })?;
        Ok(Discount::new(self.id, tier_name(&self.discount), rate))
    }
}

fn tier_name(discount: &str) -> String {
    let trimmed = discount.trim();
    if trimmed.ends_with('%') {
        trimmed.to_string()
    } else {
        format!("{trimmed}%")
    }
}

pub(crate) fn rows_into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(ProductRow::into_product).collect()
}

pub(crate) fn rows_into_discounts(
    rows: Vec<DiscountRow>,
) -> Result<Vec<Discount>, RepositoryError> {
    rows.into_iter().map(DiscountRow::into_discount).collect()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{DiscountRow, ProductRow, RepositoryError};
    use quotedesk_core::CatalogError;

    #[test]
    fn product_rows_accept_numeric_ids_and_prices() {
        let row: ProductRow = serde_json::from_value(json!({
            "id": 17,
            "item": "AB-100",
            "description": null,
            "list_price": 125.5
        }))
        .expect("decode row");

        let product = row.into_product().expect("valid product");
        assert_eq!(product.id.0, "17");
        assert_eq!(product.part_number, "AB-100");
        assert_eq!(product.description, "");
        assert_eq!(product.list_price, Decimal::new(1255, 1));
    }

    #[test]
    fn negative_list_price_is_a_decode_error() {
        let row = ProductRow {
            id: "1".into(),
            item: "AB-100".into(),
            description: None,
            list_price: Decimal::new(-1, 0),
        };
        assert!(matches!(row.into_product(), Err(RepositoryError::Decode(_))));
    }

    #[test]
    fn multiplier_becomes_discount_rate() {
        let row: DiscountRow =
            serde_json::from_value(json!({"id": 3, "discount": 25, "multiplier": "0.75"}))
                .expect("decode row");

        let discount = row.into_discount().expect("valid tier");
        assert_eq!(discount.name, "25%");
        assert_eq!(discount.value.value(), Decimal::new(25, 2));
        assert_eq!(discount.label(), "25% (x0.7500)");
    }

    #[test]
    fn out_of_range_multiplier_is_rejected() {
        for multiplier in ["0", "1.2"] {
            let row = DiscountRow {
                id: "d".into(),
                discount: "x".into(),
                multiplier: multiplier.parse().expect("decimal"),
            };
            let error = row.into_discount().expect_err("out of range");
            assert!(matches!(CatalogError::from(error), CatalogError::Decode(_)));
        }
    }

    #[test]
    fn zero_percent_tier_is_a_no_op() {
        let row = DiscountRow { id: "d0".into(), discount: "0%".into(), multiplier: Decimal::ONE };
        let discount = row.into_discount().expect("no-op tier");
        assert_eq!(discount.name, "0%");
        assert_eq!(discount.value.multiplier(), Decimal::ONE);
    }
}
