use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog entry as returned by the catalog gateway. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub part_number: String,
    pub description: String,
    pub list_price: Decimal,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        part_number: impl Into<String>,
        description: impl Into<String>,
        list_price: Decimal,
    ) -> Result<Self, DomainError> {
        let part_number = part_number.into();
        if list_price < Decimal::ZERO {
            return Err(DomainError::NegativeListPrice { part_number, value: list_price });
        }

        Ok(Self {
            id: ProductId(id.into()),
            part_number,
            description: description.into(),
            list_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::Product;
    use crate::errors::DomainError;

    #[test]
    fn negative_list_prices_are_rejected() {
        let error = Product::new("p-1", "AB-100", "Widget", Decimal::new(-1, 0))
            .expect_err("negative price");
        assert!(matches!(error, DomainError::NegativeListPrice { ref part_number, .. } if part_number == "AB-100"));
    }

    #[test]
    fn free_products_are_allowed() {
        let product = Product::new("p-2", "FREE-1", "Sample", Decimal::ZERO).expect("zero price");
        assert_eq!(product.list_price, Decimal::ZERO);
    }
}
