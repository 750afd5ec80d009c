use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quotedesk_core::domain::discount::Discount;
use quotedesk_core::domain::product::Product;
use quotedesk_core::{select_products, CatalogError, CatalogGateway, ProductQuery};

/// Process-local catalog, used for demos and tests.
#[derive(Default)]
pub struct InMemoryCatalogGateway {
    products: RwLock<HashMap<String, Product>>,
    discounts: RwLock<Vec<Discount>>,
}

impl InMemoryCatalogGateway {
    pub fn new(products: Vec<Product>, discounts: Vec<Discount>) -> Self {
        let products =
            products.into_iter().map(|product| (product.id.0.clone(), product)).collect();
        Self { products: RwLock::new(products), discounts: RwLock::new(discounts) }
    }

    pub async fn save_product(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.id.0.clone(), product);
    }

    /// Replaces a tier with the same id, otherwise appends it.
    pub async fn save_discount(&self, discount: Discount) {
        let mut discounts = self.discounts.write().await;
        match discounts.iter_mut().find(|existing| existing.id == discount.id) {
            Some(existing) => *existing = discount,
            None => discounts.push(discount),
        }
    }
}

#[async_trait]
impl CatalogGateway for InMemoryCatalogGateway {
    async fn search_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.read().await;
        Ok(select_products(products.values(), query, limit))
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError> {
        Ok(self.discounts.read().await.clone())
    }

    async fn count_products(&self) -> Result<u64, CatalogError> {
        Ok(self.products.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quotedesk_core::cpq::pricing::DiscountRate;
    use quotedesk_core::domain::discount::Discount;
    use quotedesk_core::domain::product::Product;
    use quotedesk_core::{CatalogGateway, ProductQuery};

    use super::InMemoryCatalogGateway;

    fn product(id: &str, part_number: &str, description: &str) -> Product {
        Product::new(id, part_number, description, Decimal::new(2500, 2)).expect("product")
    }

    #[tokio::test]
    async fn search_is_ordered_and_limited() {
        let gateway = InMemoryCatalogGateway::new(
            vec![
                product("3", "CD-300", "Gauge"),
                product("1", "AB-100", "Ball valve"),
                product("2", "AB-200", "Gate valve"),
            ],
            Vec::new(),
        );

        let found = gateway.search_products(&ProductQuery::classify("ab"), 50).await.expect("ok");
        let parts: Vec<&str> = found.iter().map(|product| product.part_number.as_str()).collect();
        assert_eq!(parts, ["AB-100", "AB-200"]);

        let found = gateway.search_products(&ProductQuery::Listing, 2).await.expect("ok");
        assert_eq!(found.len(), 2);
        assert_eq!(gateway.count_products().await.expect("count"), 3);
    }

    #[tokio::test]
    async fn saving_replaces_by_id() {
        let gateway = InMemoryCatalogGateway::default();
        gateway.save_product(product("1", "AB-100", "Old")).await;
        gateway.save_product(product("1", "AB-100", "New")).await;

        let ten = DiscountRate::new(Decimal::new(10, 2)).expect("rate");
        let twenty = DiscountRate::new(Decimal::new(20, 2)).expect("rate");
        gateway.save_discount(Discount::new("d-1", "10%", ten)).await;
        gateway.save_discount(Discount::new("d-2", "20%", twenty)).await;
        gateway.save_discount(Discount::new("d-1", "Ten", ten)).await;

        let found = gateway.search_products(&ProductQuery::Listing, 20).await.expect("ok");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "New");

        let tiers = gateway.list_discounts().await.expect("tiers");
        let names: Vec<&str> = tiers.iter().map(|tier| tier.name.as_str()).collect();
        assert_eq!(names, ["Ten", "20%"]);
    }
}
