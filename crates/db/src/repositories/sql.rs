use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;
use tracing::debug;

use quotedesk_core::domain::discount::Discount;
use quotedesk_core::domain::product::Product;
use quotedesk_core::{CatalogError, CatalogGateway, ProductQuery};

use super::{rows_into_discounts, rows_into_products, DiscountRow, ProductRow, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, item, description, list_price";

/// Catalog backed by the local `pricing` and `discounts` tables.
pub struct SqlCatalogGateway {
    pool: DbPool,
}

impl SqlCatalogGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn find_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match query {
            ProductQuery::Listing => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM pricing ORDER BY item ASC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            ProductQuery::PartNumber(needle) => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM pricing
                     WHERE lower(item) = ?1 OR lower(item) LIKE ?2 ESCAPE '\\'
                     ORDER BY item ASC
                     LIMIT ?3"
                ))
                .bind(needle)
                .bind(format!("{}%", escape_like(needle)))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            ProductQuery::Text(needle) => {
                sqlx::query(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM pricing
                     WHERE lower(item) LIKE ?1 ESCAPE '\\'
                        OR lower(description) LIKE ?1 ESCAPE '\\'
                     ORDER BY item ASC
                     LIMIT ?2"
                ))
                .bind(format!("%{}%", escape_like(needle)))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let rows = rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()?;
        rows_into_products(rows)
    }

    pub async fn find_discounts(&self) -> Result<Vec<Discount>, RepositoryError> {
        let rows = sqlx::query("SELECT id, discount, multiplier FROM discounts ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        let rows = rows.iter().map(row_to_discount).collect::<Result<Vec<_>, _>>()?;
        rows_into_discounts(rows)
    }

    pub async fn save_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pricing (id, item, description, list_price)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 item = excluded.item,
                 description = excluded.description,
                 list_price = excluded.list_price,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(&product.id.0)
        .bind(&product.part_number)
        .bind(&product.description)
        .bind(product.list_price.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_discount(&self, discount: &Discount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO discounts (id, discount, multiplier)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 discount = excluded.discount,
                 multiplier = excluded.multiplier",
        )
        .bind(&discount.id.0)
        .bind(&discount.name)
        .bind(discount.value.multiplier().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn product_count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM pricing").fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl CatalogGateway for SqlCatalogGateway {
    async fn search_products(
        &self,
        query: &ProductQuery,
        limit: usize,
    ) -> Result<Vec<Product>, CatalogError> {
        let products = self.find_products(query, limit).await?;
        debug!(
            event_name = "db.catalog.search",
            query = ?query,
            limit,
            results = products.len(),
            "sqlite catalog search"
        );
        Ok(products)
    }

    async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError> {
        Ok(self.find_discounts().await?)
    }

    async fn count_products(&self) -> Result<u64, CatalogError> {
        Ok(self.product_count().await?)
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<ProductRow, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let item: String = row.try_get("item").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let list_price: String =
        row.try_get("list_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ProductRow { list_price: parse_decimal("list_price", &id, &list_price)?, id, item, description })
}

fn row_to_discount(row: &sqlx::sqlite::SqliteRow) -> Result<DiscountRow, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let discount: String =
        row.try_get("discount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let multiplier: String =
        row.try_get("multiplier").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(DiscountRow { multiplier: parse_decimal("multiplier", &id, &multiplier)?, id, discount })
}

fn parse_decimal(column: &str, id: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    raw.trim().parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("{column} `{raw}` of row `{id}` is not a number: {error}"))
    })
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quotedesk_core::cpq::pricing::DiscountRate;
    use quotedesk_core::domain::discount::Discount;
    use quotedesk_core::domain::product::Product;
    use quotedesk_core::{CatalogError, CatalogGateway, ProductQuery};

    use super::{escape_like, SqlCatalogGateway};
    use crate::{connect_with_settings, migrations};

    async fn gateway() -> SqlCatalogGateway {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let gateway = SqlCatalogGateway::new(pool);

        for (id, part_number, description, cents) in [
            ("1", "AB-100", "Ball valve, brass", 10_000),
            ("2", "AB-110", "Ball valve, steel 100%", 12_500),
            ("3", "CD-300", "Pressure gauge", 4_000),
            ("4", "AB_9", "Underscore part", 100),
        ] {
            let product = Product::new(id, part_number, description, Decimal::new(cents, 2))
                .expect("product");
            gateway.save_product(&product).await.expect("save product");
        }
        gateway
    }

    fn parts(products: &[Product]) -> Vec<&str> {
        products.iter().map(|product| product.part_number.as_str()).collect()
    }

    #[tokio::test]
    async fn part_number_prefix_is_case_insensitive() {
        let gateway = gateway().await;
        let found = gateway.search_products(&ProductQuery::classify("ab-1"), 50).await.expect("ok");
        assert_eq!(parts(&found), ["AB-100", "AB-110"]);
    }

    #[tokio::test]
    async fn text_matches_description_substring() {
        let gateway = gateway().await;
        let found =
            gateway.search_products(&ProductQuery::classify("VALVE, s"), 50).await.expect("ok");
        assert_eq!(parts(&found), ["AB-110"]);
        assert_eq!(found[0].list_price, Decimal::new(12_500, 2));
    }

    #[tokio::test]
    async fn like_wildcards_in_input_are_literal() {
        let gateway = gateway().await;
        let found = gateway.search_products(&ProductQuery::classify("l 100%"), 50).await.expect("ok");
        assert_eq!(parts(&found), ["AB-110"]);

        let found = gateway.search_products(&ProductQuery::classify("b_9"), 50).await.expect("ok");
        assert_eq!(parts(&found), ["AB_9"]);
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
    }

    #[tokio::test]
    async fn listing_is_ordered_and_limited() {
        let gateway = gateway().await;
        let found = gateway.search_products(&ProductQuery::Listing, 3).await.expect("ok");
        assert_eq!(parts(&found), ["AB-100", "AB-110", "AB_9"]);
        assert_eq!(gateway.count_products().await.expect("count"), 4);
    }

    #[tokio::test]
    async fn discounts_round_trip_through_multiplier() {
        let gateway = gateway().await;
        for (id, name, rate) in [("d-25", "25%", "0.25"), ("d-10", "10%", "0.10")] {
            let rate = DiscountRate::new(rate.parse().expect("decimal")).expect("rate");
            gateway.save_discount(&Discount::new(id, name, rate)).await.expect("save");
        }

        let tiers = gateway.list_discounts().await.expect("tiers");
        let names: Vec<&str> = tiers.iter().map(|tier| tier.name.as_str()).collect();
        assert_eq!(names, ["25%", "10%"], "insertion order is kept");
        assert_eq!(tiers[0].value.value(), Decimal::new(25, 2));
    }

    #[tokio::test]
    async fn corrupt_price_is_a_decode_error() {
        let gateway = gateway().await;
        sqlx::query("INSERT INTO pricing (id, item, list_price) VALUES ('9', 'ZZ-900', 'n/a')")
            .execute(gateway.pool())
            .await
            .expect("insert");

        let error = gateway
            .search_products(&ProductQuery::classify("zz-9"), 50)
            .await
            .expect_err("decode failure");
        assert!(matches!(error, CatalogError::Decode(_)));
    }
}
