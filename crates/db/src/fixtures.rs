use rust_decimal::Decimal;

use quotedesk_core::cpq::pricing::DiscountRate;
use quotedesk_core::domain::discount::Discount;
use quotedesk_core::domain::product::Product;

use crate::connection::DbPool;
use crate::repositories::{InMemoryCatalogGateway, RepositoryError, SqlCatalogGateway};

/// Deterministic demo catalog: a handful of industrial parts and four discount tiers.
const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct { id: "seed-001", item: "BV-050", description: "Ball valve, 1/2in brass", cents: 2_450 },
    SeedProduct { id: "seed-002", item: "BV-100", description: "Ball valve, 1in brass", cents: 4_125 },
    SeedProduct { id: "seed-003", item: "BV-100-SS", description: "Ball valve, 1in stainless", cents: 9_800 },
    SeedProduct { id: "seed-004", item: "GV-200", description: "Gate valve, 2in cast iron", cents: 18_900 },
    SeedProduct { id: "seed-005", item: "PG-060", description: "Pressure gauge, 0-60 psi", cents: 1_675 },
    SeedProduct { id: "seed-006", item: "PG-160", description: "Pressure gauge, 0-160 psi", cents: 1_875 },
    SeedProduct { id: "seed-007", item: "FL-100", description: "Flange, 1in weld neck", cents: 3_300 },
    SeedProduct { id: "seed-008", item: "CV-075", description: "Check valve, 3/4in swing", cents: 5_290 },
];

const SEED_DISCOUNTS: &[SeedDiscount] = &[
    SeedDiscount { id: "tier-10", discount: "10%", multiplier: "0.90" },
    SeedDiscount { id: "tier-20", discount: "20%", multiplier: "0.80" },
    SeedDiscount { id: "tier-25", discount: "25%", multiplier: "0.75" },
    SeedDiscount { id: "tier-40", discount: "40%", multiplier: "0.60" },
];

pub struct DemoCatalog;

impl DemoCatalog {
    pub fn products() -> Result<Vec<Product>, RepositoryError> {
        SEED_PRODUCTS.iter().map(SeedProduct::to_product).collect()
    }

    pub fn discounts() -> Result<Vec<Discount>, RepositoryError> {
        SEED_DISCOUNTS.iter().map(SeedDiscount::to_discount).collect()
    }

    pub fn in_memory() -> Result<InMemoryCatalogGateway, RepositoryError> {
        Ok(InMemoryCatalogGateway::new(Self::products()?, Self::discounts()?))
    }

    /// Upserts the demo catalog. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let products = Self::products()?;
        let discounts = Self::discounts()?;

        let mut tx = pool.begin().await?;
        for product in &products {
            sqlx::query(
                "INSERT INTO pricing (id, item, description, list_price)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     item = excluded.item,
                     description = excluded.description,
                     list_price = excluded.list_price",
            )
            .bind(&product.id.0)
            .bind(&product.part_number)
            .bind(&product.description)
            .bind(product.list_price.to_string())
            .execute(&mut *tx)
            .await?;
        }
        for discount in &discounts {
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
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(SeedResult { products_seeded: products.len(), discounts_seeded: discounts.len() })
    }

    /// Checks every seeded row is present and decodes to the expected values.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let gateway = SqlCatalogGateway::new(pool.clone());
        let mut checks = Vec::new();

        for seed in SEED_PRODUCTS {
            let found = gateway
                .find_products(&quotedesk_core::ProductQuery::classify(seed.item), usize::MAX)
                .await?
                .into_iter()
                .find(|product| product.id.0 == seed.id);
            let ok = found.is_some_and(|product| {
                product.part_number == seed.item && product.list_price == seed.list_price()
            });
            checks.push((seed.id, ok));
        }

        let tiers = gateway.find_discounts().await?;
        for seed in SEED_DISCOUNTS {
            let ok = tiers.iter().any(|tier| {
                tier.id.0 == seed.id
                    && seed.multiplier.parse::<Decimal>().ok() == Some(tier.value.multiplier())
            });
            checks.push((seed.id, ok));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo rows, leaving any other catalog data in place.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for seed in SEED_PRODUCTS {
            sqlx::query("DELETE FROM pricing WHERE id = ?").bind(seed.id).execute(&mut *tx).await?;
        }
        for seed in SEED_DISCOUNTS {
            sqlx::query("DELETE FROM discounts WHERE id = ?").bind(seed.id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedProduct {
    id: &'static str,
    item: &'static str,
    description: &'static str,
    cents: i64,
}

impl SeedProduct {
    fn list_price(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    fn to_product(&self) -> Result<Product, RepositoryError> {
        Product::new(self.id, self.item, self.description, self.list_price())
            .map_err(|error| RepositoryError::Decode(error.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedDiscount {
    id: &'static str,
    discount: &'static str,
    multiplier: &'static str,
}

impl SeedDiscount {
    fn to_discount(&self) -> Result<Discount, RepositoryError> {
        let multiplier = self
            .multiplier
            .parse::<Decimal>()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let rate = DiscountRate::new(Decimal::ONE - multiplier)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        Ok(Discount::new(self.id, self.discount, rate))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub products_seeded: usize,
    pub discounts_seeded: usize,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
