pub mod catalog;
pub mod pricing;
pub mod search;

use chrono::Local;
use tracing::{info, warn};

use crate::domain::discount::Discount;
use crate::domain::product::{Product, ProductId};
use crate::domain::quote::{Quote, QuoteLineItem};
use crate::errors::{ApplicationError, DomainError};
use crate::render::RenderOptions;

use self::{
    catalog::{CatalogClient, CatalogGateway},
    pricing::Margin,
    search::{SearchSession, SearchSettings, SearchTicket},
};

/// One user session: the catalog client handed in at startup, the quote under
/// construction, the search box and the discount tiers loaded for the session.
pub struct QuoteDesk<G> {
    catalog: CatalogClient<G>,
    quote: Quote,
    search: SearchSession,
    discount_tiers: Vec<Discount>,
    tiers_loaded: bool,
}

impl<G: CatalogGateway> QuoteDesk<G> {
    pub fn new(catalog: CatalogClient<G>, search: SearchSettings) -> Self {
        Self {
            catalog,
            quote: Quote::new(),
            search: SearchSession::new(search),
            discount_tiers: Vec::new(),
            tiers_loaded: false,
        }
    }

    pub fn catalog(&self) -> &CatalogClient<G> {
        &self.catalog
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn search(&self) -> &SearchSession {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut SearchSession {
        &mut self.search
    }

    pub fn discount_tiers(&self) -> &[Discount] {
        &self.discount_tiers
    }

    /// Loads tiers once per session and reconciles the current selection.
    pub async fn load_discount_tiers(&mut self) -> &[Discount] {
        if !self.tiers_loaded {
            self.discount_tiers = self.catalog.discount_tiers().await;
            self.tiers_loaded = true;
            if let Err(error) = self.quote.reconcile_discount_tiers(&self.discount_tiers) {
                warn!(
                    event_name = "quote.discounts.reconcile_failed",
                    error = %error,
                    "kept previous discount selection"
                );
            }
            info!(
                event_name = "quote.discounts.loaded",
                tiers = self.discount_tiers.len(),
                selected = %self.quote.discount_name(),
                "discount tiers loaded"
            );
        }
        &self.discount_tiers
    }

    /// Runs a dispatched search and publishes its results unless superseded.
    pub async fn run_search(&mut self, ticket: SearchTicket) -> bool {
        let results = self.catalog.search(&ticket.query).await;
        self.search.complete(&ticket, results)
    }

    /// Immediate search for `term`, bypassing the debounce window.
    pub async fn search_now(&mut self, term: &str) -> &[Product] {
        if let Some(ticket) = self.search.submit(term) {
            self.run_search(ticket).await;
        }
        self.search.results()
    }

    pub fn add_product(&mut self, product: Product) -> Result<&QuoteLineItem, DomainError> {
        self.quote.add_product(product)
    }

    /// Adds the `index`-th product (zero based) of the latest search results.
    pub fn add_search_result(&mut self, index: usize) -> Result<&QuoteLineItem, DomainError> {
        let product = self
            .search
            .results()
            .get(index)
            .cloned()
            .ok_or_else(|| DomainError::UnknownPart(format!("#{}", index + 1)))?;
        self.quote.add_product(product)
    }

    /// Looks a part number up in the catalog and adds it to the quote.
    pub async fn add_part(&mut self, part_number: &str) -> Result<&QuoteLineItem, ApplicationError> {
        self.add_part_units(part_number, 1).await
    }

    /// Like [`Self::add_part`], but adds `quantity` units on top of any already quoted.
    pub async fn add_part_units(
        &mut self,
        part_number: &str,
        quantity: u32,
    ) -> Result<&QuoteLineItem, ApplicationError> {
        let product = self
            .catalog
            .find_part(part_number)
            .await?
            .ok_or_else(|| DomainError::UnknownPart(part_number.trim().to_string()))?;
        Ok(self.quote.add_units(product, quantity)?)
    }

    pub fn change_quantity(&mut self, part_number: &str, quantity: u32) -> Result<(), DomainError> {
        let id = self.line_id(part_number)?;
        self.quote.change_quantity(&id, quantity).map(|_| ())
    }

    pub fn remove_line(&mut self, part_number: &str) -> Result<(), DomainError> {
        let id = self.line_id(part_number)?;
        self.quote.remove_line(&id);
        Ok(())
    }

    /// `None` selects no discount; otherwise the tier is matched by id or name.
    pub fn select_discount(&mut self, tier: Option<&str>) -> Result<(), DomainError> {
        let discount = match tier {
            None => None,
            Some(needle) => Some(
                self.discount_tiers
                    .iter()
                    .find(|discount| discount.matches(needle))
                    .cloned()
                    .ok_or_else(|| DomainError::UnknownDiscount(needle.trim().to_string()))?,
            ),
        };
        self.quote.select_discount(discount)
    }

    pub fn set_margin(&mut self, margin: Margin) {
        self.quote.set_margin(margin);
    }

    /// Renders with the session's margin; stamps today's date unless one is given.
    pub fn export(&self, options: RenderOptions) -> Result<String, DomainError> {
        let options = RenderOptions {
            margin: self.quote.margin(),
            generated_on: options.generated_on.or_else(|| Some(Local::now().date_naive())),
            ..options
        };
        self.quote.export(&options)
    }

    fn line_id(&self, part_number: &str) -> Result<ProductId, DomainError> {
        let wanted = part_number.trim();
        self.quote
            .lines()
            .iter()
            .find(|line| line.product.part_number.eq_ignore_ascii_case(wanted))
            .map(|line| line.id().clone())
            .ok_or_else(|| DomainError::UnknownPart(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::cpq::catalog::{
        select_products, CatalogClient, CatalogError, CatalogGateway, ProductQuery, SearchLimits,
    };
    use crate::cpq::pricing::{DiscountRate, Margin};
    use crate::cpq::search::SearchSettings;
    use crate::cpq::QuoteDesk;
    use crate::domain::discount::Discount;
    use crate::domain::product::Product;
    use crate::errors::{ApplicationError, DomainError};
    use crate::render::{QuoteFormat, RenderOptions};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    struct FixtureGateway {
        products: Vec<Product>,
        discounts: Vec<Discount>,
    }

    #[async_trait]
    impl CatalogGateway for FixtureGateway {
        async fn search_products(
            &self,
            query: &ProductQuery,
            limit: usize,
        ) -> Result<Vec<Product>, CatalogError> {
            Ok(select_products(&self.products, query, limit))
        }

        async fn list_discounts(&self) -> Result<Vec<Discount>, CatalogError> {
            Ok(self.discounts.clone())
        }

        async fn count_products(&self) -> Result<u64, CatalogError> {
            Ok(self.products.len() as u64)
        }
    }

    fn desk() -> QuoteDesk<FixtureGateway> {
        let gateway = FixtureGateway {
            products: vec![
                Product::new("p-1", "AB-100", "Valve, ball", dec("100")).expect("product"),
                Product::new("p-2", "CD-200", "Valve, gate", dec("40")).expect("product"),
            ],
            discounts: vec![
                Discount::new("d-10", "10%", DiscountRate::new(dec("0.10")).expect("rate")),
                Discount::new("d-25", "25%", DiscountRate::new(dec("0.25")).expect("rate")),
            ],
        };
        QuoteDesk::new(
            CatalogClient::new(gateway, SearchLimits::default()),
            SearchSettings::default(),
        )
    }

    #[tokio::test]
    async fn loading_tiers_selects_the_first_one_once() {
        let mut desk = desk();
        assert_eq!(desk.load_discount_tiers().await.len(), 2);
        assert_eq!(desk.quote().discount_name(), "10%");

        desk.select_discount(Some("25%")).expect("select");
        desk.load_discount_tiers().await;
        assert_eq!(desk.quote().discount_name(), "25%", "reload keeps the user's choice");
    }

    #[tokio::test]
    async fn search_then_add_by_result_index() {
        let mut desk = desk();
        desk.load_discount_tiers().await;

        let results = desk.search_now("valve,").await;
        assert_eq!(results.len(), 2);
        desk.add_search_result(1).expect("add second result");

        assert_eq!(desk.quote().lines()[0].product.part_number, "CD-200");
        assert_eq!(desk.quote().lines()[0].discounted_price, dec("36.00"));
        assert!(matches!(desk.add_search_result(9), Err(DomainError::UnknownPart(_))));
    }

    #[tokio::test]
    async fn part_numbers_drive_quantity_and_removal() {
        let mut desk = desk();
        desk.add_part("ab-100").await.expect("add");
        desk.change_quantity("AB-100", 3).expect("quantity");
        assert_eq!(desk.quote().subtotal(), dec("300"));

        assert!(matches!(
            desk.add_part("ZZ-999").await,
            Err(ApplicationError::Domain(DomainError::UnknownPart(_)))
        ));
        assert!(desk.remove_line("zz-999").is_err());
        desk.remove_line("ab-100").expect("remove");
        assert!(desk.quote().is_empty());
    }

    #[tokio::test]
    async fn repeated_parts_accumulate_units() {
        let mut desk = desk();
        desk.add_part_units("AB-100", 3).await.expect("first");
        let line = desk.add_part_units("ab-100", 2).await.expect("second");
        assert_eq!(line.quantity, 5);

        desk.add_part("AB-100").await.expect("bump");
        assert_eq!(desk.quote().lines().len(), 1);
        assert_eq!(desk.quote().subtotal(), dec("600"));
    }

    #[tokio::test]
    async fn unknown_tier_leaves_selection_untouched() {
        let mut desk = desk();
        desk.load_discount_tiers().await;
        let error = desk.select_discount(Some("90%")).expect_err("unknown tier");

        assert_eq!(error, DomainError::UnknownDiscount("90%".into()));
        assert_eq!(desk.quote().discount_name(), "10%");

        desk.select_discount(None).expect("clear selection");
        assert_eq!(desk.quote().discount_name(), "None");
    }

    #[tokio::test]
    async fn export_uses_session_margin() {
        let mut desk = desk();
        desk.load_discount_tiers().await;
        desk.add_part("AB-100").await.expect("add");
        desk.set_margin(Margin::new(dec("0.2")).expect("margin"));

        let text = desk
            .export(RenderOptions {
                format: QuoteFormat::TabDelimited,
                show_customer_price: true,
                generated_on: NaiveDate::from_ymd_opt(2026, 1, 2),
                ..RenderOptions::default()
            })
            .expect("export");

        assert!(text.starts_with("QUOTE SUMMARY (2026-01-02)\nDiscount Applied: 10% (x0.9000)\n"));
        assert!(text.contains("AB-100\tValve, ball\t1\t$90.00\t$112.50\t$90.00\t$112.50"));
        assert!(text.contains("Distribution Profit: $22.50"));
    }
}
