use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpq::pricing::{self, DiscountRate, Margin};
use crate::domain::discount::Discount;
use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;
use crate::render::{self, RenderOptions};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub discounted_price: Decimal,
    pub line_total: Decimal,
}

impl QuoteLineItem {
    fn priced(product: Product, quantity: u32, rate: DiscountRate) -> Result<Self, DomainError> {
        let discounted_price = pricing::apply_discount(product.list_price, rate)?;
        let line_total = pricing::line_total(discounted_price, quantity)?;
        Ok(Self { product, quantity, discounted_price, line_total })
    }

    pub fn id(&self) -> &ProductId {
        &self.product.id
    }

    pub fn customer_price(&self, margin: Margin) -> Result<Decimal, DomainError> {
        pricing::customer_price(self.discounted_price, margin)
    }

    pub fn customer_line_total(&self, margin: Margin) -> Result<Decimal, DomainError> {
        pricing::customer_line_total(self.discounted_price, margin, self.quantity)
    }
}

/// Quote under construction: ordered lines, selected tier and margin.
///
/// Every mutating method either commits prices consistent with the selected
/// discount or returns an error with the quote untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    lines: Vec<QuoteLineItem>,
    selected_discount: Option<Discount>,
    margin: Margin,
    subtotal: Decimal,
}

impl Quote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[QuoteLineItem] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, id: &ProductId) -> Option<&QuoteLineItem> {
        self.lines.iter().find(|line| line.id() == id)
    }

    pub fn selected_discount(&self) -> Option<&Discount> {
        self.selected_discount.as_ref()
    }

    pub fn discount_rate(&self) -> DiscountRate {
        rate_of(self.selected_discount.as_ref())
    }

    pub fn discount_name(&self) -> &str {
        self.selected_discount.as_ref().map(|discount| discount.name.as_str()).unwrap_or("None")
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    /// Adds a new line at quantity 1, or bumps the quantity of an existing one.
    pub fn add_product(&mut self, product: Product) -> Result<&QuoteLineItem, DomainError> {
        self.add_units(product, 1)
    }

    /// Adds `quantity` units of `product`, on top of any already quoted.
    pub fn add_units(
        &mut self,
        product: Product,
        quantity: u32,
    ) -> Result<&QuoteLineItem, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }
        if let Some(index) = self.position(&product.id) {
            let total = self.lines[index]
                .quantity
                .checked_add(quantity)
                .ok_or(DomainError::AmountOverflow)?;
            self.set_line_quantity(index, total)?;
            return Ok(&self.lines[index]);
        }

        let line = QuoteLineItem::priced(product, quantity, self.discount_rate())?;
        let subtotal = pricing::add_amounts(self.subtotal, line.line_total)?;
        debug!(
            event_name = "quote.line.added",
            product_id = %line.product.id,
            part_number = %line.product.part_number,
            quantity,
            "added quote line"
        );
        self.lines.push(line);
        self.subtotal = subtotal;
        let index = self.lines.len() - 1;
        Ok(&self.lines[index])
    }

    /// Returns `Ok(false)` when no line carries `id`.
    pub fn change_quantity(&mut self, id: &ProductId, quantity: u32) -> Result<bool, DomainError> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        self.set_line_quantity(index, quantity)?;
        Ok(true)
    }

    pub fn remove_line(&mut self, id: &ProductId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let removed = self.lines.remove(index);
        self.subtotal = self.subtotal.saturating_sub(removed.line_total);
        debug!(event_name = "quote.line.removed", product_id = %id, "removed quote line");
        true
    }

    /// Reprices every line under `discount`.
    pub fn select_discount(&mut self, discount: Option<Discount>) -> Result<(), DomainError> {
        let rate = rate_of(discount.as_ref());
        let lines = self
            .lines
            .iter()
            .map(|line| QuoteLineItem::priced(line.product.clone(), line.quantity, rate))
            .collect::<Result<Vec<_>, _>>()?;
        let subtotal = pricing::sum_amounts(lines.iter().map(|line| line.line_total))?;

        self.lines = lines;
        self.subtotal = subtotal;
        self.selected_discount = discount;
        debug!(
            event_name = "quote.discount.selected",
            discount = %self.discount_name(),
            lines = self.lines.len(),
            "selected discount tier"
        );
        Ok(())
    }

    pub fn set_margin(&mut self, margin: Margin) {
        self.margin = margin;
    }

    /// Keeps the selection valid against a freshly loaded tier list: a missing or
    /// stale selection falls back to the first tier, or to none when the list is empty.
    /// Returns whether the selection changed.
    pub fn reconcile_discount_tiers(&mut self, tiers: &[Discount]) -> Result<bool, DomainError> {
        let current = self
            .selected_discount
            .as_ref()
            .and_then(|selected| tiers.iter().find(|tier| tier.id == selected.id));

        match current {
            Some(tier) if Some(tier) == self.selected_discount.as_ref() => Ok(false),
            Some(tier) => {
                let refreshed = tier.clone();
                self.select_discount(Some(refreshed))?;
                Ok(true)
            }
            None => {
                let fallback = tiers.first().cloned();
                let changed = fallback != self.selected_discount;
                self.select_discount(fallback)?;
                Ok(changed)
            }
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Fails when the margin pushes a customer figure past the decimal range.
    pub fn customer_subtotal(&self) -> Result<Decimal, DomainError> {
        self.lines.iter().try_fold(Decimal::ZERO, |total, line| {
            pricing::add_amounts(total, line.customer_line_total(self.margin)?)
        })
    }

    pub fn distribution_profit(&self) -> Result<Decimal, DomainError> {
        self.customer_subtotal()?
            .checked_sub(self.subtotal)
            .ok_or(DomainError::AmountOverflow)
    }

    /// Renders the quote for export. Empty quotes are refused.
    pub fn export(&self, options: &RenderOptions) -> Result<String, DomainError> {
        if self.lines.is_empty() {
            return Err(DomainError::EmptyQuote);
        }
        render::render(&self.lines, self.discount_name(), options)
    }

    /// Commits a new quantity only if the line and the subtotal both stay in range.
    fn set_line_quantity(&mut self, index: usize, quantity: u32) -> Result<(), DomainError> {
        let line_total = pricing::line_total(self.lines[index].discounted_price, quantity)?;
        let subtotal = pricing::sum_amounts(self.lines.iter().enumerate().map(|(at, line)| {
            if at == index {
                line_total
            } else {
                line.line_total
            }
        }))?;

        let line = &mut self.lines[index];
        line.quantity = quantity;
        line.line_total = line_total;
        self.subtotal = subtotal;
        debug!(
            event_name = "quote.line.quantity_changed",
            product_id = %line.product.id,
            quantity,
            "changed quantity"
        );
        Ok(())
    }

    fn position(&self, id: &ProductId) -> Option<usize> {
        self.lines.iter().position(|line| line.id() == id)
    }
}

fn rate_of(discount: Option<&Discount>) -> DiscountRate {
    discount.map(|discount| discount.value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::Quote;
    use crate::cpq::pricing::{DiscountRate, Margin};
    use crate::domain::discount::Discount;
    use crate::domain::product::{Product, ProductId};
    use crate::errors::DomainError;
    use crate::render::{render, RenderOptions};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn product(id: &str, list_price: &str) -> Product {
        Product::new(id, format!("PN-{id}"), format!("Product {id}"), dec(list_price))
            .expect("product")
    }

    fn tier(id: &str, rate: &str) -> Discount {
        Discount::new(id, format!("{id}%"), DiscountRate::new(dec(rate)).expect("rate"))
    }

    #[test]
    fn new_quote_is_empty_with_no_discount() {
        let quote = Quote::new();
        assert!(quote.is_empty());
        assert_eq!(quote.discount_name(), "None");
        assert_eq!(quote.discount_rate(), DiscountRate::ZERO);
        assert_eq!(quote.margin(), Margin::ZERO);
    }

    #[test]
    fn new_line_is_priced_with_selected_discount() {
        let mut quote = Quote::new();
        quote.select_discount(Some(tier("10", "0.10"))).expect("select");
        let line = quote.add_product(product("a", "100")).expect("add");

        assert_eq!(line.quantity, 1);
        assert_eq!(line.discounted_price, dec("90.00"));
        assert_eq!(line.line_total, dec("90.00"));

        quote.change_quantity(&ProductId("a".into()), 3).expect("quantity");
        assert_eq!(quote.lines()[0].line_total, dec("270.00"));
    }

    #[test]
    fn adding_twice_matches_add_then_set_quantity() {
        let mut twice = Quote::new();
        twice.select_discount(Some(tier("5", "0.05"))).expect("select");
        twice.add_product(product("b", "200")).expect("first add");
        twice.add_product(product("b", "200")).expect("second add");

        let mut once = Quote::new();
        once.select_discount(Some(tier("5", "0.05"))).expect("select");
        once.add_product(product("b", "200")).expect("add");
        once.change_quantity(&ProductId("b".into()), 2).expect("quantity");

        assert_eq!(twice.lines().len(), 1);
        assert_eq!(twice.lines(), once.lines());
        assert_eq!(twice.lines()[0].line_total, dec("380.00"));
    }

    #[test]
    fn discount_change_recomputes_every_line() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "50")).expect("add a");
        quote.add_product(product("b", "200")).expect("add b");
        quote.change_quantity(&ProductId("b".into()), 2).expect("quantity");

        quote.select_discount(Some(tier("25", "0.25"))).expect("select");
        assert_eq!(quote.lines()[0].discounted_price, dec("37.5"));
        assert_eq!(quote.lines()[1].discounted_price, dec("150"));
        assert_eq!(quote.lines()[1].line_total, dec("300"));

        quote.select_discount(None).expect("select");
        assert_eq!(quote.lines()[0].discounted_price, dec("50"));
        assert_eq!(quote.subtotal(), dec("450"));
    }

    #[test]
    fn subtotal_sums_lines_priced_under_different_tiers() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "50")).expect("add a");
        let mut lines = quote.lines().to_vec();

        quote.select_discount(Some(tier("5", "0.05"))).expect("select");
        quote.add_product(product("b", "200")).expect("add b");
        quote.change_quantity(&ProductId("b".into()), 2).expect("quantity");
        lines.push(quote.lines()[1].clone());

        // 50.00 + 2 * 190.00
        let rendered = render(&lines, "Mixed", &RenderOptions::default()).expect("render");
        assert!(rendered.contains("Subtotal: $430.00"), "{rendered}");

        // Selecting the tier repriced line a as well: 47.50 + 380.00
        assert_eq!(quote.subtotal(), dec("427.50"));
        assert!(quote
            .export(&RenderOptions::default())
            .expect("export")
            .contains("Subtotal: $427.50"));
    }

    #[test]
    fn add_units_accumulates_on_an_existing_line() {
        let mut quote = Quote::new();
        quote.add_units(product("a", "10"), 3).expect("first");
        let line = quote.add_units(product("a", "10"), 2).expect("second");

        assert_eq!(line.quantity, 5);
        assert_eq!(quote.subtotal(), dec("50"));
        assert_eq!(
            quote.add_units(product("a", "10"), 0).map(|_| ()),
            Err(DomainError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            quote.add_units(product("a", "10"), u32::MAX).map(|_| ()),
            Err(DomainError::AmountOverflow)
        );
        assert_eq!(quote.lines()[0].quantity, 5);
    }

    #[test]
    fn amounts_past_the_decimal_range_leave_state_unchanged() {
        let third = Decimal::MAX / dec("3");
        let mut quote = Quote::new();
        quote.select_discount(Some(tier("50", "0.50"))).expect("select");
        let huge = Product::new("h", "HUGE-1", "Huge", third).expect("product");
        quote.add_product(huge).expect("add");
        quote.change_quantity(&ProductId("h".into()), 4).expect("two thirds of the range");
        let before = quote.clone();

        assert_eq!(
            quote.change_quantity(&ProductId("h".into()), 7),
            Err(DomainError::AmountOverflow)
        );
        assert_eq!(quote.select_discount(None), Err(DomainError::AmountOverflow));
        let max = Product::new("m", "MAX-1", "Max", Decimal::MAX).expect("product");
        assert_eq!(quote.add_product(max).map(|_| ()), Err(DomainError::AmountOverflow));
        assert_eq!(quote, before);
    }

    #[test]
    fn margin_near_one_fails_only_the_customer_figures() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "24.50")).expect("add");
        quote.set_margin("0.9999999999999999999999999999".parse::<Margin>().expect("margin"));

        assert_eq!(quote.subtotal(), dec("24.50"));
        assert_eq!(quote.customer_subtotal(), Err(DomainError::AmountOverflow));
        assert_eq!(quote.distribution_profit(), Err(DomainError::AmountOverflow));

        let customer = RenderOptions {
            show_customer_price: true,
            margin: quote.margin(),
            ..RenderOptions::default()
        };
        assert_eq!(quote.export(&customer), Err(DomainError::AmountOverflow));
        assert!(quote.export(&RenderOptions::default()).is_ok());
    }

    #[test]
    fn invalid_quantity_leaves_state_unchanged() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "10")).expect("add");
        quote.change_quantity(&ProductId("a".into()), 4).expect("quantity");
        let before = quote.clone();

        let error = quote.change_quantity(&ProductId("a".into()), 0).expect_err("zero");
        assert_eq!(error, DomainError::InvalidQuantity { quantity: 0 });
        assert_eq!(quote, before);
    }

    #[test]
    fn quantity_change_for_unknown_line_is_a_noop() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "10")).expect("add");
        assert!(!quote.change_quantity(&ProductId("missing".into()), 2).expect("noop"));
        assert_eq!(quote.lines()[0].quantity, 1);
    }

    #[test]
    fn removing_unknown_line_leaves_sequence_unchanged() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "10")).expect("add a");
        quote.add_product(product("b", "20")).expect("add b");
        let before = quote.lines().to_vec();

        assert!(!quote.remove_line(&ProductId("zzz".into())));
        assert_eq!(quote.lines(), before.as_slice());

        assert!(quote.remove_line(&ProductId("a".into())));
        assert_eq!(quote.lines().len(), 1);
        assert_eq!(quote.lines()[0].product.part_number, "PN-b");
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut quote = Quote::new();
        for id in ["c", "a", "b"] {
            quote.add_product(product(id, "1")).expect("add");
        }
        quote.add_product(product("a", "1")).expect("re-add");

        let order: Vec<&str> = quote.lines().iter().map(|line| line.product.id.0.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }

    #[test]
    fn margin_only_affects_customer_projection() {
        let mut quote = Quote::new();
        quote.select_discount(Some(tier("10", "0.10"))).expect("select");
        quote.add_product(product("a", "100")).expect("add");
        quote.change_quantity(&ProductId("a".into()), 3).expect("quantity");
        let distributor_lines = quote.lines().to_vec();

        quote.set_margin(Margin::new(dec("0.20")).expect("margin"));

        assert_eq!(quote.lines(), distributor_lines.as_slice());
        assert_eq!(quote.subtotal(), dec("270"));
        assert_eq!(quote.customer_subtotal(), Ok(dec("337.5")));
        assert_eq!(quote.distribution_profit(), Ok(dec("67.5")));
    }

    #[test]
    fn stale_selection_falls_back_to_first_tier() {
        let mut quote = Quote::new();
        quote.select_discount(Some(tier("old", "0.30"))).expect("select");
        quote.add_product(product("a", "100")).expect("add");

        let tiers = [tier("15", "0.15"), tier("25", "0.25")];
        assert!(quote.reconcile_discount_tiers(&tiers).expect("reconcile"));
        assert_eq!(quote.selected_discount().map(|d| d.id.0.as_str()), Some("15"));
        assert_eq!(quote.lines()[0].discounted_price, dec("85"));

        assert!(!quote.reconcile_discount_tiers(&tiers).expect("reconcile"));
    }

    #[test]
    fn empty_tier_list_clears_selection() {
        let mut quote = Quote::new();
        quote.select_discount(Some(tier("old", "0.30"))).expect("select");
        quote.add_product(product("a", "100")).expect("add");

        assert!(quote.reconcile_discount_tiers(&[]).expect("reconcile"));
        assert!(quote.selected_discount().is_none());
        assert_eq!(quote.lines()[0].discounted_price, dec("100"));
    }

    #[test]
    fn first_tier_is_selected_when_nothing_is_selected() {
        let mut quote = Quote::new();
        assert!(quote.reconcile_discount_tiers(&[tier("40", "0.40")]).expect("reconcile"));
        assert_eq!(quote.discount_name(), "40%");
    }

    #[test]
    fn export_refuses_empty_quote() {
        let quote = Quote::new();
        assert_eq!(
            quote.export(&RenderOptions::default()).expect_err("empty"),
            DomainError::EmptyQuote
        );
    }

    #[test]
    fn line_items_serialize_with_flattened_product_fields() {
        let mut quote = Quote::new();
        quote.add_product(product("a", "12.50")).expect("add");
        let value = serde_json::to_value(&quote.lines()[0]).expect("serialize");

        assert_eq!(value["part_number"], "PN-a");
        assert_eq!(value["quantity"], 1);
        assert!(value.get("product").is_none());
    }
}
