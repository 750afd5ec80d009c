use quotedesk_core::config::LoadOptions;
use quotedesk_core::cpq::pricing::format_money;
use quotedesk_core::{Product, ProductQuery};

use crate::bootstrap::open_desk;
use crate::commands::{exit, load_config, runtime, CommandResult};

pub fn run(options: LoadOptions, query: Option<String>) -> CommandResult {
    let config = match load_config("search", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let term = query.unwrap_or_default();
    let trimmed = term.trim();
    if !trimmed.is_empty() && trimmed.chars().count() < config.search.min_query_chars {
        return CommandResult::failure(
            "search",
            "validation",
            format!("search needs at least {} characters", config.search.min_query_chars),
            exit::VALIDATION,
        );
    }

    let runtime = match runtime("search") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let desk = match open_desk(&config).await {
            Ok(desk) => desk,
            Err(error) => {
                return CommandResult::failure(
                    "search",
                    error.error_class(),
                    error.to_string(),
                    exit::CATALOG,
                )
            }
        };

        let results = desk.catalog().search(&ProductQuery::classify(trimmed)).await;
        CommandResult::text(render_results(&results))
    })
}

pub(crate) fn render_results(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products found".to_string();
    }

    let width = products.iter().map(|product| product.part_number.len()).max().unwrap_or(0);
    products
        .iter()
        .enumerate()
        .map(|(index, product)| {
            format!(
                "{:>3}. {:<width$}  {}  {}",
                index + 1,
                product.part_number,
                format_money(product.list_price),
                product.description,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quotedesk_core::Product;

    use super::render_results;

    #[test]
    fn results_are_numbered_and_aligned() {
        let products = vec![
            Product::new("1", "AB-100", "Ball valve", Decimal::new(4125, 2)).expect("product"),
            Product::new("2", "AB-100-SS", "Ball valve, stainless", Decimal::new(98, 0))
                .expect("product"),
        ];

        assert_eq!(
            render_results(&products),
            "  1. AB-100     $41.25  Ball valve\n  2. AB-100-SS  $98.00  Ball valve, stainless"
        );
        assert_eq!(render_results(&[]), "No products found");
    }
}
