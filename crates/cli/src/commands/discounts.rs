use quotedesk_core::config::LoadOptions;
use quotedesk_core::Discount;

use crate::bootstrap::open_desk;
use crate::commands::{exit, load_config, runtime, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("discounts", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("discounts") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let mut desk = match open_desk(&config).await {
            Ok(desk) => desk,
            Err(error) => {
                return CommandResult::failure(
                    "discounts",
                    error.error_class(),
                    error.to_string(),
                    exit::CATALOG,
                )
            }
        };

        let tiers = desk.load_discount_tiers().await;
        CommandResult::text(render_tiers(tiers, None))
    })
}

/// One tier per line, `*` marking the selected tier.
pub(crate) fn render_tiers(tiers: &[Discount], selected: Option<&Discount>) -> String {
    if tiers.is_empty() {
        return "No discount tiers available".to_string();
    }

    tiers
        .iter()
        .enumerate()
        .map(|(index, tier)| {
            let marker = if selected.is_some_and(|current| current.id == tier.id) { '*' } else { ' ' };
            format!("{marker}{:>2}. {}", index + 1, tier.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
