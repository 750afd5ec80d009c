use quotedesk_core::config::{AppConfig, LoadOptions};
use quotedesk_core::cpq::pricing::parse_quantity;
use quotedesk_core::{
    ApplicationError, CatalogError, DomainError, Margin, QuoteDesk, QuoteFormat,
};

use crate::bootstrap::{open_desk, DynGateway};
use crate::commands::{exit, load_config, runtime, CommandResult};

#[derive(Clone, Debug, Default)]
pub struct QuoteArgs {
    /// `PART` or `PART:QTY`.
    pub items: Vec<String>,
    /// Tier name or id; `none` clears the automatic first-tier selection.
    pub discount: Option<String>,
    pub margin: Option<String>,
    pub format: Option<String>,
    pub list_price: bool,
    pub customer_price: bool,
    pub notes: Option<String>,
}

pub fn run(options: LoadOptions, args: QuoteArgs) -> CommandResult {
    let config = match load_config("quote", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    if args.items.is_empty() {
        return failure(ApplicationError::Domain(DomainError::EmptyQuote));
    }
    let runtime = match runtime("quote") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let mut desk = match open_desk(&config).await {
            Ok(desk) => desk,
            Err(error) => {
                return CommandResult::failure(
                    "quote",
                    error.error_class(),
                    error.to_string(),
                    exit::CATALOG,
                )
            }
        };

        match build_quote(&mut desk, &config, &args).await {
            Ok(rendered) => CommandResult::text(rendered),
            Err(error) => failure(error),
        }
    })
}

async fn build_quote(
    desk: &mut QuoteDesk<DynGateway>,
    config: &AppConfig,
    args: &QuoteArgs,
) -> Result<String, ApplicationError> {
    desk.load_discount_tiers().await;

    // Repeated parts add up: `BV-100:3 BV-100:2` quotes five.
    for item in &args.items {
        let (part_number, quantity) = parse_item(item)?;
        desk.add_part_units(part_number, quantity.unwrap_or(1)).await?;
    }

    match args.discount.as_deref().map(str::trim) {
        Some(name) if name.eq_ignore_ascii_case("none") => desk.select_discount(None)?,
        Some(name) => desk.select_discount(Some(name))?,
        None => {}
    }
    if let Some(raw) = &args.margin {
        desk.set_margin(raw.parse::<Margin>()?);
    }

    let mut options = config.quote.render_options();
    if let Some(raw) = &args.format {
        options.format = raw.parse::<QuoteFormat>()?;
    }
    options.show_list_price |= args.list_price;
    options.show_customer_price |= args.customer_price;
    options.additional_notes = args.notes.clone();

    Ok(desk.export(options)?)
}

fn parse_item(raw: &str) -> Result<(&str, Option<u32>), DomainError> {
    match raw.split_once(':') {
        Some((part_number, quantity)) => Ok((part_number.trim(), Some(parse_quantity(quantity)?))),
        None => Ok((raw.trim(), None)),
    }
}

fn failure(error: ApplicationError) -> CommandResult {
    let (error_class, exit_code) = match &error {
        ApplicationError::Domain(_) => ("validation", exit::VALIDATION),
        ApplicationError::Catalog(CatalogError::Configuration(_)) => {
            ("config_validation", exit::VALIDATION)
        }
        ApplicationError::Catalog(_) => ("catalog", exit::CATALOG),
    };
    CommandResult::failure("quote", error_class, error.to_string(), exit_code)
}
