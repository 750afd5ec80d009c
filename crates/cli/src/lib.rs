pub mod bootstrap;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use quotedesk_core::config::{AppConfig, LoadOptions};

use crate::commands::quote::QuoteArgs;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "quotedesk",
    about = "Quotedesk pricing quote assistant",
    long_about = "Search the parts catalog, build discounted quotes and render them as plain text for email.",
    after_help = "Examples:\n  quotedesk search \"ball valve\"\n  quotedesk quote BV-100:4 GV-200 --discount 25% --format tab\n  quotedesk shell"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Read configuration from this file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending catalog migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo catalog into the configured database")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, catalog connectivity and discount tiers")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Search the catalog by part number prefix or free text")]
    Search {
        #[arg(help = "Search term; omit to list the first products")]
        query: Option<String>,
    },
    #[command(about = "List discount tiers offered by the catalog")]
    Discounts,
    #[command(about = "Build a quote from part numbers and print it")]
    Quote(QuoteCommand),
    #[command(about = "Start an interactive quote session")]
    Shell,
}

#[derive(Debug, Args)]
struct QuoteCommand {
    #[arg(required = true, value_name = "PART[:QTY]")]
    items: Vec<String>,
    #[arg(long, help = "Discount tier name or id, or `none`")]
    discount: Option<String>,
    #[arg(long, help = "Distribution margin, e.g. 0.2 or 20%")]
    margin: Option<String>,
    #[arg(long, help = "bullet_list, tab_delimited or markdown_table")]
    format: Option<String>,
    #[arg(long, help = "Include the list price column")]
    list_price: bool,
    #[arg(long, help = "Include customer price columns")]
    customer_price: bool,
    #[arg(long, help = "Additional notes appended to the quote")]
    notes: Option<String>,
}

impl From<QuoteCommand> for QuoteArgs {
    fn from(command: QuoteCommand) -> Self {
        Self {
            items: command.items,
            discount: command.discount,
            margin: command.margin,
            format: command.format,
            list_price: command.list_price,
            customer_price: command.customer_price,
            notes: command.notes,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = || LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    // Logging follows the loaded config; a broken config is reported by the command itself.
    if let Ok(config) = AppConfig::load(options()) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options()),
        Command::Seed => commands::seed::run(options()),
        Command::Config => CommandResult::text(commands::config::run(options())),
        Command::Doctor { json } => {
            let (output, passed) = commands::doctor::run(options(), json);
            let exit_code = if passed { 0 } else { commands::exit::VERIFICATION };
            CommandResult { exit_code, output }
        }
        Command::Search { query } => commands::search::run(options(), query),
        Command::Discounts => commands::discounts::run(options()),
        Command::Quote(command) => commands::quote::run(options(), command.into()),
        Command::Shell => commands::shell::run(options()),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
