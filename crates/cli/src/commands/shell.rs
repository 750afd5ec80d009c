//! Interactive quote session over stdin/stdout.
//!
//! Each input line is one command. Searches honor the configured debounce
//! window; failures are reported inline and never end the session.

use std::time::Instant;

use anyhow::Context;
use quotedesk_core::config::LoadOptions;
use quotedesk_core::cpq::pricing::{format_money, parse_quantity};
use quotedesk_core::{
    ApplicationError, CatalogGateway, Margin, QuoteDesk, QuoteFormat, RenderOptions, SearchInput,
};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::bootstrap::open_desk;
use crate::commands::discounts::render_tiers;
use crate::commands::search::render_results;
use crate::commands::{exit, load_config, runtime, CommandResult};

const PROMPT: &str = "quotedesk> ";

const HELP: &str = "\
search TERM              search the catalog (part number prefix or free text)
recent [N]               list recent searches, or rerun the N-th one
add N|PART               add the N-th search result or a part number
qty PART N               set a line quantity
rm PART                  remove a line
discounts                list discount tiers
discount NAME|none       select a discount tier
margin RATE              set the distribution margin, e.g. 0.2
show                     show the quote with totals
format bullet|tab|markdown
columns list|customer on|off
notes [TEXT]             set or clear additional notes
export                   render the quote for email
quit";

enum Step {
    Reply(String),
    Quit,
}

pub struct Shell<G> {
    desk: QuoteDesk<G>,
    options: RenderOptions,
    commands: u64,
}

impl<G: CatalogGateway> Shell<G> {
    pub fn new(desk: QuoteDesk<G>, options: RenderOptions) -> Self {
        Self { desk, options, commands: 0 }
    }

    pub fn desk(&self) -> &QuoteDesk<G> {
        &self.desk
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.desk.load_discount_tiers().await;
        output.write_all(b"quotedesk shell. Type `help` for commands.\n").await?;

        let mut lines = input.lines();
        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await.context("failed to read shell input")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            self.commands += 1;
            let reply = match self.execute(line).await {
                Ok(Step::Quit) => break,
                Ok(Step::Reply(reply)) => reply,
                Err(error) => {
                    let error = error.into_interface(format!("shell-{}", self.commands));
                    warn!(
                        event_name = "shell.command.failed",
                        command = %line,
                        error = %error,
                        "shell command failed"
                    );
                    format!("error: {} ({})", error.user_message(), error.message())
                }
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
        }

        output.write_all(b"\n").await?;
        output.flush().await?;
        Ok(())
    }

    async fn execute(&mut self, line: &str) -> Result<Step, ApplicationError> {
        let (command, args) = match line.split_once(char::is_whitespace) {
            Some((command, args)) => (command, args.trim()),
            None => (line, ""),
        };
        debug!(event_name = "shell.command.received", command, "shell command");

        let reply = match command.to_ascii_lowercase().as_str() {
            "quit" | "exit" => return Ok(Step::Quit),
            "help" | "?" => HELP.to_string(),
            "search" => self.search(args).await,
            "recent" => self.recent(args).await,
            "add" => self.add(args).await?,
            "qty" => self.quantity(args)?,
            "rm" | "remove" => self.remove(args)?,
            "discounts" => {
                render_tiers(self.desk.discount_tiers(), self.desk.quote().selected_discount())
            }
            "discount" => self.discount(args)?,
            "margin" => self.margin(args)?,
            "show" => self.show()?,
            "format" => self.format(args)?,
            "columns" => self.columns(args),
            "notes" => self.notes(args),
            "export" => self.desk.export(self.options.clone())?,
            other => format!("unknown command `{other}`; type `help`"),
        };
        Ok(Step::Reply(reply))
    }

    async fn search(&mut self, term: &str) -> String {
        let min_chars = self.desk.search().settings().min_query_chars;
        match self.desk.search_mut().set_term(term, Instant::now()) {
            SearchInput::Cleared => {
                return format!("type at least {min_chars} characters to search");
            }
            SearchInput::Scheduled { due_at } => tokio::time::sleep_until(due_at.into()).await,
        }

        if let Some(ticket) = self.desk.search_mut().poll(Instant::now()) {
            self.desk.run_search(ticket).await;
        }
        render_results(self.desk.search().results())
    }

    async fn recent(&mut self, args: &str) -> String {
        if args.is_empty() {
            let recent = self.desk.search().recent_searches();
            if recent.is_empty() {
                return "No recent searches".to_string();
            }
            return recent
                .iter()
                .enumerate()
                .map(|(index, term)| format!("{:>3}. {term}", index + 1))
                .collect::<Vec<_>>()
                .join("\n");
        }

        let term = match args.parse::<usize>() {
            Ok(position) if position > 0 => {
                self.desk.search().recent_searches().get(position - 1).cloned()
            }
            _ => None,
        };
        match term {
            Some(term) => render_results(self.desk.search_now(&term).await),
            None => format!("no recent search #{args}"),
        }
    }

    async fn add(&mut self, args: &str) -> Result<String, ApplicationError> {
        if args.is_empty() {
            return Ok(usage("add N|PART"));
        }

        let line = match args.parse::<usize>() {
            Ok(position) if position > 0 => self.desk.add_search_result(position - 1)?,
            _ => self.desk.add_part(args).await?,
        };
        Ok(format!("added {} (qty {})", line.product.part_number, line.quantity))
    }

    fn quantity(&mut self, args: &str) -> Result<String, ApplicationError> {
        let Some((part_number, raw)) = args.rsplit_once(char::is_whitespace) else {
            return Ok(usage("qty PART N"));
        };
        let quantity = parse_quantity(raw)?;
        self.desk.change_quantity(part_number, quantity)?;
        Ok(format!("{} quantity set to {quantity}", part_number.trim()))
    }

    fn remove(&mut self, args: &str) -> Result<String, ApplicationError> {
        if args.is_empty() {
            return Ok(usage("rm PART"));
        }
        self.desk.remove_line(args)?;
        Ok(format!("removed {args}"))
    }

    fn discount(&mut self, args: &str) -> Result<String, ApplicationError> {
        if args.is_empty() {
            return Ok(usage("discount NAME|none"));
        }
        if args.eq_ignore_ascii_case("none") {
            self.desk.select_discount(None)?;
        } else {
            self.desk.select_discount(Some(args))?;
        }
        Ok(format!("Discount Applied: {}", self.discount_label()))
    }

    fn margin(&mut self, args: &str) -> Result<String, ApplicationError> {
        if args.is_empty() {
            let percent = (self.desk.quote().margin().value() * Decimal::ONE_HUNDRED).normalize();
            return Ok(format!("margin is {percent}%"));
        }
        let margin: Margin = args.parse()?;
        self.desk.set_margin(margin);
        Ok(format!("margin set to {}%", (margin.value() * Decimal::ONE_HUNDRED).normalize()))
    }

    fn format(&mut self, args: &str) -> Result<String, ApplicationError> {
        if args.is_empty() {
            return Ok(usage("format bullet|tab|markdown"));
        }
        self.options.format = args.parse::<QuoteFormat>()?;
        Ok(format!("export format set to {}", format_name(self.options.format)))
    }

    fn columns(&mut self, args: &str) -> String {
        let mut words = args.split_whitespace();
        let (Some(column), Some(state), None) = (words.next(), words.next(), words.next()) else {
            return usage("columns list|customer on|off");
        };
        let enabled = match state.to_ascii_lowercase().as_str() {
            "on" => true,
            "off" => false,
            _ => return usage("columns list|customer on|off"),
        };
        match column.to_ascii_lowercase().as_str() {
            "list" => self.options.show_list_price = enabled,
            "customer" => self.options.show_customer_price = enabled,
            _ => return usage("columns list|customer on|off"),
        }
        format!("{} price column {}", column.to_ascii_lowercase(), if enabled { "on" } else { "off" })
    }

    fn notes(&mut self, args: &str) -> String {
        if args.is_empty() {
            self.options.additional_notes = None;
            "notes cleared".to_string()
        } else {
            self.options.additional_notes = Some(args.to_string());
            "notes updated".to_string()
        }
    }

    fn show(&self) -> Result<String, ApplicationError> {
        let quote = self.desk.quote();
        if quote.is_empty() {
            return Ok("Quote is empty".to_string());
        }

        let width = quote.lines().iter().map(|line| line.product.part_number.len()).max().unwrap_or(0);
        let mut rows: Vec<String> = quote
            .lines()
            .iter()
            .enumerate()
            .map(|(index, line)| {
                format!(
                    "{:>3}. {:<width$}  x{:<4} {:>10}  {:>12}",
                    index + 1,
                    line.product.part_number,
                    line.quantity,
                    format_money(line.discounted_price),
                    format_money(line.line_total),
                )
            })
            .collect();

        rows.push(format!("Subtotal: {}", format_money(quote.subtotal())));
        rows.push(format!("Discount Applied: {}", self.discount_label()));
        if !quote.margin().is_zero() {
            rows.push(format!("Customer Subtotal: {}", format_money(quote.customer_subtotal()?)));
            rows.push(format!(
                "Distribution Profit: {}",
                format_money(quote.distribution_profit()?)
            ));
        }
        Ok(rows.join("\n"))
    }

    fn discount_label(&self) -> String {
        self.desk
            .quote()
            .selected_discount()
            .map(|discount| discount.label())
            .unwrap_or_else(|| "None".to_string())
    }
}

fn usage(form: &str) -> String {
    format!("usage: {form}")
}

fn format_name(format: QuoteFormat) -> &'static str {
    match format {
        QuoteFormat::BulletList => "bullet_list",
        QuoteFormat::TabDelimited => "tab_delimited",
        QuoteFormat::MarkdownTable => "markdown_table",
    }
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("shell", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("shell") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let desk = match open_desk(&config).await {
            Ok(desk) => desk,
            Err(error) => {
                return CommandResult::failure(
                    "shell",
                    error.error_class(),
                    error.to_string(),
                    exit::CATALOG,
                )
            }
        };

        let mut shell = Shell::new(desk, config.quote.render_options());
        let mut stdout = tokio::io::stdout();
        match shell.run(BufReader::new(tokio::io::stdin()), &mut stdout).await {
            Ok(()) => CommandResult::text(""),
            Err(error) => {
                CommandResult::failure("shell", "io", format!("{error:#}"), exit::EXECUTION)
            }
        }
    })
}
