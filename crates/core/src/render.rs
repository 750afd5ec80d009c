//! Plain-text quote documents for pasting into email.
//!
//! All layouts share the same title block, column selection and summary; they
//! differ only in how line items are laid out.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::cpq::pricing::{self, format_money, Margin};
use crate::domain::quote::QuoteLineItem;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteFormat {
    BulletList,
    TabDelimited,
    #[default]
    MarkdownTable,
}

impl FromStr for QuoteFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bullet" | "bullets" | "bullet_list" => Ok(Self::BulletList),
            "tab" | "tsv" | "tab_delimited" => Ok(Self::TabDelimited),
            "markdown" | "md" | "markdown_table" => Ok(Self::MarkdownTable),
            other => Err(DomainError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub format: QuoteFormat,
    pub show_list_price: bool,
    pub show_customer_price: bool,
    /// Markup used for customer prices when `show_customer_price` is set.
    pub margin: Margin,
    pub additional_notes: Option<String>,
    /// Cosmetic stamp in the title line; omitted when `None`.
    pub generated_on: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Column {
    PartNumber,
    Description,
    Quantity,
    ListPrice,
    UnitPrice,
    CustomerPrice,
    LineTotal,
    CustomerTotal,
}

impl Column {
    fn header(self) -> &'static str {
        match self {
            Self::PartNumber => "Part Number",
            Self::Description => "Description",
            Self::Quantity => "Qty",
            Self::ListPrice => "List Price",
            Self::UnitPrice => "Unit Price",
            Self::CustomerPrice => "Customer Price",
            Self::LineTotal => "Line Total",
            Self::CustomerTotal => "Customer Total",
        }
    }

    fn bullet_label(self) -> &'static str {
        match self {
            Self::Quantity => "Quantity",
            Self::UnitPrice => "Distributor Price",
            other => other.header(),
        }
    }

    fn cell(self, line: &QuoteLineItem, margin: Margin) -> Result<String, DomainError> {
        let amount = match self {
            Self::PartNumber => return Ok(line.product.part_number.clone()),
            Self::Description => return Ok(line.product.description.clone()),
            Self::Quantity => return Ok(line.quantity.to_string()),
            Self::ListPrice => line.product.list_price,
            Self::UnitPrice => line.discounted_price,
            Self::CustomerPrice => line.customer_price(margin)?,
            Self::LineTotal => line.line_total,
            Self::CustomerTotal => line.customer_line_total(margin)?,
        };
        Ok(format_money(amount))
    }
}

fn columns(options: &RenderOptions) -> Vec<Column> {
    let mut columns = vec![Column::PartNumber, Column::Description, Column::Quantity];
    if options.show_list_price {
        columns.push(Column::ListPrice);
    }
    columns.push(Column::UnitPrice);
    if options.show_customer_price {
        columns.push(Column::CustomerPrice);
    }
    columns.push(Column::LineTotal);
    if options.show_customer_price {
        columns.push(Column::CustomerTotal);
    }
    columns
}

/// Multiplier shown next to the discount name, taken from the first line's
/// realized ratio. Neutral when there are no lines or the list price is zero.
pub fn effective_multiplier(lines: &[QuoteLineItem]) -> Decimal {
    lines
        .first()
        .and_then(|line| line.discounted_price.checked_div(line.product.list_price))
        .unwrap_or(Decimal::ONE)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Builds the whole document. Fails only when a customer figure does not fit
/// the decimal range, in which case nothing is returned.
pub fn render(
    lines: &[QuoteLineItem],
    discount_name: &str,
    options: &RenderOptions,
) -> Result<String, DomainError> {
    let columns = columns(options);
    let rows = lines
        .iter()
        .map(|line| {
            columns
                .iter()
                .map(|column| column.cell(line, options.margin))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    let summary = render_summary(lines, options)?;

    let mut out = match options.generated_on {
        Some(date) => format!("QUOTE SUMMARY ({})\n", date.format("%Y-%m-%d")),
        None => "QUOTE SUMMARY\n".to_string(),
    };
    out.push_str(&format!(
        "Discount Applied: {discount_name} (x{:.4})\n\n",
        effective_multiplier(lines)
    ));

    match options.format {
        QuoteFormat::BulletList => render_bullets(&mut out, lines, &columns, &rows),
        QuoteFormat::TabDelimited => render_tabbed(&mut out, &columns, &rows),
        QuoteFormat::MarkdownTable => render_markdown(&mut out, &columns, &rows),
    }

    out.push('\n');
    out.push_str(&summary);
    Ok(out)
}

fn render_bullets(
    out: &mut String,
    lines: &[QuoteLineItem],
    columns: &[Column],
    rows: &[Vec<String>],
) {
    for (index, (line, cells)) in lines.iter().zip(rows).enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("- {} - {}\n", line.product.part_number, line.product.description));
        for (column, cell) in columns.iter().zip(cells) {
            if matches!(column, Column::PartNumber | Column::Description) {
                continue;
            }
            out.push_str(&format!("  {}: {cell}\n", column.bullet_label()));
        }
    }
}

fn render_tabbed(out: &mut String, columns: &[Column], rows: &[Vec<String>]) {
    let header: Vec<&str> = columns.iter().map(|column| column.header()).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');

    for cells in rows {
        let cells: Vec<String> = cells.iter().map(|cell| tab_cell(cell)).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
}

fn render_markdown(out: &mut String, columns: &[Column], rows: &[Vec<String>]) {
    let header: Vec<&str> = columns.iter().map(|column| column.header()).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));

    let separator: Vec<String> =
        columns.iter().map(|column| "-".repeat(column.header().len() + 2)).collect();
    out.push_str(&format!("|{}|\n", separator.join("|")));

    for cells in rows {
        let cells: Vec<String> = cells.iter().map(|cell| markdown_cell(cell)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
}

fn render_summary(lines: &[QuoteLineItem], options: &RenderOptions) -> Result<String, DomainError> {
    let subtotal = pricing::sum_amounts(lines.iter().map(|line| line.line_total))?;
    let mut out = format!("Subtotal: {}\n", format_money(subtotal));

    if options.show_customer_price {
        let customer_subtotal = lines.iter().try_fold(Decimal::ZERO, |total, line| {
            pricing::add_amounts(total, line.customer_line_total(options.margin)?)
        })?;
        let profit =
            customer_subtotal.checked_sub(subtotal).ok_or(DomainError::AmountOverflow)?;
        out.push_str(&format!("Customer Subtotal: {}\n", format_money(customer_subtotal)));
        out.push_str(&format!("Distribution Profit: {}\n", format_money(profit)));
    }

    if let Some(notes) = options.additional_notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
        out.push_str(&format!("\nAdditional Notes:\n{notes}\n"));
    }
    Ok(out)
}

fn tab_cell(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

fn markdown_cell(value: &str) -> String {
    value.replace(['\r', '\n'], " ").replace('|', "\\|")
}
