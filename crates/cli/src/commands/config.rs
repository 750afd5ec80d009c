use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quotedesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let catalog = &config.catalog;
    let search = &config.search;
    let quote = &config.quote;
    let field = |key, env_key, value: String| Field { key, env_key, value };

    vec![
        field("catalog.backend", "QUOTEDESK_CATALOG_BACKEND", format!("{:?}", catalog.backend)),
        field("catalog.database_url", "QUOTEDESK_CATALOG_DATABASE_URL", catalog.database_url.clone()),
        field(
            "catalog.max_connections",
            "QUOTEDESK_CATALOG_MAX_CONNECTIONS",
            catalog.max_connections.to_string(),
        ),
        field("catalog.timeout_secs", "QUOTEDESK_CATALOG_TIMEOUT_SECS", catalog.timeout_secs.to_string()),
        field(
            "catalog.rest_url",
            "QUOTEDESK_CATALOG_REST_URL",
            catalog.rest_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field(
            "catalog.api_key",
            "QUOTEDESK_CATALOG_API_KEY",
            catalog
                .api_key
                .as_ref()
                .map(|key| redact_key(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("catalog.products_table", "QUOTEDESK_CATALOG_PRODUCTS_TABLE", catalog.products_table.clone()),
        field(
            "catalog.discounts_table",
            "QUOTEDESK_CATALOG_DISCOUNTS_TABLE",
            catalog.discounts_table.clone(),
        ),
        field(
            "search.min_query_chars",
            "QUOTEDESK_SEARCH_MIN_QUERY_CHARS",
            search.min_query_chars.to_string(),
        ),
        field(
            "search.default_listing_limit",
            "QUOTEDESK_SEARCH_DEFAULT_LISTING_LIMIT",
            search.default_listing_limit.to_string(),
        ),
        field("search.result_limit", "QUOTEDESK_SEARCH_RESULT_LIMIT", search.result_limit.to_string()),
        field("search.debounce_ms", "QUOTEDESK_SEARCH_DEBOUNCE_MS", search.debounce_ms.to_string()),
        field(
            "search.recent_searches",
            "QUOTEDESK_SEARCH_RECENT_SEARCHES",
            search.recent_searches.to_string(),
        ),
        field("quote.format", "QUOTEDESK_QUOTE_FORMAT", format!("{:?}", quote.format)),
        field(
            "quote.show_list_price",
            "QUOTEDESK_QUOTE_SHOW_LIST_PRICE",
            quote.show_list_price.to_string(),
        ),
        field(
            "quote.show_customer_price",
            "QUOTEDESK_QUOTE_SHOW_CUSTOMER_PRICE",
            quote.show_customer_price.to_string(),
        ),
        field("quote.margin", "QUOTEDESK_QUOTE_MARGIN", quote.margin.to_string()),
        field("logging.level", "QUOTEDESK_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "QUOTEDESK_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("quotedesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/quotedesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short prefix so operators can tell keys apart without exposing them.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let prefix: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() > 8 {
        format!("{prefix}***")
    } else {
        "<redacted>".to_string()
    }
}
