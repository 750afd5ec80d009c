use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::catalog::SearchLimits;
use crate::cpq::pricing::Margin;
use crate::cpq::search::SearchSettings;
use crate::render::{QuoteFormat, RenderOptions};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
    pub quote: QuoteConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    pub database_url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub rest_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub products_table: String,
    pub discounts_table: String,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub min_query_chars: usize,
    pub default_listing_limit: usize,
    pub result_limit: usize,
    pub debounce_ms: u64,
    pub recent_searches: usize,
}

#[derive(Clone, Debug)]
pub struct QuoteConfig {
    pub format: QuoteFormat,
    pub show_list_price: bool,
    pub show_customer_price: bool,
    pub margin: Decimal,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogBackend {
    Memory,
    Sqlite,
    Rest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_backend: Option<CatalogBackend>,
    pub database_url: Option<String>,
    pub rest_url: Option<String>,
    pub api_key: Option<String>,
    pub quote_format: Option<QuoteFormat>,
    pub margin: Option<Decimal>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                backend: CatalogBackend::Sqlite,
                database_url: "sqlite://quotedesk.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                rest_url: None,
                api_key: None,
                products_table: "pricing".to_string(),
                discounts_table: "discounts".to_string(),
            },
            search: SearchConfig {
                min_query_chars: 3,
                default_listing_limit: 20,
                result_limit: 50,
                debounce_ms: 500,
                recent_searches: 5,
            },
            quote: QuoteConfig {
                format: QuoteFormat::MarkdownTable,
                show_list_price: false,
                show_customer_price: false,
                margin: Decimal::ZERO,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for CatalogBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "rest" => Ok(Self::Rest),
            other => Err(ConfigError::Validation(format!(
                "unsupported catalog backend `{other}` (expected memory|sqlite|rest)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SearchConfig {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            min_query_chars: self.min_query_chars,
            debounce: Duration::from_millis(self.debounce_ms),
            recent_limit: self.recent_searches,
        }
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            result_limit: self.result_limit,
            default_listing_limit: self.default_listing_limit,
        }
    }
}

impl QuoteConfig {
    /// Validated default margin; `validate()` guarantees the range.
    pub fn default_margin(&self) -> Margin {
        Margin::new(self.margin).unwrap_or_default()
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format,
            show_list_price: self.show_list_price,
            show_customer_price: self.show_customer_price,
            margin: self.default_margin(),
            ..RenderOptions::default()
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("quotedesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(backend) = catalog.backend {
                self.catalog.backend = backend;
            }
            if let Some(database_url) = catalog.database_url {
                self.catalog.database_url = database_url;
            }
            if let Some(max_connections) = catalog.max_connections {
                self.catalog.max_connections = max_connections;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
            if let Some(rest_url) = catalog.rest_url {
                self.catalog.rest_url = Some(rest_url);
            }
            if let Some(catalog_api_key_value) = catalog.api_key {
                self.catalog.api_key = Some(secret_value(catalog_api_key_value));
            }
            if let Some(products_table) = catalog.products_table {
                self.catalog.products_table = products_table;
            }
            if let Some(discounts_table) = catalog.discounts_table {
                self.catalog.discounts_table = discounts_table;
            }
        }

        if let Some(search) = patch.search {
            if let Some(min_query_chars) = search.min_query_chars {
                self.search.min_query_chars = min_query_chars;
            }
            if let Some(default_listing_limit) = search.default_listing_limit {
                self.search.default_listing_limit = default_listing_limit;
            }
            if let Some(result_limit) = search.result_limit {
                self.search.result_limit = result_limit;
            }
            if let Some(debounce_ms) = search.debounce_ms {
                self.search.debounce_ms = debounce_ms;
            }
            if let Some(recent_searches) = search.recent_searches {
                self.search.recent_searches = recent_searches;
            }
        }

        if let Some(quote) = patch.quote {
            if let Some(format) = quote.format {
                self.quote.format = format;
            }
            if let Some(show_list_price) = quote.show_list_price {
                self.quote.show_list_price = show_list_price;
            }
            if let Some(show_customer_price) = quote.show_customer_price {
                self.quote.show_customer_price = show_customer_price;
            }
            if let Some(margin) = quote.margin {
                self.quote.margin = margin;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUOTEDESK_CATALOG_BACKEND") {
            self.catalog.backend = value.parse()?;
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_DATABASE_URL") {
            self.catalog.database_url = value;
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_MAX_CONNECTIONS") {
            self.catalog.max_connections =
                parse_env("QUOTEDESK_CATALOG_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_env("QUOTEDESK_CATALOG_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_REST_URL") {
            self.catalog.rest_url = Some(value);
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_API_KEY") {
            self.catalog.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_PRODUCTS_TABLE") {
            self.catalog.products_table = value;
        }
        if let Some(value) = read_env("QUOTEDESK_CATALOG_DISCOUNTS_TABLE") {
            self.catalog.discounts_table = value;
        }

        if let Some(value) = read_env("QUOTEDESK_SEARCH_MIN_QUERY_CHARS") {
            self.search.min_query_chars = parse_env("QUOTEDESK_SEARCH_MIN_QUERY_CHARS", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_SEARCH_DEFAULT_LISTING_LIMIT") {
            self.search.default_listing_limit =
                parse_env("QUOTEDESK_SEARCH_DEFAULT_LISTING_LIMIT", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_SEARCH_RESULT_LIMIT") {
            self.search.result_limit = parse_env("QUOTEDESK_SEARCH_RESULT_LIMIT", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_SEARCH_DEBOUNCE_MS") {
            self.search.debounce_ms = parse_env("QUOTEDESK_SEARCH_DEBOUNCE_MS", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_SEARCH_RECENT_SEARCHES") {
            self.search.recent_searches = parse_env("QUOTEDESK_SEARCH_RECENT_SEARCHES", &value)?;
        }

        if let Some(value) = read_env("QUOTEDESK_QUOTE_FORMAT") {
            self.quote.format = parse_env("QUOTEDESK_QUOTE_FORMAT", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_QUOTE_SHOW_LIST_PRICE") {
            self.quote.show_list_price = parse_env("QUOTEDESK_QUOTE_SHOW_LIST_PRICE", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_QUOTE_SHOW_CUSTOMER_PRICE") {
            self.quote.show_customer_price =
                parse_env("QUOTEDESK_QUOTE_SHOW_CUSTOMER_PRICE", &value)?;
        }
        if let Some(value) = read_env("QUOTEDESK_QUOTE_MARGIN") {
            self.quote.margin = parse_env("QUOTEDESK_QUOTE_MARGIN", &value)?;
        }

        let log_level =
            read_env("QUOTEDESK_LOGGING_LEVEL").or_else(|| read_env("QUOTEDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("QUOTEDESK_LOGGING_FORMAT").or_else(|| read_env("QUOTEDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(backend) = overrides.catalog_backend {
            self.catalog.backend = backend;
        }
        if let Some(database_url) = overrides.database_url {
            self.catalog.database_url = database_url;
        }
        if let Some(rest_url) = overrides.rest_url {
            self.catalog.rest_url = Some(rest_url);
        }
        if let Some(api_key) = overrides.api_key {
            self.catalog.api_key = Some(secret_value(api_key));
        }
        if let Some(format) = overrides.quote_format {
            self.quote.format = format;
        }
        if let Some(margin) = overrides.margin {
            self.quote.margin = margin;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_search(&self.search)?;
        validate_quote(&self.quote)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("quotedesk.toml"), PathBuf::from("config/quotedesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    match catalog.backend {
        CatalogBackend::Memory => {}
        CatalogBackend::Sqlite => {
            let url = catalog.database_url.trim();
            let sqlite_url =
                url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
            if !sqlite_url {
                return Err(ConfigError::Validation(
                    "catalog.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                        .to_string(),
                ));
            }
            if catalog.max_connections == 0 {
                return Err(ConfigError::Validation(
                    "catalog.max_connections must be greater than zero".to_string(),
                ));
            }
        }
        CatalogBackend::Rest => {
            let url = catalog.rest_url.as_deref().map(str::trim).unwrap_or_default();
            if url.is_empty() {
                return Err(ConfigError::Validation(
                    "catalog.rest_url is required for the rest backend".to_string(),
                ));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(
                    "catalog.rest_url must start with http:// or https://".to_string(),
                ));
            }
            let missing_key = catalog
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing_key {
                return Err(ConfigError::Validation(
                    "catalog.api_key is required for the rest backend".to_string(),
                ));
            }
            if catalog.products_table.trim().is_empty() || catalog.discounts_table.trim().is_empty()
            {
                return Err(ConfigError::Validation(
                    "catalog.products_table and catalog.discounts_table must not be empty"
                        .to_string(),
                ));
            }
        }
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if search.min_query_chars == 0 {
        return Err(ConfigError::Validation(
            "search.min_query_chars must be greater than zero".to_string(),
        ));
    }
    if search.result_limit == 0 || search.default_listing_limit == 0 {
        return Err(ConfigError::Validation(
            "search.result_limit and search.default_listing_limit must be greater than zero"
                .to_string(),
        ));
    }
    if search.debounce_ms > 10_000 {
        return Err(ConfigError::Validation(
            "search.debounce_ms must be in range 0..=10000".to_string(),
        ));
    }
    Ok(())
}

fn validate_quote(quote: &QuoteConfig) -> Result<(), ConfigError> {
    Margin::new(quote.margin)
        .map(|_| ())
        .map_err(|_| ConfigError::Validation("quote.margin must be in range [0, 1)".to_string()))
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    search: Option<SearchPatch>,
    quote: Option<QuotePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    backend: Option<CatalogBackend>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    rest_url: Option<String>,
    api_key: Option<String>,
    products_table: Option<String>,
    discounts_table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    min_query_chars: Option<usize>,
    default_listing_limit: Option<usize>,
    result_limit: Option<usize>,
    debounce_ms: Option<u64>,
    recent_searches: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotePatch {
    format: Option<QuoteFormat>,
    show_list_price: Option<bool>,
    show_customer_price: Option<bool>,
    margin: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
