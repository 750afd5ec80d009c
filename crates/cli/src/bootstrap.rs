use std::time::Duration;

use quotedesk_core::config::{AppConfig, CatalogBackend};
use quotedesk_core::{CatalogClient, CatalogGateway, QuoteDesk};
use quotedesk_db::{
    connect_with_settings, migrations, DemoCatalog, RepositoryError, RestCatalogGateway,
    RestCatalogSettings, SqlCatalogGateway,
};
use thiserror::Error;
use tracing::info;

pub type DynGateway = Box<dyn CatalogGateway>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog setup failed: {0}")]
    Catalog(#[from] RepositoryError),
    #[error("catalog backend `{0}` is missing required settings")]
    Incomplete(&'static str),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::DatabaseConnect(_) => "db_connectivity",
            Self::Migration(_) => "migration",
            Self::Catalog(RepositoryError::Configuration(_)) | Self::Incomplete(_) => {
                "config_validation"
            }
            Self::Catalog(_) => "catalog",
        }
    }
}

/// Builds the configured catalog gateway. SQLite catalogs are migrated on open
/// so a fresh database file is immediately searchable.
pub async fn open_catalog(config: &AppConfig) -> Result<DynGateway, BootstrapError> {
    let catalog = &config.catalog;
    let gateway: DynGateway = match catalog.backend {
        CatalogBackend::Memory => Box::new(DemoCatalog::in_memory()?),
        CatalogBackend::Sqlite => {
            let pool = connect_with_settings(
                &catalog.database_url,
                catalog.max_connections,
                catalog.timeout_secs,
            )
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            Box::new(SqlCatalogGateway::new(pool))
        }
        CatalogBackend::Rest => {
            let base_url = catalog.rest_url.clone().ok_or(BootstrapError::Incomplete("rest"))?;
            let api_key = catalog.api_key.clone().ok_or(BootstrapError::Incomplete("rest"))?;
            Box::new(RestCatalogGateway::new(RestCatalogSettings {
                base_url,
                api_key,
                products_table: catalog.products_table.clone(),
                discounts_table: catalog.discounts_table.clone(),
                timeout: Duration::from_secs(catalog.timeout_secs),
            })?)
        }
    };

    info!(
        event_name = "system.bootstrap.catalog_opened",
        backend = ?catalog.backend,
        "catalog gateway ready"
    );
    Ok(gateway)
}

/// A quote session wired to the configured catalog, search limits and default margin.
pub async fn open_desk(config: &AppConfig) -> Result<QuoteDesk<DynGateway>, BootstrapError> {
    let gateway = open_catalog(config).await?;
    let mut desk =
        QuoteDesk::new(CatalogClient::new(gateway, config.search.limits()), config.search.settings());
    desk.set_margin(config.quote.default_margin());
    Ok(desk)
}

#[cfg(test)]
mod tests {
    use quotedesk_core::config::{AppConfig, CatalogBackend};
    use quotedesk_core::CatalogGateway;

    use super::{open_catalog, open_desk};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.catalog.backend = CatalogBackend::Memory;
        config
    }

    #[tokio::test]
    async fn memory_backend_serves_demo_catalog() {
        let gateway = open_catalog(&memory_config()).await.expect("open");
        assert_eq!(gateway.count_products().await.expect("count"), 8);
    }

    #[tokio::test]
    async fn sqlite_backend_is_migrated_on_open() {
        let mut config = AppConfig::default();
        config.catalog.database_url = "sqlite::memory:".to_string();

        let gateway = open_catalog(&config).await.expect("open");
        assert_eq!(gateway.count_products().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn desk_loads_tiers_from_configured_catalog() {
        let mut desk = open_desk(&memory_config()).await.expect("desk");
        assert_eq!(desk.load_discount_tiers().await.len(), 4);
        assert_eq!(desk.quote().discount_name(), "10%");
    }

    #[tokio::test]
    async fn rest_backend_without_key_is_incomplete() {
        let mut config = AppConfig::default();
        config.catalog.backend = CatalogBackend::Rest;
        config.catalog.rest_url = Some("https://catalog.example.com".to_string());

        let error = open_catalog(&config).await.err().expect("missing key");
        assert_eq!(error.error_class(), "config_validation");
    }

    #[tokio::test]
    async fn rest_backend_with_malformed_url_is_a_config_failure() {
        let mut config = AppConfig::default();
        config.catalog.backend = CatalogBackend::Rest;
        config.catalog.rest_url = Some("not a url".to_string());
        config.catalog.api_key = Some("anon-key".to_string().into());

        let error = open_catalog(&config).await.err().expect("malformed url");
        assert_eq!(error.error_class(), "config_validation");
    }
}
