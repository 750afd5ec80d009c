pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod render;

pub use cpq::catalog::{
    select_products, CatalogClient, CatalogError, CatalogGateway, ProductQuery, SearchLimits,
};
pub use cpq::pricing::{DiscountRate, LinePricing, Margin};
pub use cpq::search::{SearchInput, SearchSession, SearchSettings, SearchTicket};
pub use cpq::QuoteDesk;
pub use domain::discount::{Discount, DiscountId};
pub use domain::product::{Product, ProductId};
pub use domain::quote::{Quote, QuoteLineItem};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use render::{render, QuoteFormat, RenderOptions};
