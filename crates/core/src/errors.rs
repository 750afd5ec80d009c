use rust_decimal::Decimal;
use thiserror::Error;

use crate::cpq::catalog::CatalogError;
use crate::cpq::pricing::RateKind;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("quantity must be a positive integer, got {quantity}")]
    InvalidQuantity { quantity: i64 },
    #[error("quantity must be a positive integer, got `{0}`")]
    UnparsableQuantity(String),
    #[error("{kind} rate must be in [0, 1), got {value}")]
    RateOutOfRange { kind: RateKind, value: Decimal },
    #[error("{kind} rate is not a decimal number: `{raw}`")]
    UnparsableRate { kind: RateKind, raw: String },
    #[error("list price for `{part_number}` must not be negative, got {value}")]
    NegativeListPrice { part_number: String, value: Decimal },
    #[error("unsupported quote format `{0}` (expected bullet_list|tab_delimited|markdown_table)")]
    UnknownFormat(String),
    #[error("no discount tier matches `{0}`")]
    UnknownDiscount(String),
    #[error("no product matches part number `{0}`")]
    UnknownPart(String),
    #[error("quote has no line items to export")]
    EmptyQuote,
    #[error("amount is too large to price")]
    AmountOverflow,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "That input was not accepted. Check it and try again.",
            Self::ServiceUnavailable { .. } => {
                "The product catalog is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Catalog(error @ CatalogError::Configuration(_)) => Self::Internal {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Catalog(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}
