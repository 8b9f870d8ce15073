use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::ConfigError;
use crate::line_item::MAX_UNIT_PRICE;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid unit price `{0}`: price must be in range 0..={max}", max = MAX_UNIT_PRICE)]
    InvalidPrice(Decimal),
    #[error("invalid quantity `{0}`: quantity must be in range 0..={max}", max = u32::MAX)]
    InvalidQuantity(i64),
    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },
    #[error("invalid condition value `{value}`: {reason}")]
    InvalidCondition { value: String, reason: String },
    #[error("conditions move the unit price to `{0}`, beyond the supported magnitude")]
    ConditionedPriceOutOfRange(Decimal),
}

impl DomainError {
    pub(crate) fn attribute(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute { key: key.to_owned(), reason: reason.into() }
    }

    pub(crate) fn condition(value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCondition { value: value.to_owned(), reason: reason.into() }
    }
}

/// Failure reported by a [`crate::format::Formatter`] implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("formatter failure: {0}")]
    Backend(String),
}

/// Failure reported by a [`crate::repository::ModelRepository`] implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    #[error("lookup failure: {0}")]
    Lookup(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ConfigError> for ApplicationError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl ApplicationError {
    /// Stable machine-readable class used by command payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) => "domain",
            Self::Format(_) => "format",
            Self::Repository(_) => "repository",
            Self::Configuration(_) => "config_validation",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "The line item could not be accepted. Check inputs and try again.",
            Self::Format(_) => "A calculated value could not be rendered.",
            Self::Repository(_) => "The associated model could not be resolved.",
            Self::Configuration(_) => "The calculator configuration is invalid.",
        }
    }
}
