pub mod attributes;
pub mod condition;
pub mod config;
pub mod errors;
pub mod format;
pub mod line_item;
pub mod repository;
pub mod vat;

pub use attributes::ItemAttributes;
pub use condition::{
    CartCondition, ConditionKind, ConditionList, ConditionSet, ConditionValue, Direction,
    PriceCondition, PriceTier,
};
pub use errors::{ApplicationError, DomainError, FormatError, RepositoryError};
pub use format::{DisplayValue, FormatConfig, Formatter, NumberFormatter};
pub use line_item::{LineItem, LineItemId, LineItemInput, LineItemSummary};
pub use repository::{InMemoryModelRepository, ModelRepository};
