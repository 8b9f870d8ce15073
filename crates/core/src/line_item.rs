//! A single cart line and the values derived from it.
//!
//! A [`LineItem`] is validated once at construction and never mutated by its
//! queries. Monetary queries compute on raw decimals and hand the final value
//! to the formatter exactly once.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::attributes::ItemAttributes;
use crate::condition::{ConditionList, ConditionSet};
use crate::errors::{DomainError, FormatError};
use crate::format::{DisplayValue, FormatConfig, Formatter, NumberFormatter};
use crate::repository::ModelRepository;
use crate::vat::{add_vat, remove_vat};

const WEIGHT_DECIMALS: u32 = 3;

/// Largest accepted unit price, before or after conditions. Any such price
/// times any `u32` quantity, with VAT added, fits in a `Decimal`.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Caller-supplied line data before validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub id: LineItemId,
    #[serde(default)]
    pub name: String,
    pub price: Decimal,
    pub quantity: i64,
    #[serde(default)]
    pub attributes: ItemAttributes,
    #[serde(default)]
    pub conditions: ConditionSet,
}

impl LineItemInput {
    pub fn new(id: impl Into<LineItemId>, price: Decimal, quantity: i64) -> Self {
        Self { id: id.into(), price, quantity, ..Self::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_attributes(mut self, attributes: ItemAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions = conditions;
        self
    }
}

#[derive(Clone, Debug)]
pub struct LineItem<F = NumberFormatter> {
    id: LineItemId,
    name: String,
    price: Decimal,
    quantity: u32,
    attributes: ItemAttributes,
    conditions: ConditionList,
    formatter: F,
}

impl LineItem<NumberFormatter> {
    pub fn from_input(input: LineItemInput, config: &FormatConfig) -> Result<Self, DomainError> {
        Self::new(input, NumberFormatter::new(config.clone()))
    }
}

impl<F: Formatter> LineItem<F> {
    pub fn new(input: LineItemInput, formatter: F) -> Result<Self, DomainError> {
        let checked = validate_input(&input).and_then(|quantity| {
            let conditions = ConditionList::from(input.conditions);
            check_conditioned_price(input.price, &conditions).map(|()| (quantity, conditions))
        });
        let (quantity, conditions) = match checked {
            Ok(checked) => checked,
            Err(error) => {
                warn!(
                    event_name = "item.construction_rejected",
                    item_id = %input.id,
                    error = %error,
                    "line item rejected"
                );
                return Err(error);
            }
        };

        debug!(
            event_name = "item.constructed",
            item_id = %input.id,
            quantity,
            conditions = conditions.len(),
            "line item constructed"
        );

        Ok(Self {
            id: input.id,
            name: input.name,
            price: input.price,
            quantity,
            attributes: input.attributes,
            conditions,
            formatter,
        })
    }

    /// Replaces the condition list, e.g. with custom [`crate::PriceCondition`]
    /// implementations that cannot travel through [`LineItemInput`].
    pub fn with_conditions(
        mut self,
        conditions: impl Into<ConditionList>,
    ) -> Result<Self, DomainError> {
        let conditions = conditions.into();
        check_conditioned_price(self.price, &conditions)?;
        self.conditions = conditions;
        Ok(self)
    }

    pub fn id(&self) -> &LineItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn attributes(&self) -> &ItemAttributes {
        &self.attributes
    }

    pub fn unit_total(&self) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.price * self.quantity_decimal(), true)
    }

    /// Total shipping weight, or `None` when neither weight scheme is set up.
    ///
    /// `gross_weight` (per unit) wins over the carton scheme, which rounds
    /// the quantity up to whole cartons.
    pub fn weight(&self) -> Option<Decimal> {
        let quantity = self.quantity_decimal();

        if let Some(gross_weight) = self.attributes.gross_weight().filter(|w| !w.is_zero()) {
            return Some(round_weight(gross_weight * quantity));
        }

        let carton_weight = self.attributes.carton_weight().filter(|w| !w.is_zero())?;
        let pcs_per_carton = self.attributes.pcs_per_carton().filter(|p| !p.is_zero())?;
        let cartons = quantity.checked_div(pcs_per_carton)?.ceil();
        Some(round_weight(carton_weight * cartons))
    }

    pub fn unit_price_with_tax(&self) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.net_to_gross_price(), true)
    }

    pub fn total_with_tax(&self) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.net_to_gross_price() * self.quantity_decimal(), true)
    }

    pub fn unit_price_without_tax(&self) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.gross_to_net_price(), true)
    }

    pub fn total_without_tax(&self) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.gross_to_net_price() * self.quantity_decimal(), true)
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &ConditionList {
        &self.conditions
    }

    pub fn price_with_conditions(&self, formatted: bool) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.conditioned_price(), formatted)
    }

    pub fn total_with_conditions(&self, formatted: bool) -> Result<DisplayValue, FormatError> {
        self.formatter.format(self.conditioned_price() * self.quantity_decimal(), formatted)
    }

    /// Looks up the entity named by the `associated_model` attribute. Items
    /// without that attribute never reach the repository.
    pub fn associated_model<R>(&self, repository: &R) -> Result<Option<R::Entity>, R::Error>
    where
        R: ModelRepository,
    {
        match self.attributes.associated_model() {
            Some(model) => repository.find_by_id(model, &self.id),
            None => Ok(None),
        }
    }

    pub fn summary(&self) -> Result<LineItemSummary, FormatError> {
        Ok(LineItemSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            unit_price: self.price,
            unit_total: self.unit_total()?,
            weight: self.weight(),
            unit_price_with_tax: self.unit_price_with_tax()?,
            total_with_tax: self.total_with_tax()?,
            unit_price_without_tax: self.unit_price_without_tax()?,
            total_without_tax: self.total_without_tax()?,
            condition_count: self.conditions.len(),
            price_with_conditions: self.price_with_conditions(true)?,
            total_with_conditions: self.total_with_conditions(true)?,
        })
    }

    fn quantity_decimal(&self) -> Decimal {
        Decimal::from(self.quantity)
    }

    /// VAT is added only for items explicitly marked as VAT-exclusive.
    fn net_to_gross_price(&self) -> Decimal {
        match (self.attributes.is_vat_inclusive(), self.attributes.vat_percentage()) {
            (Some(false), Some(vat)) => add_vat(self.price, vat),
            _ => self.price,
        }
    }

    /// VAT is removed only for items explicitly marked as VAT-inclusive.
    fn gross_to_net_price(&self) -> Decimal {
        match (self.attributes.is_vat_inclusive(), self.attributes.vat_percentage()) {
            (Some(true), Some(vat)) => remove_vat(self.price, vat),
            _ => self.price,
        }
    }

    fn conditioned_price(&self) -> Decimal {
        self.conditions.apply(self.price)
    }
}

/// Every derived value of a line item in one serializable snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItemSummary {
    pub id: LineItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_total: DisplayValue,
    pub weight: Option<Decimal>,
    pub unit_price_with_tax: DisplayValue,
    pub total_with_tax: DisplayValue,
    pub unit_price_without_tax: DisplayValue,
    pub total_without_tax: DisplayValue,
    pub condition_count: usize,
    pub price_with_conditions: DisplayValue,
    pub total_with_conditions: DisplayValue,
}

fn validate_input(input: &LineItemInput) -> Result<u32, DomainError> {
    if input.price < Decimal::ZERO || input.price > MAX_UNIT_PRICE {
        return Err(DomainError::InvalidPrice(input.price));
    }
    let quantity =
        u32::try_from(input.quantity).map_err(|_| DomainError::InvalidQuantity(input.quantity))?;
    input.attributes.validate()?;
    Ok(quantity)
}

fn check_conditioned_price(price: Decimal, conditions: &ConditionList) -> Result<(), DomainError> {
    let conditioned = conditions.apply(price);
    if conditioned.abs() > MAX_UNIT_PRICE {
        return Err(DomainError::ConditionedPriceOutOfRange(conditioned));
    }
    Ok(())
}

fn round_weight(weight: Decimal) -> Decimal {
    weight.round_dp_with_strategy(WEIGHT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}
