//! Price conditions: discounts, surcharges and fees applied to a running price.
//!
//! A line item only depends on the [`PriceCondition`] capability. [`CartCondition`]
//! is the stock implementation, driven by a [`ConditionValue`] such as `"-10%"`,
//! `"+2.50"` or a table of price tiers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;

use crate::attributes::ItemAttributes;
use crate::errors::DomainError;

pub trait PriceCondition: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Maps an input price to an output price. Must be pure and deterministic.
    fn apply_condition(&self, price: Decimal) -> Decimal;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Discount,
    Tax,
    Shipping,
    Fee,
    Surcharge,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Add,
    Subtract,
}

impl Direction {
    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionValue {
    Percentage { direction: Direction, rate: Decimal },
    Fixed { direction: Direction, amount: Decimal },
    /// The tier with the greatest `min_price` not above the input price applies.
    Tiered(Vec<PriceTier>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub min_price: Decimal,
    pub value: ConditionValue,
}

impl ConditionValue {
    pub fn percentage(direction: Direction, rate: Decimal) -> Self {
        Self::Percentage { direction, rate }
    }

    pub fn fixed(direction: Direction, amount: Decimal) -> Self {
        Self::Fixed { direction, amount }
    }

    pub fn tiered(tiers: Vec<PriceTier>) -> Result<Self, DomainError> {
        let value = Self::Tiered(tiers);
        value.validate()?;
        Ok(value)
    }

    /// The signed adjustment this value makes to `price`, or `None` when no
    /// tier matches.
    pub fn adjustment(&self, price: Decimal) -> Option<(Direction, Decimal)> {
        match self {
            Self::Percentage { direction, rate } => {
                Some((*direction, price.saturating_mul(*rate) / Decimal::ONE_HUNDRED))
            }
            Self::Fixed { direction, amount } => Some((*direction, *amount)),
            Self::Tiered(tiers) => tiers
                .iter()
                .filter(|tier| tier.min_price <= price)
                .max_by_key(|tier| tier.min_price)
                .and_then(|tier| tier.value.adjustment(price)),
        }
    }

    /// Applies the adjustment, clamping at zero so an item never gets a
    /// negative price. Overflow saturates at `Decimal::MAX`.
    pub fn apply(&self, price: Decimal) -> Decimal {
        let adjusted = match self.adjustment(price) {
            Some((Direction::Add, amount)) => price.saturating_add(amount),
            Some((Direction::Subtract, amount)) => price.saturating_sub(amount),
            None => price,
        };
        adjusted.max(Decimal::ZERO)
    }

    fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Percentage { rate: magnitude, .. } | Self::Fixed { amount: magnitude, .. } => {
                if *magnitude < Decimal::ZERO {
                    return Err(DomainError::condition(
                        &self.to_string(),
                        "magnitude must be non-negative; use the sign for direction",
                    ));
                }
                Ok(())
            }
            Self::Tiered(tiers) => {
                if tiers.is_empty() {
                    return Err(DomainError::condition("tiered", "at least one tier is required"));
                }
                for tier in tiers {
                    if matches!(tier.value, Self::Tiered(_)) {
                        return Err(DomainError::condition(
                            &tier.min_price.to_string(),
                            "tiers cannot be nested",
                        ));
                    }
                    if tier.min_price < Decimal::ZERO {
                        return Err(DomainError::condition(
                            &tier.min_price.to_string(),
                            "tier threshold must be non-negative",
                        ));
                    }
                    tier.value.validate()?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ConditionValue {
    type Err = DomainError;

    /// Parses `"+10%"`, `"-12.5%"`, `"-5"` or `"3"`. A missing sign means add.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (direction, rest) = match trimmed.chars().next() {
            Some('-') => (Direction::Subtract, &trimmed[1..]),
            Some('+') => (Direction::Add, &trimmed[1..]),
            Some(_) => (Direction::Add, trimmed),
            None => return Err(DomainError::condition(input, "value is empty")),
        };

        let (is_percentage, number) = match rest.trim().strip_suffix('%') {
            Some(number) => (true, number.trim()),
            None => (false, rest.trim()),
        };

        let magnitude = Decimal::from_str(number)
            .map_err(|_| DomainError::condition(input, "expected a number or percentage"))?;

        let value = if is_percentage {
            Self::percentage(direction, magnitude)
        } else {
            Self::fixed(direction, magnitude)
        };
        value.validate().map_err(|_| DomainError::condition(input, "sign must appear once"))?;
        Ok(value)
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentage { direction, rate } => write!(f, "{}{rate}%", direction.symbol()),
            Self::Fixed { direction, amount } => write!(f, "{}{amount}", direction.symbol()),
            Self::Tiered(tiers) => {
                f.write_str("tiered[")?;
                for (index, tier) in tiers.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, ">={}: {}", tier.min_price, tier.value)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Wire shape of a condition value: an expression string, a bare signed
/// number, or a `{ "tiers": [...] }` table.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawConditionValue {
    Expression(String),
    Number(Decimal),
    Tiered { tiers: Vec<PriceTier> },
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value: Result<Self, DomainError> = match RawConditionValue::deserialize(deserializer)? {
            RawConditionValue::Expression(expression) => expression.parse(),
            RawConditionValue::Number(number) if number < Decimal::ZERO => {
                Ok(Self::fixed(Direction::Subtract, number.abs()))
            }
            RawConditionValue::Number(number) => Ok(Self::fixed(Direction::Add, number)),
            RawConditionValue::Tiered { tiers } => Self::tiered(tiers),
        };
        value.map_err(serde::de::Error::custom)
    }
}

impl Serialize for ConditionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Tiered(tiers) => {
                RawConditionValue::Tiered { tiers: tiers.clone() }.serialize(serializer)
            }
            other => serializer.collect_str(other),
        }
    }
}

fn default_target() -> String {
    "item".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartCondition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ConditionKind,
    #[serde(default = "default_target")]
    pub target: String,
    pub value: ConditionValue,
    /// Informational only; conditions always run in insertion order.
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub attributes: ItemAttributes,
}

impl CartCondition {
    pub fn new(name: impl Into<String>, kind: ConditionKind, value: ConditionValue) -> Self {
        Self {
            name: name.into(),
            kind,
            target: default_target(),
            value,
            order: 0,
            attributes: ItemAttributes::default(),
        }
    }

    pub fn parse(
        name: impl Into<String>,
        kind: ConditionKind,
        expression: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(name, kind, expression.parse()?))
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_attributes(mut self, attributes: ItemAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Absolute amount this condition adds or removes for the given input price.
    pub fn parsed_raw_value(&self, price: Decimal) -> Decimal {
        self.value.adjustment(price).map(|(_, amount)| amount).unwrap_or(Decimal::ZERO)
    }
}

impl PriceCondition for CartCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_condition(&self, price: Decimal) -> Decimal {
        self.value.apply(price)
    }
}

/// Conditions as they arrive on the wire: one condition or a list of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSet {
    Single(CartCondition),
    Many(Vec<CartCondition>),
}

impl Default for ConditionSet {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Insertion-ordered conditions of a line item. Order is application order;
/// nothing here sorts or deduplicates.
#[derive(Clone, Debug, Default)]
pub struct ConditionList(Vec<Arc<dyn PriceCondition>>);

impl ConditionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(condition: impl PriceCondition + 'static) -> Self {
        Self(vec![Arc::new(condition)])
    }

    pub fn push(&mut self, condition: impl PriceCondition + 'static) {
        self.0.push(Arc::new(condition));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Left fold: each condition receives the previous condition's output.
    pub fn apply(&self, price: Decimal) -> Decimal {
        self.0.iter().fold(price, |running, condition| {
            let next = condition.apply_condition(running);
            trace!(
                event_name = "item.condition_applied",
                condition = condition.name(),
                input = %running,
                output = %next,
                "condition applied"
            );
            next
        })
    }
}

impl From<CartCondition> for ConditionList {
    fn from(condition: CartCondition) -> Self {
        Self::single(condition)
    }
}

impl From<Vec<CartCondition>> for ConditionList {
    fn from(conditions: Vec<CartCondition>) -> Self {
        conditions.into_iter().collect()
    }
}

impl From<Vec<Arc<dyn PriceCondition>>> for ConditionList {
    fn from(conditions: Vec<Arc<dyn PriceCondition>>) -> Self {
        Self(conditions)
    }
}

impl From<ConditionSet> for ConditionList {
    fn from(set: ConditionSet) -> Self {
        match set {
            ConditionSet::Single(condition) => condition.into(),
            ConditionSet::Many(conditions) => conditions.into(),
        }
    }
}

impl<C: PriceCondition + 'static> FromIterator<C> for ConditionList {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|condition| Arc::new(condition) as Arc<dyn PriceCondition>)
                .collect(),
        )
    }
}
