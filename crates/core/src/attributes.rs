//! Typed view over the free-form attribute map carried by a line item.
//!
//! Values are stored as JSON so callers can attach arbitrary metadata, while
//! the keys the calculator understands are read through named getters.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

pub const GROSS_WEIGHT: &str = "gross_weight";
pub const CARTON_WEIGHT: &str = "carton_weight";
pub const PCS_PER_CARTON: &str = "pcs_per_carton";
pub const IS_VAT_INCLUSIVE: &str = "is_vat_inclusive";
pub const VAT_PERCENTAGE: &str = "vat_percentage";
pub const ASSOCIATED_MODEL: &str = "associated_model";

/// Upper bound for `gross_weight`, `carton_weight` and `pcs_per_carton`.
pub const MAX_WEIGHT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemAttributes(BTreeMap<String, Value>);

impl ItemAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the raw value, treating JSON `null` as unset.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        self.get(key).and_then(value_as_decimal)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(value_as_bool)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn gross_weight(&self) -> Option<Decimal> {
        self.decimal(GROSS_WEIGHT)
    }

    pub fn carton_weight(&self) -> Option<Decimal> {
        self.decimal(CARTON_WEIGHT)
    }

    pub fn pcs_per_carton(&self) -> Option<Decimal> {
        self.decimal(PCS_PER_CARTON)
    }

    pub fn is_vat_inclusive(&self) -> Option<bool> {
        self.bool(IS_VAT_INCLUSIVE)
    }

    pub fn vat_percentage(&self) -> Option<Decimal> {
        self.decimal(VAT_PERCENTAGE)
    }

    pub fn associated_model(&self) -> Option<&str> {
        self.str(ASSOCIATED_MODEL)
    }

    /// Checks that every recognized key holds a value of the expected shape.
    /// Unrecognized keys are never inspected.
    pub fn validate(&self) -> Result<(), DomainError> {
        for key in [GROSS_WEIGHT, CARTON_WEIGHT, PCS_PER_CARTON, VAT_PERCENTAGE] {
            let Some(raw) = self.get(key) else { continue };
            let value = value_as_decimal(raw).ok_or_else(|| {
                DomainError::attribute(key, format!("expected a number, got {raw}"))
            })?;
            if value < Decimal::ZERO {
                return Err(DomainError::attribute(key, "must be non-negative"));
            }
            if key != VAT_PERCENTAGE && value > MAX_WEIGHT {
                return Err(DomainError::attribute(key, format!("must be at most {MAX_WEIGHT}")));
            }
        }

        // Zero disables the carton scheme.
        if let Some(pieces) = self.pcs_per_carton() {
            if !pieces.is_zero() && pieces < Decimal::ONE {
                return Err(DomainError::attribute(PCS_PER_CARTON, "must be 0 or at least 1"));
            }
        }

        if let Some(vat) = self.vat_percentage() {
            if vat > Decimal::ONE_HUNDRED {
                return Err(DomainError::attribute(VAT_PERCENTAGE, "must be in range 0..=100"));
            }
        }

        if let Some(raw) = self.get(IS_VAT_INCLUSIVE) {
            if value_as_bool(raw).is_none() {
                return Err(DomainError::attribute(
                    IS_VAT_INCLUSIVE,
                    format!("expected a boolean, got {raw}"),
                ));
            }
        }

        if let Some(raw) = self.get(ASSOCIATED_MODEL) {
            match raw.as_str() {
                Some(model) if !model.trim().is_empty() => {}
                _ => {
                    return Err(DomainError::attribute(
                        ASSOCIATED_MODEL,
                        "expected a non-empty model name",
                    ))
                }
            }
        }

        Ok(())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ItemAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text).ok().or_else(|| Decimal::from_scientific(text).ok())
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}
