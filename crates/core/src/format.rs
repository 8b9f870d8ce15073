use std::fmt;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::FormatError;

/// Highest scale a `Decimal` can carry.
const MAX_DECIMALS: u32 = 28;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    pub format_numbers: bool,
    pub decimals: u32,
    pub dec_point: String,
    pub thousands_sep: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            format_numbers: false,
            decimals: 0,
            dec_point: ".".to_string(),
            thousands_sep: ",".to_string(),
        }
    }
}

/// Result of a monetary query: the raw number, or its rendered text when
/// formatting is enabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    Raw(Decimal),
    Formatted(String),
}

impl DisplayValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Raw(value) => Some(*value),
            Self::Formatted(_) => None,
        }
    }

    pub fn is_formatted(&self) -> bool {
        matches!(self, Self::Formatted(_))
    }
}

impl PartialEq<Decimal> for DisplayValue {
    fn eq(&self, other: &Decimal) -> bool {
        self.as_decimal().is_some_and(|value| value == *other)
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(value) => write!(f, "{value}"),
            Self::Formatted(text) => f.write_str(text),
        }
    }
}

pub trait Formatter {
    /// Renders `value`. `formatted` is the caller's request; implementations
    /// may still decline to format based on their own configuration.
    fn format(&self, value: Decimal, formatted: bool) -> Result<DisplayValue, FormatError>;
}

impl<F: Formatter + ?Sized> Formatter for &F {
    fn format(&self, value: Decimal, formatted: bool) -> Result<DisplayValue, FormatError> {
        (**self).format(value, formatted)
    }
}

impl<F: Formatter + ?Sized> Formatter for Arc<F> {
    fn format(&self, value: Decimal, formatted: bool) -> Result<DisplayValue, FormatError> {
        (**self).format(value, formatted)
    }
}

/// Locale-style number rendering driven by [`FormatConfig`]. Formats only when
/// both the request and `format_numbers` are set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NumberFormatter {
    config: FormatConfig,
}

impl NumberFormatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    fn render(&self, value: Decimal) -> String {
        let decimals = self.config.decimals;
        let rounded =
            value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
        let digits = format!("{:.*}", decimals as usize, rounded.abs());
        let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

        let mut output = String::with_capacity(digits.len() + integer.len() / 3);
        if rounded < Decimal::ZERO {
            output.push('-');
        }
        for (index, digit) in integer.chars().enumerate() {
            if index > 0 && (integer.len() - index) % 3 == 0 {
                output.push_str(&self.config.thousands_sep);
            }
            output.push(digit);
        }
        if !fraction.is_empty() {
            output.push_str(&self.config.dec_point);
            output.push_str(fraction);
        }
        output
    }
}

impl Formatter for NumberFormatter {
    fn format(&self, value: Decimal, formatted: bool) -> Result<DisplayValue, FormatError> {
        if !(formatted && self.config.format_numbers) {
            return Ok(DisplayValue::Raw(value));
        }
        if self.config.decimals > MAX_DECIMALS {
            return Err(FormatError::Backend(format!(
                "decimals must be at most {MAX_DECIMALS}, got {}",
                self.config.decimals
            )));
        }
        Ok(DisplayValue::Formatted(self.render(value)))
    }
}
