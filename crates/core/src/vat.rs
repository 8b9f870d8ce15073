use rust_decimal::Decimal;

/// Adds `percentage` VAT on top of a net price.
pub fn add_vat(price: Decimal, percentage: Decimal) -> Decimal {
    price + price * percentage / Decimal::ONE_HUNDRED
}

/// Strips `percentage` VAT from a gross price, so that
/// `add_vat(remove_vat(p, v), v) == p`.
pub fn remove_vat(price: Decimal, percentage: Decimal) -> Decimal {
    price - price * percentage / (Decimal::ONE_HUNDRED + percentage)
}
