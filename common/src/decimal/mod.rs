//! Decimal type utilities for precise financial calculations

use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;

/// Price type with high precision
pub type Price = Decimal;

/// Quantity type with high precision
pub type Quantity = Decimal;

/// Amount type with high precision (typically Price * Quantity)
pub type Amount = Decimal;

/// Basis-point denominator (1 bps = 1/10_000)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Sentinel tolerance meaning "execute on schedule regardless of price".
/// Only meaningful for DCA orders; placement rejects it for limit orders.
pub const TOLERANCE_AGNOSTIC: u32 = u32::MAX;

/// Convert a basis-point value to a decimal fraction (100 bps -> 0.01)
pub fn bps_fraction(bps: u32) -> Decimal {
    Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR)
}

/// Precision helpers for common operations
pub mod precision {
    use super::*;

    /// Default price precision (8 decimal places)
    pub const PRICE_PRECISION: u32 = 8;

    /// Default quantity precision (8 decimal places)
    pub const QUANTITY_PRECISION: u32 = 8;

    /// Round price to standard precision
    pub fn round_price(price: Price) -> Price {
        price.round_dp(PRICE_PRECISION)
    }

    /// Round quantity to standard precision
    pub fn round_quantity(qty: Quantity) -> Quantity {
        qty.round_dp(QUANTITY_PRECISION)
    }
}
