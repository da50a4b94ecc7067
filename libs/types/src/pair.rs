//! Trading pair configuration
//!
//! Immutable at runtime. The pair carries the order-size bounds and the
//! price/quantity precision that book-level validation enforces before an
//! intent reaches the risk gate.

use crate::errors::ValidationError;
use crate::ids::Symbol;
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Configuration for one trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: Symbol,
    pub base_asset: String,
    pub quote_asset: String,
    pub min_order_size: Quantity,
    pub max_order_size: Quantity,
    /// Decimal places accepted on prices.
    pub price_precision: u32,
    /// Decimal places accepted on quantities.
    pub quantity_precision: u32,
    pub active: bool,
}

impl TradingPair {
    /// Create an active pair, deriving base/quote assets from the symbol.
    pub fn new(
        symbol: Symbol,
        min_order_size: Quantity,
        max_order_size: Quantity,
        price_precision: u32,
        quantity_precision: u32,
    ) -> Self {
        let base_asset = symbol.base().to_string();
        let quote_asset = symbol.quote().to_string();
        Self {
            symbol,
            base_asset,
            quote_asset,
            min_order_size,
            max_order_size,
            price_precision,
            quantity_precision,
            active: true,
        }
    }

    /// Validate an order quantity against pair bounds and precision.
    pub fn validate_quantity(&self, quantity: Quantity) -> Result<(), ValidationError> {
        if !quantity.fits_precision(self.quantity_precision) {
            return Err(ValidationError::PrecisionExceeded {
                field: "quantity",
                decimals: self.quantity_precision,
            });
        }
        if quantity < self.min_order_size || quantity > self.max_order_size {
            return Err(ValidationError::QuantityOutOfBounds {
                min: self.min_order_size,
                max: self.max_order_size,
                got: quantity,
            });
        }
        Ok(())
    }

    /// Validate a limit price against pair precision.
    pub fn validate_price(&self, price: Price) -> Result<(), ValidationError> {
        if !price.fits_precision(self.price_precision) {
            return Err(ValidationError::PrecisionExceeded {
                field: "price",
                decimals: self.price_precision,
            });
        }
        Ok(())
    }
}
