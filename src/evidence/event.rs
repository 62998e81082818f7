//! Normalized evidence events accepted by the memory store.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Side of a liquidated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationSide {
    Long,
    Short,
}

/// Side of the order book an update refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSide {
    Bid,
    Ask,
}

/// Kind of an evidence event, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Trade,
    Liquidation,
    OrderBook,
    PriceTouch,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade => write!(f, "trade"),
            Self::Liquidation => write!(f, "liquidation"),
            Self::OrderBook => write!(f, "order_book"),
            Self::PriceTouch => write!(f, "price_touch"),
        }
    }
}

/// One structured fact from the ingestion collaborator.
///
/// Timestamps are seconds, monotonic per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvidenceEvent {
    Trade {
        timestamp: f64,
        symbol: String,
        price: f64,
        quantity: f64,
        is_buyer_initiated: bool,
    },
    Liquidation {
        timestamp: f64,
        symbol: String,
        price: f64,
        quantity: f64,
        side: LiquidationSide,
    },
    OrderBook {
        timestamp: f64,
        symbol: String,
        price: f64,
        size: f64,
        side: BookSide,
    },
    PriceTouch {
        timestamp: f64,
        symbol: String,
        price: f64,
    },
}

impl EvidenceEvent {
    pub fn trade(
        timestamp: f64,
        symbol: impl Into<String>,
        price: f64,
        quantity: f64,
        is_buyer_initiated: bool,
    ) -> Self {
        Self::Trade {
            timestamp,
            symbol: symbol.into(),
            price,
            quantity,
            is_buyer_initiated,
        }
    }

    pub fn liquidation(
        timestamp: f64,
        symbol: impl Into<String>,
        price: f64,
        quantity: f64,
        side: LiquidationSide,
    ) -> Self {
        Self::Liquidation {
            timestamp,
            symbol: symbol.into(),
            price,
            quantity,
            side,
        }
    }

    pub fn order_book(
        timestamp: f64,
        symbol: impl Into<String>,
        price: f64,
        size: f64,
        side: BookSide,
    ) -> Self {
        Self::OrderBook {
            timestamp,
            symbol: symbol.into(),
            price,
            size,
            side,
        }
    }

    pub fn price_touch(timestamp: f64, symbol: impl Into<String>, price: f64) -> Self {
        Self::PriceTouch {
            timestamp,
            symbol: symbol.into(),
            price,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Trade { timestamp, .. }
            | Self::Liquidation { timestamp, .. }
            | Self::OrderBook { timestamp, .. }
            | Self::PriceTouch { timestamp, .. } => *timestamp,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Trade { symbol, .. }
            | Self::Liquidation { symbol, .. }
            | Self::OrderBook { symbol, .. }
            | Self::PriceTouch { symbol, .. } => symbol,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            Self::Trade { price, .. }
            | Self::Liquidation { price, .. }
            | Self::OrderBook { price, .. }
            | Self::PriceTouch { price, .. } => *price,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Trade { .. } => EventKind::Trade,
            Self::Liquidation { .. } => EventKind::Liquidation,
            Self::OrderBook { .. } => EventKind::OrderBook,
            Self::PriceTouch { .. } => EventKind::PriceTouch,
        }
    }

    /// Check field ranges. Ordering against earlier events is the store's job.
    pub fn validate(&self) -> Result<()> {
        let ts = self.timestamp();
        if !ts.is_finite() || ts < 0.0 {
            return Err(Error::invalid_event(format!(
                "{} timestamp must be finite and non-negative, got {}",
                self.kind(),
                ts
            )));
        }

        if self.symbol().trim().is_empty() {
            return Err(Error::invalid_event(format!(
                "{} event has an empty symbol",
                self.kind()
            )));
        }

        let price = self.price();
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::invalid_event(format!(
                "{} price must be finite and positive, got {}",
                self.kind(),
                price
            )));
        }

        match self {
            Self::Trade { quantity, .. } | Self::Liquidation { quantity, .. } => {
                if !quantity.is_finite() || *quantity <= 0.0 {
                    return Err(Error::invalid_event(format!(
                        "{} quantity must be finite and positive, got {}",
                        self.kind(),
                        quantity
                    )));
                }
            }
            Self::OrderBook { size, .. } => {
                if !size.is_finite() || *size < 0.0 {
                    return Err(Error::invalid_event(format!(
                        "order_book size must be finite and non-negative, got {}",
                        size
                    )));
                }
            }
            Self::PriceTouch { .. } => {}
        }

        Ok(())
    }
}
