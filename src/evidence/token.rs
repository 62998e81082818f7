//! The closed catalogue of evidence tokens.
//!
//! Each token names one observable fact type. Tokens carry no direction,
//! side, or outcome; they exist only so the order of facts can be recorded.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// An atomic, neutral observation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceToken {
    /// Resting size appeared at a level that had none
    ObAppear,
    /// Resting size updated at a level that already had some
    ObPersist,
    /// Resting size at a level went to zero
    ObVanish,
    /// A trade executed inside the band
    TradeExec,
    /// A trade's quantity was large relative to the level's own mean trade size
    TradeVolumeHigh,
    /// A liquidation occurred inside the band
    LiqOccur,
    /// A liquidation followed another one inside the cascade window
    LiqCascade,
    /// Price entered the band
    PriceTouch,
    /// Price left the band
    PriceExit,
    /// Price was observed inside the band again without leaving
    PriceDwell,
}

/// Source family of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenFamily {
    OrderBook,
    Trade,
    Liquidation,
    Price,
}

impl EvidenceToken {
    /// Every token, in catalogue order.
    pub const ALL: [EvidenceToken; 10] = [
        Self::ObAppear,
        Self::ObPersist,
        Self::ObVanish,
        Self::TradeExec,
        Self::TradeVolumeHigh,
        Self::LiqOccur,
        Self::LiqCascade,
        Self::PriceTouch,
        Self::PriceExit,
        Self::PriceDwell,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObAppear => "OB_APPEAR",
            Self::ObPersist => "OB_PERSIST",
            Self::ObVanish => "OB_VANISH",
            Self::TradeExec => "TRADE_EXEC",
            Self::TradeVolumeHigh => "TRADE_VOLUME_HIGH",
            Self::LiqOccur => "LIQ_OCCUR",
            Self::LiqCascade => "LIQ_CASCADE",
            Self::PriceTouch => "PRICE_TOUCH",
            Self::PriceExit => "PRICE_EXIT",
            Self::PriceDwell => "PRICE_DWELL",
        }
    }

    pub fn family(&self) -> TokenFamily {
        match self {
            Self::ObAppear | Self::ObPersist | Self::ObVanish => TokenFamily::OrderBook,
            Self::TradeExec | Self::TradeVolumeHigh => TokenFamily::Trade,
            Self::LiqOccur | Self::LiqCascade => TokenFamily::Liquidation,
            Self::PriceTouch | Self::PriceExit | Self::PriceDwell => TokenFamily::Price,
        }
    }
}

impl std::fmt::Display for EvidenceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EvidenceToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown evidence token: {}", s))
    }
}

/// A token stamped with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: EvidenceToken,
    pub timestamp: f64,
}

impl TokenEntry {
    pub fn new(token: EvidenceToken, timestamp: f64) -> Self {
        Self { token, timestamp }
    }
}
