/// Book value types shared by both representations
///
/// A `Quote` with zero size marks an empty price level; it never means a
/// resting zero-size order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sell side, best = lowest price
    Ask,
    /// Buy side, best = highest price
    Bid,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Ask => "ask",
            Side::Bid => "bid",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable (price, size) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub size: Decimal,
}

impl Quote {
    #[inline]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Placeholder for a slot with no resting size
    #[inline]
    pub const fn empty(price: Decimal) -> Self {
        Self { price, size: Decimal::ZERO }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.is_zero()
    }
}

/// One replace instruction from the feed: `[price, size]`.
///
/// Decodes from the two-element array the exchange sends; prices and sizes
/// arrive as decimal strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Decimal, Decimal)", into = "(Decimal, Decimal)")]
pub struct Level {
    pub price: Decimal,
    pub size: Decimal,
}

impl Level {
    #[inline]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

impl From<(Decimal, Decimal)> for Level {
    fn from((price, size): (Decimal, Decimal)) -> Self {
        Self { price, size }
    }
}

impl From<Level> for (Decimal, Decimal) {
    fn from(level: Level) -> Self {
        (level.price, level.size)
    }
}

impl From<Level> for Quote {
    fn from(level: Level) -> Self {
        Quote::new(level.price, level.size)
    }
}

/// Which representation backs a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookKind {
    /// Fixed tick-indexed array, O(1) updates, bounded price range
    #[default]
    Windowed,
    /// Ordered map, O(log n) updates, unbounded range
    Sparse,
}

impl std::str::FromStr for BookKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windowed" => Ok(BookKind::Windowed),
            "sparse" => Ok(BookKind::Sparse),
            other => Err(format!("unknown book kind: {other}")),
        }
    }
}

/// What a single replace instruction did to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelChange {
    /// Best pointer of the side moved
    pub best_moved: bool,
    /// Stored size at the price differs from before
    pub size_changed: bool,
}

impl LevelChange {
    #[inline]
    pub fn is_material(&self) -> bool {
        self.best_moved || self.size_changed
    }

    #[inline]
    pub fn merge(&mut self, other: LevelChange) {
        self.best_moved |= other.best_moved;
        self.size_changed |= other.size_changed;
    }
}
