/// Price ↔ slot conversion for the windowed book
///
/// Each side gets a zero-price anchor placed `offset_ratio` beyond the
/// snapshot's best price, so better prices arriving later still land in the
/// window. Slot indices grow toward worse prices on both sides:
///
/// ```text
/// ask: price(i) = zero_ask + i * tick      (zero_ask <= best ask)
/// bid: price(i) = zero_bid - i * tick      (zero_bid >= best bid)
/// ```
///
/// Both sides share one `depth`, the larger of the two spans.

use super::types::Side;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Snapshot extremes used to size the window
#[derive(Debug, Clone, Copy)]
pub struct WindowBounds {
    pub first_ask: Decimal,
    pub last_ask: Decimal,
    pub first_bid: Decimal,
    pub last_bid: Decimal,
}

/// Tick grid anchored per side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceWindow {
    tick_size: Decimal,
    zero_ask: Decimal,
    zero_bid: Decimal,
    depth: usize,
}

impl PriceWindow {
    /// Build the window from snapshot extremes.
    ///
    /// `tick_size` must be positive; callers validate it when the book is
    /// created.
    pub fn init(bounds: WindowBounds, offset_ratio: Decimal, tick_size: Decimal) -> Self {
        let below = Decimal::ONE - offset_ratio;
        let above = Decimal::ONE + offset_ratio;

        let zero_ask = floor_to_tick(bounds.first_ask * below, tick_size);
        let ask_top = ceil_to_tick(bounds.last_ask * above, tick_size);
        let zero_bid = ceil_to_tick(bounds.first_bid * above, tick_size);
        let bid_bottom = floor_to_tick(bounds.last_bid * below, tick_size);

        let ask_span = span(ask_top - zero_ask, tick_size);
        let bid_span = span(zero_bid - bid_bottom, tick_size);

        Self {
            tick_size,
            zero_ask,
            zero_bid,
            depth: ask_span.max(bid_span),
        }
    }

    /// Number of slots per side
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn tick_size(&self) -> Decimal {
        self.tick_size
    }

    /// Price stored at slot 0 of `side`
    #[inline]
    pub fn anchor(&self, side: Side) -> Decimal {
        match side {
            Side::Ask => self.zero_ask,
            Side::Bid => self.zero_bid,
        }
    }

    /// Unchecked slot index, may be negative or past `depth`.
    ///
    /// Quantizes with round-half-away-from-zero.
    #[inline]
    pub fn index(&self, price: Decimal, side: Side) -> i64 {
        let delta = match side {
            Side::Ask => price - self.zero_ask,
            Side::Bid => self.zero_bid - price,
        };
        round_ticks(delta, self.tick_size)
    }

    /// Slot index when `price` falls inside `[0, depth)`.
    #[inline]
    pub fn slot(&self, price: Decimal, side: Side) -> Option<usize> {
        let idx = self.index(price, side);
        if idx >= 0 && (idx as u64) < self.depth as u64 {
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Price at slot `index` of `side`
    #[inline]
    pub fn price_at(&self, index: usize, side: Side) -> Decimal {
        let offset = Decimal::from(index as u64) * self.tick_size;
        match side {
            Side::Ask => self.zero_ask + offset,
            Side::Bid => self.zero_bid - offset,
        }
    }
}

/// Tick count for `delta`, rounded half away from zero; saturates on overflow.
fn round_ticks(delta: Decimal, tick_size: Decimal) -> i64 {
    delta
        .checked_div(tick_size)
        .map(|t| t.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|t| t.to_i64())
        .unwrap_or(if delta.is_sign_negative() { i64::MIN } else { i64::MAX })
}

fn span(range: Decimal, tick_size: Decimal) -> usize {
    let ticks = round_ticks(range, tick_size).max(0);
    usize::try_from(ticks).unwrap_or(usize::MAX).saturating_add(1)
}

fn floor_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    (price / tick_size).floor() * tick_size
}

fn ceil_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    (price / tick_size).ceil() * tick_size
}
