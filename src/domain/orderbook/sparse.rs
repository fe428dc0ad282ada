/// Sparse order book - one `BTreeMap` per side
///
/// Only nonzero levels are stored, so depth is unbounded and there is no
/// window to overflow. The next best level after a removal is the first key
/// of the map (asks) or the last key (bids).
///
/// Keys are rounded to `decimals` places, half away from zero, the same
/// quantization the windowed book applies to ticks.

use super::traits::OrderBook;
use super::types::{BookKind, Level, LevelChange, Quote, Side};
use crate::shared::error::BookError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct SparseBook {
    symbol: Arc<str>,
    decimals: u32,
    asks: BTreeMap<Decimal, Decimal>,
    bids: BTreeMap<Decimal, Decimal>,
}

impl SparseBook {
    pub fn new(symbol: impl Into<Arc<str>>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
        }
    }

    #[inline]
    fn key(&self, price: Decimal) -> Decimal {
        price.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero)
    }

    #[inline]
    fn side(&self, side: Side) -> &BTreeMap<Decimal, Decimal> {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    fn best_key(map: &BTreeMap<Decimal, Decimal>, side: Side) -> Option<Decimal> {
        match side {
            Side::Ask => map.keys().next().copied(),
            Side::Bid => map.keys().next_back().copied(),
        }
    }

    fn collect(&self, levels: &[Level]) -> BTreeMap<Decimal, Decimal> {
        levels
            .iter()
            .filter(|level| !level.size.is_zero())
            .map(|level| (self.key(level.price), level.size))
            .collect()
    }
}

impl OrderBook for SparseBook {
    fn apply_snapshot(&mut self, asks: &[Level], bids: &[Level]) -> Result<(), BookError> {
        // 稀疏表示允许单边为空
        self.asks = self.collect(asks);
        self.bids = self.collect(bids);
        Ok(())
    }

    fn apply_level(&mut self, side: Side, level: Level) -> Result<LevelChange, BookError> {
        let key = self.key(level.price);
        let map = match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        };
        let old_best = Self::best_key(map, side);

        let old_size = if level.size.is_zero() {
            let removed = map.remove(&key);
            if old_best == Some(key) && map.is_empty() {
                // 最优档被撤且无后续档位：簿已损坏
                return Err(BookError::IntegrityViolation {
                    symbol: self.symbol.to_string(),
                    side,
                    price: level.price,
                });
            }
            removed
        } else {
            map.insert(key, level.size)
        };

        Ok(LevelChange {
            best_moved: Self::best_key(map, side) != old_best,
            size_changed: old_size.unwrap_or(Decimal::ZERO) != level.size,
        })
    }

    fn best(&self, side: Side) -> Option<Quote> {
        let map = self.side(side);
        let entry = match side {
            Side::Ask => map.iter().next(),
            Side::Bid => map.iter().next_back(),
        };
        entry.map(|(&price, &size)| Quote::new(price, size))
    }

    fn levels(&self, side: Side, limit: usize) -> Vec<Quote> {
        let map = self.side(side);
        let to_quote = |(&price, &size): (&Decimal, &Decimal)| Quote::new(price, size);
        match side {
            Side::Ask => map.iter().take(limit).map(to_quote).collect(),
            Side::Bid => map.iter().rev().take(limit).map(to_quote).collect(),
        }
    }

    fn level_count(&self, side: Side) -> usize {
        self.side(side).len()
    }

    fn size_at(&self, side: Side, price: Decimal) -> Decimal {
        self.side(side)
            .get(&self.key(price))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn kind(&self) -> BookKind {
        BookKind::Sparse
    }
}
