/// 基于Tick的窗口数组订单簿
///
/// Each side is a pre-allocated array of `Quote`s, one per tick inside the
/// window computed from the last snapshot (see `PriceWindow`). Every slot
/// carries its grid price from allocation on; only sizes change afterwards.
///
/// Design points:
/// 1. **Price discretization** - exchange prices move on a fixed tick
/// 2. **Array indexing** - O(1) price → slot instead of a tree lookup
/// 3. **Bitmap of nonzero slots** - finding the level behind a vacated best
///    price is a word scan, not a walk over empty slots
/// 4. **Bounded range** - a delta outside the window is an error; the book
///    must be rebuilt from a fresh snapshot

use super::price_window::{PriceWindow, WindowBounds};
use super::traits::OrderBook;
use super::types::{BookKind, Level, LevelChange, Quote, Side};
use crate::shared::collections::FastBitmap;
use crate::shared::error::BookError;
use rust_decimal::Decimal;
use std::sync::Arc;

/// One side of the window
#[derive(Debug, Clone, Default)]
struct SideSlots {
    /// 索引0 = 锚定价格，索引越大价格越差
    slots: Vec<Quote>,
    /// bit=1 表示该槽位 size > 0
    nonzero: FastBitmap,
    /// 最优价索引（缓存）
    best: Option<usize>,
}

impl SideSlots {
    fn allocate(window: &PriceWindow, side: Side) -> Self {
        let depth = window.depth();
        Self {
            slots: (0..depth).map(|i| Quote::empty(window.price_at(i, side))).collect(),
            nonzero: FastBitmap::new(depth),
            best: None,
        }
    }

    #[inline]
    fn write(&mut self, idx: usize, size: Decimal) {
        self.slots[idx].size = size;
        self.nonzero.set(idx, !size.is_zero());
    }
}

/// Windowed order book for one instrument
pub struct WindowedBook {
    symbol: Arc<str>,
    tick_size: Decimal,
    /// 窗口相对快照首尾价格的扩展比例
    offset_ratio: Decimal,
    max_slots: usize,
    window: Option<PriceWindow>,
    asks: SideSlots,
    bids: SideSlots,
}

impl WindowedBook {
    pub fn new(
        symbol: impl Into<Arc<str>>,
        tick_size: Decimal,
        offset_ratio: Decimal,
        max_slots: usize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            offset_ratio,
            max_slots,
            window: None,
            asks: SideSlots::default(),
            bids: SideSlots::default(),
        }
    }

    /// Current window, `None` before the first snapshot
    pub fn window(&self) -> Option<&PriceWindow> {
        self.window.as_ref()
    }

    #[cfg(test)]
    fn slots(&self, side: Side) -> &[Quote] {
        &self.side(side).slots
    }

    #[inline]
    fn side(&self, side: Side) -> &SideSlots {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    fn first_last(&self, side: Side, levels: &[Level]) -> Result<(Decimal, Decimal), BookError> {
        match (levels.first(), levels.last()) {
            (Some(first), Some(last)) => Ok((first.price, last.price)),
            _ => Err(BookError::EmptySnapshotSide {
                symbol: self.symbol.to_string(),
                side,
            }),
        }
    }

    fn fill(&self, window: &PriceWindow, side: Side, levels: &[Level]) -> Result<SideSlots, BookError> {
        let mut slots = SideSlots::allocate(window, side);
        for level in levels {
            let idx = window.slot(level.price, side).ok_or_else(|| BookError::PriceOutOfWindow {
                symbol: self.symbol.to_string(),
                side,
                price: level.price,
                depth: window.depth(),
            })?;
            slots.write(idx, level.size);
        }
        // 快照按优到劣排列，第一个非零槽位即最优价
        slots.best = slots.nonzero.find_first_one();
        Ok(slots)
    }
}

impl OrderBook for WindowedBook {
    fn apply_snapshot(&mut self, asks: &[Level], bids: &[Level]) -> Result<(), BookError> {
        let (first_ask, last_ask) = self.first_last(Side::Ask, asks)?;
        let (first_bid, last_bid) = self.first_last(Side::Bid, bids)?;

        let window = PriceWindow::init(
            WindowBounds { first_ask, last_ask, first_bid, last_bid },
            self.offset_ratio,
            self.tick_size,
        );
        if window.depth() > self.max_slots {
            return Err(BookError::WindowTooLarge {
                symbol: self.symbol.to_string(),
                required: window.depth(),
                limit: self.max_slots,
            });
        }

        // Build both sides before touching the live book so a bad snapshot
        // leaves the previous image intact.
        let ask_slots = self.fill(&window, Side::Ask, asks)?;
        let bid_slots = self.fill(&window, Side::Bid, bids)?;

        self.asks = ask_slots;
        self.bids = bid_slots;
        self.window = Some(window);
        Ok(())
    }

    fn apply_level(&mut self, side: Side, level: Level) -> Result<LevelChange, BookError> {
        let Some(window) = self.window.as_ref() else {
            return Err(BookError::MissingSnapshot { symbol: self.symbol.to_string() });
        };
        let Some(idx) = window.slot(level.price, side) else {
            return Err(BookError::PriceOutOfWindow {
                symbol: self.symbol.to_string(),
                side,
                price: level.price,
                depth: window.depth(),
            });
        };

        let symbol = &self.symbol;
        let slots = match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        };
        let old_best = slots.best;
        let old_size = slots.slots[idx].size;

        if old_best == Some(idx) && level.size.is_zero() {
            // 最优价被撤空：向劣价方向找下一个非零槽位
            let next = slots.nonzero.find_next_one(idx).ok_or_else(|| {
                BookError::IntegrityViolation {
                    symbol: symbol.to_string(),
                    side,
                    price: level.price,
                }
            })?;
            slots.best = Some(next);
        } else if !level.size.is_zero() && old_best.map_or(true, |best| idx < best) {
            // 更优价格直接成为最优价
            slots.best = Some(idx);
        }

        slots.write(idx, level.size);

        Ok(LevelChange {
            best_moved: slots.best != old_best,
            size_changed: old_size != level.size,
        })
    }

    fn best(&self, side: Side) -> Option<Quote> {
        let slots = self.side(side);
        slots.best.map(|idx| slots.slots[idx])
    }

    fn levels(&self, side: Side, limit: usize) -> Vec<Quote> {
        let slots = self.side(side);
        slots
            .nonzero
            .iter_ones()
            .take(limit)
            .map(|idx| slots.slots[idx])
            .collect()
    }

    fn level_count(&self, side: Side) -> usize {
        self.side(side).nonzero.count_ones()
    }

    fn size_at(&self, side: Side, price: Decimal) -> Decimal {
        self.window
            .as_ref()
            .and_then(|window| window.slot(price, side))
            .map_or(Decimal::ZERO, |idx| self.side(side).slots[idx].size)
    }

    fn kind(&self) -> BookKind {
        BookKind::Windowed
    }
}
