/// OrderBook Trait - one contract, two representations
///
/// Both the windowed array book and the sparse ordered-map book implement
/// this trait so the replica layer (sequencing, validity flags, timestamps)
/// stays the same whichever storage backs a symbol.
///
/// ## Implementations
/// - `WindowedBook`: tick-indexed arrays, O(1) update, bounded price range
/// - `SparseBook`: `BTreeMap` per side, O(log n) update, unbounded range
///
/// ## Example
/// ```rust
/// use lob_mirror::domain::orderbook::{Level, OrderBook, SparseBook, Side};
/// use rust_decimal::Decimal;
///
/// let mut book = SparseBook::new("BTCUSDT", 1);
/// book.apply_snapshot(
///     &[Level::new(Decimal::new(1001, 1), Decimal::ONE)],
///     &[Level::new(Decimal::new(999, 1), Decimal::ONE)],
/// ).unwrap();
/// assert_eq!(book.best(Side::Ask).unwrap().price, Decimal::new(1001, 1));
/// ```

use super::types::{BookKind, Level, LevelChange, Quote, Side};
use crate::shared::error::BookError;
use rust_decimal::Decimal;

pub trait OrderBook: Send {
    /// Replaces both sides with a full image.
    ///
    /// Entries are ordered best to worst per side, as the feed delivers them.
    /// Zero-size entries are skipped. On success the best pointers refer to
    /// the first nonzero entry of each side.
    fn apply_snapshot(&mut self, asks: &[Level], bids: &[Level]) -> Result<(), BookError>;

    /// Applies one replace instruction.
    ///
    /// Size zero removes the level; any other size overwrites it. When the
    /// current best level is vacated the next nonzero level behind it becomes
    /// best; if there is none the book is corrupt and
    /// `BookError::IntegrityViolation` is returned.
    fn apply_level(&mut self, side: Side, level: Level) -> Result<LevelChange, BookError>;

    /// Best nonzero level of `side`
    fn best(&self, side: Side) -> Option<Quote>;

    /// Nonzero levels of `side`, best first, at most `limit` entries
    fn levels(&self, side: Side, limit: usize) -> Vec<Quote>;

    /// Number of nonzero levels on `side`
    fn level_count(&self, side: Side) -> usize;

    /// Size resting at exactly `price`, zero if none
    fn size_at(&self, side: Side, price: Decimal) -> Decimal;

    fn kind(&self) -> BookKind;

    #[inline]
    fn best_bid(&self) -> Option<Quote> {
        self.best(Side::Bid)
    }

    #[inline]
    fn best_ask(&self) -> Option<Quote> {
        self.best(Side::Ask)
    }

    /// best ask - best bid, when both sides are present
    fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBook {
        bid: Option<Quote>,
        ask: Option<Quote>,
    }

    impl OrderBook for MockBook {
        fn apply_snapshot(&mut self, _asks: &[Level], _bids: &[Level]) -> Result<(), BookError> {
            Ok(())
        }

        fn apply_level(&mut self, _side: Side, _level: Level) -> Result<LevelChange, BookError> {
            Ok(LevelChange::default())
        }

        fn best(&self, side: Side) -> Option<Quote> {
            match side {
                Side::Ask => self.ask,
                Side::Bid => self.bid,
            }
        }

        fn levels(&self, side: Side, _limit: usize) -> Vec<Quote> {
            self.best(side).into_iter().collect()
        }

        fn level_count(&self, side: Side) -> usize {
            self.best(side).map_or(0, |_| 1)
        }

        fn size_at(&self, _side: Side, _price: Decimal) -> Decimal {
            Decimal::ZERO
        }

        fn kind(&self) -> BookKind {
            BookKind::Sparse
        }
    }

    #[test]
    fn test_trait_spread_and_mid() {
        let book = MockBook {
            bid: Some(Quote::new(Decimal::new(9990, 2), Decimal::ONE)),
            ask: Some(Quote::new(Decimal::new(10010, 2), Decimal::ONE)),
        };
        assert_eq!(book.spread(), Some(Decimal::new(20, 2)));
        assert_eq!(book.mid_price(), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn test_trait_one_sided_book() {
        let book = MockBook {
            bid: None,
            ask: Some(Quote::new(Decimal::ONE, Decimal::ONE)),
        };
        assert_eq!(book.spread(), None);
        assert_eq!(book.mid_price(), None);
    }
}
