/// Replica book - one instrument's reconstructed order book
///
/// Wraps an `OrderBook` representation with the state the feed protocol
/// needs: validity and snapshot flags, the last applied update id, and the
/// exchange timestamps used to compute delay.
///
/// ## Apply rules
/// - A snapshot always rebuilds the book and makes it valid.
/// - A delta before any snapshot is rejected (`MissingSnapshot`).
/// - A delta on an invalidated book is rejected (`AwaitingResync`).
/// - A delta whose update id does not exceed the last applied one
///   invalidates the book without touching any level.
/// - Any level error while applying (window overflow, exhausted side)
///   invalidates the book; the rest of the message is skipped.
///
/// Nothing here panics or escapes: every failure becomes an `ApplyOutcome`.

use super::instrument::InstrumentSpec;
use super::orderbook::{BookKind, Level, LevelChange, OrderBook, Quote, Side, SparseBook, WindowedBook};
use crate::shared::error::{BookError, StoreError};
use crate::shared::protocol::BookMessage;
use crate::shared::timestamp::delay_millis;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Book construction settings shared by every symbol of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    pub kind: BookKind,
    /// Window extension beyond the snapshot range, as a ratio of price
    pub window_offset: Decimal,
    /// Upper bound on slots per side for windowed books
    pub max_window_slots: usize,
    /// Levels per side copied into published views; `None` copies all
    pub view_depth: Option<usize>,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            kind: BookKind::Windowed,
            window_offset: Decimal::new(1, 2),
            max_window_slots: 1_000_000,
            view_depth: None,
        }
    }
}

impl BookConfig {
    /// 窗口扩展比例须在 [0, 1) 内
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.window_offset < Decimal::ZERO || self.window_offset >= Decimal::ONE {
            return Err(StoreError::InvalidWindowOffset(self.window_offset));
        }
        Ok(())
    }
}

/// Result of applying one orderbook message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Message applied; `changed` when a best price moved or a size changed
    Applied { changed: bool },
    /// Message ignored, book state untouched
    Rejected(BookError),
    /// Book marked invalid, a fresh snapshot is required
    Invalidated(BookError),
}

impl ApplyOutcome {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    /// Every value `label` can return
    pub const LABELS: [&'static str; 4] = ["applied", "unchanged", "rejected", "invalidated"];

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied { changed: true } => "applied",
            ApplyOutcome::Applied { changed: false } => "unchanged",
            ApplyOutcome::Rejected(_) => "rejected",
            ApplyOutcome::Invalidated(_) => "invalidated",
        }
    }
}

/// Immutable copy of a book published to readers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub symbol: Arc<str>,
    pub kind: BookKind,
    pub valid: bool,
    pub snapshot_received: bool,
    pub last_update_id: u64,
    pub seq: u64,
    pub best_bid: Option<Quote>,
    pub best_ask: Option<Quote>,
    /// Best first
    pub bids: Vec<Quote>,
    /// Best first
    pub asks: Vec<Quote>,
    pub snapshot_time_ms: Option<i64>,
    pub update_time_ms: Option<i64>,
    pub delay_ms: i64,
}

impl BookView {
    /// View of a book that has not seen any message yet
    pub fn empty(symbol: Arc<str>, kind: BookKind) -> Self {
        Self {
            symbol,
            kind,
            valid: false,
            snapshot_received: false,
            last_update_id: 0,
            seq: 0,
            best_bid: None,
            best_ask: None,
            bids: Vec::new(),
            asks: Vec::new(),
            snapshot_time_ms: None,
            update_time_ms: None,
            delay_ms: 0,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask?.price - self.best_bid?.price)
    }
}

pub struct ReplicaBook {
    symbol: Arc<str>,
    book: Box<dyn OrderBook>,
    valid: bool,
    snapshot_received: bool,
    last_update_id: u64,
    seq: u64,
    snapshot_time_ms: Option<i64>,
    update_time_ms: Option<i64>,
    delay_ms: i64,
}

impl ReplicaBook {
    /// `spec.tick_size` must be positive.
    pub fn new(symbol: Arc<str>, spec: &InstrumentSpec, config: &BookConfig) -> Self {
        let book: Box<dyn OrderBook> = match config.kind {
            BookKind::Windowed => Box::new(WindowedBook::new(
                symbol.clone(),
                spec.tick_size,
                config.window_offset,
                config.max_window_slots,
            )),
            BookKind::Sparse => Box::new(SparseBook::new(symbol.clone(), spec.decimals())),
        };

        Self {
            symbol,
            book,
            valid: false,
            snapshot_received: false,
            last_update_id: 0,
            seq: 0,
            snapshot_time_ms: None,
            update_time_ms: None,
            delay_ms: 0,
        }
    }

    /// Apply one snapshot or delta received at `now_ms`.
    pub fn apply(&mut self, msg: &BookMessage, now_ms: i64) -> ApplyOutcome {
        let engine_time = msg.engine_time();
        self.update_time_ms = Some(engine_time);
        self.delay_ms = delay_millis(engine_time, now_ms);

        if msg.is_snapshot() {
            self.apply_snapshot(msg, now_ms)
        } else {
            self.apply_delta(msg)
        }
    }

    fn apply_snapshot(&mut self, msg: &BookMessage, now_ms: i64) -> ApplyOutcome {
        if let Err(e) = self.book.apply_snapshot(&msg.data.asks, &msg.data.bids) {
            return self.invalidate(e);
        }

        self.valid = true;
        self.snapshot_received = true;
        self.last_update_id = msg.data.update_id;
        self.seq = msg.data.seq;
        self.snapshot_time_ms = Some(now_ms);
        ApplyOutcome::Applied { changed: true }
    }

    fn apply_delta(&mut self, msg: &BookMessage) -> ApplyOutcome {
        if !self.snapshot_received {
            return ApplyOutcome::Rejected(BookError::MissingSnapshot {
                symbol: self.symbol.to_string(),
            });
        }
        if !self.valid {
            return ApplyOutcome::Rejected(BookError::AwaitingResync {
                symbol: self.symbol.to_string(),
            });
        }

        let update_id = msg.data.update_id;
        if update_id <= self.last_update_id {
            return self.invalidate(BookError::OutOfOrderSequence {
                symbol: self.symbol.to_string(),
                last: self.last_update_id,
                received: update_id,
            });
        }

        let mut change = LevelChange::default();
        for (side, levels) in [(Side::Bid, &msg.data.bids), (Side::Ask, &msg.data.asks)] {
            if let Err(e) = self.apply_levels(side, levels, &mut change) {
                return self.invalidate(e);
            }
        }

        self.last_update_id = update_id;
        self.seq = msg.data.seq;
        ApplyOutcome::Applied { changed: change.is_material() }
    }

    fn apply_levels(&mut self, side: Side, levels: &[Level], change: &mut LevelChange) -> Result<(), BookError> {
        for &level in levels {
            change.merge(self.book.apply_level(side, level)?);
        }
        Ok(())
    }

    fn invalidate(&mut self, error: BookError) -> ApplyOutcome {
        self.valid = false;
        ApplyOutcome::Invalidated(error)
    }

    /// Copy of the current state, levels capped at `depth` per side
    pub fn view(&self, depth: Option<usize>) -> BookView {
        let limit = depth.unwrap_or(usize::MAX);
        BookView {
            symbol: self.symbol.clone(),
            kind: self.book.kind(),
            valid: self.valid,
            snapshot_received: self.snapshot_received,
            last_update_id: self.last_update_id,
            seq: self.seq,
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
            bids: self.book.levels(Side::Bid, limit),
            asks: self.book.levels(Side::Ask, limit),
            snapshot_time_ms: self.snapshot_time_ms,
            update_time_ms: self.update_time_ms,
            delay_ms: self.delay_ms,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn snapshot_received(&self) -> bool {
        self.snapshot_received
    }

    #[inline]
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn snapshot_time_ms(&self) -> Option<i64> {
        self.snapshot_time_ms
    }

    pub fn update_time_ms(&self) -> Option<i64> {
        self.update_time_ms
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    pub fn best_bid(&self) -> Option<Quote> {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Option<Quote> {
        self.book.best_ask()
    }

    pub fn size_at(&self, side: Side, price: Decimal) -> Decimal {
        self.book.size_at(side, price)
    }
}
