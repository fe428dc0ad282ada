/// 合成行情生成器
///
/// Produces a deterministic (seeded) stream of orderbook frames for one
/// symbol: a snapshot, then deltas that insert, resize and remove levels.
/// The generator keeps its own copy of the book, so replaying its output
/// can be checked level by level against `expected_levels`.
///
/// Generated deltas stay inside the snapshot's price range, never cross the
/// fixed mid price, and never empty a side, so a correct replica never
/// invalidates while replaying them.

use crate::domain::orderbook::{Level, Quote, Side};
use crate::shared::protocol::{BookData, BookMessage, UpdateType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

pub struct FeedGenerator {
    rng: StdRng,
    symbol: String,
    tick_size: Decimal,
    /// 中间价（tick 数），买卖盘不会越过
    mid_ticks: i64,
    /// 每侧档位数
    depth: i64,
    asks: BTreeMap<i64, Decimal>,
    bids: BTreeMap<i64, Decimal>,
    update_id: u64,
    ts: i64,
}

impl FeedGenerator {
    pub fn new(symbol: impl Into<String>, tick_size: Decimal, mid_ticks: i64, depth: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: symbol.into(),
            tick_size,
            mid_ticks,
            depth: depth.max(1) as i64,
            asks: BTreeMap::new(),
            bids: BTreeMap::new(),
            update_id: 0,
            ts: 1_700_000_000_000,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Full book, every tick of the range populated
    pub fn snapshot(&mut self) -> BookMessage {
        self.asks.clear();
        self.bids.clear();
        for offset in 1..=self.depth {
            let ask_size = self.random_size();
            let bid_size = self.random_size();
            self.asks.insert(self.mid_ticks + offset, ask_size);
            self.bids.insert(self.mid_ticks - offset, bid_size);
        }

        let asks = self.side_levels(Side::Ask);
        let bids = self.side_levels(Side::Bid);
        self.message(UpdateType::Snapshot, asks, bids)
    }

    /// 1-4 replace instructions per side, each price at most once
    pub fn delta(&mut self) -> BookMessage {
        let asks = self.side_changes(Side::Ask);
        let bids = self.side_changes(Side::Bid);
        self.message(UpdateType::Delta, asks, bids)
    }

    /// Delta whose update id repeats the previous one
    pub fn stale_delta(&mut self) -> BookMessage {
        let mut msg = self.delta();
        // 回退序列号，模拟乱序
        self.update_id -= 1;
        msg.data.update_id = self.update_id;
        msg
    }

    /// Nonzero levels the generator believes are resting, best first
    pub fn expected_levels(&self, side: Side) -> Vec<Quote> {
        let to_quote = |(&ticks, &size): (&i64, &Decimal)| Quote::new(self.price(ticks), size);
        match side {
            Side::Ask => self.asks.iter().map(to_quote).collect(),
            Side::Bid => self.bids.iter().rev().map(to_quote).collect(),
        }
    }

    /// One JSON line
    pub fn frame_text(msg: &BookMessage) -> String {
        serde_json::to_string(msg).unwrap_or_default()
    }

    fn side_changes(&mut self, side: Side) -> Vec<Level> {
        let count = self.rng.gen_range(1..=4);
        let mut touched = HashSet::new();
        let mut changes = Vec::with_capacity(count);

        for _ in 0..count {
            let offset = self.rng.gen_range(1..=self.depth);
            let ticks = match side {
                Side::Ask => self.mid_ticks + offset,
                Side::Bid => self.mid_ticks - offset,
            };
            if !touched.insert(ticks) {
                continue;
            }

            let remove = self.rng.gen_bool(0.3);
            let new_size = self.random_size();
            let book = match side {
                Side::Ask => &mut self.asks,
                Side::Bid => &mut self.bids,
            };
            // 不撤掉一侧的最后一档
            let last_level = book.len() == 1 && book.contains_key(&ticks);

            let size = if remove && !last_level {
                book.remove(&ticks);
                Decimal::ZERO
            } else {
                book.insert(ticks, new_size);
                new_size
            };
            changes.push(Level::new(self.price(ticks), size));
        }
        changes
    }

    fn side_levels(&self, side: Side) -> Vec<Level> {
        self.expected_levels(side)
            .into_iter()
            .map(|quote| Level::new(quote.price, quote.size))
            .collect()
    }

    fn message(&mut self, update_type: UpdateType, asks: Vec<Level>, bids: Vec<Level>) -> BookMessage {
        self.update_id += 1;
        self.ts += self.rng.gen_range(1..20);
        BookMessage {
            topic: format!("orderbook.{}.{}", self.depth, self.symbol),
            update_type,
            ts: self.ts,
            cts: Some(self.ts - 1),
            data: BookData {
                symbol: self.symbol.clone(),
                bids,
                asks,
                update_id: self.update_id,
                seq: self.update_id * 3,
            },
        }
    }

    fn random_size(&mut self) -> Decimal {
        Decimal::new(self.rng.gen_range(1..100_000), 3)
    }

    fn price(&self, ticks: i64) -> Decimal {
        Decimal::from(ticks) * self.tick_size
    }
}
