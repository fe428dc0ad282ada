//! Error types
//!
//! Every book-level failure is contained at the single-message boundary and
//! turned into a state change on the book (`valid = false`). These enums carry
//! enough context (symbol, side, price, sequence numbers) to diagnose the
//! failure from a log line alone.

use crate::domain::orderbook::Side;
use rust_decimal::Decimal;
use thiserror::Error;

/// Book reconstruction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// Delta arrived before any snapshot was applied
    #[error("{symbol}: delta received before snapshot")]
    MissingSnapshot { symbol: String },

    /// Book was invalidated and is waiting for a fresh snapshot
    #[error("{symbol}: book invalidated, awaiting snapshot")]
    AwaitingResync { symbol: String },

    /// Update id did not advance
    #[error("{symbol}: update id {received} does not exceed last applied {last}")]
    OutOfOrderSequence {
        symbol: String,
        last: u64,
        received: u64,
    },

    /// Delta referenced a price outside the allocated window
    #[error("{symbol}: {side} price {price} outside window (depth {depth})")]
    PriceOutOfWindow {
        symbol: String,
        side: Side,
        price: Decimal,
        depth: usize,
    },

    /// Best level vacated and no other nonzero level left on that side
    #[error("{symbol}: {side} best level {price} removed, no level behind it")]
    IntegrityViolation {
        symbol: String,
        side: Side,
        price: Decimal,
    },

    /// Windowed snapshots need both sides to anchor the window
    #[error("{symbol}: snapshot has empty {side} side")]
    EmptySnapshotSide { symbol: String, side: Side },

    /// Snapshot range would need more slots than configured
    #[error("{symbol}: window needs {required} slots, limit is {limit}")]
    WindowTooLarge {
        symbol: String,
        required: usize,
        limit: usize,
    },
}

impl BookError {
    /// Every value `kind` can return
    pub const KINDS: [&'static str; 7] = [
        "missing_snapshot",
        "awaiting_resync",
        "out_of_order_sequence",
        "price_out_of_window",
        "integrity_violation",
        "empty_snapshot_side",
        "window_too_large",
    ];

    /// Short label used for metrics and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            BookError::MissingSnapshot { .. } => "missing_snapshot",
            BookError::AwaitingResync { .. } => "awaiting_resync",
            BookError::OutOfOrderSequence { .. } => "out_of_order_sequence",
            BookError::PriceOutOfWindow { .. } => "price_out_of_window",
            BookError::IntegrityViolation { .. } => "integrity_violation",
            BookError::EmptySnapshotSide { .. } => "empty_snapshot_side",
            BookError::WindowTooLarge { .. } => "window_too_large",
        }
    }
}

/// Lane (per-symbol queue) errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// Sequencer was shut down, admission is closed
    #[error("sequencer is shut down")]
    Closed,

    /// Lane consumer has exited and can no longer accept work
    #[error("lane {0} is closed")]
    LaneClosed(String),

    /// No tokio runtime available to host lane consumers
    #[error("no tokio runtime: {0}")]
    NoRuntime(String),
}

/// Book store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Metadata collaborator has no entry for the symbol
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Tick size must be strictly positive
    #[error("invalid tick size {tick_size} for {symbol}")]
    InvalidTickSize { symbol: String, tick_size: Decimal },

    /// Window offset ratio must lie in [0, 1)
    #[error("window offset {0} outside [0, 1)")]
    InvalidWindowOffset(Decimal),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

/// Inbound frame errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Frame matched neither the data nor the acknowledgment shape
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame had the right shape but a field failed to decode
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Exchange refused a request (`success == false`)
    #[error("request {op} rejected: {message}")]
    Rejected { op: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
