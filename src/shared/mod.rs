/// Shared utilities and types used across all layers
///
/// This module contains:
/// - Feed protocol (orderbook/kline/ack frames, frame discrimination)
/// - Error types
/// - Symbol interning, wall-clock helpers, metrics
/// - Collections (nonzero-slot bitmap)

pub mod collections;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod symbol_pool;
pub mod timestamp;

// Re-export commonly used types
pub use error::{BookError, FeedError, SequencerError, StoreError};
pub use protocol::{decode_frame, BookData, BookMessage, FeedFrame, KlineMessage, SubscriptionAck, UpdateType};
pub use symbol_pool::SymbolPool;
pub use timestamp::now_millis;
