/// Feed Router - entry point for raw text frames
///
/// Decodes a frame, classifies it, and hands it on:
/// - orderbook → `BookStore::route` (returns once queued)
/// - kline → broadcast to kline subscribers as-is
/// - ack → logged; a refused request surfaces as `FeedError::Rejected`
///
/// The router holds no per-symbol state and never awaits, so it can sit
/// directly in a transport's read loop.

use super::store::BookStore;
use crate::shared::error::FeedError;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{decode_frame, FeedFrame, KlineMessage};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const KLINE_CAPACITY: usize = 1024;

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Orderbook,
    Kline,
    Ack,
}

pub struct FeedRouter {
    store: BookStore,
    klines: broadcast::Sender<KlineMessage>,
}

impl FeedRouter {
    pub fn new(store: BookStore) -> Self {
        let (klines, _) = broadcast::channel(KLINE_CAPACITY);
        Self { store, klines }
    }

    pub fn store(&self) -> &BookStore {
        &self.store
    }

    pub fn klines(&self) -> broadcast::Receiver<KlineMessage> {
        self.klines.subscribe()
    }

    /// Handle one text frame.
    pub fn handle_text(&self, text: &str) -> Result<Routed, FeedError> {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                METRICS.frames_total.with_label_values(&["malformed"]).inc();
                return Err(e);
            }
        };
        METRICS.frames_total.with_label_values(&[frame.kind()]).inc();
        self.handle_frame(frame)
    }

    pub fn handle_frame(&self, frame: FeedFrame) -> Result<Routed, FeedError> {
        match frame {
            FeedFrame::Orderbook(msg) => {
                self.store.route(msg)?;
                Ok(Routed::Orderbook)
            }
            FeedFrame::Kline(msg) => {
                debug!(topic = %msg.topic, candles = msg.data.len(), "kline");
                // 没有订阅者时丢弃
                let _ = self.klines.send(msg);
                Ok(Routed::Kline)
            }
            FeedFrame::Ack(ack) if ack.success => {
                info!(op = %ack.op, conn_id = %ack.conn_id, req_id = ?ack.req_id, "request acknowledged");
                Ok(Routed::Ack)
            }
            FeedFrame::Ack(ack) => {
                warn!(op = %ack.op, conn_id = %ack.conn_id, ret_msg = %ack.ret_msg, "request rejected");
                Err(FeedError::Rejected {
                    op: ack.op,
                    message: ack.ret_msg,
                })
            }
        }
    }
}
