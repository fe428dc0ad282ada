/// Book Store - symbol → replica book, routed through per-symbol lanes
///
/// ## Write path
/// `route(msg)` finds (or lazily creates) the symbol's book, then enqueues
/// the apply on that symbol's lane. It never waits for the apply.
///
/// ## Read path
/// Readers never touch the live book. After each message that changed state,
/// flipped validity or moved the engine timestamps, the lane publishes a fresh
/// `Arc<BookView>`; queries clone that `Arc`. Only material changes (levels or
/// validity) go out on the lane to registered `BookObserver`s and on a
/// broadcast channel of `BookEvent`s.

use super::sequencer::{LaneStop, UpdateSequencer};
use crate::domain::instrument::InstrumentCatalog;
use crate::domain::orderbook::Quote;
use crate::domain::replica::{ApplyOutcome, BookConfig, BookView, ReplicaBook};
use crate::shared::error::{BookError, SequencerError, StoreError};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::BookMessage;
use crate::shared::symbol_pool::SymbolPool;
use crate::shared::timestamp::{delay_duration, now_millis};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 1024;

/// Everything a store needs, passed in explicitly
#[derive(Clone)]
pub struct StoreContext {
    pub catalog: Arc<dyn InstrumentCatalog>,
    pub config: BookConfig,
    pub runtime: Handle,
}

impl StoreContext {
    /// Rejects a `config` no book could be built from.
    pub fn new(catalog: Arc<dyn InstrumentCatalog>, config: BookConfig, runtime: Handle) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self { catalog, config, runtime })
    }

    /// Bind to the runtime of the calling context
    pub fn current(catalog: Arc<dyn InstrumentCatalog>, config: BookConfig) -> Result<Self, StoreError> {
        let runtime = Handle::try_current().map_err(|e| SequencerError::NoRuntime(e.to_string()))?;
        Self::new(catalog, config, runtime)
    }
}

/// Change notification
#[derive(Debug, Clone)]
pub enum BookEvent {
    Updated(Arc<BookView>),
    Invalidated { symbol: Arc<str>, reason: BookError },
}

/// Callback registered on the store; invoked on the symbol's lane
pub trait BookObserver: Send + Sync {
    fn on_update(&self, view: &Arc<BookView>);

    fn on_invalidated(&self, _symbol: &str, _reason: &BookError) {}
}

struct BookSlot {
    /// 仅由该交易对的处理通道加锁
    book: Mutex<ReplicaBook>,
    /// 最近一次发布的只读快照
    view: RwLock<Arc<BookView>>,
}

impl BookSlot {
    fn published(&self) -> Arc<BookView> {
        self.view.read().clone()
    }
}

struct StoreInner {
    catalog: Arc<dyn InstrumentCatalog>,
    config: BookConfig,
    symbols: SymbolPool,
    books: RwLock<HashMap<Arc<str>, Arc<BookSlot>>>,
    sequencer: UpdateSequencer,
    observers: RwLock<Vec<Arc<dyn BookObserver>>>,
    events: broadcast::Sender<BookEvent>,
}

/// Cheap to clone; clones share the same books
#[derive(Clone)]
pub struct BookStore {
    inner: Arc<StoreInner>,
}

impl BookStore {
    pub fn new(context: StoreContext) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                catalog: context.catalog,
                config: context.config,
                symbols: SymbolPool::new(),
                books: RwLock::new(HashMap::new()),
                sequencer: UpdateSequencer::new(context.runtime),
                observers: RwLock::new(Vec::new()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &BookConfig {
        &self.inner.config
    }

    /// Create the book for `symbol` if it does not exist yet.
    pub fn subscribe(&self, symbol: &str) -> Result<(), StoreError> {
        self.inner.slot_or_create(symbol).map(|_| ())
    }

    /// Drop the book and abandon its lane. Returns false if not subscribed.
    pub fn unsubscribe(&self, symbol: &str) -> bool {
        {
            let mut books = self.inner.books.write();
            if books.remove(symbol).is_none() {
                return false;
            }
            // 持有写锁关闭通道，`route` 无法在两者之间重建通道
            self.inner.sequencer.close_lane(symbol, LaneStop::Abandon);
            self.inner.symbols.release(symbol);
        }
        METRICS.books.dec();
        METRICS.remove_symbol(symbol, &ApplyOutcome::LABELS, &BookError::KINDS);
        info!(symbol, "book unsubscribed");
        true
    }

    /// Queue `msg` on its symbol's lane, subscribing on first reference.
    pub fn route(&self, msg: BookMessage) -> Result<(), StoreError> {
        let received_at = now_millis();
        loop {
            let (key, slot) = self.inner.slot_or_create(msg.symbol())?;
            let books = self.inner.books.read();
            // 查找后被退订（或已换成新订单簿）则重新查找
            if !books.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                continue;
            }

            let inner = self.inner.clone();
            self.inner.sequencer.enqueue(&key, async move {
                inner.apply(&slot, &msg, received_at);
            })?;
            return Ok(());
        }
    }

    /// Wait until every message routed to `symbol` so far has been applied.
    pub async fn flush(&self, symbol: &str) -> Result<(), StoreError> {
        let Some(key) = self.inner.symbols.get(symbol) else {
            return Ok(());
        };
        self.inner.sequencer.flush(&key).await?;
        Ok(())
    }

    pub async fn flush_all(&self) -> Result<(), StoreError> {
        for symbol in self.symbols() {
            self.flush(&symbol).await?;
        }
        Ok(())
    }

    pub fn add_observer(&self, observer: Arc<dyn BookObserver>) {
        self.inner.observers.write().push(observer);
    }

    pub fn events(&self) -> broadcast::Receiver<BookEvent> {
        self.inner.events.subscribe()
    }

    /// Latest published view
    pub fn view(&self, symbol: &str) -> Option<Arc<BookView>> {
        self.inner.books.read().get(symbol).map(|slot| slot.published())
    }

    pub fn best_bid(&self, symbol: &str) -> Option<Quote> {
        self.view(symbol)?.best_bid
    }

    pub fn best_ask(&self, symbol: &str) -> Option<Quote> {
        self.view(symbol)?.best_ask
    }

    /// False for unknown symbols
    pub fn is_valid(&self, symbol: &str) -> bool {
        self.view(symbol).is_some_and(|view| view.valid)
    }

    pub fn update_time_ms(&self, symbol: &str) -> Option<i64> {
        self.view(symbol)?.update_time_ms
    }

    pub fn delay(&self, symbol: &str) -> Option<i64> {
        self.view(symbol).map(|view| view.delay_ms)
    }

    /// Subscribed symbols, sorted
    pub fn symbols(&self) -> Vec<Arc<str>> {
        let mut symbols: Vec<_> = self.inner.books.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Subscribed symbols whose book is not currently trustworthy
    pub fn invalid_symbols(&self) -> Vec<Arc<str>> {
        let mut symbols: Vec<_> = self
            .inner
            .books
            .read()
            .iter()
            .filter(|(_, slot)| !slot.view.read().valid)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn lane_count(&self) -> usize {
        self.inner.sequencer.lane_count()
    }

    /// Stop every lane; further `route` calls fail.
    pub fn shutdown(&self) {
        self.inner.sequencer.shutdown();
    }
}

impl StoreInner {
    fn slot_or_create(&self, symbol: &str) -> Result<(Arc<str>, Arc<BookSlot>), StoreError> {
        if let Some((key, slot)) = self.books.read().get_key_value(symbol) {
            return Ok((key.clone(), slot.clone()));
        }

        let spec = self
            .catalog
            .lookup(symbol)
            .ok_or_else(|| StoreError::UnknownInstrument(symbol.to_string()))?;
        if spec.tick_size <= Decimal::ZERO {
            return Err(StoreError::InvalidTickSize {
                symbol: symbol.to_string(),
                tick_size: spec.tick_size,
            });
        }

        let mut books = self.books.write();
        // 获取写锁期间可能已被其他生产者创建
        if let Some((key, slot)) = books.get_key_value(symbol) {
            return Ok((key.clone(), slot.clone()));
        }

        let key = self.symbols.intern(symbol);
        let book = ReplicaBook::new(key.clone(), &spec, &self.config);
        let slot = Arc::new(BookSlot {
            view: RwLock::new(Arc::new(BookView::empty(key.clone(), self.config.kind))),
            book: Mutex::new(book),
        });
        books.insert(key.clone(), slot.clone());
        METRICS.books.inc();
        info!(symbol, tick_size = %spec.tick_size, kind = ?self.config.kind, "book subscribed");

        Ok((key, slot))
    }

    /// Runs on the symbol's lane.
    fn apply(&self, slot: &BookSlot, msg: &BookMessage, now_ms: i64) {
        let symbol = msg.symbol();
        let timer = METRICS.apply_duration.with_label_values(&[symbol]).start_timer();

        let (outcome, published) = {
            let mut book = slot.book.lock();
            let was_valid = book.is_valid();
            let last_update_id = book.last_update_id();
            let outcome = book.apply(msg, now_ms);

            match &outcome {
                ApplyOutcome::Invalidated(reason) => {
                    warn!(
                        symbol,
                        update_id = msg.data.update_id,
                        last_update_id,
                        reason = reason.kind(),
                        error = %reason,
                        "book invalidated"
                    );
                }
                ApplyOutcome::Rejected(reason) => {
                    debug!(symbol, update_id = msg.data.update_id, error = %reason, "message rejected");
                }
                ApplyOutcome::Applied { .. } => {}
            }

            let material = match outcome {
                ApplyOutcome::Applied { changed } => changed || !was_valid,
                _ => was_valid != book.is_valid(),
            };
            // 时间戳与更新号每条消息都会推进，档位不变也要重新发布
            let current = slot.published();
            let stale = current.update_time_ms != book.update_time_ms()
                || current.delay_ms != book.delay_ms()
                || current.last_update_id != book.last_update_id();
            let published = (material || stale).then(|| Arc::new(book.view(self.config.view_depth)));
            (outcome, published.map(|view| (view, material)))
        };
        timer.observe_duration();

        METRICS
            .book_messages_total
            .with_label_values(&[symbol, outcome.label()])
            .inc();
        METRICS
            .book_delay
            .with_label_values(&[symbol])
            .observe(delay_duration(msg.engine_time(), now_ms).as_secs_f64());

        if let Some((view, material)) = published {
            *slot.view.write() = view.clone();
            if material {
                self.notify(view, &outcome);
            }
        }
    }

    fn notify(&self, view: Arc<BookView>, outcome: &ApplyOutcome) {
        let observers = self.observers.read().clone();

        if let ApplyOutcome::Invalidated(reason) = outcome {
            METRICS
                .invalidations_total
                .with_label_values(&[view.symbol.as_ref(), reason.kind()])
                .inc();
            for observer in &observers {
                observer.on_invalidated(&view.symbol, reason);
            }
            // 没有订阅者时发送失败，属正常情况
            let _ = self.events.send(BookEvent::Invalidated {
                symbol: view.symbol.clone(),
                reason: reason.clone(),
            });
            return;
        }

        for observer in &observers {
            observer.on_update(&view);
        }
        let _ = self.events.send(BookEvent::Updated(view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::{InstrumentSpec, StaticCatalog};
    use crate::domain::orderbook::{BookKind, Level};
    use crate::shared::protocol::{BookData, UpdateType};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store(kind: BookKind) -> BookStore {
        let catalog: StaticCatalog = [
            InstrumentSpec::new("BTCUSDT", Decimal::new(10, 2)),
            InstrumentSpec::new("ETHUSDT", Decimal::new(1, 2)),
        ]
        .into_iter()
        .collect();
        let config = BookConfig {
            kind,
            window_offset: Decimal::ZERO,
            ..BookConfig::default()
        };
        BookStore::new(StoreContext::current(catalog.into_shared(), config).unwrap())
    }

    fn lvl(price: i64, size: i64) -> Level {
        Level::new(Decimal::new(price, 2), Decimal::from(size))
    }

    fn msg(symbol: &str, update_type: UpdateType, update_id: u64, asks: Vec<Level>, bids: Vec<Level>) -> BookMessage {
        BookMessage {
            topic: format!("orderbook.50.{symbol}"),
            update_type,
            ts: 1_000,
            cts: None,
            data: BookData {
                symbol: symbol.to_string(),
                bids,
                asks,
                update_id,
                seq: 0,
            },
        }
    }

    fn snapshot(symbol: &str, update_id: u64) -> BookMessage {
        msg(
            symbol,
            UpdateType::Snapshot,
            update_id,
            vec![lvl(10000, 1), lvl(10010, 2)],
            vec![lvl(9990, 1), lvl(9980, 3)],
        )
    }

    #[tokio::test]
    async fn test_unknown_instrument() {
        let store = store(BookKind::Windowed);
        let err = store.subscribe("DOGEUSDT").unwrap_err();
        assert_eq!(err, StoreError::UnknownInstrument("DOGEUSDT".to_string()));
        assert!(store.route(snapshot("DOGEUSDT", 1)).is_err());
        assert!(store.symbols().is_empty());
    }

    #[tokio::test]
    async fn test_route_publishes_view() {
        let store = store(BookKind::Windowed);
        store.subscribe("BTCUSDT").unwrap();
        assert!(!store.is_valid("BTCUSDT"));
        assert_eq!(store.invalid_symbols().len(), 1);

        store.route(snapshot("BTCUSDT", 1)).unwrap();
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 2, vec![lvl(10000, 0)], vec![]))
            .unwrap();
        store.flush("BTCUSDT").await.unwrap();

        assert!(store.is_valid("BTCUSDT"));
        assert_eq!(store.best_ask("BTCUSDT"), Some(Quote::new(Decimal::new(10010, 2), Decimal::from(2))));
        assert_eq!(store.best_bid("BTCUSDT").unwrap().price, Decimal::new(9990, 2));
        assert_eq!(store.update_time_ms("BTCUSDT"), Some(1_000));
        assert!(store.delay("BTCUSDT").is_some());
        assert!(store.invalid_symbols().is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_event() {
        let store = store(BookKind::Sparse);
        let mut events = store.events();

        store.route(snapshot("ETHUSDT", 10)).unwrap();
        store
            .route(msg("ETHUSDT", UpdateType::Delta, 9, vec![lvl(10000, 5)], vec![]))
            .unwrap();
        store.flush("ETHUSDT").await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), BookEvent::Updated(view) if view.valid));
        match events.recv().await.unwrap() {
            BookEvent::Invalidated { symbol, reason } => {
                assert_eq!(symbol.as_ref(), "ETHUSDT");
                assert_eq!(reason.kind(), "out_of_order_sequence");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!store.is_valid("ETHUSDT"));
        // 失效前的数据仍可读
        assert_eq!(store.best_ask("ETHUSDT").unwrap().size, Decimal::ONE);
        assert_eq!(store.invalid_symbols(), vec![Arc::<str>::from("ETHUSDT")]);
    }

    struct CountingObserver {
        updates: AtomicUsize,
        invalidations: AtomicUsize,
    }

    impl BookObserver for CountingObserver {
        fn on_update(&self, _view: &Arc<BookView>) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_invalidated(&self, _symbol: &str, _reason: &BookError) {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_observer_only_sees_material_changes() {
        let store = store(BookKind::Windowed);
        let observer = Arc::new(CountingObserver {
            updates: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        });
        store.add_observer(observer.clone());

        // 快照前的增量被拒绝，不通知
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 1, vec![lvl(10000, 1)], vec![]))
            .unwrap();
        store.route(snapshot("BTCUSDT", 5)).unwrap();
        // 与快照相同的数量：不是实质变化
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 6, vec![lvl(10010, 2)], vec![]))
            .unwrap();
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 7, vec![lvl(10010, 4)], vec![]))
            .unwrap();
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 8, vec![lvl(90000, 4)], vec![]))
            .unwrap();
        store.flush("BTCUSDT").await.unwrap();

        assert_eq!(observer.updates.load(Ordering::SeqCst), 2);
        assert_eq!(observer.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_tears_down_lane() {
        let store = store(BookKind::Windowed);
        store.route(snapshot("BTCUSDT", 1)).unwrap();
        store.route(snapshot("ETHUSDT", 1)).unwrap();
        store.flush_all().await.unwrap();
        assert_eq!(store.lane_count(), 2);

        assert!(store.unsubscribe("BTCUSDT"));
        assert!(!store.unsubscribe("BTCUSDT"));
        assert_eq!(store.lane_count(), 1);
        assert!(store.view("BTCUSDT").is_none());
        assert_eq!(store.symbols(), vec![Arc::<str>::from("ETHUSDT")]);

        // 重新订阅得到全新的订单簿
        store.subscribe("BTCUSDT").unwrap();
        assert!(!store.is_valid("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_view_tracks_engine_time_without_level_change() {
        let store = store(BookKind::Windowed);
        let mut events = store.events();
        store.route(snapshot("BTCUSDT", 1)).unwrap();

        // 数量与快照相同
        let mut same = msg("BTCUSDT", UpdateType::Delta, 2, vec![lvl(10010, 2)], vec![]);
        same.ts = 9_000;
        store.route(same).unwrap();
        store.flush("BTCUSDT").await.unwrap();

        let view = store.view("BTCUSDT").unwrap();
        assert_eq!(view.update_time_ms, Some(9_000));
        assert_eq!(view.last_update_id, 2);
        assert!(matches!(events.recv().await.unwrap(), BookEvent::Updated(_)));
        assert!(events.try_recv().is_err());

        // 失效后的增量被拒绝，时间戳照常推进
        store
            .route(msg("BTCUSDT", UpdateType::Delta, 2, vec![], vec![]))
            .unwrap();
        let mut rejected = msg("BTCUSDT", UpdateType::Delta, 3, vec![lvl(10010, 5)], vec![]);
        rejected.ts = 12_000;
        store.route(rejected).unwrap();
        store.flush("BTCUSDT").await.unwrap();

        assert!(!store.is_valid("BTCUSDT"));
        assert_eq!(store.update_time_ms("BTCUSDT"), Some(12_000));
        assert_eq!(store.best_ask("BTCUSDT").unwrap().size, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_context_rejects_window_offset() {
        let catalog: StaticCatalog = [InstrumentSpec::new("BTCUSDT", Decimal::new(10, 2))]
            .into_iter()
            .collect();
        let config = BookConfig {
            window_offset: Decimal::new(-5, 2),
            ..BookConfig::default()
        };
        let err = StoreContext::current(catalog.into_shared(), config).err().unwrap();
        assert_eq!(err, StoreError::InvalidWindowOffset(Decimal::new(-5, 2)));
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_symbol_metrics() {
        let catalog: StaticCatalog = [InstrumentSpec::new("UNSUBUSDT", Decimal::new(10, 2))]
            .into_iter()
            .collect();
        let store = BookStore::new(StoreContext::current(catalog.into_shared(), BookConfig::default()).unwrap());
        store.route(snapshot("UNSUBUSDT", 1)).unwrap();
        store
            .route(msg("UNSUBUSDT", UpdateType::Delta, 1, vec![], vec![]))
            .unwrap();
        store.flush("UNSUBUSDT").await.unwrap();
        assert!(METRICS.export().contains("UNSUBUSDT"));

        assert!(store.unsubscribe("UNSUBUSDT"));
        assert!(!METRICS.export().contains("UNSUBUSDT"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_route_racing_unsubscribe_leaves_no_orphan_lane() {
        let store = store(BookKind::Windowed);
        let routers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for id in 1..=500 {
                        store.route(snapshot("BTCUSDT", id)).unwrap();
                    }
                })
            })
            .collect();
        let unsubscriber = {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    store.unsubscribe("BTCUSDT");
                }
            })
        };
        for handle in routers {
            handle.join().unwrap();
        }
        unsubscriber.join().unwrap();

        // 每个通道都对应一个已订阅的订单簿
        assert!(store.lane_count() <= store.symbols().len());
        store.unsubscribe("BTCUSDT");
        assert_eq!(store.lane_count(), 0);
    }

    #[tokio::test]
    async fn test_route_after_shutdown() {
        let store = store(BookKind::Windowed);
        store.shutdown();
        let err = store.route(snapshot("BTCUSDT", 1)).unwrap_err();
        assert_eq!(err, StoreError::Sequencer(SequencerError::Closed));
    }
}
