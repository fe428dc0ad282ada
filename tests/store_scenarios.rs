//! 订单簿副本端到端场景：快照、增量、乱序、缺失快照
//!
//! 每个场景都跑两种订单簿实现，结果必须一致。

use lob_mirror::application::{BookEvent, BookStore, StoreContext};
use lob_mirror::domain::instrument::{InstrumentSpec, StaticCatalog};
use lob_mirror::domain::orderbook::{BookKind, Level, Quote};
use lob_mirror::domain::replica::BookConfig;
use lob_mirror::shared::error::BookError;
use lob_mirror::shared::protocol::{BookData, BookMessage, UpdateType};
use rust_decimal::Decimal;

const KINDS: [BookKind; 2] = [BookKind::Windowed, BookKind::Sparse];

fn store(kind: BookKind) -> BookStore {
    let catalog: StaticCatalog = [InstrumentSpec::new("BTCUSDT", Decimal::new(10, 2)).with_decimals(2)]
        .into_iter()
        .collect();
    let config = BookConfig {
        kind,
        window_offset: Decimal::ZERO,
        ..BookConfig::default()
    };
    BookStore::new(StoreContext::current(catalog.into_shared(), config).unwrap())
}

fn px(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn lvl(cents: i64, size: i64) -> Level {
    Level::new(px(cents), Decimal::from(size))
}

fn message(update_type: UpdateType, update_id: u64, asks: Vec<Level>, bids: Vec<Level>) -> BookMessage {
    BookMessage {
        topic: "orderbook.50.BTCUSDT".to_string(),
        update_type,
        ts: 1_700_000_000_000,
        cts: Some(1_700_000_000_000),
        data: BookData {
            symbol: "BTCUSDT".to_string(),
            bids,
            asks,
            update_id,
            seq: update_id,
        },
    }
}

fn snapshot_a() -> BookMessage {
    message(
        UpdateType::Snapshot,
        10,
        vec![lvl(10000, 1), lvl(10010, 2)],
        vec![lvl(9990, 1), lvl(9980, 3)],
    )
}

#[tokio::test]
async fn snapshot_sets_best_prices() {
    for kind in KINDS {
        let store = store(kind);
        store.route(snapshot_a()).unwrap();
        store.flush("BTCUSDT").await.unwrap();

        assert!(store.is_valid("BTCUSDT"), "{kind:?}");
        assert_eq!(store.best_ask("BTCUSDT"), Some(Quote::new(px(10000), Decimal::ONE)));
        assert_eq!(store.best_bid("BTCUSDT"), Some(Quote::new(px(9990), Decimal::ONE)));

        let view = store.view("BTCUSDT").unwrap();
        assert_eq!(view.kind, kind);
        assert_eq!(view.asks, vec![
            Quote::new(px(10000), Decimal::ONE),
            Quote::new(px(10010), Decimal::from(2)),
        ]);
        assert_eq!(view.bids, vec![
            Quote::new(px(9990), Decimal::ONE),
            Quote::new(px(9980), Decimal::from(3)),
        ]);
        assert_eq!(view.spread(), Some(px(10)));
        store.shutdown();
    }
}

#[tokio::test]
async fn removing_best_ask_promotes_next_level() {
    for kind in KINDS {
        let store = store(kind);
        store.route(snapshot_a()).unwrap();
        store
            .route(message(UpdateType::Delta, 11, vec![lvl(10000, 0)], vec![]))
            .unwrap();
        store.flush("BTCUSDT").await.unwrap();

        assert!(store.is_valid("BTCUSDT"));
        assert_eq!(store.best_ask("BTCUSDT"), Some(Quote::new(px(10010), Decimal::from(2))));
        assert_eq!(store.view("BTCUSDT").unwrap().asks.len(), 1);
        store.shutdown();
    }
}

#[tokio::test]
async fn stale_update_invalidates_and_keeps_levels() {
    for kind in KINDS {
        let store = store(kind);
        let mut events = store.events();
        store.route(snapshot_a()).unwrap();
        store
            .route(message(UpdateType::Delta, 10, vec![lvl(10000, 0)], vec![lvl(9990, 7)]))
            .unwrap();
        store.flush("BTCUSDT").await.unwrap();

        let view = store.view("BTCUSDT").unwrap();
        assert!(!view.valid);
        assert_eq!(view.last_update_id, 10);
        assert_eq!(view.best_ask, Some(Quote::new(px(10000), Decimal::ONE)));
        assert_eq!(view.best_bid, Some(Quote::new(px(9990), Decimal::ONE)));
        assert_eq!(store.invalid_symbols().len(), 1);

        assert!(matches!(events.recv().await.unwrap(), BookEvent::Updated(_)));
        match events.recv().await.unwrap() {
            BookEvent::Invalidated { symbol, reason } => {
                assert_eq!(symbol.as_ref(), "BTCUSDT");
                assert!(matches!(reason, BookError::OutOfOrderSequence { last: 10, received: 10, .. }));
            }
            other => panic!("unexpected event {other:?}"),
        }

        // 新快照恢复有效
        store.route(message(UpdateType::Snapshot, 20, vec![lvl(10050, 4)], vec![lvl(10040, 5)])).unwrap();
        store.flush("BTCUSDT").await.unwrap();
        assert!(store.is_valid("BTCUSDT"));
        assert_eq!(store.best_ask("BTCUSDT"), Some(Quote::new(px(10050), Decimal::from(4))));
        assert!(store.invalid_symbols().is_empty());
        store.shutdown();
    }
}

#[tokio::test]
async fn delta_without_snapshot_is_rejected() {
    for kind in KINDS {
        let store = store(kind);
        store
            .route(message(UpdateType::Delta, 1, vec![lvl(10000, 1)], vec![]))
            .unwrap();
        store.flush("BTCUSDT").await.unwrap();

        let view = store.view("BTCUSDT").unwrap();
        assert!(!view.valid);
        assert!(!view.snapshot_received);
        assert_eq!(view.best_ask, None);

        // 通道继续工作
        store.route(snapshot_a()).unwrap();
        store.flush("BTCUSDT").await.unwrap();
        assert!(store.is_valid("BTCUSDT"));
        store.shutdown();
    }
}

#[tokio::test]
async fn windowed_price_outside_window_invalidates() {
    let outside = || message(UpdateType::Delta, 11, vec![lvl(10500, 1)], vec![]);

    let windowed = store(BookKind::Windowed);
    windowed.route(snapshot_a()).unwrap();
    windowed.route(outside()).unwrap();
    windowed.flush("BTCUSDT").await.unwrap();
    assert!(!windowed.is_valid("BTCUSDT"));
    windowed.shutdown();

    // 稀疏实现没有窗口限制
    let sparse = store(BookKind::Sparse);
    sparse.route(snapshot_a()).unwrap();
    sparse.route(outside()).unwrap();
    sparse.flush("BTCUSDT").await.unwrap();
    assert!(sparse.is_valid("BTCUSDT"));
    assert_eq!(sparse.view("BTCUSDT").unwrap().asks.len(), 3);
    sparse.shutdown();
}

#[tokio::test]
async fn unsubscribe_tears_down_lane() {
    let store = store(BookKind::Windowed);
    store.route(snapshot_a()).unwrap();
    store.flush("BTCUSDT").await.unwrap();
    assert_eq!(store.lane_count(), 1);

    assert!(store.unsubscribe("BTCUSDT"));
    assert!(!store.unsubscribe("BTCUSDT"));
    assert_eq!(store.lane_count(), 0);
    assert!(store.view("BTCUSDT").is_none());
    assert!(!store.is_valid("BTCUSDT"));

    // 重新订阅得到全新的订单簿
    store.route(snapshot_a()).unwrap();
    store.flush("BTCUSDT").await.unwrap();
    assert!(store.is_valid("BTCUSDT"));
    store.shutdown();
}
