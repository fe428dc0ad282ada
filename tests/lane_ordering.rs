//! 多生产者并发入队时，同一交易对的任务严格按入队顺序、逐个执行

use lob_mirror::application::UpdateSequencer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const PRODUCERS: usize = 4;
const PER_PRODUCER: usize = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_keep_admission_order() {
    let sequencer = Arc::new(UpdateSequencer::current().unwrap());
    let key: Arc<str> = Arc::from("BTCUSDT");

    // 入队顺序由该锁决定：拿到锁的生产者取号并在锁内入队
    let admission = Arc::new(Mutex::new(0usize));
    let applied = Arc::new(Mutex::new(Vec::with_capacity(PRODUCERS * PER_PRODUCER)));
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let sequencer = sequencer.clone();
            let key = key.clone();
            let admission = admission.clone();
            let applied = applied.clone();
            let in_flight = in_flight.clone();
            let overlaps = overlaps.clone();

            thread::spawn(move || {
                for _ in 0..PER_PRODUCER {
                    let mut next = admission.lock();
                    let id = *next;
                    *next += 1;

                    let applied = applied.clone();
                    let in_flight = in_flight.clone();
                    let overlaps = overlaps.clone();
                    sequencer
                        .enqueue(&key, async move {
                            if in_flight.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            tokio::task::yield_now().await;
                            applied.lock().push(id);
                            in_flight.store(false, Ordering::SeqCst);
                        })
                        .unwrap();
                    drop(next);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    sequencer.flush(&key).await.unwrap();

    let applied = applied.lock().clone();
    let expected: Vec<usize> = (0..PRODUCERS * PER_PRODUCER).collect();
    assert_eq!(applied, expected);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    sequencer.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_symbol_does_not_block_others() {
    let sequencer = UpdateSequencer::current().unwrap();
    let slow: Arc<str> = Arc::from("SLOWUSDT");
    let fast: Arc<str> = Arc::from("FASTUSDT");

    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    sequencer
        .enqueue(&slow, async move {
            let _ = release_rx.await;
        })
        .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let done = done.clone();
        sequencer
            .enqueue(&fast, async move {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    // 慢通道仍阻塞时，快通道已全部完成
    sequencer.flush(&fast).await.unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 10);
    assert_eq!(sequencer.lane_count(), 2);

    release_tx.send(()).unwrap();
    sequencer.flush(&slow).await.unwrap();
    sequencer.shutdown();
}
