/// Update Sequencer - one ordered lane per symbol
///
/// Messages for many symbols arrive interleaved, possibly from several
/// producer tasks. Each symbol gets its own unbounded queue and a single
/// consumer task, so:
/// - per symbol, jobs run one at a time in admission order
/// - symbols run in parallel on the shared tokio runtime
/// - `enqueue` never awaits; the receive path is never blocked by a slow book
///
/// ## Architecture
/// ```text
/// producer ─┐                 ┌─> lane[BTCUSDT] ── job, job, job ─> consumer task
/// producer ─┼─ enqueue(key) ──┼─> lane[ETHUSDT] ── job ───────────> consumer task
/// producer ─┘                 └─> lane[...]
/// ```
///
/// Admission happens under the lane-map lock, so two producers racing on one
/// symbol are ordered by who took the lock first. A panicking job is caught
/// and counted; the lane moves on to the next job.

use crate::shared::error::SequencerError;
use crate::shared::metrics::METRICS;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Unit of work run on a lane
pub type Job = BoxFuture<'static, ()>;

/// How a lane stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStop {
    /// Stop admission, run everything already queued
    Drain,
    /// Stop admission, finish the in-flight job, drop the rest
    Abandon,
}

/// Counters for one lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    pub processed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct LaneCounters {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl LaneCounters {
    fn snapshot(&self) -> LaneStats {
        LaneStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

struct Lane {
    tx: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
    counters: Arc<LaneCounters>,
}

pub struct UpdateSequencer {
    runtime: Handle,
    lanes: Mutex<HashMap<Arc<str>, Lane>>,
    /// 所有通道的父取消令牌
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl UpdateSequencer {
    /// Lanes are spawned on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            lanes: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Use the runtime of the calling context
    pub fn current() -> Result<Self, SequencerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SequencerError::NoRuntime(e.to_string()))
    }

    /// Admit `job` to the lane of `key`, creating the lane on first use.
    ///
    /// Returns as soon as the job is queued.
    pub fn enqueue<F>(&self, key: &Arc<str>, job: F) -> Result<(), SequencerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.enqueue_boxed(key, job.boxed())
    }

    pub fn enqueue_boxed(&self, key: &Arc<str>, job: Job) -> Result<(), SequencerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SequencerError::Closed);
        }

        let mut lanes = self.lanes.lock();
        let lane = lanes
            .entry(key.clone())
            .or_insert_with(|| self.spawn_lane(key.clone()));

        match lane.tx.send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(job)) => {
                // 消费者已退出（运行时关闭等），重建通道
                let lane = self.spawn_lane(key.clone());
                let result = lane
                    .tx
                    .send(job)
                    .map_err(|_| SequencerError::LaneClosed(key.to_string()));
                lanes.insert(key.clone(), lane);
                result
            }
        }
    }

    /// Resolves once every job admitted to `key` before this call has run.
    pub async fn flush(&self, key: &Arc<str>) -> Result<(), SequencerError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(key, async move {
            let _ = done_tx.send(());
        })?;
        done_rx
            .await
            .map_err(|_| SequencerError::LaneClosed(key.to_string()))
    }

    /// Stop the lane of `key`; returns false if there was none.
    pub fn close_lane(&self, key: &str, stop: LaneStop) -> bool {
        let Some(lane) = self.lanes.lock().remove(key) else {
            return false;
        };
        if stop == LaneStop::Abandon {
            lane.cancel.cancel();
        }
        // Drain: 丢弃发送端后，消费者处理完队列中剩余任务即退出
        debug!(symbol = key, ?stop, "lane closed");
        true
    }

    /// Abandon every lane and refuse further admission.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.cancel();
        self.lanes.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn lane_stats(&self, key: &str) -> Option<LaneStats> {
        self.lanes.lock().get(key).map(|lane| lane.counters.snapshot())
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.lock().len()
    }

    fn spawn_lane(&self, key: Arc<str>) -> Lane {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();
        let counters = Arc::new(LaneCounters::default());

        self.runtime
            .spawn(run_lane(key.clone(), rx, cancel.clone(), counters.clone()));
        debug!(symbol = %key, "lane started");

        Lane { tx, cancel, counters }
    }
}

/// 单个通道的消费循环：严格FIFO，一次只执行一个任务
async fn run_lane(
    key: Arc<str>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    cancel: CancellationToken,
    counters: Arc<LaneCounters>,
) {
    METRICS.active_lanes.inc();

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(()) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(panic) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(symbol = %key, panic = panic_message(panic.as_ref()), "lane job panicked");
            }
        }
    }

    METRICS.active_lanes.dec();
    debug!(symbol = %key, "lane stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
