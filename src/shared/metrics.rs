//! Prometheus Metrics Module
//!
//! 订单簿副本的核心运行指标
//!
//! ## 指标类型
//! - **Counter**: 行情帧数（按类型）、订单簿消息处理结果、失效原因
//! - **Histogram**: 单条消息应用耗时、行情延迟
//! - **Gauge**: 活跃处理通道数、已订阅订单簿数
//!
//! ## 使用示例
//! ```rust,ignore
//! use lob_mirror::shared::metrics::METRICS;
//!
//! METRICS.frames_total.with_label_values(&["orderbook"]).inc();
//!
//! let timer = METRICS.apply_duration.with_label_values(&["BTCUSDT"]).start_timer();
//! // ... apply ...
//! timer.observe_duration();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// 全局Metrics实例
    pub static ref METRICS: Metrics = Metrics::new();
}

pub struct Metrics {
    /// 收到的行情帧 (orderbook/kline/ack/malformed)
    pub frames_total: CounterVec,

    /// 订单簿消息处理结果 (applied/unchanged/rejected/invalidated)
    pub book_messages_total: CounterVec,

    /// 订单簿失效次数 (按原因)
    pub invalidations_total: CounterVec,

    /// 单条消息应用耗时 (秒)
    pub apply_duration: HistogramVec,

    /// 本地时间 - 撮合引擎时间 (秒)
    pub book_delay: HistogramVec,

    /// 活跃处理通道
    pub active_lanes: Gauge,

    /// 已订阅订单簿
    pub books: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: register_counter_vec!(
                "lob_mirror_frames_total",
                "Inbound feed frames by kind",
                &["kind"]
            )
            .expect("register lob_mirror_frames_total"),

            book_messages_total: register_counter_vec!(
                "lob_mirror_book_messages_total",
                "Orderbook messages by apply outcome",
                &["symbol", "outcome"]
            )
            .expect("register lob_mirror_book_messages_total"),

            invalidations_total: register_counter_vec!(
                "lob_mirror_invalidations_total",
                "Book invalidations by reason",
                &["symbol", "reason"]
            )
            .expect("register lob_mirror_invalidations_total"),

            apply_duration: register_histogram_vec!(
                "lob_mirror_apply_duration_seconds",
                "Time to apply one orderbook message",
                &["symbol"],
                vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005]
            )
            .expect("register lob_mirror_apply_duration_seconds"),

            book_delay: register_histogram_vec!(
                "lob_mirror_book_delay_seconds",
                "Local receive time minus matching engine time",
                &["symbol"],
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
            )
            .expect("register lob_mirror_book_delay_seconds"),

            active_lanes: register_gauge!(
                "lob_mirror_active_lanes",
                "Per-symbol processing lanes currently running"
            )
            .expect("register lob_mirror_active_lanes"),

            books: register_gauge!("lob_mirror_books", "Subscribed order books")
                .expect("register lob_mirror_books"),
        }
    }

    /// 删除某交易对的全部带标签序列
    ///
    /// `outcomes` and `reasons` list every value the `outcome` and `reason`
    /// labels may carry.
    pub fn remove_symbol(&self, symbol: &str, outcomes: &[&str], reasons: &[&str]) {
        // 从未记录过的组合删除失败，忽略即可
        let _ = self.apply_duration.remove_label_values(&[symbol]);
        let _ = self.book_delay.remove_label_values(&[symbol]);
        for &outcome in outcomes {
            let _ = self.book_messages_total.remove_label_values(&[symbol, outcome]);
        }
        for &reason in reasons {
            let _ = self.invalidations_total.remove_label_values(&[symbol, reason]);
        }
    }

    /// 导出Prometheus文本格式
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
