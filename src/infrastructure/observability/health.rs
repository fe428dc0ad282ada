//! Health Check
//!
//! 订单簿副本的健康状态，用于负载均衡器和监控系统
//!
//! ## 状态判定
//! - 手动设置的状态非 Healthy 时直接返回（例如正在关闭）
//! - 任一已订阅订单簿处于失效状态 → Degraded
//! - 否则 → Healthy
//!
//! ## 响应格式
//! ```json
//! {
//!   "status": "degraded",
//!   "uptime_seconds": 3600,
//!   "version": "0.1.0",
//!   "timestamp": 1234567890,
//!   "details": { "books": 2, "invalid_books": 1, "invalid_symbols": ["ETHUSDT"], "active_lanes": 2 }
//! }
//! ```

use crate::application::store::BookStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// 部分订单簿失效，等待新快照
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDetails {
    /// 已订阅订单簿数
    pub books: usize,
    pub invalid_books: usize,
    pub invalid_symbols: Vec<String>,
    pub active_lanes: usize,
}

/// 健康检查器
pub struct HealthChecker {
    start_time: Instant,
    /// 手动设置的基础状态
    status: RwLock<HealthStatus>,
    version: String,
    store: BookStore,
}

impl HealthChecker {
    pub fn new(version: impl Into<String>, store: BookStore) -> Self {
        Self {
            start_time: Instant::now(),
            status: RwLock::new(HealthStatus::Healthy),
            version: version.into(),
            store,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn set_status(&self, status: HealthStatus) {
        *self.status.write() = status;
    }

    /// 综合手动状态与订单簿有效性
    pub fn get_status(&self) -> HealthStatus {
        let base = *self.status.read();
        if base != HealthStatus::Healthy {
            return base;
        }
        if self.store.invalid_symbols().is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    pub fn details(&self) -> HealthDetails {
        let invalid: Vec<String> = self
            .store
            .invalid_symbols()
            .iter()
            .map(|symbol| symbol.to_string())
            .collect();
        HealthDetails {
            books: self.store.symbols().len(),
            invalid_books: invalid.len(),
            invalid_symbols: invalid,
            active_lanes: self.store.lane_count(),
        }
    }

    pub fn check_health(&self) -> HealthResponse {
        HealthResponse {
            status: self.get_status(),
            uptime_seconds: self.uptime_seconds(),
            version: self.version.clone(),
            timestamp: Self::current_timestamp(),
            details: Some(self.details()),
        }
    }

    /// 存活检查：只要能返回就说明进程仍在运行
    pub fn check_liveness(&self) -> bool {
        true
    }

    /// 就绪检查：所有订单簿有效才接受流量
    pub fn check_readiness(&self) -> bool {
        matches!(self.get_status(), HealthStatus::Healthy)
    }
}
