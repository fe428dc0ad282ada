//! HTTP Observability Server
//!
//! 提供Prometheus metrics和健康检查端点
//!
//! ## 端点
//! - `GET /metrics` - Prometheus格式的指标
//! - `GET /health` - 健康检查（含失效订单簿列表）
//! - `GET /health/ready` - 就绪检查（所有订单簿有效）
//! - `GET /health/live` - 存活检查
//!
//! ## 使用示例
//! ```rust,ignore
//! let server = ObservabilityServer::new(9090, store.clone());
//! tokio::spawn(server.run());
//! ```

use super::health::{HealthChecker, HealthStatus};
use crate::application::store::BookStore;
use crate::shared::metrics::METRICS;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// 可观测性服务器
pub struct ObservabilityServer {
    addr: SocketAddr,
    health_checker: Arc<HealthChecker>,
}

impl ObservabilityServer {
    pub fn new(port: u16, store: BookStore) -> Self {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        Self {
            addr,
            health_checker: Arc::new(HealthChecker::new(env!("CARGO_PKG_VERSION"), store)),
        }
    }

    pub fn health_checker(&self) -> Arc<HealthChecker> {
        self.health_checker.clone()
    }

    pub fn router(&self) -> Router {
        router(self.health_checker.clone())
    }

    /// 启动HTTP服务器
    pub async fn run(self) -> std::io::Result<()> {
        let app = self.router();

        info!(addr = %self.addr, "observability server listening");
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await
    }
}

fn router(checker: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(checker)
}

async fn metrics_handler() -> Response {
    (StatusCode::OK, METRICS.export()).into_response()
}

async fn health_handler(State(checker): State<Arc<HealthChecker>>) -> Response {
    let response = checker.check_health();

    // Degraded 仍返回200：进程可用，只是部分订单簿在等待快照
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// Kubernetes readiness check
async fn readiness_handler(State(checker): State<Arc<HealthChecker>>) -> StatusCode {
    if checker.check_readiness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Kubernetes liveness check
async fn liveness_handler(State(checker): State<Arc<HealthChecker>>) -> StatusCode {
    if checker.check_liveness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
