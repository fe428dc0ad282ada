/// Infrastructure Layer - Technical Implementations
///
/// Everything that talks to the outside world on behalf of the replica:
/// today that is the observability HTTP surface (metrics and health).
///
/// ## Modules
/// - `observability`: Prometheus export, health, readiness and liveness endpoints

pub mod observability;

pub use observability::{HealthChecker, HealthStatus, ObservabilityServer};
