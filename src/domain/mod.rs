/// Domain Layer - Core Book Logic
///
/// Reconstruction of an exchange order book from snapshots and deltas.
/// No I/O and no runtime here; everything is driven by the application layer.
///
/// ## Modules
/// - `orderbook`: price window, the `OrderBook` contract and its two
///   representations
/// - `replica`: per-symbol book state and apply rules
/// - `instrument`: tick size / decimals metadata
///
/// ## Principles
/// 1. **Pure Logic**: no I/O, no frameworks
/// 2. **Contained Failures**: every error becomes a typed outcome
/// 3. **Testable**: unit tests need no runtime

pub mod instrument;
pub mod orderbook;
pub mod replica;

pub use instrument::{InstrumentCatalog, InstrumentSpec, StaticCatalog};
pub use orderbook::{BookKind, Level, OrderBook, Quote, Side, SparseBook, WindowedBook};
pub use replica::{ApplyOutcome, BookConfig, BookView, ReplicaBook};
