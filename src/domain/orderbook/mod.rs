/// Domain Layer - OrderBook Module
///
/// Replica order books reconstructed from an exchange feed.
///
/// ## Representations
/// - `WindowedBook`: tick-indexed arrays sized from the last snapshot plus an
///   offset, with a `FastBitmap` of nonzero slots
///   - O(1) update, bounded price range
/// - `SparseBook`: `BTreeMap` per side
///   - O(log n) update, no range limit
///
/// ## Trait Abstraction
/// The `OrderBook` trait is the one contract both implement; `ReplicaBook`
/// (in `domain::replica`) owns a `Box<dyn OrderBook>` and adds sequencing.

pub mod price_window;
pub mod sparse;
pub mod traits;
pub mod types;
pub mod windowed;

pub use price_window::{PriceWindow, WindowBounds};
pub use sparse::SparseBook;
pub use traits::OrderBook;
pub use types::{BookKind, Level, LevelChange, Quote, Side};
pub use windowed::WindowedBook;
