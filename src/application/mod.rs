/// Application Layer - lanes, store, router
///
/// Drives the domain books from a live feed. Depends on the domain layer
/// and on tokio; knows nothing about transports.
///
/// ## Modules
/// - `sequencer`: per-symbol ordered lanes (`UpdateSequencer`)
/// - `store`: symbol → book map, published views, change notifications
/// - `router`: text frame → store / kline channel / ack handling

pub mod router;
pub mod sequencer;
pub mod store;

pub use router::{FeedRouter, Routed};
pub use sequencer::{LaneStats, LaneStop, UpdateSequencer};
pub use store::{BookEvent, BookObserver, BookStore, StoreContext};
