/// Interfaces Layer - External Entry Points
///
/// Everything that drives the replica from outside: the replay CLI and
/// the synthetic feed tooling. A live websocket transport would sit here
/// too, calling `FeedRouter::handle_text` from its read loop.
///
/// ## Modules
/// - `cli`: Command-line interface (main.rs logic)
/// - `tools`: Utility tools (feed generator)

pub mod cli;
pub mod tools;
